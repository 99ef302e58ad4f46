//! Platform layer: windowing, event loop and input for the fur demo.
//!
//! - Continuous redraw: every `about_to_wait` requests a frame.
//! - Keyboard changes fur parameters; the renderer reacts on the next draw.
//! - Construction failures (shader, invalid mesh) end the run with an error.

pub mod input;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use asset::mask::DEFAULT_MASK_SIZE;
use asset::mesh::MeshData;
use asset::texture::TextureData;
use asset::{obj, primitives};
use corelib::camera::Camera;
use corelib::transform::Transform;
use corelib::{FurCommand, FurParams, MeshSlot, vec3};
use renderer::{FurRenderable, FurScene, GpuState};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::input::Action;

/// Everything `main` collects from the command line.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub backends: wgpu::Backends,
    pub show_fps: bool,
    pub width: u32,
    pub height: u32,
    pub primary_mesh: Option<PathBuf>,
    pub secondary_mesh: Option<PathBuf>,
    pub base_texture: Option<PathBuf>,
    pub params: FurParams,
    pub mask_size: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            show_fps: false,
            width: 1280,
            height: 720,
            primary_mesh: Some(PathBuf::from("models/bunny_world.obj")),
            secondary_mesh: Some(PathBuf::from("models/rock.obj")),
            base_texture: Some(PathBuf::from("textures/fur.bmp")),
            params: FurParams::default(),
            mask_size: DEFAULT_MASK_SIZE,
        }
    }
}

/// Open the window and run the fur scene until it is closed.
pub fn run_with_renderer(config: RunConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = FurApp::new(config);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Load an OBJ, or fall back to a built-in mesh when the path is unset or unreadable.
pub fn load_mesh(path: Option<&Path>, fallback: fn() -> MeshData) -> (String, MeshData) {
    if let Some(path) = path {
        match obj::load_obj_from_path(path) {
            Ok(mesh) => return (path.display().to_string(), mesh),
            Err(err) => log::warn!("{err:#}; using built-in mesh"),
        }
    }
    ("built-in".to_string(), fallback())
}

fn fallback_primary() -> MeshData {
    primitives::uv_sphere(32, 48)
}

fn fallback_secondary() -> MeshData {
    primitives::quad_cube()
}

/// Placement used for every mesh: lifted by one unit and doubled in size.
fn model_transform() -> Transform {
    Transform::placed(vec3(0.0, 1.0, 0.0), 2.0)
}

struct FpsCounter {
    since: Instant,
    frames: u32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            since: Instant::now(),
            frames: 0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let elapsed = self.since.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            log::info!("FPS: {:.1}", self.frames as f32 / elapsed);
            self.frames = 0;
            self.since = Instant::now();
        }
    }
}

struct FurApp {
    config: RunConfig,
    base_texture: Option<TextureData>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    scene: Option<FurScene>,
    fps: FpsCounter,
    fatal: Option<anyhow::Error>,
}

impl FurApp {
    fn new(config: RunConfig) -> Self {
        let base_texture = config
            .base_texture
            .as_deref()
            .and_then(|path| match TextureData::load(path) {
                Ok(tex) => Some(tex),
                Err(err) => {
                    log::warn!("{err:#}; fur uses the fallback colour");
                    None
                }
            });
        Self {
            config,
            base_texture,
            window: None,
            gpu: None,
            scene: None,
            fps: FpsCounter::new(),
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Furshell")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let gpu = pollster::block_on(GpuState::new(window.clone(), self.config.backends))
            .context("GPU initialization failed")?;
        let renderable = self.build_renderable(&gpu, MeshSlot::Primary, &self.config.params)?;
        let camera = Camera::orbiting(vec3(0.0, 1.0, 0.0), 6.0, 60f32.to_radians(), gpu.aspect());

        self.scene = Some(FurScene::new(camera, self.config.params, renderable));
        self.gpu = Some(gpu);
        self.window = Some(window);
        Ok(())
    }

    fn build_renderable(
        &self,
        gpu: &GpuState,
        slot: MeshSlot,
        params: &FurParams,
    ) -> Result<FurRenderable> {
        let (path, fallback): (_, fn() -> MeshData) = match slot {
            MeshSlot::Primary => (self.config.primary_mesh.as_deref(), fallback_primary),
            MeshSlot::Secondary => (self.config.secondary_mesh.as_deref(), fallback_secondary),
        };
        let (name, mesh) = load_mesh(path, fallback);
        gpu.create_renderable(
            &name,
            mesh,
            self.base_texture.as_ref(),
            params,
            model_transform(),
            self.config.mask_size,
        )
        .with_context(|| format!("Failed to build fur renderable from {name}"))
    }

    fn handle_action(&mut self, event_loop: &ActiveEventLoop, action: Action) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        match action {
            Action::Exit => event_loop.exit(),
            Action::Orbit { yaw, pitch } => scene.camera.orbit(yaw, pitch),
            Action::Zoom(factor) => scene.camera.zoom(factor),
            Action::Fur(FurCommand::SwitchMesh(slot)) => {
                let params = scene.params;
                let Some(gpu) = self.gpu.as_ref() else {
                    return;
                };
                match self.build_renderable(gpu, slot, &params) {
                    Ok(renderable) => {
                        if let Some(scene) = self.scene.as_mut() {
                            scene.replace_renderable(renderable);
                        }
                    }
                    Err(err) => self.fail(event_loop, err),
                }
            }
            Action::Fur(cmd) => scene.apply(cmd),
        }
    }

    fn redraw(&mut self) {
        let (Some(gpu), Some(scene)) = (self.gpu.as_mut(), self.scene.as_mut()) else {
            return;
        };
        match gpu.render(scene) {
            Ok(()) => {
                if self.config.show_fps {
                    self.fps.tick();
                }
            }
            Err(err) if GpuState::is_surface_lost(&err) => {
                log::warn!("Surface {err}; reconfiguring");
                if let Some(format) = gpu.recreate_surface() {
                    scene.renderable.retarget(format);
                }
            }
            Err(wgpu::SurfaceError::Timeout) => log::debug!("Surface timeout; skipping frame"),
            Err(err) => log::error!("Render error: {err}"),
        }
    }
}

impl ApplicationHandler for FurApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if let Some(action) = input::action_for_key(code) {
                    self.handle_action(event_loop, action);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(action) = input::action_for_scroll(delta) {
                    self.handle_action(event_loop, action);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mesh_falls_back_to_builtin() {
        let (name, mesh) = load_mesh(Some(Path::new("no/such/model.obj")), fallback_secondary);
        assert_eq!(name, "built-in");
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.faces.expect("faces").face_count(), 6);
    }

    #[test]
    fn unset_mesh_uses_fallback() {
        let (_, mesh) = load_mesh(None, fallback_primary);
        assert!(mesh.has_vertices());
    }

    #[test]
    fn default_config_matches_demo_parameters() {
        let config = RunConfig::default();
        assert_eq!(config.params.fur_density, 30_000);
        assert_eq!(config.params.num_of_layers, 30);
        assert_eq!(config.mask_size, 128);
        assert_eq!(config.base_texture, Some(PathBuf::from("textures/fur.bmp")));
    }

    #[test]
    fn unreadable_base_texture_is_dropped() {
        let app = FurApp::new(RunConfig {
            base_texture: Some(PathBuf::from("no/such/fur.bmp")),
            ..RunConfig::default()
        });
        assert!(app.base_texture.is_none());
    }
}
