//! Renderer: wgpu init + depth + fur shell passes.
//! wgpu = 26.x, winit = 0.30.x

pub mod buffers;
pub mod fur;
pub mod scene;
pub mod shader;
pub mod shell;
pub mod uniform;

use std::sync::Arc;

use asset::mesh::MeshData;
use asset::texture::TextureData;
use corelib::transform::Transform;
use corelib::{FurError, FurParams};
use thiserror::Error;
use wgpu::{
    Adapter, Backends, CommandEncoderDescriptor, Device, DeviceDescriptor, Extent3d, Features,
    Instance, InstanceDescriptor, Limits, LoadOp, Operations, PowerPreference, PresentMode, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Surface, SurfaceConfiguration,
    SurfaceError, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};
use winit::{dpi::PhysicalSize, window::Window};

pub use fur::{FrameContext, FurRenderable};
pub use scene::FurScene;

pub(crate) const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("No suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("Failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("Surface reports no supported formats")]
    NoSurfaceFormat,
    #[error(transparent)]
    Fur(#[from] FurError),
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    adapter: Adapter,

    // Device/queue
    device: Device,
    queue: Queue,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: Backends) -> Result<Self, RendererError> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Furshell Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        let surface_format = preferred_format(&surface, &adapter)?;
        let caps = surface.get_capabilities(&adapter);

        // Configure surface
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);

        Ok(Self {
            surface,
            surface_config,
            adapter,
            device,
            queue,
            depth_view,
            width,
            height,
        })
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Build a fur renderable against this device and surface format.
    pub fn create_renderable(
        &self,
        name: &str,
        mesh: MeshData,
        base: Option<&TextureData>,
        params: &FurParams,
        transform: Transform,
        mask_size: u32,
    ) -> Result<FurRenderable, RendererError> {
        Ok(FurRenderable::new(
            &self.device,
            &self.queue,
            self.surface_config.format,
            name,
            mesh,
            base,
            params,
            transform,
            mask_size,
        )?)
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    /// Render one frame: clear, then draw the scene's fur shells.
    pub fn render(&mut self, scene: &mut FurScene) -> Result<(), SurfaceError> {
        scene.camera.aspect = self.aspect();
        let projection = scene.camera.proj();
        let view_matrix = scene.camera.view();

        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("FurPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.08,
                            a: 1.0,
                        }),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut ctx = FrameContext {
                device: &self.device,
                queue: &self.queue,
                pass: &mut rpass,
                projection,
                view: view_matrix,
            };
            scene.renderable.draw(&mut ctx, &scene.params, scene.parent);
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    /// Reconfigure after a lost/outdated surface. Returns the new format if
    /// the preferred one changed.
    pub fn recreate_surface(&mut self) -> Option<TextureFormat> {
        let changed = match preferred_format(&self.surface, &self.adapter) {
            Ok(format) if format != self.surface_config.format => {
                log::info!(
                    "Surface format changed: {:?} -> {:?}",
                    self.surface_config.format,
                    format
                );
                self.surface_config.format = format;
                Some(format)
            }
            Ok(_) => None,
            Err(err) => {
                log::warn!("{err}; keeping {:?}", self.surface_config.format);
                None
            }
        };
        self.resize(self.width, self.height);
        changed
    }
}

/// Surface format, preferring sRGB.
fn preferred_format(surface: &Surface<'_>, adapter: &Adapter) -> Result<TextureFormat, RendererError> {
    let caps = surface.get_capabilities(adapter);
    caps.formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or(RendererError::NoSurfaceFormat)
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}
