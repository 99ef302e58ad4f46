//! Entry point for the fur shell demo.
//! Logging + CLI flags, then hand over to the platform loop.

use std::path::PathBuf;

use anyhow::Result;
use corelib::FurParams;
use platform::RunConfig;

fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_show_fps_arg(args: &[String]) -> bool {
    // --show-fps[=on|off], off by default
    for arg in args {
        if arg == "--show-fps" {
            return true;
        }
        if let Some(val) = arg.strip_prefix("--show-fps=") {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

fn parse_size_args(args: &[String]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

/// Last `--{name}=value` on the command line; `none` clears a default path.
fn parse_path_arg(args: &[String], name: &str, default: Option<PathBuf>) -> Option<PathBuf> {
    let prefix = format!("--{name}=");
    let mut path = default;
    for arg in args {
        if let Some(v) = arg.strip_prefix(&prefix) {
            path = match v {
                "" | "none" => None,
                p => Some(PathBuf::from(p)),
            };
        }
    }
    path
}

/// Last parseable `--{name}=value`, or `default`.
fn parse_num_arg<T: std::str::FromStr>(args: &[String], name: &str, default: T) -> T {
    let prefix = format!("--{name}=");
    let mut value = default;
    for arg in args {
        if let Some(v) = arg.strip_prefix(&prefix) {
            match v.parse::<T>() {
                Ok(parsed) => value = parsed,
                Err(_) => log::warn!("Ignoring invalid {prefix}{v}"),
            }
        }
    }
    value
}

fn parse_config(args: &[String]) -> RunConfig {
    let defaults = RunConfig::default();
    let (width, height) = parse_size_args(args);
    let fur = defaults.params;
    let params = FurParams::new(
        parse_num_arg(args, "length", fur.fur_length),
        parse_num_arg(args, "density", fur.fur_density),
        parse_num_arg(args, "layers", fur.num_of_layers),
    );

    RunConfig {
        backends: parse_backend_arg(args),
        show_fps: parse_show_fps_arg(args),
        width,
        height,
        primary_mesh: parse_path_arg(args, "mesh", defaults.primary_mesh),
        secondary_mesh: parse_path_arg(args, "alt-mesh", defaults.secondary_mesh),
        base_texture: parse_path_arg(args, "base-texture", defaults.base_texture),
        params,
        mask_size: parse_num_arg(args, "mask-size", defaults.mask_size).max(1),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_config(&args);
    log::info!(
        "Starting furshell. Backend: {:?}, show_fps={}, window_size={}x{}, layers={}, density={}, length={:.2}",
        config.backends,
        config.show_fps,
        config.width,
        config.height,
        config.params.num_of_layers,
        config.params.fur_density,
        config.params.fur_length
    );

    platform::run_with_renderer(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
