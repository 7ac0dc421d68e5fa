use std::{ffi::OsString, path::PathBuf};

use anyhow::{bail, Context};
use halfling_routine::ShadingMode;
use pico_args::Arguments;
use wgpu::Backend;

pub const HELP: &str = "\
halfling-demo

Clustered deferred shading of a scene file.

usage: halfling-demo --options [./path/to/scene.json]

Meta:
  -h --help                    This menu.

Rendering:
  --shading <mode>             Light gather to use ('tiled' [clustered compute], 'no-cull' [every light per pixel]). Default tiled.
  -b --backend <backend>       Choose backend to run on ('vk', 'dx12', 'dx11', 'metal', 'gl').
  --vsync <on|off>             Wait for vblank. Default on.

Windowing:
  --width <pixels>             Initial window width. Default 1280.
  --height <pixels>            Initial window height. Default 720.

Controls:
  Left drag orbits, right drag pans, the wheel zooms.
  1 / 2 switch to tiled / no-cull shading, F toggles wireframe, Space pauses the lights.
  ` opens the console. Type 'help' for its commands.
";

#[derive(Debug, Clone, PartialEq)]
pub struct DemoOptions {
    pub scene_path: PathBuf,
    pub shading: ShadingMode,
    pub backend: Option<Backend>,
    pub vsync: bool,
    pub width: u32,
    pub height: u32,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            scene_path: default_scene_path(),
            shading: ShadingMode::default(),
            backend: None,
            vsync: true,
            width: 1280,
            height: 720,
        }
    }
}

pub fn default_scene_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/scene.json"))
}

fn extract_backend(value: &str) -> Result<Backend, &'static str> {
    Ok(match value.to_lowercase().as_str() {
        "vulkan" | "vk" => Backend::Vulkan,
        "dx12" | "12" => Backend::Dx12,
        "dx11" | "11" => Backend::Dx11,
        "metal" | "mtl" => Backend::Metal,
        "opengl" | "gl" => Backend::Gl,
        _ => return Err("unknown backend"),
    })
}

fn extract_toggle(value: &str) -> Result<bool, &'static str> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err("expected 'on' or 'off'"),
    }
}

impl DemoOptions {
    /// `None` if help was requested.
    pub fn parse(args: Vec<OsString>) -> anyhow::Result<Option<Self>> {
        let mut args = Arguments::from_vec(args);

        if args.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let mut options = Self::default();
        if let Some(shading) = args.opt_value_from_str("--shading")? {
            options.shading = shading;
        }
        options.backend = args.opt_value_from_fn(["-b", "--backend"], extract_backend)?;
        if let Some(vsync) = args.opt_value_from_fn("--vsync", extract_toggle)? {
            options.vsync = vsync;
        }
        if let Some(width) = args.opt_value_from_str("--width")? {
            options.width = width;
        }
        if let Some(height) = args.opt_value_from_str("--height")? {
            options.height = height;
        }
        if options.width == 0 || options.height == 0 {
            bail!("window size must be non-zero, got {}x{}", options.width, options.height);
        }

        if let Some(scene_path) = args.opt_free_from_str().context("invalid scene path")? {
            options.scene_path = scene_path;
        }

        let remaining = args.finish();
        if !remaining.is_empty() {
            let remaining: Vec<_> = remaining.iter().map(|s| s.to_string_lossy()).collect();
            bail!("unknown arguments: {}", remaining.join(" "));
        }

        Ok(Some(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Option<DemoOptions>> {
        DemoOptions::parse(args.iter().map(OsString::from).collect())
    }

    #[test]
    fn defaults() {
        assert_eq!(parse(&[]).unwrap(), Some(DemoOptions::default()));
        assert!(parse(&["--help"]).unwrap().is_none());
    }

    #[test]
    fn every_option() {
        let options = parse(&[
            "--shading",
            "no-cull",
            "-b",
            "VK",
            "--vsync",
            "off",
            "--width",
            "800",
            "--height",
            "600",
            "scenes/sponza.json",
        ])
        .unwrap()
        .unwrap();

        assert_eq!(
            options,
            DemoOptions {
                scene_path: PathBuf::from("scenes/sponza.json"),
                shading: ShadingMode::NoCull,
                backend: Some(Backend::Vulkan),
                vsync: false,
                width: 800,
                height: 600,
            }
        );
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(parse(&["--shading", "forward"]).is_err());
        assert!(parse(&["--backend", "glide"]).is_err());
        assert!(parse(&["--width", "0"]).is_err());
        assert!(parse(&["--vsync", "maybe"]).is_err());
        assert!(parse(&["a.json", "b.json"]).is_err());
    }
}
