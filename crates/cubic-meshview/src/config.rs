// SPDX-License-Identifier: CEPL-1.0
//! Command line plus `cubic.toml`. CLI flags win over the file, the file wins
//! over built-in defaults.
use clap::{Parser, ValueEnum};
use cubic_render::{RenderSettings, DEFAULT_CLEAR_COLOR};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Textured mesh viewer", long_about = None)]
pub struct Args {
    /// Renderer backend; `auto` tries Vulkan and falls back to OpenGL
    #[arg(long, value_enum)]
    pub backend: Option<BackendChoice>,

    /// Configuration file
    #[arg(long, default_value = "cubic.toml")]
    pub config: PathBuf,

    /// Directory the asset paths are resolved against
    #[arg(long)]
    pub assets: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendChoice {
    #[default]
    Auto,
    Vk,
    Gl,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            title: "cubic meshview".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub backend: BackendChoice,
    pub clear_color: [f32; 4],
    pub asset_root: PathBuf,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            clear_color: DEFAULT_CLEAR_COLOR,
            asset_root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

impl AppCfg {
    /// Missing file means defaults; a malformed one is reported and ignored.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                warn!("ignoring malformed {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => {
                info!("no {} found; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(src: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(src)
    }

    pub fn apply_args(mut self, args: &Args) -> Self {
        if let Some(backend) = args.backend {
            self.render.backend = backend;
        }
        if let Some(root) = &args.assets {
            self.render.asset_root = root.clone();
        }
        self
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            asset_root: self.render.asset_root.clone(),
            clear_color: self.render.clear_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_parses() {
        let cfg = AppCfg::parse(
            r#"
            [window]
            title = "viewer"
            width = 800
            height = 600

            [render]
            backend = "gl"
            clear_color = [0.0, 0.0, 0.0, 1.0]
            asset_root = "/opt/cubic"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "viewer");
        assert_eq!((cfg.window.width, cfg.window.height), (800, 600));
        assert_eq!(cfg.render.backend, BackendChoice::Gl);
        assert_eq!(cfg.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(cfg.render.asset_root, PathBuf::from("/opt/cubic"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = AppCfg::parse("[window]\nwidth = 640\n").unwrap();
        assert_eq!(cfg.window.width, 640);
        assert_eq!(cfg.window.height, WindowCfg::default().height);
        assert_eq!(cfg.render, RenderCfg::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(AppCfg::parse("[render]\nbackend = \"metal\"\n").is_err());
        assert!(AppCfg::parse("[window\n").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = AppCfg::load(Path::new("/nonexistent/cubic.toml"));
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn cli_overrides_file() {
        let file = AppCfg::parse("[render]\nbackend = \"vk\"\nasset_root = \"a\"\n").unwrap();
        let args = Args::parse_from(["cubic-meshview", "--backend", "gl", "--assets", "b"]);
        let cfg = file.apply_args(&args);
        assert_eq!(cfg.render.backend, BackendChoice::Gl);
        assert_eq!(cfg.render.asset_root, PathBuf::from("b"));

        let untouched = AppCfg::default().apply_args(&Args::parse_from(["cubic-meshview"]));
        assert_eq!(untouched.render.backend, BackendChoice::Auto);
        assert_eq!(untouched.render.asset_root, PathBuf::from("."));
    }
}
