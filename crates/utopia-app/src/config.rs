// SPDX-License-Identifier: CEPL-1.0
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use utopia_render::{ClearColor, PresentPolicy, SurfaceConfig};

use crate::application::ApplicationSpec;

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub app: AppCfg,
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub headless: HeadlessCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppCfg {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub present_mode: PresentModeCfg,
    #[serde(default = "default_min_images")]
    pub min_image_count: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Fifo,
    LowLatency,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessCfg {
    #[serde(default)]
    pub sleep_ms: u64,
}

impl Default for AppCfg {
    fn default() -> Self {
        AppCfg {
            name: default_name(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            present_mode: PresentModeCfg::Fifo,
            min_image_count: default_min_images(),
        }
    }
}

fn default_name() -> String {
    "Utopia App".into()
}
fn default_width() -> u32 {
    1600
}
fn default_height() -> u32 {
    900
}
fn default_clear() -> [f32; 4] {
    ClearColor::default().0
}
fn default_min_images() -> u32 {
    2
}

impl Config {
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Missing file: defaults. Unparseable file: a warning, then defaults.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                warn!("ignoring {}: {e}", path.display());
                Self::default()
            }),
            Err(e) => {
                debug!("no config at {} ({e}); using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn spec(&self) -> ApplicationSpec {
        ApplicationSpec {
            name: self.app.name.clone(),
            width: self.app.width,
            height: self.app.height,
            clear_color: ClearColor(self.render.clear_color),
        }
    }

    pub fn surface(&self) -> SurfaceConfig {
        SurfaceConfig {
            present_policy: match self.render.present_mode {
                PresentModeCfg::Fifo => PresentPolicy::Fifo,
                PresentModeCfg::LowLatency => PresentPolicy::LowLatency,
            },
            min_image_count: self.render.min_image_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.spec(), ApplicationSpec::default());
        assert_eq!(cfg.surface(), SurfaceConfig::default());
        assert_eq!(cfg.headless.sleep_ms, 0);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::parse(
            r#"
            [app]
            width = 800

            [render]
            present_mode = "low_latency"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.app.width, 800);
        assert_eq!(cfg.app.height, 900);
        assert_eq!(cfg.app.name, "Utopia App");
        assert_eq!(cfg.surface().present_policy, PresentPolicy::LowLatency);
        assert_eq!(cfg.render.clear_color, [0.45, 0.55, 0.60, 1.0]);
    }

    #[test]
    fn unknown_present_mode_is_rejected() {
        assert!(Config::parse("[render]\npresent_mode = \"vsync\"").is_err());
    }

    #[test]
    fn missing_or_broken_file_falls_back() {
        let dir = std::env::temp_dir();
        let missing = dir.join("utopia-config-test-missing.toml");
        let _ = fs::remove_file(&missing);
        assert_eq!(Config::load(&missing), Config::default());

        let broken = dir.join(format!("utopia-config-test-{}.toml", std::process::id()));
        fs::write(&broken, "[app\nwidth = ").unwrap();
        assert_eq!(Config::load(&broken), Config::default());
        let _ = fs::remove_file(&broken);
    }
}
