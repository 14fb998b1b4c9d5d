use crate::materializer::MaterialOverride;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Turntable".to_string(), width: 1280, height: 720, vsync: true, fullscreen: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_min_distance")]
    pub min_distance: f32,
    #[serde(default = "CameraConfig::default_orbit_sensitivity")]
    pub orbit_sensitivity: f32,
    #[serde(default = "CameraConfig::default_zoom_duration_secs")]
    pub zoom_duration_secs: f32,
}

impl CameraConfig {
    const fn default_min_distance() -> f32 {
        0.01
    }

    const fn default_orbit_sensitivity() -> f32 {
        0.005
    }

    const fn default_zoom_duration_secs() -> f32 {
        0.4
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_distance: Self::default_min_distance(),
            orbit_sensitivity: Self::default_orbit_sensitivity(),
            zoom_duration_secs: Self::default_zoom_duration_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowConfig {
    #[serde(default = "ShadowConfig::default_resolution")]
    pub resolution: u32,
}

impl ShadowConfig {
    const fn default_resolution() -> u32 {
        1024
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self { resolution: Self::default_resolution() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    #[serde(default = "AssetConfig::default_path")]
    pub path: String,
    #[serde(default = "AssetConfig::default_overrides")]
    pub overrides: Vec<MaterialOverride>,
}

impl AssetConfig {
    fn default_path() -> String {
        "assets/models/robot.glb".to_string()
    }

    /// The stock override table for the bundled robot asset: a repainted matte
    /// tail and a glossy clearcoated head, both with boosted normal detail.
    fn default_overrides() -> Vec<MaterialOverride> {
        vec![
            MaterialOverride {
                material: "M_Robot_Tail".to_string(),
                color: Some("#222".to_string()),
                roughness: Some(0.6),
                clear_roughness_map: true,
                normal_scale: Some(4.0),
                clearcoat: None,
            },
            MaterialOverride {
                material: "M_Robot_Head".to_string(),
                color: Some("black".to_string()),
                roughness: Some(0.0),
                clear_roughness_map: false,
                normal_scale: Some(4.0),
                clearcoat: Some(0.1),
            },
        ]
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self { path: Self::default_path(), overrides: Self::default_overrides() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub shadow: ShadowConfig,
    #[serde(default)]
    pub asset: AssetConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
    pub asset: Option<String>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("config load error: {err:?}; falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.window.vsync = vsync;
        }
        if let Some(asset) = &overrides.asset {
            self.asset.path = asset.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_missing_sections() {
        let cfg: AppConfig = serde_json::from_str("{}").expect("empty object parses");
        assert_eq!(cfg.window.width, 1280);
        assert!((cfg.camera.min_distance - 0.01).abs() < f32::EPSILON);
        assert_eq!(cfg.shadow.resolution, 1024);
        assert_eq!(cfg.asset.overrides.len(), 2);
    }

    #[test]
    fn loads_partial_file_and_applies_cli_overrides() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config file");
        write!(file, r#"{{ "window": {{ "title": "T", "width": 800, "height": 600, "vsync": true, "fullscreen": false }} }}"#)
            .expect("write config");
        let mut cfg = AppConfig::load(file.path()).expect("load config");
        assert_eq!(cfg.window.width, 800);

        let overrides = AppConfigOverrides {
            width: Some(1024),
            vsync: Some(false),
            asset: Some("other.glb".to_string()),
            ..Default::default()
        };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.window.width, 1024);
        assert_eq!(cfg.window.height, 600);
        assert!(!cfg.window.vsync);
        assert_eq!(cfg.asset.path, "other.glb");
    }

    #[test]
    fn unreadable_config_falls_back_to_defaults() {
        let cfg = AppConfig::load_or_default("does/not/exist.json");
        assert_eq!(cfg.window.title, "Turntable");
    }
}
