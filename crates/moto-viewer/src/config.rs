//! Configuration for the viewer host

use anyhow::{Context, Result};
use moto_core::{ControlSettings, ModelHandle, Platform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub viewer: WindowConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default = "default_controls")]
    pub controls: ControlSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Widget surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_auto_rotate")]
    pub auto_rotate: bool,
}

fn default_title() -> String {
    "Moto Viewer".to_string()
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_auto_rotate() -> bool {
    true
}

fn default_controls() -> ControlSettings {
    ControlSettings::default()
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            auto_rotate: default_auto_rotate(),
        }
    }
}

/// Which model to show and where bundled assets live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Bundle id from the manifest; ignored when `path` is set
    #[serde(default = "default_bundle_id")]
    pub bundle_id: Option<u32>,
    /// Direct path or URL to a glTF/GLB file
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Force the web or native resolution path
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Download external images on native targets; classified materials
    /// never sample them, so this only checks that they are reachable
    #[serde(default)]
    pub fetch_textures: bool,
}

fn default_bundle_id() -> Option<u32> {
    Some(1)
}

fn default_manifest() -> PathBuf {
    PathBuf::from("assets/bundle.toml")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".moto-cache")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            bundle_id: default_bundle_id(),
            path: None,
            manifest: default_manifest(),
            cache_dir: default_cache_dir(),
            platform: None,
            fetch_textures: false,
        }
    }
}

impl ModelConfig {
    /// The model reference to hand to the resolver
    pub fn handle(&self) -> ModelHandle {
        match (&self.path, self.bundle_id) {
            (Some(path), _) => ModelHandle::Path(path.clone()),
            (None, Some(id)) => ModelHandle::BundleId(id),
            (None, None) => ModelHandle::Unrecognized(String::new()),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    /// Directory bundle sources are relative to
    pub fn bundle_root(&self) -> PathBuf {
        self.manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<ViewerConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: ViewerConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(ViewerConfig::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&ViewerConfig::default())?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.viewer.width, 1280);
        assert!(config.viewer.auto_rotate);
        assert_eq!(config.model.handle(), ModelHandle::BundleId(1));
        assert_eq!(config.controls, ControlSettings::default());
        assert_eq!(config.logging.level, "info");
        assert!(!config.model.fetch_textures);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("viewer.toml");
        std::fs::write(
            &path,
            r#"
            [viewer]
            auto_rotate = false

            [model]
            path = "bikes/custom.glb"
            platform = "web"

            [controls]
            max_zoom = 8.0
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert!(!config.viewer.auto_rotate);
        assert_eq!(config.viewer.height, 720);
        assert_eq!(config.model.handle(), ModelHandle::Path("bikes/custom.glb".into()));
        assert_eq!(config.model.platform(), Platform::Web);
        assert_eq!(config.controls.max_zoom, 8.0);
        assert_eq!(config.controls.min_zoom, 0.5);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("viewer.toml");
        std::fs::write(&path, "[viewer]\nwidth = \"wide\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("viewer.toml");
        save_default_config(&path).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.viewer.title, "Moto Viewer");
        assert_eq!(config.model.manifest, PathBuf::from("assets/bundle.toml"));
        assert_eq!(config.model.bundle_root(), PathBuf::from("assets"));
    }

    #[test]
    fn test_no_handle_configured() {
        let model = ModelConfig {
            bundle_id: None,
            ..ModelConfig::default()
        };
        assert_eq!(model.handle(), ModelHandle::Unrecognized(String::new()));
    }
}
