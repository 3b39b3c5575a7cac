//! Configuration file support for threadcanvas.
//!
//! Settings are read from `~/.config/threadcanvas/config.toml` (or a path given
//! on the command line). Missing files fall back to defaults; out of range
//! values are clamped with a warning.

pub mod enums;
pub mod types;

pub use enums::{BackendKind, OverflowPolicy};
pub use types::{CanvasConfig, DemoConfig};

use anyhow::{Context, Result};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure.
///
/// # Example TOML
/// ```toml
/// [canvas]
/// capacity = 512
/// fps = 30
/// overflow = "block"
///
/// [demo]
/// producers = 8
/// batch_size = 4
/// frames = 120
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Queue, pacing and surface settings
    #[serde(default)]
    pub canvas: CanvasConfig,

    /// Producer/consumer demo settings
    #[serde(default)]
    pub demo: DemoConfig,
}

impl Config {
    /// Clamps all values to their valid ranges, logging a warning for each fix.
    ///
    /// Validated ranges:
    /// - `canvas.capacity`: 1 - 65536
    /// - `canvas.fps`: 0 - 1000
    /// - `canvas.width` / `canvas.height`: 16 - 8192
    /// - `canvas.background`: 0.0 - 1.0 per component
    /// - `demo.producers`: 1 - 64
    /// - `demo.batch_size`: 1 - 256
    pub fn validate_and_clamp(&mut self) {
        if !(1..=65536).contains(&self.canvas.capacity) {
            log::warn!(
                "Invalid capacity {}, clamping to 1-65536 range",
                self.canvas.capacity
            );
            self.canvas.capacity = self.canvas.capacity.clamp(1, 65536);
        }

        if self.canvas.fps > 1000 {
            log::warn!("Invalid fps {}, clamping to 0-1000 range", self.canvas.fps);
            self.canvas.fps = 1000;
        }

        for (name, value) in [
            ("width", &mut self.canvas.width),
            ("height", &mut self.canvas.height),
        ] {
            if !(16..=8192).contains(&*value) {
                log::warn!("Invalid {} {}, clamping to 16-8192 range", name, value);
                *value = (*value).clamp(16, 8192);
            }
        }

        for (i, component) in self.canvas.background.iter_mut().enumerate() {
            if !(0.0..=1.0).contains(&*component) {
                log::warn!(
                    "Invalid background[{}] = {:.3}, clamping to 0.0-1.0",
                    i,
                    component
                );
                *component = component.clamp(0.0, 1.0);
            }
        }

        if !(1..=64).contains(&self.demo.producers) {
            log::warn!(
                "Invalid producers {}, clamping to 1-64 range",
                self.demo.producers
            );
            self.demo.producers = self.demo.producers.clamp(1, 64);
        }

        if !(1..=256).contains(&self.demo.batch_size) {
            log::warn!(
                "Invalid batch_size {}, clamping to 1-256 range",
                self.demo.batch_size
            );
            self.demo.batch_size = self.demo.batch_size.clamp(1, 256);
        }
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("threadcanvas");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads the configuration from the default path, or defaults if it does not exist.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Loads and validates the configuration at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config = Self::from_toml(&config_str)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate_and_clamp();

        info!("Loaded config from {}", path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Parses a TOML document without validation.
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Serializes the configuration as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// JSON schema describing the configuration file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.canvas.capacity, 1024);
        assert_eq!(config.canvas.fps, 60);
        assert_eq!(config.canvas.overflow, OverflowPolicy::Block);
        assert_eq!(config.demo.producers, 4);
        assert_eq!(config.demo.backend, BackendKind::Log);
    }

    #[test]
    fn parses_kebab_case_enums() {
        let config = Config::from_toml(
            r#"
            [canvas]
            overflow = "overwrite-oldest"
            fps = 0

            [demo]
            backend = "cairo"
            "#,
        )
        .unwrap();
        assert_eq!(config.canvas.overflow, OverflowPolicy::OverwriteOldest);
        assert_eq!(config.canvas.fps, 0);
        assert_eq!(config.demo.backend, BackendKind::Cairo);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut config = Config::from_toml(
            r#"
            [canvas]
            capacity = 0
            fps = 5000
            width = 2
            background = [2.0, -1.0, 0.5, 1.0]

            [demo]
            producers = 1000
            batch_size = 0
            "#,
        )
        .unwrap();
        config.validate_and_clamp();

        assert_eq!(config.canvas.capacity, 1);
        assert_eq!(config.canvas.fps, 1000);
        assert_eq!(config.canvas.width, 16);
        assert_eq!(config.canvas.background, [1.0, 0.0, 0.5, 1.0]);
        assert_eq!(config.demo.producers, 64);
        assert_eq!(config.demo.batch_size, 1);
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[canvas]\ncapacity = \"lots\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn toml_round_trip_keeps_settings() {
        let mut config = Config::default();
        config.canvas.capacity = 7;
        config.demo.record_dir = Some(PathBuf::from("/tmp/frames"));
        let text = config.to_toml_string().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.canvas.capacity, 7);
        assert_eq!(parsed.demo.record_dir, Some(PathBuf::from("/tmp/frames")));
    }

    #[test]
    fn schema_mentions_sections() {
        let schema = serde_json::to_string(&Config::json_schema()).unwrap();
        assert!(schema.contains("canvas"));
        assert!(schema.contains("overwrite-oldest"));
    }
}
