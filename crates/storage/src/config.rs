//! User settings: zoom limits and the data directory.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables.
//!
//! Environment variables:
//! - `SITEINSPECT_DATA_DIR`: directory holding the session and settings files
//! - `SITEINSPECT_ZOOM_MIN`: minimum zoom in percent (default: 50)
//! - `SITEINSPECT_ZOOM_MAX`: maximum zoom in percent (default: 200)
//! - `SITEINSPECT_ZOOM_STEP`: zoom step in percent (default: 10)

use inspect_model::ZoomLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "SITEINSPECT_DATA_DIR";
pub const ENV_ZOOM_MIN: &str = "SITEINSPECT_ZOOM_MIN";
pub const ENV_ZOOM_MAX: &str = "SITEINSPECT_ZOOM_MAX";
pub const ENV_ZOOM_STEP: &str = "SITEINSPECT_ZOOM_STEP";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unable to write settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid zoom limits: {0}")]
    InvalidZoom(String),
}

/// Expected file format:
/// ```toml
/// data_dir = "/path/to/data"
///
/// [zoom]
/// min_percent = 50
/// max_percent = 200
/// step_percent = 10
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub zoom: ZoomLimits,
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `path` when it exists, defaults otherwise, then applies the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };

        settings.with_env(lookup)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }

        let percent = |key: &'static str| -> Result<Option<u16>, ConfigError> {
            lookup(key)
                .map(|value| {
                    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue { key, value })
                })
                .transpose()
        };

        if let Some(min) = percent(ENV_ZOOM_MIN)? {
            self.zoom.min_percent = min;
        }
        if let Some(max) = percent(ENV_ZOOM_MAX)? {
            self.zoom.max_percent = max;
        }
        if let Some(step) = percent(ENV_ZOOM_STEP)? {
            self.zoom.step_percent = step;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zoom.check().map_err(ConfigError::InvalidZoom)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_plan_view_limits() {
        let settings = Settings::default();
        assert_eq!(settings.zoom, ZoomLimits { min_percent: 50, max_percent: 200, step_percent: 10 });
        assert_eq!(settings.data_dir, None);
    }

    #[test]
    fn parses_partial_file() {
        let settings = Settings::from_toml("[zoom]\nmax_percent = 400\n").expect("valid toml");
        assert_eq!(settings.zoom.max_percent, 400);
        assert_eq!(settings.zoom.min_percent, 50);
    }

    #[test]
    fn rejects_inverted_limits() {
        let err = Settings::from_toml("[zoom]\nmin_percent = 300\n").expect_err("min above max");
        assert!(matches!(err, ConfigError::InvalidZoom(_)));
    }

    #[test]
    fn env_overrides_file() {
        let settings = Settings::from_toml("data_dir = \"/from/file\"\n")
            .expect("valid toml")
            .with_env(env(&[(ENV_DATA_DIR, "/from/env"), (ENV_ZOOM_STEP, "25")]))
            .expect("valid overrides");

        assert_eq!(settings.data_dir, Some(PathBuf::from("/from/env")));
        assert_eq!(settings.zoom.step_percent, 25);
    }

    #[test]
    fn env_rejects_non_numeric_zoom() {
        let err = Settings::default()
            .with_env(env(&[(ENV_ZOOM_MIN, "half")]))
            .expect_err("not a number");

        assert!(matches!(err, ConfigError::InvalidValue { key: ENV_ZOOM_MIN, .. }));
    }

    #[test]
    fn file_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("settings.toml");
        let settings = Settings {
            data_dir: Some(PathBuf::from("/data")),
            zoom: ZoomLimits { min_percent: 25, max_percent: 400, step_percent: 25 },
        };

        settings.save_to_file(&path).expect("save should succeed");
        assert_eq!(Settings::from_file(&path).expect("load should succeed"), settings);
    }

    #[test]
    fn from_file_requires_existing_file() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let settings = Settings::from_file(temp.path().join("missing.toml"));
        assert!(matches!(settings, Err(ConfigError::Io(_))));
    }

    #[test]
    fn missing_optional_file_falls_back_to_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("missing.toml");

        let loaded =
            Settings::load_with(Some(path.as_path()), env(&[])).expect("defaults are valid");
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn load_with_reads_existing_file() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("settings.toml");
        fs::write(&path, "[zoom]\nstep_percent = 5\n").expect("write should succeed");

        let loaded = Settings::load_with(Some(path.as_path()), env(&[(ENV_ZOOM_MAX, "300")]))
            .expect("valid settings");
        assert_eq!(loaded.zoom, ZoomLimits { min_percent: 50, max_percent: 300, step_percent: 5 });
    }
}
