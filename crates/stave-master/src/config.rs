//! Controller settings.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use stave_engine::REFERENCE_RATE;

/// Typed error for settings load/parse failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid setting: {0}")]
    Invalid(&'static str),
}

/// Runtime settings for the editor controller.
///
/// Read from an optional YAML file, then overridden by `STAVE_*`
/// environment variables (`STAVE_SAMPLE_RATE=44100`).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Rate requested from the output device.
    pub sample_rate: u32,
    /// 16-bit mono WAV holding every instrument note and editor sound.
    /// Without one a synthesized bank is used.
    pub sample_sheet: Option<PathBuf>,
    /// Grace period after a non-looping song ends before transport stops.
    pub end_stop_ms: u32,
    /// Output latency the follow cursor waits out before moving.
    pub latency_ms: u32,
    /// Rate of WAV exports.
    pub export_rate: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: REFERENCE_RATE,
            sample_sheet: None,
            end_stop_ms: 2000,
            latency_ms: 372,
            export_rate: REFERENCE_RATE,
        }
    }
}

impl Settings {
    /// Load settings from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("STAVE").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive"));
        }
        if self.export_rate == 0 {
            return Err(ConfigError::Invalid("export_rate must be positive"));
        }
        Ok(())
    }
}
