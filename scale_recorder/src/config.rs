//! Runtime configuration, read from `SCALE_*` environment variables.

use std::path::PathBuf;

use nau7802::{SampleRate, DEFAULT_SAMPLES};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Settings for one recorder run.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// I2C character device the NAU7802 sits on.
    pub i2c_device: String,
    /// JSON file holding the zero offset and calibration factor.
    pub settings_path: PathBuf,
    /// Conversion rate applied after the default power-on setup.
    pub sample_rate: SampleRate,
    /// Conversions averaged per weight reading.
    pub samples_per_reading: usize,
    /// Report readings below the zero offset as negative weights.
    pub allow_negative: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            i2c_device: "/dev/i2c-1".to_string(),
            settings_path: PathBuf::from("settings.json"),
            sample_rate: SampleRate::Sps320,
            samples_per_reading: DEFAULT_SAMPLES,
            allow_negative: true,
        }
    }
}

impl RecorderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, falling back to defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dev) = lookup("SCALE_I2C_DEV") {
            config.i2c_device = dev;
        }
        if let Some(path) = lookup("SCALE_SETTINGS_PATH") {
            config.settings_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("SCALE_SPS") {
            config.sample_rate = value
                .trim()
                .parse()
                .ok()
                .and_then(SampleRate::from_sps)
                .ok_or(ConfigError::InvalidValue { key: "SCALE_SPS", value })?;
        }
        if let Some(value) = lookup("SCALE_SAMPLES") {
            config.samples_per_reading = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidValue { key: "SCALE_SAMPLES", value }),
            };
        }
        if let Some(value) = lookup("SCALE_ALLOW_NEGATIVE") {
            config.allow_negative = match value.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::InvalidValue { key: "SCALE_ALLOW_NEGATIVE", value }),
            };
        }

        Ok(config)
    }
}
