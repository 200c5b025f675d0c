//! Zero offset and calibration factor persisted as JSON between runs.
//!
//! The driver keeps both values in memory only. This module loads them at
//! start-up, pushes them into the driver, and writes them back after a
//! calibration.

use std::fs;
use std::io;
use std::path::Path;

use embedded_hal::i2c::I2c;
use nau7802::Nau7802;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Offset stored before the scale has ever been zeroed.
pub const UNSET_ZERO_OFFSET: i32 = 1000;
/// Factors below this are treated as "never calibrated".
const MIN_CALIBRATION_FACTOR: f32 = 0.1;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings file I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Values a caller must keep to restore a calibrated scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleSettings {
    #[serde(rename = "CALIBRATION_FACTOR", default)]
    pub calibration_factor: f32,
    #[serde(rename = "ZERO_OFFSET", default = "unset_zero_offset")]
    pub zero_offset: i32,
}

fn unset_zero_offset() -> i32 {
    UNSET_ZERO_OFFSET
}

impl Default for ScaleSettings {
    fn default() -> Self {
        Self { calibration_factor: 0.0, zero_offset: UNSET_ZERO_OFFSET }
    }
}

impl ScaleSettings {
    /// Load settings from `path`. A missing file yields the uncalibrated defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults.", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Settings written to {}.", path.display());
        Ok(())
    }

    /// False while either value still holds its placeholder.
    pub fn is_calibrated(&self) -> bool {
        self.calibration_factor >= MIN_CALIBRATION_FACTOR && self.zero_offset != UNSET_ZERO_OFFSET
    }

    /// Snapshot the values currently held by the driver.
    pub fn from_scale<I2C, E>(scale: &Nau7802<I2C>) -> Self
    where
        I2C: I2c<Error = E>,
        E: std::error::Error + 'static,
    {
        Self { calibration_factor: scale.calibration_factor(), zero_offset: scale.zero_offset() }
    }

    /// Push these values into the driver. A factor the driver rejects leaves
    /// its current factor in place.
    pub fn apply_to<I2C, E>(&self, scale: &mut Nau7802<I2C>)
    where
        I2C: I2c<Error = E>,
        E: std::error::Error + 'static,
    {
        scale.set_zero_offset(self.zero_offset);
        if let Err(e) = scale.set_calibration_factor(self.calibration_factor) {
            warn!("Stored calibration factor ignored: {e}");
        }
    }
}
