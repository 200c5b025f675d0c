use std::error::Error;
use std::io::{self, Write};
use std::time::Duration;

use linux_embedded_hal::{I2CError, I2cdev};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use config::RecorderConfig;
use reader::ScaleReader;
use settings::{ScaleSettings, SettingsError};

pub mod config;
pub mod data;
pub mod reader;
pub mod settings;

/// Conversions averaged while zeroing and calibrating.
pub const CALIBRATION_SAMPLES: usize = 64;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("could not open I2C device: {0}")]
    Device(String),
    #[error("scale error: {0}")]
    Scale(#[from] nau7802::Error<I2CError>),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("console I/O error: {0}")]
    Io(#[from] io::Error),
}

fn open_reader(
    config: &RecorderConfig,
) -> Result<(ScaleReader<I2cdev>, ScaleSettings), RecorderError> {
    let i2c = I2cdev::new(&config.i2c_device).map_err(|e| RecorderError::Device(e.to_string()))?;
    let settings = ScaleSettings::load(&config.settings_path)?;
    let reader = ScaleReader::new(i2c, settings, config)?;
    Ok((reader, settings))
}

/// Print weights until `cancel` fires, then power the scale down.
#[tracing::instrument(skip(cancel))]
pub fn record(config: &RecorderConfig, cancel: &CancellationToken) -> Result<(), RecorderError> {
    let (mut reader, settings) = open_reader(config)?;
    let calibrated = settings.is_calibrated();
    if !calibrated {
        warn!("Scale not calibrated. Run `scale_recorder calibrate <weight>` first.");
    }

    while !cancel.is_cancelled() {
        match reader.measure() {
            Some(sample) => println!(
                "Reading: {}\tWeight: {:.2}\tAvgWeight: {:.2}\t{}",
                sample.raw,
                sample.weight,
                sample.average_weight,
                if calibrated { "" } else { "Scale not calibrated!" }
            ),
            None => std::thread::sleep(Duration::from_millis(1)),
        }
    }

    reader.shutdown()?;
    info!("Scale powered down.");
    Ok(())
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{message} ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

/// Zero the scale, calibrate it against `known_weight` and persist the result.
#[tracing::instrument]
pub fn calibrate(
    config: &RecorderConfig,
    known_weight: f32,
) -> Result<ScaleSettings, RecorderError> {
    let (mut reader, _) = open_reader(config)?;

    prompt("Setup scale with no weight on it. Press Enter when ready.")?;
    let offset = reader.zero(CALIBRATION_SAMPLES)?;
    println!("New zero offset: {offset}");

    prompt(&format!(
        "Place {known_weight} on the scale. Press Enter when it is in place and stable."
    ))?;
    let settings = reader.calibrate(known_weight, CALIBRATION_SAMPLES)?;
    settings.save(&config.settings_path)?;
    println!("New calibration factor: {:.2}", settings.calibration_factor);

    if let Some(sample) = reader.measure() {
        println!("New scale reading: {:.2}", sample.weight);
    }
    reader.shutdown()?;
    Ok(settings)
}

/// Run the recorder loop until Ctrl-C.
pub async fn scale_recorder(config: RecorderConfig) -> Result<(), Box<dyn Error>> {
    let cancel = CancellationToken::new();
    let cloned_cancel = cancel.clone();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {e}");
            return;
        }
        info!("Shutdown signal received.");
        cancel.cancel();
    });

    // The driver blocks while polling, keep it off the async workers.
    tokio::task::block_in_place(|| record(&config, &cloned_cancel))?;

    info!("Recorder stopped.");
    Ok(())
}
