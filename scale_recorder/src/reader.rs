//! Wrapper around the NAU7802 driver that turns conversions into weight samples.

use std::time::{SystemTime, UNIX_EPOCH};

use embedded_hal::i2c::I2c;
use nau7802::{Error, Nau7802};
use tracing::{info, warn};

use crate::config::RecorderConfig;
use crate::data::{RunningAverage, WeightSample};
use crate::settings::ScaleSettings;

/// Weights smoothed over this many readings.
const AVERAGE_WINDOW: usize = 4;

/// Owns the scale and the per-run smoothing state.
pub struct ScaleReader<I2C> {
    scale: Nau7802<I2C>,
    average: RunningAverage,
    samples_per_reading: usize,
    allow_negative: bool,
}

impl<I2C, E> ScaleReader<I2C>
where
    I2C: I2c<Error = E>,
    E: std::error::Error + 'static,
{
    /// Runs the full power-on setup, restores `settings`, then switches to the
    /// configured sample rate and recalibrates the AFE for it.
    ///
    /// # Errors
    ///
    /// Returns the first error from the driver setup sequence, or from the
    /// sample rate change and recalibration.
    #[tracing::instrument(skip(i2c))]
    pub fn new(
        i2c: I2C,
        settings: ScaleSettings,
        config: &RecorderConfig,
    ) -> Result<Self, Error<E>> {
        let mut scale = Nau7802::new(i2c);
        scale.begin(true)?;
        info!("NAU7802 detected, revision {:#x}.", scale.revision_code()?);

        settings.apply_to(&mut scale);
        scale.set_samples_per_second(config.sample_rate)?;
        scale.calibrate_afe()?;
        info!(
            "Scale ready. Zero offset: {}, calibration factor: {}",
            scale.zero_offset(),
            scale.calibration_factor()
        );

        Ok(Self {
            scale,
            average: RunningAverage::new(AVERAGE_WINDOW),
            samples_per_reading: config.samples_per_reading,
            allow_negative: config.allow_negative,
        })
    }

    /// Returns a sample if a conversion was ready, `None` otherwise.
    ///
    /// Bus errors are logged and skipped. A sample whose weight could not be
    /// computed still carries its raw reading.
    pub fn measure(&mut self) -> Option<WeightSample> {
        match self.scale.available() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("NAU7802 status error: {e}");
                return None;
            }
        }
        let raw = self
            .scale
            .read_raw()
            .map_err(|e| warn!("NAU7802 read error: {e}"))
            .ok()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let mut builder = WeightSample::builder(timestamp).with_raw(raw);

        match self.scale.weight(self.allow_negative, self.samples_per_reading) {
            Ok(weight) => builder = builder.with_weight(weight, self.average.add(weight)),
            Err(e) => warn!("NAU7802 weight error: {e}"),
        }

        Some(builder.build())
    }

    /// Tare with nothing on the scale.
    pub fn zero(&mut self, samples: usize) -> Result<i32, Error<E>> {
        self.scale.tare(samples)?;
        info!("New zero offset: {}", self.scale.zero_offset());
        Ok(self.scale.zero_offset())
    }

    /// Calibrate against `known_weight` and return the values to persist.
    pub fn calibrate(
        &mut self,
        known_weight: f32,
        samples: usize,
    ) -> Result<ScaleSettings, Error<E>> {
        self.scale.calibrate_with_known_weight(known_weight, samples)?;
        info!("New calibration factor: {:.2}", self.scale.calibration_factor());
        Ok(self.settings())
    }

    pub fn settings(&self) -> ScaleSettings {
        ScaleSettings::from_scale(&self.scale)
    }

    /// Power the chip down and hand back the bus.
    pub fn shutdown(mut self) -> Result<I2C, Error<E>> {
        self.scale.power_down()?;
        Ok(self.scale.release())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use nau7802::registers::{Ctrl2, PuCtrl, RegisterBit};
    use nau7802::{Register, SampleRate};
    use test_log::test;

    #[derive(thiserror::Error, Debug)]
    #[error("fake bus error")]
    struct FakeError;

    impl embedded_hal::i2c::Error for FakeError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Always powered up, calibrates instantly, and always has `sample` ready.
    struct FakeChip {
        regs: [u8; 32],
        pointer: usize,
        sample: Rc<Cell<i32>>,
    }

    impl FakeChip {
        fn new(sample: Rc<Cell<i32>>) -> Self {
            Self { regs: [0; 32], pointer: 0, sample }
        }

        fn read(&mut self, addr: usize) -> u8 {
            if addr == Register::PuCtrl.addr() as usize {
                self.regs[addr] | PuCtrl::PUR.mask() | PuCtrl::CR.mask()
            } else if addr == Register::Ctrl2.addr() as usize {
                self.regs[addr] & !(Ctrl2::CALS.mask() | Ctrl2::CalError.mask())
            } else if (0x12..0x15).contains(&addr) {
                self.sample.get().to_be_bytes()[addr - 0x11]
            } else {
                self.regs[addr]
            }
        }
    }

    impl ErrorType for FakeChip {
        type Error = FakeError;
    }

    impl I2c for FakeChip {
        fn transaction(
            &mut self,
            _address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), FakeError> {
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if let Some((&reg, data)) = bytes.split_first() {
                            self.pointer = reg as usize;
                            for &b in data {
                                self.regs[self.pointer % 32] = b;
                                self.pointer += 1;
                            }
                        }
                    }
                    Operation::Read(buf) => {
                        for b in buf.iter_mut() {
                            *b = self.read(self.pointer % 32);
                            self.pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    fn config() -> RecorderConfig {
        RecorderConfig { samples_per_reading: 2, ..RecorderConfig::default() }
    }

    #[test]
    fn setup_applies_sample_rate_and_settings() {
        let sample = Rc::new(Cell::new(0));
        let settings = ScaleSettings { calibration_factor: 20.0, zero_offset: 500 };
        let reader = ScaleReader::new(FakeChip::new(sample), settings, &config()).unwrap();
        assert_eq!(reader.settings(), settings);

        let chip = reader.shutdown().unwrap();
        let ctrl2 = chip.regs[Register::Ctrl2.addr() as usize];
        assert_eq!((ctrl2 >> 4) & 0b111, SampleRate::Sps320 as u8);
        let pu_ctrl = chip.regs[Register::PuCtrl.addr() as usize];
        assert_eq!(pu_ctrl & (PuCtrl::PUD.mask() | PuCtrl::PUA.mask()), 0);
    }

    #[test]
    fn uncalibrated_settings_keep_unit_factor() {
        let sample = Rc::new(Cell::new(0));
        let reader =
            ScaleReader::new(FakeChip::new(sample), ScaleSettings::default(), &config()).unwrap();
        assert_eq!(reader.settings().calibration_factor, 1.0);
        assert_eq!(reader.settings().zero_offset, 1000);
    }

    #[test]
    fn zero_and_calibrate_then_measure() {
        let sample = Rc::new(Cell::new(-2_000));
        let chip = FakeChip::new(sample.clone());
        let mut reader = ScaleReader::new(chip, ScaleSettings::default(), &config()).unwrap();

        assert_eq!(reader.zero(4).unwrap(), -2_000);
        sample.set(8_000);
        let settings = reader.calibrate(5.0, 4).unwrap();
        assert_eq!(settings, ScaleSettings { calibration_factor: 2_000.0, zero_offset: -2_000 });
        assert!(settings.is_calibrated());

        let first = reader.measure().unwrap();
        assert_eq!(first.raw, 8_000);
        assert!((first.weight - 5.0).abs() < 1e-5, "Expected near 5.0, got {}", first.weight);
        assert!(
            (first.average_weight - 1.25).abs() < 1e-5,
            "Expected near 1.25, got {}",
            first.average_weight
        );
    }
}
