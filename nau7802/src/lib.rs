//! NAU7802 24-bit load-cell ADC driver using embedded-hal.
//!
//! The driver owns the I2C bus handle plus two pieces of host-side state, the
//! zero offset and the calibration factor. Neither is ever read back from the
//! chip; persisting them is up to the caller.
//!
//! All waiting is blocking: the calling thread sleeps in 1 ms steps while
//! polling status bits.

use embedded_hal::i2c::I2c;
use std::thread::sleep;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub mod registers;

#[cfg(test)]
mod sim;

pub use registers::{CalibrationStatus, Channel, Gain, Ldo, Register, SampleRate, DEVICE_ADDRESS};
use registers::{
    Ctrl1, Ctrl2, PgaPwr, PuCtrl, RegisterBit, ADC_CHOPPER_CLOCK_OFF, CRS_MASK, CRS_SHIFT,
    GAIN_MASK, LDO_MASK, LDO_SHIFT,
};

/// Samples averaged by `tare`, `calibrate_with_known_weight` and `weight` when
/// the caller has no preference.
pub const DEFAULT_SAMPLES: usize = 8;

/// Timeout used by [`Nau7802::calibrate_afe`].
pub const CALIBRATION_TIMEOUT_MS: u64 = 1000;

const POLL_INTERVAL: Duration = Duration::from_millis(1);
const RESET_HOLD: Duration = Duration::from_millis(1);
const POWER_UP_POLLS: usize = 100;
const AVERAGE_TIMEOUT: Duration = Duration::from_secs(1);

/// Errors for the NAU7802 driver.
#[derive(Error, Debug)]
pub enum Error<E: std::error::Error + 'static> {
    #[error("I2C bus error: {0}")]
    I2c(#[from] E),
    #[error("device did not acknowledge at address 0x2A")]
    NotConnected,
    #[error("timed out waiting for the device")]
    Timeout,
    #[error("AFE calibration reported an error")]
    CalibrationFailed,
    #[error("calibration factor must be finite and non-zero, got {0}")]
    InvalidCalibrationFactor(f32),
}

/// Decode the three ADC output bytes (MSB first) as a 24-bit two's complement value.
pub fn decode_raw(bytes: [u8; 3]) -> i32 {
    // Place the 24 bits at the top of an i32 and shift back arithmetically to sign-extend.
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0]) >> 8
}

/// Record the first failing step of a configuration sequence while letting the
/// remaining steps run.
fn keep_first_error<E: std::error::Error + 'static>(
    acc: &mut Result<(), Error<E>>,
    step: Result<(), Error<E>>,
    what: &str,
) {
    if let Err(e) = step {
        warn!("{what} failed: {e}");
        if acc.is_ok() {
            *acc = Err(e);
        }
    }
}

/// NAU7802 driver struct.
pub struct Nau7802<I2C> {
    i2c: I2C,
    zero_offset: i32,
    calibration_factor: f32,
}

impl<I2C, E> Nau7802<I2C>
where
    I2C: I2c<Error = E>,
    E: std::error::Error + 'static,
{
    /// Bind the bus handle. No bus traffic happens until [`Nau7802::begin`].
    pub fn new(i2c: I2C) -> Self {
        Nau7802 { i2c, zero_offset: 0, calibration_factor: 1.0 }
    }

    /// Give the bus handle back to the caller.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Check the device answers and, if `full_setup`, run the power-on sequence:
    /// reset, power up, LDO 3.3 V, gain 128, 80 SPS, chopper clock off,
    /// PGA decoupling capacitor on, AFE calibration.
    ///
    /// Every setup step runs even if an earlier one failed. The first error is
    /// returned.
    pub fn begin(&mut self, full_setup: bool) -> Result<(), Error<E>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if !full_setup {
            return Ok(());
        }

        let mut result = Ok(());
        keep_first_error(&mut result, self.reset(), "reset");
        keep_first_error(&mut result, self.power_up(), "power up");
        keep_first_error(&mut result, self.set_ldo_voltage(Ldo::V3_3), "set LDO");
        keep_first_error(&mut result, self.set_gain_mode(Gain::G128), "set gain");
        keep_first_error(
            &mut result,
            self.set_samples_per_second(SampleRate::Sps80),
            "set sample rate",
        );
        keep_first_error(
            &mut result,
            self.write_register(Register::Adc, ADC_CHOPPER_CLOCK_OFF),
            "disable chopper clock",
        );
        keep_first_error(
            &mut result,
            self.set_bit(PgaPwr::PgaCapEn, Register::PgaPwr),
            "enable PGA cap",
        );
        keep_first_error(&mut result, self.calibrate_afe(), "AFE calibration");

        match &result {
            Ok(()) => debug!("NAU7802 initialized"),
            Err(e) => warn!("NAU7802 setup incomplete: {e}"),
        }
        result
    }

    /// Single-byte register read.
    pub fn read_register(&mut self, reg: Register) -> Result<u8, Error<E>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(DEVICE_ADDRESS, &[reg.addr()], &mut buf)
            .map_err(Error::I2c)?;
        Ok(buf[0])
    }

    /// Single-byte register write.
    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(DEVICE_ADDRESS, &[reg.addr(), value])
            .map_err(Error::I2c)
    }

    /// Sequential read of `buf.len()` registers starting at `reg`.
    pub fn read_block(&mut self, reg: Register, buf: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write_read(DEVICE_ADDRESS, &[reg.addr()], buf)
            .map_err(Error::I2c)
    }

    /// Issue a one-byte read to see whether the device acknowledges.
    pub fn probe(&mut self) -> bool {
        let mut buf = [0u8; 1];
        self.i2c.read(DEVICE_ADDRESS, &mut buf).is_ok()
    }

    /// True if the device acknowledges within two probes. The chip occasionally
    /// misses a single ACK while busy.
    pub fn is_connected(&mut self) -> bool {
        if self.probe() {
            return true;
        }
        warn!("NAU7802 did not acknowledge, retrying");
        self.probe()
    }

    /// Read `reg` and test a single bit.
    pub fn get_bit<B: RegisterBit>(&mut self, bit: B, reg: Register) -> Result<bool, Error<E>> {
        Ok(self.read_register(reg)? & bit.mask() != 0)
    }

    /// Set a single bit in `reg` by read-modify-write.
    pub fn set_bit<B: RegisterBit>(&mut self, bit: B, reg: Register) -> Result<(), Error<E>> {
        let value = self.read_register(reg)?;
        self.write_register(reg, value | bit.mask())
    }

    /// Clear a single bit in `reg` by read-modify-write.
    pub fn clear_bit<B: RegisterBit>(&mut self, bit: B, reg: Register) -> Result<(), Error<E>> {
        let value = self.read_register(reg)?;
        self.write_register(reg, value & !bit.mask())
    }

    /// Replace the bits selected by `mask` with `value`, keeping the rest.
    fn update_field(&mut self, reg: Register, mask: u8, value: u8) -> Result<(), Error<E>> {
        let current = self.read_register(reg)?;
        self.write_register(reg, (current & !mask) | (value & mask))
    }

    /// Reset all registers to their power-on defaults.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        if let Err(e) = self.set_bit(PuCtrl::RR, Register::PuCtrl) {
            warn!("setting RR failed: {e}");
        }
        sleep(RESET_HOLD);
        self.clear_bit(PuCtrl::RR, Register::PuCtrl)
    }

    /// Power up the digital and analog sections and wait for PUR.
    ///
    /// Both power bits are attempted even if the first write fails; the
    /// outcome is decided by whether PUR shows up within 100 polls.
    pub fn power_up(&mut self) -> Result<(), Error<E>> {
        if let Err(e) = self.set_bit(PuCtrl::PUD, Register::PuCtrl) {
            warn!("setting PUD failed: {e}");
        }
        if let Err(e) = self.set_bit(PuCtrl::PUA, Register::PuCtrl) {
            warn!("setting PUA failed: {e}");
        }

        for _ in 0..POWER_UP_POLLS {
            if self.get_bit(PuCtrl::PUR, Register::PuCtrl)? {
                debug!("NAU7802 powered up");
                return Ok(());
            }
            sleep(POLL_INTERVAL);
        }
        warn!("power-up ready bit never set");
        Err(Error::Timeout)
    }

    /// Put the chip into its low-power state.
    pub fn power_down(&mut self) -> Result<(), Error<E>> {
        if let Err(e) = self.clear_bit(PuCtrl::PUD, Register::PuCtrl) {
            warn!("clearing PUD failed: {e}");
        }
        self.clear_bit(PuCtrl::PUA, Register::PuCtrl)
    }

    /// Set the LDO code (clamped to 0b111) and switch AVDD to the internal LDO.
    pub fn set_ldo(&mut self, level: u8) -> Result<(), Error<E>> {
        let level = level.min(0b111);
        let mut result = Ok(());
        keep_first_error(
            &mut result,
            self.update_field(Register::Ctrl1, LDO_MASK, level << LDO_SHIFT),
            "write VLDO",
        );
        keep_first_error(
            &mut result,
            self.set_bit(PuCtrl::AVDDS, Register::PuCtrl),
            "select internal LDO",
        );
        result
    }

    /// Set the LDO output voltage.
    pub fn set_ldo_voltage(&mut self, ldo: Ldo) -> Result<(), Error<E>> {
        self.set_ldo(ldo as u8)
    }

    /// Set the PGA gain code, clamped to 0b111.
    pub fn set_gain(&mut self, level: u8) -> Result<(), Error<E>> {
        self.update_field(Register::Ctrl1, GAIN_MASK, level.min(0b111))
    }

    /// Set the PGA gain.
    pub fn set_gain_mode(&mut self, gain: Gain) -> Result<(), Error<E>> {
        self.set_gain(gain as u8)
    }

    /// Set the conversion rate code, clamped to 0b111.
    pub fn set_sample_rate(&mut self, level: u8) -> Result<(), Error<E>> {
        self.update_field(Register::Ctrl2, CRS_MASK, level.min(0b111) << CRS_SHIFT)
    }

    /// Set the conversion rate.
    pub fn set_samples_per_second(&mut self, rate: SampleRate) -> Result<(), Error<E>> {
        self.set_sample_rate(rate as u8)
    }

    /// Select input channel 1 (default) or 2.
    pub fn set_channel(&mut self, channel: Channel) -> Result<(), Error<E>> {
        match channel {
            Channel::Ch1 => self.clear_bit(Ctrl2::CHS, Register::Ctrl2),
            Channel::Ch2 => self.set_bit(Ctrl2::CHS, Register::Ctrl2),
        }
    }

    /// CRDY pin goes high when data is ready (chip default).
    pub fn set_interrupt_polarity_high(&mut self) -> Result<(), Error<E>> {
        self.clear_bit(Ctrl1::CRP, Register::Ctrl1)
    }

    /// CRDY pin goes low when data is ready.
    pub fn set_interrupt_polarity_low(&mut self) -> Result<(), Error<E>> {
        self.set_bit(Ctrl1::CRP, Register::Ctrl1)
    }

    /// Revision code of the IC, always 0x0F on known parts.
    pub fn revision_code(&mut self) -> Result<u8, Error<E>> {
        Ok(self.read_register(Register::DeviceRev)? & 0x0F)
    }

    /// Start an AFE calibration and return without waiting.
    /// Recalibrate after changing gain, sample rate or channel.
    pub fn begin_calibrate_afe(&mut self) -> Result<(), Error<E>> {
        self.set_bit(Ctrl2::CALS, Register::Ctrl2)
    }

    /// Current AFE calibration state.
    pub fn calibration_status(&mut self) -> Result<CalibrationStatus, Error<E>> {
        if self.get_bit(Ctrl2::CALS, Register::Ctrl2)? {
            return Ok(CalibrationStatus::InProgress);
        }
        if self.get_bit(Ctrl2::CalError, Register::Ctrl2)? {
            return Ok(CalibrationStatus::Failure);
        }
        Ok(CalibrationStatus::Success)
    }

    /// Poll until the running calibration finishes. A `timeout_ms` of 0 waits forever.
    pub fn wait_for_calibrate_afe(&mut self, timeout_ms: u64) -> Result<(), Error<E>> {
        let timeout = Duration::from_millis(timeout_ms);
        let start = Instant::now();

        loop {
            match self.calibration_status()? {
                CalibrationStatus::Success => return Ok(()),
                CalibrationStatus::Failure => {
                    warn!("AFE calibration failed");
                    return Err(Error::CalibrationFailed);
                }
                CalibrationStatus::InProgress => {
                    if timeout_ms > 0 && start.elapsed() > timeout {
                        warn!("AFE calibration still running after {timeout_ms} ms");
                        return Err(Error::Timeout);
                    }
                    sleep(POLL_INTERVAL);
                }
            }
        }
    }

    /// Calibrate the AFE and block for up to [`CALIBRATION_TIMEOUT_MS`].
    pub fn calibrate_afe(&mut self) -> Result<(), Error<E>> {
        self.begin_calibrate_afe()?;
        self.wait_for_calibrate_afe(CALIBRATION_TIMEOUT_MS)
    }

    /// True when the cycle-ready bit says a conversion result is waiting.
    pub fn available(&mut self) -> Result<bool, Error<E>> {
        self.get_bit(PuCtrl::CR, Register::PuCtrl)
    }

    /// Read the latest 24-bit conversion. Does not check [`Nau7802::available`].
    pub fn read_raw(&mut self) -> Result<i32, Error<E>> {
        let mut buf = [0u8; 3];
        self.read_block(Register::AdcoB2, &mut buf)?;
        Ok(decode_raw(buf))
    }

    /// Mean of `samples` conversions, or [`Error::Timeout`] if they do not all
    /// arrive within one second. A count of 0 is treated as 1.
    pub fn try_read_average(&mut self, samples: usize) -> Result<f32, Error<E>> {
        let samples = samples.max(1);
        let start = Instant::now();
        let mut total: i64 = 0;
        let mut acquired = 0;

        while acquired < samples {
            if self.available()? {
                total += i64::from(self.read_raw()?);
                acquired += 1;
            }
            if start.elapsed() > AVERAGE_TIMEOUT {
                warn!("only {acquired} of {samples} samples before timeout");
                return Err(Error::Timeout);
            }
            sleep(POLL_INTERVAL);
        }

        Ok((total as f64 / samples as f64) as f32)
    }

    /// Like [`Nau7802::try_read_average`] but reports a timeout as `0.0`.
    ///
    /// Note: a timeout cannot be told apart from a genuine zero reading here.
    /// Use `try_read_average` where that matters.
    pub fn read_average(&mut self, samples: usize) -> Result<f32, Error<E>> {
        match self.try_read_average(samples) {
            Err(Error::Timeout) => Ok(0.0),
            other => other,
        }
    }

    /// Record the current unloaded reading as the zero offset.
    pub fn tare(&mut self, samples: usize) -> Result<(), Error<E>> {
        let average = self.read_average(samples)?;
        self.zero_offset = average.round() as i32;
        debug!("zero offset set to {}", self.zero_offset);
        Ok(())
    }

    /// Compute the calibration factor from a known `weight` currently on the scale.
    /// Call [`Nau7802::tare`] first.
    pub fn calibrate_with_known_weight(
        &mut self,
        weight: f32,
        samples: usize,
    ) -> Result<(), Error<E>> {
        let on_scale = self.read_average(samples)?;
        let factor = (on_scale - self.zero_offset as f32) / weight;
        self.set_calibration_factor(factor)?;
        debug!("calibration factor set to {factor}");
        Ok(())
    }

    /// Offset-corrected, scaled weight. With `allow_negative` false, readings
    /// below the zero offset report zero.
    pub fn weight(&mut self, allow_negative: bool, samples: usize) -> Result<f32, Error<E>> {
        let mut on_scale = self.read_average(samples)?;
        let zero = self.zero_offset as f32;
        if !allow_negative && on_scale < zero {
            on_scale = zero;
        }
        Ok((on_scale - zero) / self.calibration_factor)
    }

    /// Zero offset in raw counts.
    pub fn zero_offset(&self) -> i32 {
        self.zero_offset
    }

    /// Restore a zero offset saved by the caller.
    pub fn set_zero_offset(&mut self, offset: i32) {
        self.zero_offset = offset;
    }

    /// Raw counts per unit of weight.
    pub fn calibration_factor(&self) -> f32 {
        self.calibration_factor
    }

    /// Restore a calibration factor saved by the caller. Zero and non-finite
    /// values are rejected since the factor is used as a divisor.
    pub fn set_calibration_factor(&mut self, factor: f32) -> Result<(), Error<E>> {
        if factor == 0.0 || !factor.is_finite() {
            return Err(Error::InvalidCalibrationFactor(factor));
        }
        self.calibration_factor = factor;
        Ok(())
    }
}
