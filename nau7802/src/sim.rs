//! Register-level NAU7802 simulation used by the driver tests.

use std::collections::VecDeque;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use thiserror::Error;

use crate::registers::{Ctrl2, PuCtrl, Register, RegisterBit, DEVICE_ADDRESS};

#[derive(Error, Debug)]
#[error("simulated NACK")]
pub struct SimError;

impl embedded_hal::i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

/// How the simulated AFE calibration ends, counted in CTRL2 reads after CALS is set.
#[derive(Clone, Copy, Debug)]
pub enum CalOutcome {
    Pass { after_polls: usize },
    Fail { after_polls: usize },
    Never,
}

pub struct SimChip {
    pub regs: [u8; 32],
    /// Number of upcoming transactions that will not be acknowledged.
    pub fail_next: usize,
    /// Whether PUR follows PUD and PUA.
    pub power_ready: bool,
    pub calibration: CalOutcome,
    /// Conversions handed out one per ADC read.
    pub samples: VecDeque<i32>,
    /// Conversion returned forever once `samples` is empty.
    pub repeat_sample: Option<i32>,
    pub resets: usize,
    pub calibrations: usize,
    cal_remaining: Option<usize>,
    pointer: u8,
}

impl SimChip {
    pub fn new() -> Self {
        SimChip {
            regs: [0; 32],
            fail_next: 0,
            power_ready: true,
            calibration: CalOutcome::Pass { after_polls: 0 },
            samples: VecDeque::new(),
            repeat_sample: None,
            resets: 0,
            calibrations: 0,
            cal_remaining: None,
            pointer: 0,
        }
    }

    pub fn queue_samples(&mut self, samples: &[i32]) {
        self.samples.extend(samples.iter().copied());
    }

    fn sample_ready(&self) -> bool {
        !self.samples.is_empty() || self.repeat_sample.is_some()
    }

    fn read_reg(&mut self, addr: u8) -> u8 {
        let pu_ctrl = Register::PuCtrl.addr();
        let ctrl2 = Register::Ctrl2.addr();
        let adco = Register::AdcoB2.addr();

        if addr == pu_ctrl {
            if self.sample_ready() {
                self.regs[pu_ctrl as usize] |= PuCtrl::CR.mask();
            } else {
                self.regs[pu_ctrl as usize] &= !PuCtrl::CR.mask();
            }
        } else if addr == ctrl2 {
            self.tick_calibration();
        } else if addr == adco {
            if let Some(sample) = self.samples.pop_front().or(self.repeat_sample) {
                let bytes = sample.to_be_bytes();
                self.regs[adco as usize..adco as usize + 3].copy_from_slice(&bytes[1..]);
            }
        }
        self.regs[addr as usize % 32]
    }

    fn tick_calibration(&mut self) {
        let Some(remaining) = self.cal_remaining else {
            return;
        };
        let ctrl2 = Register::Ctrl2.addr() as usize;
        let failed = match self.calibration {
            CalOutcome::Never => return,
            CalOutcome::Pass { .. } => false,
            CalOutcome::Fail { .. } => true,
        };
        if remaining > 0 {
            self.cal_remaining = Some(remaining - 1);
            return;
        }
        self.cal_remaining = None;
        self.regs[ctrl2] &= !Ctrl2::CALS.mask();
        if failed {
            self.regs[ctrl2] |= Ctrl2::CalError.mask();
        } else {
            self.regs[ctrl2] &= !Ctrl2::CalError.mask();
        }
    }

    fn write_reg(&mut self, addr: u8, value: u8) {
        let old = self.regs[addr as usize % 32];

        if addr == Register::PuCtrl.addr() {
            let rr = PuCtrl::RR.mask();
            if value & rr != 0 && old & rr == 0 {
                self.resets += 1;
                self.regs = [0; 32];
                self.cal_remaining = None;
            }
            let mut value = value & !(PuCtrl::PUR.mask() | PuCtrl::CR.mask());
            let powered = PuCtrl::PUD.mask() | PuCtrl::PUA.mask();
            if self.power_ready && value & powered == powered {
                value |= PuCtrl::PUR.mask();
            }
            self.regs[addr as usize] = value;
            return;
        }

        if addr == Register::Ctrl2.addr() {
            let cals = Ctrl2::CALS.mask();
            if value & cals != 0 && old & cals == 0 {
                self.calibrations += 1;
                self.cal_remaining = Some(match self.calibration {
                    CalOutcome::Pass { after_polls } | CalOutcome::Fail { after_polls } => {
                        after_polls
                    }
                    CalOutcome::Never => 0,
                });
            } else if value & cals == 0 {
                self.cal_remaining = None;
            }
        }

        self.regs[addr as usize % 32] = value;
    }
}

impl ErrorType for SimChip {
    type Error = SimError;
}

impl I2c for SimChip {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SimError);
        }
        if address != DEVICE_ADDRESS {
            return Err(SimError);
        }

        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        self.pointer = reg;
                        for &b in data {
                            self.write_reg(self.pointer, b);
                            self.pointer = self.pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.read_reg(self.pointer);
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}
