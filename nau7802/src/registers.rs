//! NAU7802 register map and bit positions.

/// Fixed 7-bit I2C address of the NAU7802.
pub const DEVICE_ADDRESS: u8 = 0x2A;

/// Register addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    PuCtrl = 0x00,
    Ctrl1,
    Ctrl2,
    Ocal1B2,
    Ocal1B1,
    Ocal1B0,
    Gcal1B3,
    Gcal1B2,
    Gcal1B1,
    Gcal1B0,
    Ocal2B2,
    Ocal2B1,
    Ocal2B0,
    Gcal2B3,
    Gcal2B2,
    Gcal2B1,
    Gcal2B0,
    I2cControl,
    AdcoB2,
    AdcoB1,
    AdcoB0,
    Adc = 0x15, // shared with OTP[32:24]
    OtpB1,
    OtpB0,
    Pga = 0x1B,
    PgaPwr = 0x1C,
    DeviceRev = 0x1F,
}

impl Register {
    pub fn addr(self) -> u8 {
        self as u8
    }
}

/// A single bit inside one register.
pub trait RegisterBit: Copy {
    fn bit(self) -> u8;

    fn mask(self) -> u8 {
        1 << self.bit()
    }
}

/// Power-up control register (PU_CTRL) bits.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum PuCtrl {
    /// Register reset.
    RR = 0,
    /// Power up digital.
    PUD,
    /// Power up analog.
    PUA,
    /// Power-up ready, read only.
    PUR,
    /// Cycle start.
    CS,
    /// Cycle ready, read only.
    CR,
    /// Oscillator select.
    OSCS,
    /// AVDD source select (1 = internal LDO).
    AVDDS,
}

/// CTRL1 single-bit fields. Gain lives in bits 0..2, VLDO in bits 3..5.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Ctrl1 {
    DrdySel = 6,
    /// Conversion-ready pin polarity (1 = active low).
    CRP = 7,
}

/// CTRL2 single-bit fields. Sample rate (CRS) lives in bits 4..6.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Ctrl2 {
    CalMod = 0,
    /// Start calibration; cleared by the chip when done.
    CALS = 2,
    CalError = 3,
    /// Channel select.
    CHS = 7,
}

#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Pga {
    ChpDis = 0,
    Inv = 3,
    BypassEn,
    OutEn,
    LdoMode,
    RdOtpSel,
}

#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum PgaPwr {
    PgaCurr = 0,
    AdcCurr = 2,
    MstrBiasCurr = 4,
    /// 330 pF decoupling capacitor on channel 2.
    PgaCapEn = 7,
}

macro_rules! impl_register_bit {
    ($($type:ident),*) => {
        $(
            impl RegisterBit for $type {
                fn bit(self) -> u8 {
                    self as u8
                }
            }
        )*
    };
}

impl_register_bit!(PuCtrl, Ctrl1, Ctrl2, Pga, PgaPwr);

pub(crate) const GAIN_MASK: u8 = 0b0000_0111;
pub(crate) const LDO_MASK: u8 = 0b0011_1000;
pub(crate) const LDO_SHIFT: u8 = 3;
pub(crate) const CRS_MASK: u8 = 0b0111_0000;
pub(crate) const CRS_SHIFT: u8 = 4;

/// Value written to the ADC register to turn off CLK_CHP during power-on sequencing.
pub(crate) const ADC_CHOPPER_CLOCK_OFF: u8 = 0x30;

/// PGA gain settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gain {
    G1 = 0b000,
    G2 = 0b001,
    G4 = 0b010,
    G8 = 0b011,
    G16 = 0b100,
    G32 = 0b101,
    G64 = 0b110,
    G128 = 0b111,
}

/// Internal LDO output voltage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ldo {
    V2_4 = 0b111,
    V2_7 = 0b110,
    V3_0 = 0b101,
    V3_3 = 0b100,
    V3_6 = 0b011,
    V3_9 = 0b010,
    V4_2 = 0b001,
    V4_5 = 0b000,
}

/// Conversion rate in samples per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleRate {
    Sps10 = 0b000,
    Sps20 = 0b001,
    Sps40 = 0b010,
    Sps80 = 0b011,
    Sps320 = 0b111,
}

/// Input channel selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Ch1 = 0,
    Ch2 = 1,
}

/// AFE calibration state, decoded from CTRL2.CALS and CTRL2.CAL_ERR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationStatus {
    InProgress,
    Success,
    Failure,
}

impl SampleRate {
    /// Parse a samples-per-second figure (10, 20, 40, 80, 320).
    pub fn from_sps(sps: u32) -> Option<Self> {
        match sps {
            10 => Some(SampleRate::Sps10),
            20 => Some(SampleRate::Sps20),
            40 => Some(SampleRate::Sps40),
            80 => Some(SampleRate::Sps80),
            320 => Some(SampleRate::Sps320),
            _ => None,
        }
    }
}
