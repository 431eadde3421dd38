//! AD9910 register map and fixed register contents.
//!
//! The AD9910 exposes its configuration through a set of serial registers,
//! each with a fixed payload depth. Writes always start with the 8-bit
//! instruction byte (the register address) followed by the payload,
//! most significant byte first. See Table 15 ("Register Map") of the
//! [datasheet](https://www.analog.com/media/en/technical-documentation/data-sheets/AD9910.pdf).

/// System clock the pulse timings below assume, in MHz.
pub const SYSCLK_MHZ: u32 = 1000;

/// Frequency tuning word length in bytes.
pub const FTW_LEN: usize = 4;
/// Phase offset word length in bytes.
pub const POW_LEN: usize = 2;
/// Amplitude scale factor length in bytes, as stored in a profile.
pub const AMPL_LEN: usize = 2;
/// Length of one of the two ramp rate fields in bytes.
pub const RAMP_RATE_LEN: usize = 2;

/// Profile payload length: `{AMPL, POW, FTW}` packed back to back.
pub const PROFILE_LEN: usize = AMPL_LEN + POW_LEN + FTW_LEN;
/// Ramp limit payload length: upper FTW then lower FTW.
pub const RAMP_LIMITS_LEN: usize = 2 * FTW_LEN;
/// Ramp step size payload length: positive step then negative step.
pub const RAMP_STEP_LEN: usize = 2 * FTW_LEN;
/// Ramp rate payload length: positive rate then negative rate.
pub const RAMP_RATE_PAYLOAD_LEN: usize = 2 * RAMP_RATE_LEN;

/// The serial registers addressed by this crate.
///
/// Only the registers the sequence engine and bring-up code touch are
/// named; the RAM playback machinery shares the map but is driven through
/// the same [`addr`](Register::addr)/[`depth`](Register::depth) contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Control function register 1.
    Cfr1,
    /// Control function register 2. Holds the digital ramp enable bit.
    Cfr2,
    /// Control function register 3. PLL and input divider configuration.
    Cfr3,
    /// Auxiliary DAC control (full-scale output current).
    AuxDac,
    /// I/O update rate, used only in internal-update mode.
    IoUpdateRate,
    /// Frequency tuning word.
    Ftw,
    /// Phase offset word.
    Pow,
    /// Amplitude scale factor.
    Asf,
    /// Multichip sync control.
    MultichipSync,
    /// Digital ramp limits: upper FTW then lower FTW.
    RampLimits,
    /// Digital ramp step size: positive step then negative step.
    RampStep,
    /// Digital ramp rate: positive rate then negative rate.
    RampRate,
    /// Tone profile 0. Reserved for the sequence engine.
    P0,
    /// Tone profile 1.
    P1,
    /// Tone profile 2.
    P2,
    /// Tone profile 3.
    P3,
    /// Tone profile 4.
    P4,
    /// Tone profile 5.
    P5,
    /// Tone profile 6.
    P6,
    /// Tone profile 7.
    P7,
    /// RAM data port.
    Ram,
}

impl Register {
    /// The instruction byte that addresses this register for a write.
    pub fn addr(self) -> u8 {
        match self {
            Register::Cfr1 => 0x00,
            Register::Cfr2 => 0x01,
            Register::Cfr3 => 0x02,
            Register::AuxDac => 0x03,
            Register::IoUpdateRate => 0x04,
            Register::Ftw => 0x07,
            Register::Pow => 0x08,
            Register::Asf => 0x09,
            Register::MultichipSync => 0x0A,
            Register::RampLimits => 0x0B,
            Register::RampStep => 0x0C,
            Register::RampRate => 0x0D,
            Register::P0 => 0x0E,
            Register::P1 => 0x0F,
            Register::P2 => 0x10,
            Register::P3 => 0x11,
            Register::P4 => 0x12,
            Register::P5 => 0x13,
            Register::P6 => 0x14,
            Register::P7 => 0x15,
            Register::Ram => 0x16,
        }
    }

    /// Payload depth of this register in bytes.
    ///
    /// Writing fewer bytes than the depth is allowed but leaves a partial
    /// word in the chip's serial buffer, which must then be flushed with
    /// an I/O reset. Writing more is an error.
    pub fn depth(self) -> usize {
        match self {
            Register::Cfr1
            | Register::Cfr2
            | Register::Cfr3
            | Register::AuxDac
            | Register::IoUpdateRate
            | Register::Ftw
            | Register::Asf
            | Register::MultichipSync
            | Register::RampRate
            | Register::Ram => 4,
            Register::Pow => 2,
            Register::RampLimits
            | Register::RampStep
            | Register::P0
            | Register::P1
            | Register::P2
            | Register::P3
            | Register::P4
            | Register::P5
            | Register::P6
            | Register::P7 => 8,
        }
    }

    /// The profile register for DDS channel `channel` (0..=7).
    pub fn profile(channel: u8) -> Option<Register> {
        match channel {
            0 => Some(Register::P0),
            1 => Some(Register::P1),
            2 => Some(Register::P2),
            3 => Some(Register::P3),
            4 => Some(Register::P4),
            5 => Some(Register::P5),
            6 => Some(Register::P6),
            7 => Some(Register::P7),
            _ => None,
        }
    }
}

// Control register defaults. These byte strings are the power-up
// configuration this crate programs and are a bit-exact contract with the
// chip: SDIO input-only, PLL enabled for a 1 GHz SYSCLK, auxiliary DAC at
// full scale.
pub const CFR1_DEFAULT: [u8; 4] = [0x00, 0x20, 0x00, 0x00];
pub const CFR2_DEFAULT: [u8; 4] = [0x01, 0x40, 0x00, 0x20];
pub const CFR3_DEFAULT: [u8; 4] = [0x07, 0x00, 0x40, 0x00];
pub const AUXDAC_DEFAULT: [u8; 4] = [0x00, 0x00, 0x00, 0x7F];

/// CFR2 with the digital ramp generator enabled (destination: frequency).
pub const CFR2_DRG_ENABLE: [u8; 4] = [0x00, 0x48, 0x00, 0x20];

/// Profile payload that parks a tone at zero amplitude.
///
/// Loaded into every profile slot before an upload so that channels the
/// host does not program stay silent.
pub const PROFILE_SILENCE: [u8; PROFILE_LEN] = [0x3F, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
