//! Program and profile storage.
//!
//! The host uploads two things: a *program* (an ordered list of up to
//! twelve output steps, walked once per trigger edge) and up to eight
//! *profiles* (the chip's fixed tone slots). Both live in a single
//! [`Model`] value that is allocated once and reused across uploads.

use crate::regmap::{
    PROFILE_LEN, PROFILE_SILENCE, RAMP_LIMITS_LEN, RAMP_RATE_PAYLOAD_LEN, RAMP_STEP_LEN,
};

/// Capacity of the program table.
pub const MAX_STEPS: usize = 12;
/// Number of on-chip tone profiles.
pub const NUM_PROFILES: usize = 8;

/// What a program step asks the chip to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// A static tone, described by one profile payload.
    SingleTone,
    /// A frequency sweep run by the digital ramp generator.
    Sweep,
}

/// One entry of the program.
///
/// A step carries buffers for both modes; which ones are meaningful is
/// decided by `mode`, set by the last uploaded record. Payload bytes are
/// stored exactly as they go out on the SPI bus, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub(crate) mode: StepMode,
    pub(crate) enabled: bool,
    pub(crate) sweep_invert: bool,
    /// `{AMPL, POW, FTW}` in profile register format.
    pub(crate) single: [u8; PROFILE_LEN],
    pub(crate) ramp_limits: [u8; RAMP_LIMITS_LEN],
    pub(crate) ramp_step: [u8; RAMP_STEP_LEN],
    pub(crate) ramp_rate: [u8; RAMP_RATE_PAYLOAD_LEN],
}

impl Default for Step {
    fn default() -> Self {
        Step {
            mode: StepMode::SingleTone,
            enabled: false,
            sweep_invert: false,
            single: [0; PROFILE_LEN],
            ramp_limits: [0; RAMP_LIMITS_LEN],
            ramp_step: [0; RAMP_STEP_LEN],
            ramp_rate: [0; RAMP_RATE_PAYLOAD_LEN],
        }
    }
}

impl Step {
    pub fn mode(&self) -> StepMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Direction select for sweep steps: `true` ramps toward the lower
    /// limit.
    pub fn sweep_invert(&self) -> bool {
        self.sweep_invert
    }

    pub fn single(&self) -> &[u8; PROFILE_LEN] {
        &self.single
    }

    pub fn ramp_limits(&self) -> &[u8; RAMP_LIMITS_LEN] {
        &self.ramp_limits
    }

    pub fn ramp_step(&self) -> &[u8; RAMP_STEP_LEN] {
        &self.ramp_step
    }

    pub fn ramp_rate(&self) -> &[u8; RAMP_RATE_PAYLOAD_LEN] {
        &self.ramp_rate
    }
}

/// One of the chip's eight tone slots.
///
/// Profile 0 is reserved: the sequence engine rewrites it for every
/// single-tone step, so the host should only rely on profiles 1..=7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub(crate) channel: u8,
    pub(crate) data: [u8; PROFILE_LEN],
}

impl Profile {
    /// DDS channel this slot programs. Always equals the table index.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn data(&self) -> &[u8; PROFILE_LEN] {
        &self.data
    }
}

/// The program and profile tables.
pub struct Model {
    pub(crate) program: [Step; MAX_STEPS],
    pub(crate) profiles: [Profile; NUM_PROFILES],
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// Fresh tables: every step disabled, every profile silenced.
    pub fn new() -> Self {
        Model {
            program: [Step::default(); MAX_STEPS],
            profiles: core::array::from_fn(|i| Profile {
                channel: i as u8,
                data: PROFILE_SILENCE,
            }),
        }
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.program.get(index)
    }

    pub fn profile(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    /// Load the zero-amplitude sentinel into every profile slot.
    ///
    /// Run before an upload so that any profile the host does not re-send
    /// stays silent.
    pub fn zero_profiles(&mut self) {
        for profile in self.profiles.iter_mut() {
            profile.data = PROFILE_SILENCE;
        }
    }

    /// Clear the enabled flag on every step.
    ///
    /// Run at the start of each upload; the upload then re-enables
    /// exactly the steps it touches, which keeps the enabled steps a
    /// contiguous prefix of the table.
    pub fn disable_all(&mut self) {
        for step in self.program.iter_mut() {
            step.enabled = false;
        }
    }

    /// Index of the last step of the enabled prefix, or `None` when the
    /// program is empty.
    ///
    /// Enabled steps are assumed contiguous from index 0; the first
    /// disabled slot terminates the program.
    pub fn last_enabled(&self) -> Option<usize> {
        for (i, step) in self.program.iter().enumerate() {
            if !step.enabled {
                return i.checked_sub(1);
            }
        }
        Some(MAX_STEPS - 1)
    }
}
