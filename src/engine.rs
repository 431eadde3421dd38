//! Trigger-driven sequence engine.
//!
//! Once armed, the engine walks the enabled prefix of the program: each
//! rising edge on TRIG programs the next step into the DDS and commits it
//! with an I/O update. Single-tone steps land in profile register 0 with
//! the ramp generator off; sweep steps load the three ramp registers and
//! turn the generator on. The engine is level-insensitive between edges
//! and holds at most one pending edge.

use embedded_hal::digital::v2::InputPin;
use log::{debug, info, warn};

use crate::dds::DdsControl;
use crate::model::{Model, Step, StepMode};
use crate::regmap::Register;

/// Where the engine is in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No program armed.
    Idle,
    /// A program is loaded; waiting for the first trigger edge.
    Armed,
    /// Step `i` has just been programmed and committed.
    Running(usize),
    /// Step `i` is on the output; waiting for the next trigger edge.
    StepDone(usize),
    /// The whole enabled prefix has been played. Cleared by a new upload
    /// or a reset.
    SequenceDone,
}

/// Engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError<DdsE, TrigE> {
    /// The driver rejected or failed a register action. The engine has
    /// already returned to [`State::Idle`].
    Dds(DdsE),
    /// The trigger input could not be read.
    Trigger(TrigE),
}

/// Walks the program on trigger edges.
///
/// Owns the TRIG input; everything else is borrowed per poll so that the
/// upload path and the engine can share the model and the driver inside
/// one cooperative loop.
///
/// Single-tone steps rely on the chip selecting profile 0, which holds as
/// long as CFR1 keeps its default and the PROFILE[2:0] pins are strapped
/// low.
pub struct Sequencer<TRIG> {
    trig: TRIG,
    state: State,
    last_level: bool,
}

impl<TRIG: InputPin> Sequencer<TRIG> {
    pub fn new(trig: TRIG) -> Self {
        Sequencer {
            trig,
            state: State::Idle,
            last_level: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Arm the engine for one pass over the enabled prefix.
    ///
    /// A no-op unless idle; an empty program stays idle.
    pub fn arm(&mut self, model: &Model) -> State {
        if self.state == State::Idle {
            match model.last_enabled() {
                Some(last) => {
                    info!("armed: {} step program", last + 1);
                    self.state = State::Armed;
                }
                None => debug!("not arming: program is empty"),
            }
        }
        self.state
    }

    /// Abandon the sequence and return to idle.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Release the trigger pin.
    pub fn free(self) -> TRIG {
        self.trig
    }

    /// Advance the state machine by at most one transition.
    ///
    /// Call this from the main loop. Waiting states only move on a rising
    /// TRIG edge; a missing trigger is not an error, the engine simply
    /// stays put.
    pub fn poll<D: DdsControl>(
        &mut self,
        dds: &mut D,
        model: &Model,
    ) -> Result<State, EngineError<D::Error, TRIG::Error>> {
        match self.state {
            State::Idle | State::SequenceDone => {}
            State::Armed => {
                if self.rising_edge()? {
                    self.enter_step(dds, model, 0)?;
                }
            }
            // Programming finished inside the previous poll; start
            // waiting for the edge that ends this step.
            State::Running(i) => self.state = State::StepDone(i),
            State::StepDone(i) => {
                if self.rising_edge()? {
                    let last = model.last_enabled().unwrap_or(0);
                    if i + 1 <= last {
                        self.enter_step(dds, model, i + 1)?;
                    } else {
                        info!("sequence complete");
                        self.state = State::SequenceDone;
                    }
                }
            }
        }
        Ok(self.state)
    }

    fn rising_edge<DdsE>(&mut self) -> Result<bool, EngineError<DdsE, TRIG::Error>> {
        let level = self.trig.is_high().map_err(EngineError::Trigger)?;
        let rising = level && !self.last_level;
        self.last_level = level;
        Ok(rising)
    }

    fn enter_step<D: DdsControl>(
        &mut self,
        dds: &mut D,
        model: &Model,
        index: usize,
    ) -> Result<(), EngineError<D::Error, TRIG::Error>> {
        let step = match model.step(index) {
            Some(step) if step.is_enabled() => step,
            // The program shrank under us; nothing sensible left to play.
            _ => {
                warn!("step {} vanished mid-sequence", index);
                self.state = State::Idle;
                return Ok(());
            }
        };
        debug!("programming step {}", index);
        match program_step(dds, step) {
            Ok(()) => {
                self.state = State::Running(index);
                Ok(())
            }
            Err(e) => {
                self.state = State::Idle;
                Err(EngineError::Dds(e))
            }
        }
    }
}

/// Issue the register writes one step asks for and commit them.
fn program_step<D: DdsControl>(dds: &mut D, step: &Step) -> Result<(), D::Error> {
    match step.mode() {
        StepMode::SingleTone => {
            dds.write_register(Register::P0, step.single())?;
            dds.drg_enable(false)?;
            dds.io_update()
        }
        StepMode::Sweep => {
            dds.write_register(Register::RampLimits, step.ramp_limits())?;
            dds.write_register(Register::RampStep, step.ramp_step())?;
            dds.write_register(Register::RampRate, step.ramp_rate())?;
            dds.drg_enable(true)?;
            dds.set_ramp_direction(step.sweep_invert())?;
            dds.set_ramp_hold(false)?;
            dds.io_update()
        }
    }
}
