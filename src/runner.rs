//! The firmware main loop, as one pollable unit.
//!
//! Each [`poll`](Runner::poll) services at most one serial line and gives
//! the engine one chance to advance. Upload terminator handling (echo the
//! tables back, then arm) and the abort-on-new-upload rule live here, so
//! the platform's `loop {}` needs nothing but this call.

use embedded_hal::digital::v2::InputPin;
use log::info;

use crate::dds::DdsControl;
use crate::engine::{EngineError, Sequencer, State};
use crate::model::Model;
use crate::protocol::{echo, Event, SerialLine, UploadError, Uploader};

/// Main-loop failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerError<DdsE, TrigE, SerE> {
    /// The DDS driver failed; the engine has returned to idle.
    Dds(DdsE),
    /// The trigger input could not be read.
    Trigger(TrigE),
    /// The serial link failed.
    Serial(SerE),
}

/// Ties the upload path and the sequence engine together.
pub struct Runner<TRIG> {
    uploader: Uploader,
    engine: Sequencer<TRIG>,
}

impl<TRIG: InputPin> Runner<TRIG> {
    pub fn new(trig: TRIG) -> Self {
        Runner {
            uploader: Uploader::new(),
            engine: Sequencer::new(trig),
        }
    }

    pub fn state(&self) -> State {
        self.engine.state()
    }

    /// One iteration of the control loop.
    ///
    /// A data record arriving while a sequence is armed, running or
    /// finished aborts it: the upload wins, and `Done` re-arms against
    /// the fresh tables. Malformed lines are skipped (the host finds out
    /// from the echo); serial faults and driver faults are returned.
    pub fn poll<D: DdsControl, S: SerialLine>(
        &mut self,
        dds: &mut D,
        serial: &mut S,
        model: &mut Model,
    ) -> Result<State, RunnerError<D::Error, TRIG::Error, S::Error>> {
        match self.uploader.service(serial, model) {
            Ok(Event::Slot(_)) => {
                if self.engine.state() != State::Idle {
                    info!("upload in progress: aborting sequence");
                    self.engine.reset();
                }
            }
            Ok(Event::Done) => {
                echo(model, serial).map_err(RunnerError::Serial)?;
                self.engine.arm(model);
            }
            Ok(Event::Probe) | Ok(Event::NoData) | Ok(Event::Idle) => {}
            Err(UploadError::Malformed) => {}
            Err(UploadError::Serial(e)) => return Err(RunnerError::Serial(e)),
        }

        self.engine.poll(dds, model).map_err(|e| match e {
            EngineError::Dds(e) => RunnerError::Dds(e),
            EngineError::Trigger(e) => RunnerError::Trigger(e),
        })
    }

    /// Spin until the current sequence has played out (or the engine
    /// dropped to idle). Serial traffic keeps being serviced, so a new
    /// upload can still abort the wait.
    pub fn run_sequence<D: DdsControl, S: SerialLine>(
        &mut self,
        dds: &mut D,
        serial: &mut S,
        model: &mut Model,
    ) -> Result<State, RunnerError<D::Error, TRIG::Error, S::Error>> {
        loop {
            match self.poll(dds, serial, model)? {
                state @ (State::Idle | State::SequenceDone) => return Ok(state),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regmap::{Register, PROFILE_SILENCE};
    use crate::testutil::{DdsCall, MockDds, ScriptPin, ScriptSerial};

    #[test]
    fn upload_echo_arm_trigger_in_one_loop() {
        let mut model = Model::new();
        let mut dds = MockDds::default();
        let mut serial = ScriptSerial::new(&["0,0,0F,FF,00,00,20,00,00,00", "Done"]);
        let mut runner = Runner::new(ScriptPin::new(&[false, true]));

        assert_eq!(runner.poll(&mut dds, &mut serial, &mut model).unwrap(), State::Idle);
        // "Done": the echo goes out and the engine arms, but the line is
        // still low.
        assert_eq!(runner.poll(&mut dds, &mut serial, &mut model).unwrap(), State::Armed);
        assert!(serial.output().starts_with("0,0,0,\nF,FF,0,0,20,0,0,0,\n"));
        // First edge plays step 0.
        assert_eq!(
            runner.poll(&mut dds, &mut serial, &mut model).unwrap(),
            State::Running(0)
        );
        assert!(dds
            .calls
            .contains(&DdsCall::Write(
                Register::P0,
                vec![0x0F, 0xFF, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00]
            )));
    }

    #[test]
    fn empty_upload_echoes_profiles_and_stays_idle() {
        let mut model = Model::new();
        let mut dds = MockDds::default();
        let mut serial = ScriptSerial::new(&["Done"]);
        let mut runner = Runner::new(ScriptPin::new(&[true, true]));

        assert_eq!(runner.poll(&mut dds, &mut serial, &mut model).unwrap(), State::Idle);
        // No program lines in the dump, eight silent profiles.
        assert!(serial.output().starts_with("0,\n3F,FF,0,0,0,0,0,0,\n"));
        assert_eq!(runner.poll(&mut dds, &mut serial, &mut model).unwrap(), State::Idle);
        assert!(dds.calls.is_empty());
    }

    #[test]
    fn a_probe_does_not_disturb_an_armed_engine() {
        let mut model = Model::new();
        let mut dds = MockDds::default();
        let mut serial = ScriptSerial::new(&["0,0,11,22,33,44,55,66,77,88", "Done", "cxn?"]);
        let mut runner = Runner::new(ScriptPin::new(&[false, false, false]));

        runner.poll(&mut dds, &mut serial, &mut model).unwrap();
        runner.poll(&mut dds, &mut serial, &mut model).unwrap();
        assert_eq!(runner.state(), State::Armed);
        runner.poll(&mut dds, &mut serial, &mut model).unwrap();
        assert_eq!(runner.state(), State::Armed);
        assert!(serial.output().ends_with("ad9910\n"));
    }

    #[test]
    fn a_new_upload_aborts_the_running_sequence() {
        let mut model = Model::new();
        let mut dds = MockDds::default();
        let mut serial = ScriptSerial::new(&["0,0,11,22,33,44,55,66,77,88", "Done"]);
        let mut runner = Runner::new(ScriptPin::new(&[false, true]));

        runner.poll(&mut dds, &mut serial, &mut model).unwrap();
        runner.poll(&mut dds, &mut serial, &mut model).unwrap();
        assert_eq!(
            runner.poll(&mut dds, &mut serial, &mut model).unwrap(),
            State::Running(0)
        );

        // Mid-sequence, the host starts over with a different program.
        let mut serial = ScriptSerial::new(&["0,0,AA,BB,CC,DD,EE,FF,00,11", "Done"]);
        assert_eq!(
            runner.poll(&mut dds, &mut serial, &mut model).unwrap(),
            State::Idle
        );
        assert_eq!(
            runner.poll(&mut dds, &mut serial, &mut model).unwrap(),
            State::Armed
        );
        assert_eq!(
            model.step(0).unwrap().single(),
            &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11]
        );
    }

    #[test]
    fn run_sequence_plays_the_whole_program() {
        let mut model = Model::new();
        let mut dds = MockDds::default();
        let mut serial = ScriptSerial::new(&[
            "0,0,11,22,33,44,55,66,77,88",
            "1,1,00,11,22,33,44,55,66,77",
            "1,2,01,02,03,04,05,06,07,08",
            "1,3,0A,0B,0C,0D",
            "1,4,01",
            "Done",
        ]);
        let mut runner = Runner::new(ScriptPin::new(&[
            false, true, false, true, false, true,
        ]));

        for _ in 0..6 {
            runner.poll(&mut dds, &mut serial, &mut model).unwrap();
        }
        assert_eq!(runner.state(), State::Armed);

        let state = runner
            .run_sequence(&mut dds, &mut serial, &mut model)
            .unwrap();
        assert_eq!(state, State::SequenceDone);
        assert_eq!(
            dds.calls.iter().filter(|c| **c == DdsCall::IoUpdate).count(),
            2
        );
        assert!(dds.calls.contains(&DdsCall::RampDirection(true)));
    }

    #[test]
    fn profiles_not_resent_fall_back_to_silence() {
        let mut model = Model::new();
        let mut dds = MockDds::default();
        // First upload programs profile 2; the second never mentions it.
        let mut serial = ScriptSerial::new(&[
            "14,0,AA,BB,CC,DD,EE,FF,11,22",
            "Done",
            "0,0,11,22,33,44,55,66,77,88",
            "Done",
        ]);
        let mut runner = Runner::new(ScriptPin::new(&[false; 4]));
        for _ in 0..4 {
            runner.poll(&mut dds, &mut serial, &mut model).unwrap();
        }
        assert_eq!(model.profile(2).unwrap().data(), &PROFILE_SILENCE);
    }
}
