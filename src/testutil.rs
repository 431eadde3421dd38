//! Recording mocks for the hardware seams, shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Write as SpiWrite;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::protocol::SerialLine;

/// One observed hardware action, in program order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A named pin was driven to a level.
    Pin(&'static str, bool),
    /// One SPI transfer.
    Spi(Vec<u8>),
    /// A blocking delay.
    DelayUs(u16),
}

#[derive(Default)]
struct LogInner {
    ops: Vec<Op>,
    spi_calls: usize,
    fail_spi_after: Option<usize>,
}

/// Event log shared between the pin, bus and delay mocks so tests can
/// assert on interleaving.
#[derive(Clone, Default)]
pub struct SharedLog(Rc<RefCell<LogInner>>);

impl SharedLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything recorded so far.
    pub fn take(&self) -> Vec<Op> {
        core::mem::take(&mut self.0.borrow_mut().ops)
    }

    /// Let `n` SPI transfers succeed, then fail every one after.
    pub fn fail_spi_after(&self, n: usize) {
        self.0.borrow_mut().fail_spi_after = Some(n);
    }

    fn push(&self, op: Op) {
        self.0.borrow_mut().ops.push(op);
    }
}

/// Number of rising edges recorded for `pin`.
pub fn ticks(ops: &[Op], pin: &str) -> usize {
    ops.iter()
        .filter(|op| matches!(op, Op::Pin(name, true) if *name == pin))
        .count()
}

/// Output pin that records every level change.
pub struct LogPin {
    name: &'static str,
    log: SharedLog,
}

impl LogPin {
    pub fn new(name: &'static str, log: &SharedLog) -> Self {
        LogPin {
            name,
            log: log.clone(),
        }
    }
}

impl OutputPin for LogPin {
    type Error = core::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.log.push(Op::Pin(self.name, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.log.push(Op::Pin(self.name, true));
        Ok(())
    }
}

/// SPI bus mock recording transfers, with an optional scripted fault.
pub struct LogSpi {
    log: SharedLog,
}

/// Error injected by [`SharedLog::fail_spi_after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

impl LogSpi {
    pub fn new(log: &SharedLog) -> Self {
        LogSpi { log: log.clone() }
    }
}

impl SpiWrite<u8> for LogSpi {
    type Error = BusFault;

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut inner = self.log.0.borrow_mut();
        inner.spi_calls += 1;
        if let Some(limit) = inner.fail_spi_after {
            if inner.spi_calls > limit {
                return Err(BusFault);
            }
        }
        inner.ops.push(Op::Spi(words.to_vec()));
        Ok(())
    }
}

/// Delay source that records requested pulse widths instead of sleeping.
pub struct LogDelay {
    log: SharedLog,
}

impl LogDelay {
    pub fn new(log: &SharedLog) -> Self {
        LogDelay { log: log.clone() }
    }
}

impl DelayUs<u16> for LogDelay {
    fn delay_us(&mut self, us: u16) {
        self.log.push(Op::DelayUs(us));
    }
}

/// Trigger input replaying a scripted level sequence; the last level
/// repeats once the script runs out.
pub struct ScriptPin {
    levels: RefCell<VecDeque<bool>>,
    last: RefCell<bool>,
}

impl ScriptPin {
    pub fn new(levels: &[bool]) -> Self {
        ScriptPin {
            levels: RefCell::new(levels.iter().copied().collect()),
            last: RefCell::new(false),
        }
    }
}

impl InputPin for ScriptPin {
    type Error = core::convert::Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        if let Some(level) = self.levels.borrow_mut().pop_front() {
            *self.last.borrow_mut() = level;
        }
        Ok(*self.last.borrow())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|level| !level)
    }
}

/// In-memory serial line: queued inbound lines, captured outbound bytes.
pub struct ScriptSerial {
    rx: VecDeque<Vec<u8>>,
    pub tx: Vec<u8>,
}

impl ScriptSerial {
    pub fn new(lines: &[&str]) -> Self {
        ScriptSerial {
            rx: lines.iter().map(|l| l.as_bytes().to_vec()).collect(),
            tx: Vec::new(),
        }
    }

    /// Everything the firmware wrote back, as text.
    pub fn output(&self) -> String {
        String::from_utf8(self.tx.clone()).unwrap()
    }
}

/// Error type for the scripted line; never actually produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFault;

impl SerialLine for ScriptSerial {
    type Error = LineFault;

    fn available(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.rx.pop_front() {
            Some(line) => {
                let n = line.len().min(buf.len());
                buf[..n].copy_from_slice(&line[..n]);
                Ok(n)
            }
            // Queue exhausted: behaves like the 1 s timeout.
            None => Ok(0),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.tx.extend_from_slice(bytes);
        Ok(())
    }
}

/// Recording stand-in for the DDS driver, for engine and runner tests.
#[derive(Default)]
pub struct MockDds {
    pub calls: Vec<DdsCall>,
    pub fail_writes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdsCall {
    Write(crate::regmap::Register, Vec<u8>),
    IoUpdate,
    Drg(bool),
    RampDirection(bool),
    RampHold(bool),
}

impl crate::dds::DdsControl for MockDds {
    type Error = BusFault;

    fn write_register(
        &mut self,
        reg: crate::regmap::Register,
        bytes: &[u8],
    ) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(BusFault);
        }
        self.calls.push(DdsCall::Write(reg, bytes.to_vec()));
        Ok(())
    }

    fn io_update(&mut self) -> Result<(), Self::Error> {
        self.calls.push(DdsCall::IoUpdate);
        Ok(())
    }

    fn drg_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        self.calls.push(DdsCall::Drg(enable));
        Ok(())
    }

    fn set_ramp_direction(&mut self, invert: bool) -> Result<(), Self::Error> {
        self.calls.push(DdsCall::RampDirection(invert));
        Ok(())
    }

    fn set_ramp_hold(&mut self, hold: bool) -> Result<(), Self::Error> {
        self.calls.push(DdsCall::RampHold(hold));
        Ok(())
    }
}
