//! Serial upload protocol.
//!
//! The firmware is the passive peer of a line-oriented ASCII protocol:
//!
//! * `cxn?`: liveness probe; answered with the literal line `ad9910`.
//! * `Done`: terminator; ends the upload session.
//! * `<idx>,<type>,<b0>,<b1>,...`: data record. Indices 0..=11 address
//!   program steps (type 0 = single tone payload, 1 = ramp limits,
//!   2 = ramp step size, 3 = ramp rate, 4 = sweep invert flag); indices
//!   12..=19 address profiles 0..=7, where the type field is ignored.
//!
//! Payload fields are hexadecimal byte literals, most significant first;
//! an optional `0x` prefix is accepted on any field. The index field
//! without a prefix reads as decimal, so `15,...` and `0x0F,...` both
//! address profile 3.
//!
//! There is no in-band error reply: a line that does not parse is skipped
//! and the host is expected to notice the omission in the [`echo`] dump.

use core::fmt::Write as _;

use heapless::String;
use log::{debug, warn};

use crate::model::{Model, Profile, Step, StepMode};

/// Upper bound on an inbound line, including the profile records the
/// production host pads with `0x` prefixes.
pub const MAX_LINE_LEN: usize = 128;

// Longest payload a record can use; later bytes are dropped anyway.
const MAX_RECORD_LEN: usize = 16;

/// Line-oriented serial link, as provided by the platform.
///
/// Implementations are expected to read with a timeout of roughly one
/// second and to strip the newline terminator.
pub trait SerialLine {
    type Error;

    /// Whether at least one received byte is waiting.
    fn available(&mut self) -> bool;

    /// Read one line into `buf`, without the terminator. Returns the
    /// number of bytes read; 0 means a bare terminator or a timeout.
    fn read_line(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write raw bytes.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// What one poll of the serial link produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A probe line arrived and was answered.
    Probe,
    /// The upload terminator arrived.
    Done,
    /// A data record was stored into the given slot.
    Slot(u8),
    /// An empty line, twice in a row.
    NoData,
    /// Nothing buffered on the link.
    Idle,
}

/// Upload failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError<E> {
    /// The serial link itself failed.
    Serial(E),
    /// The line was not a valid record. Recoverable: the session
    /// continues and the slot it addressed is left untouched.
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordType {
    Single,
    RampLimits,
    RampStep,
    RampRate,
    Invert,
}

impl RecordType {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RecordType::Single),
            1 => Some(RecordType::RampLimits),
            2 => Some(RecordType::RampStep),
            3 => Some(RecordType::RampRate),
            4 => Some(RecordType::Invert),
            _ => None,
        }
    }
}

enum Record {
    Step {
        index: u8,
        ty: RecordType,
        payload: heapless::Vec<u8, MAX_RECORD_LEN>,
    },
    Profile {
        index: u8,
        payload: heapless::Vec<u8, MAX_RECORD_LEN>,
    },
}

/// Receives host uploads into a [`Model`].
///
/// The first data record of a session disables the whole program and
/// silences every profile, so a finished upload leaves the enabled steps
/// as exactly the contiguous prefix the host sent. A lone probe does not
/// start a session.
#[derive(Default)]
pub struct Uploader {
    in_session: bool,
}

impl Uploader {
    pub fn new() -> Self {
        Uploader::default()
    }

    /// Whether an upload session is underway (a data record arrived and
    /// `Done` has not).
    pub fn in_session(&self) -> bool {
        self.in_session
    }

    /// Service the serial link once: read at most one line and route it.
    pub fn service<S: SerialLine>(
        &mut self,
        serial: &mut S,
        model: &mut Model,
    ) -> Result<Event, UploadError<S::Error>> {
        if !serial.available() {
            return Ok(Event::Idle);
        }

        let mut buf = [0u8; MAX_LINE_LEN];
        let mut n = serial.read_line(&mut buf).map_err(UploadError::Serial)?;
        if n == 0 {
            // The line driver occasionally yields a spurious empty line;
            // one retry rides over it.
            n = serial.read_line(&mut buf).map_err(UploadError::Serial)?;
            if n == 0 {
                return Ok(Event::NoData);
            }
        }

        let line = core::str::from_utf8(&buf[..n])
            .map_err(|_| UploadError::Malformed)?
            .trim();

        if line == "cxn?" {
            serial.write_all(b"ad9910\n").map_err(UploadError::Serial)?;
            return Ok(Event::Probe);
        }
        if line == "Done" {
            self.in_session = false;
            return Ok(Event::Done);
        }

        let record = parse_record(line).ok_or_else(|| {
            warn!("skipping malformed upload line");
            UploadError::Malformed
        })?;

        if !self.in_session {
            debug!("upload session started");
            model.disable_all();
            model.zero_profiles();
            self.in_session = true;
        }

        Ok(Event::Slot(apply_record(model, record)))
    }
}

/// Index field: decimal, or hexadecimal with a `0x` prefix.
fn parse_index(token: &str) -> Option<u8> {
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => token.parse().ok(),
    }
}

/// Payload field: hexadecimal, with or without a `0x` prefix.
fn parse_hex_byte(token: &str) -> Option<u8> {
    let token = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u8::from_str_radix(token, 16).ok()
}

fn parse_record(line: &str) -> Option<Record> {
    let mut fields = line.split(',').map(str::trim).filter(|t| !t.is_empty());

    let index = parse_index(fields.next()?)?;
    let type_code = parse_index(fields.next()?)?;

    let mut payload = heapless::Vec::new();
    for token in fields {
        let byte = parse_hex_byte(token)?;
        // Beyond capacity is beyond every record's declared length.
        let _ = payload.push(byte);
    }

    match index {
        0..=11 => {
            let ty = RecordType::from_code(type_code)?;
            Some(Record::Step { index, ty, payload })
        }
        12..=19 => Some(Record::Profile {
            index: index - 12,
            payload,
        }),
        _ => None,
    }
}

/// Copy `src` into `dst`, dropping extra bytes and leaving the tail of
/// `dst` untouched when `src` is short.
fn copy_clamped(dst: &mut [u8], src: &[u8]) {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
}

fn apply_record(model: &mut Model, record: Record) -> u8 {
    match record {
        Record::Step { index, ty, payload } => {
            let step = &mut model.program[index as usize];
            match ty {
                RecordType::Single => {
                    copy_clamped(&mut step.single, &payload);
                    step.mode = StepMode::SingleTone;
                }
                RecordType::RampLimits => {
                    copy_clamped(&mut step.ramp_limits, &payload);
                    step.mode = StepMode::Sweep;
                }
                RecordType::RampStep => {
                    copy_clamped(&mut step.ramp_step, &payload);
                    step.mode = StepMode::Sweep;
                }
                RecordType::RampRate => {
                    copy_clamped(&mut step.ramp_rate, &payload);
                    step.mode = StepMode::Sweep;
                }
                RecordType::Invert => {
                    step.sweep_invert = payload.first() == Some(&1);
                }
            }
            step.enabled = true;
            index
        }
        Record::Profile { index, payload } => {
            let profile = &mut model.profiles[index as usize];
            copy_clamped(&mut profile.data, &payload);
            index + 12
        }
    }
}

/// Dump the enabled program prefix and all eight profiles back to the
/// host for verification.
///
/// Rendering matches what hosts already parse: one header line per step
/// (`<idx>,<mode>,<invert>,`), then its payload line(s); one header line
/// per profile (`<idx>,`), then its payload line. Bytes are uppercase hex
/// without zero padding, each followed by a comma.
pub fn echo<S: SerialLine>(model: &Model, serial: &mut S) -> Result<(), S::Error> {
    if let Some(last) = model.last_enabled() {
        for index in 0..=last {
            print_step(serial, index, &model.program[index])?;
        }
    }
    for profile in model.profiles.iter() {
        print_profile(serial, profile)?;
    }
    Ok(())
}

// The fixed line capacities below cover the longest possible rendering
// (8 payload bytes at 3 characters each, plus the terminator).

fn print_step<S: SerialLine>(serial: &mut S, index: usize, step: &Step) -> Result<(), S::Error> {
    let mode_code: u8 = match step.mode() {
        StepMode::SingleTone => 0,
        StepMode::Sweep => 1,
    };
    let mut header: String<16> = String::new();
    let _ = write!(
        header,
        "{},{:X},{},\n",
        index,
        mode_code,
        step.sweep_invert() as u8
    );
    serial.write_all(header.as_bytes())?;

    match step.mode() {
        StepMode::SingleTone => print_bytes(serial, step.single())?,
        StepMode::Sweep => {
            print_bytes(serial, step.ramp_limits())?;
            print_bytes(serial, step.ramp_step())?;
            print_bytes(serial, step.ramp_rate())?;
        }
    }
    Ok(())
}

fn print_profile<S: SerialLine>(serial: &mut S, profile: &Profile) -> Result<(), S::Error> {
    let mut header: String<8> = String::new();
    let _ = write!(header, "{:X},\n", profile.channel());
    serial.write_all(header.as_bytes())?;
    print_bytes(serial, profile.data())
}

fn print_bytes<S: SerialLine>(serial: &mut S, bytes: &[u8]) -> Result<(), S::Error> {
    let mut line: String<32> = String::new();
    for byte in bytes {
        let _ = write!(line, "{:X},", byte);
    }
    let _ = line.push('\n');
    serial.write_all(line.as_bytes())
}
