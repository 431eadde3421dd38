#![cfg_attr(not(test), no_std)]
//! # `ad9910` - Triggered sequence engine for the AD9910 DDS synthesizer chip
//!
//! The AD9910 is a 1 GSPS DDS synthesizer chip sold by Analog Devices. Check the [datasheet](https://www.analog.com/media/en/technical-documentation/data-sheets/AD9910.pdf) for general information about it.
//!
//! This crate carries the firmware logic for a lab-style setup where a host
//! computer uploads a *program* (an ordered list of RF tones and frequency
//! sweeps) over a serial link, and the chip then steps through it on
//! hardware trigger edges:
//!
//! - [`dds`]: register writes over SPI plus the reset/update/ramp control
//!   pins, behind `embedded-hal` traits so any MCU HAL fits.
//! - [`model`]: the uploaded program (12 steps) and tone profiles (8 slots).
//! - [`protocol`]: the line-oriented ASCII upload grammar, with an echo
//!   dump the host uses to verify the transfer.
//! - [`engine`]: the trigger-advanced state machine that programs each
//!   step into the chip.
//! - [`runner`]: all of the above behind a single main-loop `poll`.
//!
//! ## Usage example
//!
//! This example uses the [`arduino-hal`](https://github.com/Rahix/avr-hal). The crate is not device
//! specific though; anything implementing the `embedded-hal` SPI, pin and
//! delay traits (and the small [`protocol::SerialLine`] trait for the
//! serial port) works the same way.
//!
//! ```ignore
//! #[arduino_hal::entry]
//! fn main() -> ! {
//!     let dp = arduino_hal::Peripherals::take().unwrap();
//!     let pins = arduino_hal::pins!(dp);
//!     let (spi, ss) = arduino_hal::Spi::new(/* MSB first, mode 0, clk/4 */);
//!
//!     let mut dds = ad9910::Ad9910::new(
//!         spi,
//!         ss.into_output(),              // SS
//!         pins.d12.into_output(),        // RESET
//!         pins.d11.into_output(),        // IO_UPDATE
//!         pins.d6.into_output(),         // IO_RESET
//!         pins.d4.into_output(),         // DRCTL
//!         pins.d5.into_output(),         // DRHOLD
//!         pins.d7.into_output(),         // OSK
//!         arduino_hal::Delay::new(),
//!     );
//!     dds.initialize().unwrap();
//!     //               ^^^^ unwrap is ok here, since pin writes are
//!     //                    infallible in the arduino-hal.
//!
//!     let mut model = ad9910::Model::new();
//!     let mut runner = ad9910::Runner::new(pins.d13.into_floating_input());
//!     let mut serial = MySerialLine::new(/* 1 s read timeout */);
//!
//!     loop {
//!         let _ = runner.poll(&mut dds, &mut serial, &mut model);
//!     }
//! }
//! ```
//!
//! The reference wiring this was built against:
//!
//! | Signal    | Arduino pin |
//! |-----------|-------------|
//! | DRCTL     |      4      |
//! | DRHOLD    |      5      |
//! | IO_RESET  |      6      |
//! | OSK       |      7      |
//! | SS        |     10      |
//! | IO_UPDATE |     11      |
//! | RESET     |     12      |
//! | TRIG      |     13      |
//!
//! All control outputs idle low; TRIG is sampled for rising edges.
//!
//! ## Host protocol
//!
//! The host speaks newline-terminated ASCII: a `cxn?` probe (answered with
//! `ad9910`), comma-separated hex data records addressed to step slots
//! 0..=11 or profile slots 12..=19, and a `Done` terminator, after which
//! the firmware echoes its tables back and arms the sequence. See the
//! [`protocol`] module docs for the grammar.
//!
//! ## A note about timing
//!
//! The chip wants a minimum width on the RESET, IO_UPDATE and IO_RESET
//! pulses (the I/O update width also depends on SYSCLK; the defaults here
//! assume the 1 GHz configuration that CFR3 programs). The driver holds
//! each pulse for a fixed number of microseconds through the HAL delay it
//! is given, comfortably above the datasheet minima. The widths are
//! constants in [`dds`]; tune them if you must, but never below the
//! datasheet figures.

pub mod dds;
pub mod engine;
pub mod model;
pub mod protocol;
pub mod regmap;
pub mod runner;

#[cfg(test)]
pub(crate) mod testutil;

pub use dds::{Ad9910, DdsControl, Error, InitError, MODE};
pub use engine::{EngineError, Sequencer, State};
pub use model::{Model, Profile, Step, StepMode, MAX_STEPS, NUM_PROFILES};
pub use protocol::{echo, Event, SerialLine, UploadError, Uploader};
pub use regmap::Register;
pub use runner::{Runner, RunnerError};
