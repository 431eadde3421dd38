//! Low-level AD9910 driver: register writes over SPI plus the handful of
//! control pins the chip needs toggled around them.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::spi::Write as SpiWrite;
use embedded_hal::digital::v2::OutputPin;
use embedded_hal::spi::{Mode, MODE_0};
use log::warn;

use crate::regmap::{
    Register, AUXDAC_DEFAULT, CFR1_DEFAULT, CFR2_DEFAULT, CFR2_DRG_ENABLE, CFR3_DEFAULT,
};

/// SPI mode the AD9910 serial port expects.
///
/// Configure the bus for this mode, MSB first, at no more than one quarter
/// of the peripheral clock before handing it to [`Ad9910::new`].
pub const MODE: Mode = MODE_0;

/// Width of the I/O update pulse in microseconds. Assumes a 1 GHz SYSCLK;
/// the datasheet minimum is one SYNC_CLK period.
pub const IO_UPDATE_PULSE_US: u16 = 50;
/// Width of the master reset pulse in microseconds.
pub const RESET_PULSE_US: u16 = 100;
/// Width of the I/O reset pulse in microseconds.
pub const IO_RESET_PULSE_US: u16 = 100;

/// Driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<CommE, PinE> {
    /// SPI bus error.
    Spi(CommE),
    /// Control pin error.
    Pin(PinE),
    /// The payload is longer than the register's depth.
    Overflow { reg: Register, len: usize },
}

/// Bring-up error, naming the stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError<CommE, PinE> {
    /// Pin levels or the master reset pulse could not be driven.
    Port(Error<CommE, PinE>),
    /// A control register could not be loaded with its default.
    Register(Register, Error<CommE, PinE>),
}

/// The operations the sequence engine needs from the DDS.
///
/// [`Ad9910`] is the hardware implementation; tests substitute a recording
/// mock.
pub trait DdsControl {
    type Error;

    /// Write `bytes` to `reg`, most significant byte first.
    fn write_register(&mut self, reg: Register, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Pulse IO_UPDATE, committing buffered register writes to the signal
    /// path.
    fn io_update(&mut self) -> Result<(), Self::Error>;

    /// Select the ramp-enabled or default CFR2 payload. Takes effect on
    /// the next I/O update.
    fn drg_enable(&mut self, enable: bool) -> Result<(), Self::Error>;

    /// Drive DRCTL: high ramps toward the lower limit (inverted sweep),
    /// low toward the upper limit.
    fn set_ramp_direction(&mut self, invert: bool) -> Result<(), Self::Error>;

    /// Drive DRHOLD: high freezes the ramp at its current point.
    fn set_ramp_hold(&mut self, hold: bool) -> Result<(), Self::Error>;
}

/// Represents a connection to an AD9910 over its SPI port.
///
/// The driver owns the bus plus the seven control outputs; the trigger
/// input belongs to the sequence engine. All outputs idle low. See the
/// [crate docs](crate) for the reference wiring.
pub struct Ad9910<SPI, SS, RST, UPD, IORST, DRCTL, DRHOLD, OSK, D> {
    spi: SPI,
    ss: SS,
    reset: RST,
    io_update: UPD,
    io_reset: IORST,
    drctl: DRCTL,
    drhold: DRHOLD,
    osk: OSK,
    delay: D,
}

impl<SPI, SS, RST, UPD, IORST, DRCTL, DRHOLD, OSK, D, CommE, PinE>
    Ad9910<SPI, SS, RST, UPD, IORST, DRCTL, DRHOLD, OSK, D>
where
    SPI: SpiWrite<u8, Error = CommE>,
    SS: OutputPin<Error = PinE>,
    RST: OutputPin<Error = PinE>,
    UPD: OutputPin<Error = PinE>,
    IORST: OutputPin<Error = PinE>,
    DRCTL: OutputPin<Error = PinE>,
    DRHOLD: OutputPin<Error = PinE>,
    OSK: OutputPin<Error = PinE>,
    D: DelayUs<u16>,
{
    /// Take ownership of the bus, control pins and delay source.
    ///
    /// No communication happens yet; call [`initialize`](Self::initialize)
    /// to reset the chip and load the control register defaults.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spi: SPI,
        ss: SS,
        reset: RST,
        io_update: UPD,
        io_reset: IORST,
        drctl: DRCTL,
        drhold: DRHOLD,
        osk: OSK,
        delay: D,
    ) -> Self {
        Ad9910 {
            spi,
            ss,
            reset,
            io_update,
            io_reset,
            drctl,
            drhold,
            osk,
            delay,
        }
    }

    /// Bring the chip to its power-on configuration.
    ///
    /// Drives every output to its idle (low) level, pulses master reset,
    /// then loads CFR1, CFR2, CFR3 and the auxiliary DAC register with
    /// their defaults, committing each with an I/O update. The error names
    /// the register whose write failed.
    pub fn initialize(&mut self) -> Result<(), InitError<CommE, PinE>> {
        self.port_init().map_err(InitError::Port)?;
        self.master_reset().map_err(InitError::Port)?;

        for (reg, bytes) in [
            (Register::Cfr1, &CFR1_DEFAULT),
            (Register::Cfr2, &CFR2_DEFAULT),
            (Register::Cfr3, &CFR3_DEFAULT),
            (Register::AuxDac, &AUXDAC_DEFAULT),
        ] {
            self.write_register(reg, bytes)
                .and_then(|()| self.io_update())
                .map_err(|e| InitError::Register(reg, e))?;
        }
        Ok(())
    }

    fn port_init(&mut self) -> Result<(), Error<CommE, PinE>> {
        self.drctl.set_low().map_err(Error::Pin)?;
        self.drhold.set_low().map_err(Error::Pin)?;
        self.io_reset.set_low().map_err(Error::Pin)?;
        self.osk.set_low().map_err(Error::Pin)?;
        self.io_update.set_low().map_err(Error::Pin)?;
        self.reset.set_low().map_err(Error::Pin)?;
        self.ss.set_low().map_err(Error::Pin)?;
        Ok(())
    }

    /// Write `bytes` to `reg`, most significant byte first.
    ///
    /// Asserts SS, clocks out the instruction byte and the payload, and
    /// deasserts SS. A payload shorter than the register depth leaves a
    /// partial word in the chip's serial buffer, so it is flushed with an
    /// I/O reset pulse before SS is released. A payload longer than the
    /// depth is rejected before any pin moves.
    pub fn write_register(
        &mut self,
        reg: Register,
        bytes: &[u8],
    ) -> Result<(), Error<CommE, PinE>> {
        let depth = reg.depth();
        if bytes.len() > depth {
            warn!(
                "rejecting {} byte write to {:?} (depth {})",
                bytes.len(),
                reg,
                depth
            );
            return Err(Error::Overflow {
                reg,
                len: bytes.len(),
            });
        }

        self.ss.set_low().map_err(Error::Pin)?;
        self.spi.write(&[reg.addr()]).map_err(Error::Spi)?;
        self.spi.write(bytes).map_err(Error::Spi)?;
        if bytes.len() < depth {
            self.io_reset()?;
        }
        self.ss.set_high().map_err(Error::Pin)
    }

    /// Pulse IO_UPDATE to commit buffered register writes.
    pub fn io_update(&mut self) -> Result<(), Error<CommE, PinE>> {
        self.io_update.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(IO_UPDATE_PULSE_US);
        self.io_update.set_low().map_err(Error::Pin)
    }

    /// Pulse IO_RESET, discarding any partial word in the serial buffer.
    pub fn io_reset(&mut self) -> Result<(), Error<CommE, PinE>> {
        self.io_reset.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(IO_RESET_PULSE_US);
        self.io_reset.set_low().map_err(Error::Pin)
    }

    /// Pulse the RESET pin, returning the chip to its power-on state.
    pub fn master_reset(&mut self) -> Result<(), Error<CommE, PinE>> {
        self.reset.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(RESET_PULSE_US);
        self.reset.set_low().map_err(Error::Pin)
    }

    /// Write CFR2 with the ramp-enabled payload, or the default when
    /// `enable` is false. Does not pulse I/O update.
    pub fn drg_enable(&mut self, enable: bool) -> Result<(), Error<CommE, PinE>> {
        let bytes: &[u8] = if enable {
            &CFR2_DRG_ENABLE
        } else {
            &CFR2_DEFAULT
        };
        self.write_register(Register::Cfr2, bytes)
    }

    /// Drive DRCTL. High ramps toward the lower limit.
    pub fn set_ramp_direction(&mut self, invert: bool) -> Result<(), Error<CommE, PinE>> {
        self.drctl.set_state(invert.into()).map_err(Error::Pin)
    }

    /// Drive DRHOLD. High freezes the ramp at its current point.
    pub fn set_ramp_hold(&mut self, hold: bool) -> Result<(), Error<CommE, PinE>> {
        self.drhold.set_state(hold.into()).map_err(Error::Pin)
    }

    /// Release the bus, pins and delay source.
    pub fn free(self) -> (SPI, SS, RST, UPD, IORST, DRCTL, DRHOLD, OSK, D) {
        (
            self.spi,
            self.ss,
            self.reset,
            self.io_update,
            self.io_reset,
            self.drctl,
            self.drhold,
            self.osk,
            self.delay,
        )
    }
}

impl<SPI, SS, RST, UPD, IORST, DRCTL, DRHOLD, OSK, D, CommE, PinE> DdsControl
    for Ad9910<SPI, SS, RST, UPD, IORST, DRCTL, DRHOLD, OSK, D>
where
    SPI: SpiWrite<u8, Error = CommE>,
    SS: OutputPin<Error = PinE>,
    RST: OutputPin<Error = PinE>,
    UPD: OutputPin<Error = PinE>,
    IORST: OutputPin<Error = PinE>,
    DRCTL: OutputPin<Error = PinE>,
    DRHOLD: OutputPin<Error = PinE>,
    OSK: OutputPin<Error = PinE>,
    D: DelayUs<u16>,
{
    type Error = Error<CommE, PinE>;

    fn write_register(&mut self, reg: Register, bytes: &[u8]) -> Result<(), Self::Error> {
        Ad9910::write_register(self, reg, bytes)
    }

    fn io_update(&mut self) -> Result<(), Self::Error> {
        Ad9910::io_update(self)
    }

    fn drg_enable(&mut self, enable: bool) -> Result<(), Self::Error> {
        Ad9910::drg_enable(self, enable)
    }

    fn set_ramp_direction(&mut self, invert: bool) -> Result<(), Self::Error> {
        Ad9910::set_ramp_direction(self, invert)
    }

    fn set_ramp_hold(&mut self, hold: bool) -> Result<(), Self::Error> {
        Ad9910::set_ramp_hold(self, hold)
    }
}
