use core::convert::Infallible;
use core::ops::{Deref, DerefMut};

use byteorder::{ByteOrder, LittleEndian};
use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use log::{debug, warn};

use super::{M76, IRQ_TIMEOUT_MS, POLL_INTERVAL_MS, POLL_LIMIT};
use crate::ad7714::{self, data, Channel, Data, Gain, OperatingMode, Register};
use crate::bus::{
    Registers, ACCESS_IRQ, ACCESS_REG, ACCESS_TR24R, DATA_REG, STATUS_REG, STATUS_TRDYR,
};
use crate::error::Error;

/// Bytes produced by [`M76::read_resistance_block`]
pub const RESISTANCE_BLOCK_SIZE: usize = 8;

impl<'a, B, D> M76<'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// One 24-bit sample of a voltage or current range
    pub fn read_single(&mut self) -> Result<u32, Error> {
        if self.state.range.is_resistance() {
            return Err(Error::IllegalParameter);
        }
        self.check_ready()?;
        let raw = self.read_register(&Data)?;
        Ok(data::Data(raw).sample())
    }

    /// Ux then Im sample of a resistance range. The voltage path is
    /// programmed again before returning, also on error.
    pub fn read_resistance_pair(&mut self) -> Result<(u32, u32), Error> {
        if !self.state.range.is_resistance() {
            return Err(Error::IllegalParameter);
        }
        self.check_ready()?;
        let ux = data::Data(self.read_register(&Data)?).sample();
        let im = {
            let mut current = CurrentPath::enter(self);
            data::Data(current.read_register(&Data)?).sample()
        };
        debug!("M76 resistance pair ux {:#08x} im {:#08x}", ux, im);
        Ok((ux, im))
    }

    /// [`read_resistance_pair`](Self::read_resistance_pair) into `buf`,
    /// little-endian Ux then Im
    pub fn read_resistance_block(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.state.range.is_resistance() {
            return Err(Error::IllegalParameter);
        }
        if buf.len() < RESISTANCE_BLOCK_SIZE {
            return Err(Error::UserBufferTooSmall);
        }
        let (ux, im) = self.read_resistance_pair()?;
        LittleEndian::write_u32(&mut buf[0..4], ux);
        LittleEndian::write_u32(&mut buf[4..8], im);
        Ok(RESISTANCE_BLOCK_SIZE)
    }

    fn check_ready(&self) -> Result<(), Error> {
        if !self.state.permit_measurement {
            warn!("M76 measurement not permitted, calibration checksum bad");
            return Err(Error::DeviceNotReady);
        }
        if !self.state.calibration_valid {
            warn!("M76 range {} not calibrated", self.state.range);
            return Err(Error::DeviceNotReady);
        }
        Ok(())
    }

    /// Read `reg` of the current channel through one 24-bit transfer
    pub(super) fn read_register<R: Register>(&mut self, reg: &R) -> Result<u32, Error> {
        ad7714::announce_read(&mut self.bus, self.state.channel, reg);
        if self.state.irq_enabled {
            self.completion.clear();
            self.bus.write(ACCESS_REG, ACCESS_TR24R | ACCESS_IRQ);
            if !self.completion.wait(&mut self.delay, IRQ_TIMEOUT_MS) {
                self.bus.write(ACCESS_REG, 0);
                warn!("M76 transfer interrupt timed out");
                return Err(Error::DeviceNotReady);
            }
        } else {
            self.bus.write(ACCESS_REG, ACCESS_TR24R);
            let mut polls = 0;
            loop {
                match self.transfer_ready() {
                    Ok(()) => break,
                    Err(nb::Error::WouldBlock) => {
                        self.delay.delay_ms(POLL_INTERVAL_MS);
                        polls += 1;
                        if polls >= POLL_LIMIT {
                            self.bus.write(ACCESS_REG, 0);
                            warn!("M76 transfer not ready after {} polls", polls);
                            return Err(Error::DeviceNotReady);
                        }
                    }
                    Err(nb::Error::Other(never)) => match never {},
                }
            }
        }
        Ok(self.bus.read_u32(DATA_REG))
    }

    fn transfer_ready(&mut self) -> nb::Result<(), Infallible> {
        if self.bus.read(STATUS_REG) & STATUS_TRDYR != 0 {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

/// The Im configuration of a resistance range (unity gain, current
/// channel) for as long as the guard lives. Dropping it programs the Ux
/// configuration again.
pub(super) struct CurrentPath<'g, 'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    dev: &'g mut M76<'a, B, D>,
    gain: Gain,
}

impl<'g, 'a, B, D> CurrentPath<'g, 'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    pub(super) fn enter(dev: &'g mut M76<'a, B, D>) -> Self {
        let gain = dev.state.gain;
        dev.state.gain = Gain::One;
        dev.state.channel = Channel::ResistanceCurrent;
        dev.state.mode = OperatingMode::Normal;
        dev.program_path();
        CurrentPath { dev, gain }
    }
}

impl<'g, 'a, B, D> Drop for CurrentPath<'g, 'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    fn drop(&mut self) {
        self.dev.state.gain = self.gain;
        self.dev.state.channel = Channel::ResistanceVoltage;
        self.dev.state.mode = OperatingMode::Normal;
        self.dev.program_path();
    }
}

impl<'g, 'a, B, D> Deref for CurrentPath<'g, 'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    type Target = M76<'a, B, D>;

    fn deref(&self) -> &Self::Target {
        &*self.dev
    }
}

impl<'g, 'a, B, D> DerefMut for CurrentPath<'g, 'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.dev
    }
}
