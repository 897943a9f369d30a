//! Bit-banged 3-wire (Microwire) serial EEPROM link.
//!
//! Every instruction is a start bit "1", a 2-bit opcode and the cell
//! address, shifted out MSB first. READ is followed by 16 data bits from the
//! chip (after a dummy zero), WRITE by 16 data bits to the chip.
//!
//! - `0b10` READ
//! - `0b01` WRITE
//! - `0b11` ERASE (cell becomes `0xFFFF`)
//! - `0b00` with `0b11…` in the address field: EWEN (erase/write enable)
//! - `0b00` with `0b00…` in the address field: EWDS (erase/write disable)
//!
//! After an erase or write the chip signals busy by pulling DO low once it is
//! selected again, and ready by releasing it high.

use embedded_hal::blocking::delay::DelayUs;
use log::trace;

use crate::identity::Ident;

mod port;
pub use port::{PinPort, RegisterPort};

const OP_READ: u16 = 0b10;
const OP_WRITE: u16 = 0b01;
const OP_ERASE: u16 = 0b11;
const OP_EXTENDED: u16 = 0b00;
const EXT_EWEN: u16 = 0b11;
const EXT_EWDS: u16 = 0b00;

pub const IDENT: &str = "microwire serial EEPROM link";

/// Iterations spent waiting for each edge of the busy/ready handshake
pub const BUSY_POLL_LIMIT: u32 = 10_000;

/// User EEPROM: 8 address bits, 100 µs per half clock
pub const USER_EEPROM_ADDRESS_BITS: u8 = 8;
pub const USER_EEPROM_HALF_PERIOD_US: u32 = 100;

/// Levels driven onto the three output lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lines {
    pub data: bool,
    pub clock: bool,
    pub select: bool,
}

impl Lines {
    pub const IDLE: Lines = Lines { data: false, clock: false, select: false };
}

/// Physical access to the EEPROM lines
pub trait Port {
    /// Drive DI, CLK and CS at once
    fn drive(&mut self, lines: Lines);
    /// Level of the chip's DO line
    fn data_in(&mut self) -> bool;
}

impl<P: Port + ?Sized> Port for &'_ mut P {
    fn drive(&mut self, lines: Lines) {
        (**self).drive(lines)
    }

    fn data_in(&mut self) -> bool {
        (**self).data_in()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("erase cycle did not complete")]
    EraseFailed,
    #[error("write cycle did not complete")]
    WriteFailed,
    #[error("read back differs from written word")]
    VerifyFailed,
}

impl WriteError {
    /// A missed busy/ready handshake is usually just load on the host; a
    /// word that reads back wrong is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            WriteError::EraseFailed | WriteError::WriteFailed => true,
            WriteError::VerifyFailed => false,
        }
    }
}

pub struct Microwire<'d, P, D> {
    port: P,
    delay: &'d mut D,
    address_bits: u8,
    half_period_us: u32,
}

impl<'d, P: Port, D: DelayUs<u32>> Microwire<'d, P, D> {
    pub fn new(port: P, delay: &'d mut D, address_bits: u8, half_period_us: u32) -> Self {
        Microwire { port, delay, address_bits, half_period_us }
    }

    /// Microwire link to the user EEPROM
    pub fn user_eeprom(port: P, delay: &'d mut D) -> Self {
        Self::new(port, delay, USER_EEPROM_ADDRESS_BITS, USER_EEPROM_HALF_PERIOD_US)
    }

    pub fn release(self) -> P {
        self.port
    }

    pub fn read(&mut self, index: u8) -> u16 {
        self.opcode(OP_READ, u16::from(index));
        let mut word = 0u16;
        for _ in 0..16 {
            word = (word << 1) | u16::from(self.clock(false));
        }
        self.deselect();
        trace!("microwire read [{:#04x}] = {:#06x}", index, word);
        word
    }

    /// Erase, program and verify one cell
    pub fn write(&mut self, index: u8, data: u16) -> Result<(), WriteError> {
        self.erase(index)?;
        self.program(index, data)?;
        if self.read(index) != data {
            return Err(WriteError::VerifyFailed);
        }
        trace!("microwire write [{:#04x}] = {:#06x}", index, data);
        Ok(())
    }

    pub fn erase(&mut self, index: u8) -> Result<(), WriteError> {
        self.enable_writes();
        self.opcode(OP_ERASE, u16::from(index));
        self.deselect();
        if self.finish_cycle() {
            Ok(())
        } else {
            Err(WriteError::EraseFailed)
        }
    }

    /// WRITE without the preceding erase
    fn program(&mut self, index: u8, data: u16) -> Result<(), WriteError> {
        self.enable_writes();
        self.opcode(OP_WRITE, u16::from(index));
        for i in (0..16).rev() {
            self.clock((data >> i) & 1 != 0);
        }
        self.deselect();
        if self.finish_cycle() {
            Ok(())
        } else {
            Err(WriteError::WriteFailed)
        }
    }

    fn enable_writes(&mut self) {
        self.opcode(OP_EXTENDED, EXT_EWEN << (self.address_bits - 2));
        self.deselect();
    }

    /// Wait for busy then ready, then lock the chip again. Returns whether
    /// the handshake was seen.
    fn finish_cycle(&mut self) -> bool {
        self.select();
        let busy = self.wait_for(false);
        let ready = busy && self.wait_for(true);
        self.opcode(OP_EXTENDED, EXT_EWDS << (self.address_bits - 2));
        self.deselect();
        ready
    }

    fn wait_for(&mut self, level: bool) -> bool {
        for _ in 0..BUSY_POLL_LIMIT {
            if self.clock(false) == level {
                return true;
            }
            self.delay.delay_us(self.half_period_us);
        }
        false
    }

    fn opcode(&mut self, op: u16, address: u16) {
        let address_mask = (1u16 << self.address_bits) - 1;
        let code = (op << self.address_bits) | (address & address_mask);
        self.select();
        // start bit
        self.clock(true);
        for i in (0..self.address_bits + 2).rev() {
            self.clock((code >> i) & 1 != 0);
        }
    }

    fn select(&mut self) {
        self.port.drive(Lines::IDLE);
        self.delay.delay_us(self.half_period_us);
        self.port.drive(Lines { select: true, ..Lines::IDLE });
        self.delay.delay_us(self.half_period_us);
    }

    fn deselect(&mut self) {
        self.port.drive(Lines::IDLE);
    }

    /// Shift one bit out, returning DO after the rising edge
    fn clock(&mut self, bit: bool) -> bool {
        self.port.drive(Lines { data: bit, clock: false, select: true });
        self.delay.delay_us(self.half_period_us);
        self.port.drive(Lines { data: bit, clock: true, select: true });
        self.delay.delay_us(self.half_period_us);
        self.port.data_in()
    }
}

impl<'d, P: Port, D: DelayUs<u32>> Ident for Microwire<'d, P, D> {
    fn identify(&self) -> &'static str {
        IDENT
    }
}
