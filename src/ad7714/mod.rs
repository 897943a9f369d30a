//! AD7714 front end, as seen through the M76 communication register.
//!
//! [Manual](https://www.analog.com/media/en/technical-documentation/data-sheets/AD7714.pdf)

pub mod regs;
pub use regs::*;

use crate::bus::{Registers, COM_REG};

/// Input pair (CH2..CH0) wired to the measurement paths of the module
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    /// Current of a resistance measurement (Im)
    ResistanceCurrent = 0x2,
    /// Voltage of a resistance measurement (Ux)
    ResistanceVoltage = 0x3,
    Dc = 0x4,
    Ac = 0x6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OperatingMode {
    Normal = 0b000,
    /// Zero-scale system calibration
    ZeroScale = 0b010,
    /// Full-scale system calibration
    FullScale = 0b011,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    One = 0b000,
    Four = 0b010,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Polarity {
    Bipolar,
    Unipolar,
}

/// Lowest and highest filter word accepted by the driver
pub const FILTER_MIN: u16 = 20;
pub const FILTER_MAX: u16 = 1920;

/// Full scale of a 24-bit sample
pub const FULL_SCALE: u32 = 0x00ff_ffff;

/// Announce a write of `reg` on `channel`, then push `data`
pub fn write_reg<B, R>(bus: &mut B, channel: Channel, reg: &R, data: &R::Data)
where
    B: Registers,
    R: Register,
{
    let com = communication::Data::new(reg.select(), false, channel);
    bus.write(COM_REG, u16::from(com.0));
    data.write_to(bus);
}

/// Announce that the next transfer reads `reg` on `channel`
pub fn announce_read<B, R>(bus: &mut B, channel: Channel, reg: &R)
where
    B: Registers,
    R: Register,
{
    let com = communication::Data::new(reg.select(), true, channel);
    bus.write(COM_REG, u16::from(com.0));
}
