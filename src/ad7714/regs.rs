use bit_field::BitField;

use super::*;
use crate::bus::{Registers, COM_REG, DATA_REG};

pub trait Register {
    type Data: RegisterData;
    /// RS2..RS0 of the communication register
    fn select(&self) -> u8;
}

pub trait RegisterData {
    /// Push the register contents through the module once the
    /// communication register has announced the write
    fn write_to<B: Registers>(&self, bus: &mut B);
}

macro_rules! def_reg {
    ($Reg: ident, $reg: ident, $rs: expr, u8) => {
        pub struct $Reg;
        impl Register for $Reg {
            type Data = $reg::Data;
            fn select(&self) -> u8 {
                $rs
            }
        }
        pub mod $reg {
            #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
            pub struct Data(pub u8);
        }
        impl RegisterData for $reg::Data {
            fn write_to<B: Registers>(&self, bus: &mut B) {
                bus.write(COM_REG, u16::from(self.0));
            }
        }
    };
    ($Reg: ident, $reg: ident, $rs: expr, u32) => {
        pub struct $Reg;
        impl Register for $Reg {
            type Data = $reg::Data;
            fn select(&self) -> u8 {
                $rs
            }
        }
        pub mod $reg {
            #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
            pub struct Data(pub u32);
        }
        impl RegisterData for $reg::Data {
            fn write_to<B: Registers>(&self, bus: &mut B) {
                bus.write_u32(DATA_REG, self.0);
            }
        }
    };
}

def_reg!(Communication, communication, 0b000, u8);
impl communication::Data {
    pub fn new(select: u8, read: bool, channel: Channel) -> Self {
        let mut byte = 0u8;
        byte.set_bits(4..=6, select);
        byte.set_bit(3, read);
        byte.set_bits(0..=2, channel as u8);
        communication::Data(byte)
    }

    pub fn select(&self) -> u8 {
        self.0.get_bits(4..=6)
    }

    pub fn is_read(&self) -> bool {
        self.0.get_bit(3)
    }

    pub fn channel(&self) -> u8 {
        self.0.get_bits(0..=2)
    }
}

def_reg!(Mode, mode, 0b001, u8);
impl mode::Data {
    pub fn new(operating: OperatingMode, gain: Gain) -> Self {
        let mut byte = 0u8;
        byte.set_bits(5..=7, operating as u8);
        byte.set_bits(2..=4, gain as u8);
        mode::Data(byte)
    }
}

def_reg!(FilterHigh, filter_high, 0b010, u8);
impl filter_high::Data {
    /// Always selects 24-bit word length
    pub fn new(polarity: Polarity, filter: u16) -> Self {
        let mut byte = 0u8;
        byte.set_bit(7, polarity == Polarity::Unipolar);
        byte.set_bit(6, true);
        byte.set_bits(0..=3, ((filter >> 8) & 0xf) as u8);
        filter_high::Data(byte)
    }

    pub fn unipolar(&self) -> bool {
        self.0.get_bit(7)
    }

    pub fn word_length_24(&self) -> bool {
        self.0.get_bit(6)
    }
}

def_reg!(FilterLow, filter_low, 0b011, u8);
impl filter_low::Data {
    pub fn new(filter: u16) -> Self {
        filter_low::Data((filter & 0xff) as u8)
    }
}

def_reg!(Data, data, 0b101, u32);
impl data::Data {
    /// The module latches the 24-bit sample followed by a status byte
    pub fn sample(&self) -> u32 {
        (self.0 >> 8) & 0x00ff_ffff
    }
}

def_reg!(ZeroScale, zero_scale, 0b110, u32);
def_reg!(FullScale, full_scale, 0b111, u32);
