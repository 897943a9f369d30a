//! M76 module register file.
//!
//! All accesses are 16 bits wide at a byte offset from the module base.

/// Data Register (two 16-bit halves, high word first)
pub const DATA_REG: u8 = 0x00;
/// Configuration Register (two 16-bit halves, high word first)
pub const CONFIG_REG: u8 = 0x04;
/// Communication Register, byte-wide window into the AD7714 serial interface
pub const COM_REG: u8 = 0x08;
pub const ACCESS_REG: u8 = 0x0a;
pub const STATUS_REG: u8 = 0x0c;
pub const CTRL_REG: u8 = 0x0e;
/// Serial EEPROM bus (identity PROM and user EEPROM share the lines)
pub const PLD_IF_REG: u8 = 0xfe;

/// Access Register: 24-bit read transfer after the converter's DRDY
pub const ACCESS_TR24R: u16 = 1 << 2;
/// Access Register: raise an interrupt when the transfer has completed
pub const ACCESS_IRQ: u16 = 1 << 3;

/// Status Register: transfer ready after `ACCESS_TR24R`
pub const STATUS_TRDYR: u16 = 1 << 2;
/// Status Register: interrupt pending
pub const STATUS_IRQ_PEND: u16 = 1 << 3;

/// Control Register: select identity PROM and release the converter reset
pub const CTRL_IDPROM_SEL: u16 = 0x2;
/// Control Register: select user EEPROM
pub const CTRL_UEPROM_SEL: u16 = 0x6;

/// Access to the module registers.
///
/// Implemented by whatever maps the module into the address space (or by a
/// model of the board in tests). Accesses cannot fail.
pub trait Registers {
    fn read(&mut self, offset: u8) -> u16;
    fn write(&mut self, offset: u8, value: u16);

    /// Write a 32-bit value as two words, high word at `offset`
    fn write_u32(&mut self, offset: u8, value: u32) {
        self.write(offset, (value >> 16) as u16);
        self.write(offset + 2, value as u16);
    }

    /// Read two words, high word at `offset`
    fn read_u32(&mut self, offset: u8) -> u32 {
        let high = u32::from(self.read(offset));
        let low = u32::from(self.read(offset + 2));
        (high << 16) | low
    }
}

impl<R: Registers + ?Sized> Registers for &'_ mut R {
    fn read(&mut self, offset: u8) -> u16 {
        (**self).read(offset)
    }

    fn write(&mut self, offset: u8, value: u16) {
        (**self).write(offset, value)
    }
}
