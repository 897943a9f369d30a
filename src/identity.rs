//! Identification of the module and of the driver layers.

use byteorder::{BigEndian, ByteOrder};
use embedded_hal::blocking::delay::DelayUs;
use log::{debug, error};

use crate::error::Error;
use crate::microwire::{Microwire, Port};

/// Capability of reporting a revision string
pub trait Ident {
    fn identify(&self) -> &'static str;
}

/// First word of a MEN identity PROM
pub const MOD_ID_MAGIC: u16 = 0x5346;
/// Module id of the M76
pub const MOD_ID: u16 = 76;
/// 93C46: 64 words
pub const ID_PROM_SIZE: usize = 128;
pub const ID_PROM_ADDRESS_BITS: u8 = 6;
pub const ID_PROM_HALF_PERIOD_US: u32 = 10;

pub fn id_prom<P: Port, D: DelayUs<u32>>(port: P, delay: &mut D) -> Microwire<'_, P, D> {
    Microwire::new(port, delay, ID_PROM_ADDRESS_BITS, ID_PROM_HALF_PERIOD_US)
}

/// Magic and module id must match
pub fn check<P: Port, D: DelayUs<u32>>(link: &mut Microwire<P, D>) -> Result<(), Error> {
    let magic = link.read(0);
    let id = link.read(1);
    if magic != MOD_ID_MAGIC || id != MOD_ID {
        error!("illegal identity PROM: magic {:#06x}, id {}", magic, id);
        return Err(Error::IllegalIdentity { magic, id });
    }
    debug!("identity PROM ok, module id {}", id);
    Ok(())
}

/// Copy as many whole words of the PROM as fit into `buf`, each big-endian.
/// Returns the number of bytes written.
pub fn read_raw<P: Port, D: DelayUs<u32>>(
    link: &mut Microwire<P, D>,
    buf: &mut [u8],
) -> Result<usize, Error> {
    if buf.len() < 2 {
        return Err(Error::UserBufferTooSmall);
    }
    let len = buf.len().min(ID_PROM_SIZE) & !1;
    for (index, chunk) in buf[..len].chunks_exact_mut(2).enumerate() {
        BigEndian::write_u16(chunk, link.read(index as u8));
    }
    Ok(len)
}
