use embedded_hal::blocking::delay::DelayUs;
use log::{debug, warn};

use super::{CalibrationTable, CHECKSUM_INDEX, MAGIC, MAGIC_INDEX, WORDS};
use crate::error::Error;
use crate::microwire::{Microwire, Port, WriteError};

/// Erase/write cycles attempted per word before giving up
pub const WRITE_ATTEMPTS: u32 = 10;

/// Calibration table persisted in the user EEPROM
pub struct CalibrationStore<'d, P, D> {
    link: Microwire<'d, P, D>,
}

impl<'d, P: Port, D: DelayUs<u32>> CalibrationStore<'d, P, D> {
    pub fn new(link: Microwire<'d, P, D>) -> Self {
        CalibrationStore { link }
    }

    pub fn has_magic(&mut self) -> bool {
        self.link.read(MAGIC_INDEX) == MAGIC
    }

    /// Blank a user EEPROM that was never set up: every table word and the
    /// checksum become `0xFFFF`, then the magic is written. Returns whether
    /// anything had to be done.
    pub fn initialize(&mut self) -> Result<bool, Error> {
        if self.has_magic() {
            return Ok(false);
        }
        warn!("user EEPROM has no magic, erasing calibration");
        for index in 0..=CHECKSUM_INDEX {
            self.write_word(index, 0xffff)?;
        }
        self.write_word(MAGIC_INDEX, MAGIC)?;
        Ok(true)
    }

    /// Returns the table and whether its checksum matched
    pub fn load(&mut self) -> (CalibrationTable, bool) {
        let link = &mut self.link;
        let table = CalibrationTable::from_words((0..WORDS as u8).map(|index| link.read(index)));
        let stored = self.link.read(CHECKSUM_INDEX);
        let valid = stored == table.checksum();
        if valid {
            debug!("calibration loaded, checksum {:#06x}", stored);
        } else {
            warn!(
                "calibration checksum mismatch: stored {:#06x}, computed {:#06x}",
                stored,
                table.checksum()
            );
        }
        (table, valid)
    }

    pub fn store(&mut self, table: &CalibrationTable) -> Result<(), Error> {
        for (index, word) in table.words().enumerate() {
            self.write_word(index as u8, word)?;
        }
        self.write_word(CHECKSUM_INDEX, table.checksum())?;
        debug!("calibration stored, checksum {:#06x}", table.checksum());
        Ok(())
    }

    /// Erase the magic word, so the next initialization blanks the whole
    /// table
    pub fn erase_magic(&mut self) -> Result<(), Error> {
        self.write_word(MAGIC_INDEX, 0xffff)
    }

    /// Retry missed handshakes. A word that does not read back is final.
    fn write_word(&mut self, index: u8, word: u16) -> Result<(), Error> {
        let mut last = WriteError::EraseFailed;
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.link.write(index, word) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() => {
                    debug!("EEPROM word {:#04x}: {} (attempt {})", index, e, attempt);
                    last = e;
                }
                Err(e) => {
                    warn!("EEPROM word {:#04x}: {}", index, e);
                    return Err(e.into());
                }
            }
        }
        warn!("EEPROM word {:#04x}: {} after {} attempts", index, last, WRITE_ATTEMPTS);
        Err(last.into())
    }
}
