//! Calibration constants of all measurement ranges.
//!
//! The table is kept in the user EEPROM as 72 consecutive 32-bit values
//! (low word first), followed by an XOR checksum over those 144 words and
//! the magic word `0x3730`.

use num_enum::TryFromPrimitive;

use crate::error::Error;
use crate::range::{Range, Slot};

mod store;
pub use store::{CalibrationStore, WRITE_ATTEMPTS};

/// Number of 32-bit values in the table
pub const VALUES: usize = PAIRS * 2 + RESISTANCE_ENTRIES * 4;
/// Number of 16-bit EEPROM words the values occupy
pub const WORDS: usize = VALUES * 2;
pub const CHECKSUM_INDEX: u8 = WORDS as u8;
pub const MAGIC_INDEX: u8 = CHECKSUM_INDEX + 1;
/// Marks an initialized user EEPROM. Also the confirmation value the host
/// passes to persist or discard the calibration.
pub const MAGIC: u16 = 0x3730;

/// DC voltage (5), AC voltage (4), DC current (4), AC current (3)
pub const PAIRS: usize = 16;
/// 2-wire (5) and 4-wire (5) resistance
pub const RESISTANCE_ENTRIES: usize = 10;

/// Value of an erased, never calibrated slot
pub const UNCALIBRATED: u32 = 0xffff_ffff;

/// A calibration value with either 16-bit half erased is not usable
pub fn is_erased(value: u32) -> bool {
    value & 0xffff == 0xffff || value >> 16 == 0xffff
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum CalibrationPoint {
    Zero = 0,
    Full = 1,
    /// Voltage path, shorted input
    UxZero = 2,
    /// Current path, shorted input
    ImFull = 3,
    /// Current path, open input
    ImZero = 4,
    /// Voltage path, open input
    UxFull = 5,
}

impl CalibrationPoint {
    pub fn from_index(index: u32) -> Result<Self, Error> {
        u8::try_from(index)
            .ok()
            .and_then(|index| CalibrationPoint::try_from(index).ok())
            .ok_or(Error::UnknownPoint(index))
    }

    /// The point belongs to a resistance range
    pub fn is_resistance(self) -> bool {
        !matches!(self, CalibrationPoint::Zero | CalibrationPoint::Full)
    }

    /// The point is measured on the current path
    pub fn is_current_path(self) -> bool {
        matches!(self, CalibrationPoint::ImFull | CalibrationPoint::ImZero)
    }

    pub fn is_zero_scale(self) -> bool {
        matches!(
            self,
            CalibrationPoint::Zero | CalibrationPoint::UxZero | CalibrationPoint::ImZero
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaliPair {
    pub zero: u32,
    pub full: u32,
}

impl CaliPair {
    pub const UNCALIBRATED: CaliPair = CaliPair { zero: UNCALIBRATED, full: UNCALIBRATED };

    pub fn is_valid(&self) -> bool {
        !is_erased(self.zero) && !is_erased(self.full)
    }
}

/// Voltage and current path calibration of a resistance range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResistancePair {
    pub ux: CaliPair,
    pub im: CaliPair,
}

impl ResistancePair {
    pub const UNCALIBRATED: ResistancePair =
        ResistancePair { ux: CaliPair::UNCALIBRATED, im: CaliPair::UNCALIBRATED };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibrationTable {
    pub pairs: [CaliPair; PAIRS],
    pub resistance: [ResistancePair; RESISTANCE_ENTRIES],
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::uncalibrated()
    }
}

impl CalibrationTable {
    pub const fn uncalibrated() -> Self {
        CalibrationTable {
            pairs: [CaliPair::UNCALIBRATED; PAIRS],
            resistance: [ResistancePair::UNCALIBRATED; RESISTANCE_ENTRIES],
        }
    }

    /// Value number `n` in EEPROM order. A resistance entry is laid out
    /// as Ux zero, Im full, Im zero, Ux full.
    pub fn value(&self, n: usize) -> u32 {
        if n < PAIRS * 2 {
            let pair = &self.pairs[n / 2];
            if n % 2 == 0 { pair.zero } else { pair.full }
        } else {
            let entry = &self.resistance[(n - PAIRS * 2) / 4];
            match n % 4 {
                0 => entry.ux.zero,
                1 => entry.im.full,
                2 => entry.im.zero,
                _ => entry.ux.full,
            }
        }
    }

    fn value_mut(&mut self, n: usize) -> &mut u32 {
        if n < PAIRS * 2 {
            let pair = &mut self.pairs[n / 2];
            if n % 2 == 0 { &mut pair.zero } else { &mut pair.full }
        } else {
            let entry = &mut self.resistance[(n - PAIRS * 2) / 4];
            match n % 4 {
                0 => &mut entry.ux.zero,
                1 => &mut entry.im.full,
                2 => &mut entry.im.zero,
                _ => &mut entry.ux.full,
            }
        }
    }

    /// EEPROM image, without checksum and magic
    pub fn words(&self) -> impl Iterator<Item = u16> + '_ {
        (0..VALUES).flat_map(move |n| {
            let value = self.value(n);
            [value as u16, (value >> 16) as u16]
        })
    }

    /// Rebuild from an EEPROM image. Missing words read as erased.
    pub fn from_words<I: IntoIterator<Item = u16>>(words: I) -> Self {
        let mut table = Self::uncalibrated();
        let mut words = words.into_iter();
        for n in 0..VALUES {
            let low = u32::from(words.next().unwrap_or(0xffff));
            let high = u32::from(words.next().unwrap_or(0xffff));
            *table.value_mut(n) = (high << 16) | low;
        }
        table
    }

    pub fn checksum(&self) -> u16 {
        self.words().fold(0, |sum, word| sum ^ word)
    }

    pub fn pair(&self, range: Range) -> Option<&CaliPair> {
        match range.slot() {
            Slot::Pair(index) => self.pairs.get(index),
            Slot::Resistance(_) => None,
        }
    }

    pub fn resistance_pair(&self, range: Range) -> Option<&ResistancePair> {
        match range.slot() {
            Slot::Resistance(index) => self.resistance.get(index),
            Slot::Pair(_) => None,
        }
    }

    /// Position of `point` of `range` in EEPROM order
    fn position(range: Range, point: CalibrationPoint) -> Result<usize, Error> {
        match range.slot() {
            Slot::Pair(index) if !point.is_resistance() => Ok(index * 2 + point as usize),
            Slot::Resistance(index) if point.is_resistance() => {
                Ok(PAIRS * 2 + index * 4 + point as usize - CalibrationPoint::UxZero as usize)
            }
            _ => Err(Error::IllegalParameter),
        }
    }

    pub fn get(&self, range: Range, point: CalibrationPoint) -> Result<u32, Error> {
        Self::position(range, point).map(|n| self.value(n))
    }

    /// Store one point. Rejects points that do not belong to `range` and
    /// values with an erased half.
    pub fn set(&mut self, range: Range, point: CalibrationPoint, value: u32) -> Result<(), Error> {
        if is_erased(value) {
            return Err(Error::IllegalParameter);
        }
        *self.value_mut(Self::position(range, point)?) = value;
        Ok(())
    }
}
