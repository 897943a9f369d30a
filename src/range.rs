//! Measurement ranges and their fixed converter settings.

use core::fmt;

use num_enum::TryFromPrimitive;

use crate::ad7714::{Channel, Gain, Polarity, FULL_SCALE};
use crate::calibration::{PAIRS, RESISTANCE_ENTRIES};
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Range {
    /// DC voltage, 125 mV
    DcV0 = 0,
    /// DC voltage, 1.25 V
    DcV1,
    /// DC voltage, 12.5 V
    DcV2,
    /// DC voltage, 125 V
    DcV3,
    /// DC voltage, 500 V
    DcV4,
    /// AC voltage, 250 mV
    AcV0,
    /// AC voltage, 2.5 V
    AcV1,
    /// AC voltage, 25 V
    AcV2,
    /// AC voltage, 250 V
    AcV3,
    /// DC current, 12.5 mA
    DcA0,
    /// DC current, 125 mA
    DcA1,
    /// DC current, 1.25 A
    DcA2,
    /// DC current, 2.5 A
    DcA3,
    /// AC current, 25 mA
    AcA0,
    /// AC current, 250 mA
    AcA1,
    /// AC current, 2.5 A
    AcA2,
    /// 2-wire resistance, 250 Ω
    R2W0,
    /// 2-wire resistance, 2.5 kΩ
    R2W1,
    /// 2-wire resistance, 25 kΩ
    R2W2,
    /// 2-wire resistance, 250 kΩ
    R2W3,
    /// 2-wire resistance, 2.5 MΩ
    R2W4,
    /// 4-wire resistance, 250 Ω
    R4W0,
    /// 4-wire resistance, 2.5 kΩ
    R4W1,
    /// 4-wire resistance, 25 kΩ
    R4W2,
    /// 4-wire resistance, 250 kΩ
    R4W3,
    /// 4-wire resistance, 2.5 MΩ
    R4W4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    DcVoltage,
    AcVoltage,
    DcCurrent,
    AcCurrent,
    TwoWire,
    FourWire,
}

impl Kind {
    pub fn is_resistance(self) -> bool {
        matches!(self, Kind::TwoWire | Kind::FourWire)
    }

    /// Bipolar conversion, zero in the middle of the code range
    pub fn is_dc(self) -> bool {
        matches!(self, Kind::DcVoltage | Kind::DcCurrent)
    }
}

/// Where a range keeps its calibration values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Index into the zero/full pairs of the voltage and current ranges
    Pair(usize),
    /// Index into the Ux/Im entries of the resistance ranges
    Resistance(usize),
}

#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub kind: Kind,
    /// Configuration register pattern
    pub config: u32,
    pub channel: Channel,
    pub gain: Gain,
    pub polarity: Polarity,
    /// Full scale in V, A or Ω
    pub full_scale: f64,
    pub label: &'static str,
}

const fn dc(kind: Kind, config: u32, full_scale: f64, label: &'static str) -> Settings {
    Settings {
        kind,
        config,
        channel: Channel::Dc,
        gain: Gain::One,
        polarity: Polarity::Bipolar,
        full_scale,
        label,
    }
}

const fn ac(kind: Kind, config: u32, full_scale: f64, label: &'static str) -> Settings {
    Settings {
        kind,
        config,
        channel: Channel::Ac,
        gain: Gain::One,
        polarity: Polarity::Unipolar,
        full_scale,
        label,
    }
}

const fn ohm(
    kind: Kind,
    config: u32,
    gain: Gain,
    full_scale: f64,
    label: &'static str,
) -> Settings {
    Settings {
        kind,
        config,
        channel: Channel::ResistanceVoltage,
        gain,
        polarity: Polarity::Unipolar,
        full_scale,
        label,
    }
}

use Kind::*;

static SETTINGS: [Settings; 26] = [
    dc(DcVoltage, 0x06fa_e600, 125.0e-3, "DC voltage, 125 mV"),
    dc(DcVoltage, 0x06fa_e500, 1.25, "DC voltage, 1.25 V"),
    dc(DcVoltage, 0x02fa_e600, 12.5, "DC voltage, 12.5 V"),
    dc(DcVoltage, 0x02fa_e500, 125.0, "DC voltage, 125 V"),
    dc(DcVoltage, 0x02fa_e500, 500.0, "DC voltage, 500 V"),
    ac(AcVoltage, 0x04fb_f500, 250.0e-3, "AC voltage, 250 mV"),
    ac(AcVoltage, 0x04fb_e600, 2.5, "AC voltage, 2.5 V"),
    ac(AcVoltage, 0x04fb_d600, 25.0, "AC voltage, 25 V"),
    ac(AcVoltage, 0x00fb_b600, 250.0, "AC voltage, 250 V"),
    dc(DcCurrent, 0x287d_e500, 12.5e-3, "DC current, 12.5 mA"),
    dc(DcCurrent, 0x28bd_e500, 125.0e-3, "DC current, 125 mA"),
    dc(DcCurrent, 0x30dd_e500, 1.25, "DC current, 1.25 A"),
    dc(DcCurrent, 0x30ed_e500, 2.5, "DC current, 2.5 A"),
    ac(AcCurrent, 0x0877_e500, 25.0e-3, "AC current, 25 mA"),
    ac(AcCurrent, 0x08b7_e500, 250.0e-3, "AC current, 250 mA"),
    ac(AcCurrent, 0x10d7_e500, 2.5, "AC current, 2.5 A"),
    ohm(TwoWire, 0x4bf9_bd00, Gain::Four, 250.0, "resistance, 2-wire, 250 Ω"),
    ohm(TwoWire, 0x4bf9_bd00, Gain::One, 2.5e3, "resistance, 2-wire, 2.5 kΩ"),
    ohm(TwoWire, 0x4bf9_dd00, Gain::One, 25.0e3, "resistance, 2-wire, 25 kΩ"),
    ohm(TwoWire, 0x4bf9_ed00, Gain::One, 250.0e3, "resistance, 2-wire, 250 kΩ"),
    ohm(TwoWire, 0x4bf9_f500, Gain::One, 2.5e6, "resistance, 2-wire, 2.5 MΩ"),
    ohm(FourWire, 0x43f9_bd00, Gain::Four, 250.0, "resistance, 4-wire, 250 Ω"),
    ohm(FourWire, 0x43f9_bd00, Gain::One, 2.5e3, "resistance, 4-wire, 2.5 kΩ"),
    ohm(FourWire, 0x43f9_dd00, Gain::One, 25.0e3, "resistance, 4-wire, 25 kΩ"),
    ohm(FourWire, 0x43f9_ed00, Gain::One, 250.0e3, "resistance, 4-wire, 250 kΩ"),
    ohm(FourWire, 0x43f9_f500, Gain::One, 2.5e6, "resistance, 4-wire, 2.5 MΩ"),
];

/// Reference voltage across the measured resistor
const U_REF: f64 = 2.5;
/// Protection resistor in series with the current source
const R_PROTECT: f64 = 100.0;
/// Current source series resistor, by resistance decade
const R_SERIES: [f64; 5] = [1.0e3, 1.0e3, 10.0e3, 100.0e3, 1.0e6];

impl Range {
    #[rustfmt::skip]
    pub const ALL: [Range; 26] = [
        Range::DcV0, Range::DcV1, Range::DcV2, Range::DcV3, Range::DcV4,
        Range::AcV0, Range::AcV1, Range::AcV2, Range::AcV3,
        Range::DcA0, Range::DcA1, Range::DcA2, Range::DcA3,
        Range::AcA0, Range::AcA1, Range::AcA2,
        Range::R2W0, Range::R2W1, Range::R2W2, Range::R2W3, Range::R2W4,
        Range::R4W0, Range::R4W1, Range::R4W2, Range::R4W3, Range::R4W4,
    ];

    pub fn from_index(index: u32) -> Result<Self, Error> {
        u8::try_from(index)
            .ok()
            .and_then(|index| Range::try_from(index).ok())
            .ok_or(Error::UnknownRange(index))
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn settings(self) -> &'static Settings {
        &SETTINGS[self as usize]
    }

    pub fn kind(self) -> Kind {
        self.settings().kind
    }

    pub fn is_resistance(self) -> bool {
        self.kind().is_resistance()
    }

    pub fn slot(self) -> Slot {
        let index = self as usize;
        if index < PAIRS {
            Slot::Pair(index)
        } else {
            Slot::Resistance(index - PAIRS)
        }
    }

    /// Position within the five ranges of a resistance kind
    fn decade(self) -> Option<usize> {
        match self.slot() {
            Slot::Resistance(index) => Some(index % (RESISTANCE_ENTRIES / 2)),
            Slot::Pair(_) => None,
        }
    }

    /// Convert a voltage or current sample to V or A
    pub fn value(self, raw: u32) -> Option<f64> {
        let settings = self.settings();
        let fs = settings.full_scale;
        let raw = f64::from(raw);
        let full = f64::from(FULL_SCALE);
        match settings.kind {
            kind if kind.is_resistance() => None,
            kind if kind.is_dc() => Some(fs * 2.0 / full * raw - fs),
            _ => Some(fs / full * raw),
        }
    }

    /// Convert a resistance pair to Ω. `None` without current.
    pub fn resistance(self, ux: u32, im: u32) -> Option<f64> {
        let decade = self.decade()?;
        if im == 0 {
            return None;
        }
        let current = U_REF / (R_SERIES[decade] + R_PROTECT);
        let ohms = (U_REF * f64::from(ux)) / (current * f64::from(im));
        if decade == 0 {
            Some(ohms / 4.0)
        } else {
            Some(ohms)
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.settings().label)
    }
}
