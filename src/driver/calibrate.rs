use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use log::{debug, trace, warn};

use super::acquire::CurrentPath;
use super::M76;
use crate::ad7714::{
    self, full_scale, zero_scale, Channel, Data, FullScale, OperatingMode, ZeroScale,
};
use crate::bus::Registers;
use crate::calibration::{CaliPair, CalibrationPoint};
use crate::error::Error;

impl<'a, B, D> M76<'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Run a system calibration for `point` of the current range and return
    /// the measured calibration word. The table is left alone.
    pub fn calibrate(&mut self, point: CalibrationPoint) -> Result<u32, Error> {
        self.check_point(point)?;
        debug!("M76 calibrate {:?} on {}", point, self.state.range);
        let mode = if point.is_zero_scale() {
            OperatingMode::ZeroScale
        } else {
            OperatingMode::FullScale
        };
        let value = if point.is_current_path() {
            let mut current = CurrentPath::enter(self);
            current.self_calibrate(mode)?
        } else {
            self.self_calibrate(mode)?
        };
        debug!("M76 calibration word {:#010x}", value);
        Ok(value)
    }

    /// Calibrate `point` and keep the result in the table
    pub fn calibrate_and_store(&mut self, point: CalibrationPoint) -> Result<u32, Error> {
        let value = self.calibrate(point)?;
        self.store_value(point, value)?;
        Ok(value)
    }

    /// Put an externally determined calibration word into the table and
    /// the converter
    pub fn store_value(&mut self, point: CalibrationPoint, value: u32) -> Result<(), Error> {
        self.check_point(point)?;
        self.table.set(self.state.range, point, value)?;
        self.refresh_registers();
        Ok(())
    }

    /// Load the current range's calibration words into the converter.
    /// Returns whether all of them are usable.
    pub fn refresh_registers(&mut self) -> bool {
        let valid = if self.state.range.is_resistance() {
            self.state.channel = Channel::ResistanceCurrent;
            let im = self.write_cali_reg();
            self.state.channel = Channel::ResistanceVoltage;
            let ux = self.write_cali_reg();
            im && ux
        } else {
            self.write_cali_reg()
        };
        if !valid {
            warn!("M76 range {} is not calibrated", self.state.range);
        }
        self.state.calibration_valid = valid;
        valid
    }

    /// Calibration words of the current range and channel into the
    /// converter
    pub(super) fn write_cali_reg(&mut self) -> bool {
        let range = self.state.range;
        let pair = match (self.table.resistance_pair(range), self.state.channel) {
            (Some(entry), Channel::ResistanceCurrent) => entry.im,
            (Some(entry), _) => entry.ux,
            (None, _) => self.table.pair(range).copied().unwrap_or(CaliPair::UNCALIBRATED),
        };
        trace!("M76 calibration {:?}: {:#010x} {:#010x}", self.state.channel, pair.zero, pair.full);
        let channel = self.state.channel;
        ad7714::write_reg(&mut self.bus, channel, &ZeroScale, &zero_scale::Data(pair.zero));
        ad7714::write_reg(&mut self.bus, channel, &FullScale, &full_scale::Data(pair.full));
        pair.is_valid()
    }

    fn check_point(&self, point: CalibrationPoint) -> Result<(), Error> {
        if point.is_resistance() != self.state.range.is_resistance() {
            return Err(Error::IllegalParameter);
        }
        Ok(())
    }

    fn self_calibrate(&mut self, mode: OperatingMode) -> Result<u32, Error> {
        self.state.mode = mode;
        self.write_mode_reg();
        // the converter returns to normal mode by itself
        self.state.mode = OperatingMode::Normal;
        self.delay.delay_ms(1);
        self.read_register(&Data)?;
        match mode {
            OperatingMode::ZeroScale => self.read_register(&ZeroScale),
            _ => self.read_register(&FullScale),
        }
    }
}
