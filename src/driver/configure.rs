use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use log::{debug, trace};

use super::M76;
use crate::ad7714::{
    self, filter_high, filter_low, mode, FilterHigh, FilterLow, Mode, OperatingMode,
};
use crate::bus::{Registers, CONFIG_REG};
use crate::error::Error;
use crate::range::Range;

impl<'a, B, D> M76<'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Switch to `range`: configuration, filter and mode registers, the
    /// range's calibration values, then the settle delay
    pub fn select_range(&mut self, range: Range) {
        debug!("M76 select range {}", range);
        let settings = range.settings();
        self.state.range = range;
        self.state.config = settings.config;
        self.state.channel = settings.channel;
        self.state.gain = settings.gain;
        self.state.polarity = settings.polarity;
        self.state.mode = OperatingMode::Normal;
        self.program_range();
    }

    /// [`select_range`](Self::select_range) by range number
    pub fn select_range_index(&mut self, index: u32) -> Result<(), Error> {
        let range = Range::from_index(index)?;
        self.select_range(range);
        Ok(())
    }

    pub(super) fn program_range(&mut self) {
        self.write_config_reg();
        self.write_filter_reg();
        self.write_mode_reg();
        self.refresh_registers();
        self.settle();
    }

    /// Filter, mode and calibration registers of the current channel,
    /// then the settle delay
    pub(super) fn program_path(&mut self) {
        self.write_filter_reg();
        self.write_mode_reg();
        self.write_cali_reg();
        self.settle();
    }

    pub(super) fn write_config_reg(&mut self) {
        trace!("M76 config {:#010x}", self.state.config);
        self.bus.write_u32(CONFIG_REG, self.state.config);
    }

    pub(super) fn write_filter_reg(&mut self) {
        let channel = self.state.channel;
        let high = filter_high::Data::new(self.state.polarity, self.state.filter);
        let low = filter_low::Data::new(self.state.filter);
        ad7714::write_reg(&mut self.bus, channel, &FilterHigh, &high);
        ad7714::write_reg(&mut self.bus, channel, &FilterLow, &low);
    }

    pub(super) fn write_mode_reg(&mut self) {
        let data = mode::Data::new(self.state.mode, self.state.gain);
        ad7714::write_reg(&mut self.bus, self.state.channel, &Mode, &data);
    }

    pub(super) fn settle(&mut self) {
        self.delay.delay_ms(self.state.settle_time_ms);
    }
}
