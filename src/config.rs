use crate::ad7714::{FILTER_MAX, FILTER_MIN};
use crate::error::Error;
use crate::range::Range;

/// Initialization options of an [`M76`](crate::M76)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Verify the identity PROM before touching anything else
    pub id_check: bool,
    /// Wait after any range, channel or filter change
    pub settle_time_ms: u32,
    /// AD7714 filter word
    pub filter: u16,
    /// Wait for transfers on the module interrupt instead of polling
    pub irq_enabled: bool,
    /// Range programmed at initialization
    pub range: Range,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            id_check: true,
            settle_time_ms: 700,
            filter: FILTER_MAX,
            irq_enabled: false,
            range: Range::AcV3,
        }
    }
}

impl Config {
    pub fn with_id_check(mut self, id_check: bool) -> Self {
        self.id_check = id_check;
        self
    }

    pub fn with_settle_time_ms(mut self, settle_time_ms: u32) -> Self {
        self.settle_time_ms = settle_time_ms;
        self
    }

    pub fn with_filter(mut self, filter: u16) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_irq_enabled(mut self, irq_enabled: bool) -> Self {
        self.irq_enabled = irq_enabled;
        self
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(FILTER_MIN..=FILTER_MAX).contains(&self.filter) {
            return Err(Error::IllegalParameter);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.id_check);
        assert_eq!(config.settle_time_ms, 700);
        assert_eq!(config.filter, 1920);
        assert!(!config.irq_enabled);
        assert_eq!(config.range, Range::AcV3);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn filter_bounds() {
        assert_eq!(Config::default().with_filter(20).validate(), Ok(()));
        assert_eq!(Config::default().with_filter(19).validate(), Err(Error::IllegalParameter));
        assert_eq!(Config::default().with_filter(1921).validate(), Err(Error::IllegalParameter));
    }
}
