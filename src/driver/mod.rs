//! The M76 device instance.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use log::{debug, info, warn};

use crate::ad7714::{Channel, Gain, OperatingMode, Polarity, FILTER_MAX, FILTER_MIN};
use crate::bus::{Registers, ACCESS_REG, CTRL_IDPROM_SEL, CTRL_REG, CTRL_UEPROM_SEL};
use crate::calibration::{CalibrationStore, CalibrationTable, MAGIC};
use crate::config::Config;
use crate::error::Error;
use crate::identity::{self, Ident};
use crate::irq::Completion;
use crate::microwire::{self, Microwire, RegisterPort};
use crate::range::Range;

mod acquire;
mod calibrate;
mod configure;

/// Polled transfer: iterations of `POLL_INTERVAL_MS`
pub const POLL_LIMIT: u32 = 200;
pub const POLL_INTERVAL_MS: u32 = 10;
/// Interrupt-driven transfer
pub const IRQ_TIMEOUT_MS: u32 = 2000;

/// Register fields and flags of the instance
#[derive(Clone, Copy, Debug)]
struct State {
    range: Range,
    config: u32,
    channel: Channel,
    gain: Gain,
    mode: OperatingMode,
    polarity: Polarity,
    filter: u16,
    settle_time_ms: u32,
    permit_measurement: bool,
    checksum_valid: bool,
    calibration_valid: bool,
    irq_enabled: bool,
}

impl State {
    fn new(config: &Config) -> Self {
        let settings = config.range.settings();
        State {
            range: config.range,
            config: settings.config,
            channel: settings.channel,
            gain: settings.gain,
            mode: OperatingMode::Normal,
            polarity: settings.polarity,
            filter: config.filter,
            settle_time_ms: config.settle_time_ms,
            permit_measurement: false,
            checksum_valid: false,
            calibration_valid: false,
            irq_enabled: config.irq_enabled,
        }
    }
}

pub struct M76<'a, B, D> {
    bus: B,
    delay: D,
    completion: &'a Completion,
    state: State,
    table: CalibrationTable,
    id_check: bool,
}

/// Run `f` against the user EEPROM, then hand the serial bus back to the
/// identity PROM
fn with_user_eeprom<B, D, T, F>(bus: &mut B, delay: &mut D, f: F) -> T
where
    B: Registers,
    D: DelayUs<u32>,
    F: FnOnce(&mut CalibrationStore<'_, RegisterPort<&mut B>, D>) -> T,
{
    bus.write(CTRL_REG, CTRL_UEPROM_SEL);
    let result = {
        let link = Microwire::user_eeprom(RegisterPort::new(&mut *bus), delay);
        let mut store = CalibrationStore::new(link);
        f(&mut store)
    };
    bus.write(CTRL_REG, CTRL_IDPROM_SEL);
    result
}

impl<'a, B, D> M76<'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    pub const IDENT: &'static str = concat!("M76 driver ", env!("CARGO_PKG_VERSION"));

    /// Check the module, load the calibration and program the initial range.
    ///
    /// A bad calibration checksum is not fatal: the instance comes up with
    /// measurements disabled until permitted explicitly or a new table is
    /// stored.
    pub fn new(
        mut bus: B,
        mut delay: D,
        completion: &'a Completion,
        config: Config,
    ) -> Result<Self, Error> {
        config.validate()?;
        bus.write(CTRL_REG, CTRL_IDPROM_SEL);
        if config.id_check {
            identity::check(&mut identity::id_prom(RegisterPort::new(&mut bus), &mut delay))?;
        }

        let (table, checksum_valid) = with_user_eeprom(&mut bus, &mut delay, |store| {
            store.initialize()?;
            Ok::<_, Error>(store.load())
        })?;
        if !checksum_valid {
            warn!("M76 measurements disabled until permitted or recalibrated");
        }

        completion.clear();
        let mut state = State::new(&config);
        state.checksum_valid = checksum_valid;
        state.permit_measurement = checksum_valid;
        let mut dev = M76 { bus, delay, completion, state, table, id_check: config.id_check };
        dev.program_range();
        info!("M76 ready, range {}", dev.state.range);
        Ok(dev)
    }

    /// Disarm the module and hand back the bus and delay
    pub fn release(mut self) -> (B, D) {
        self.bus.write(ACCESS_REG, 0);
        debug!("M76 released");
        (self.bus, self.delay)
    }

    pub fn range(&self) -> Range {
        self.state.range
    }

    pub fn id_check(&self) -> bool {
        self.id_check
    }

    pub fn settle_time_ms(&self) -> u32 {
        self.state.settle_time_ms
    }

    pub fn set_settle_time_ms(&mut self, settle_time_ms: i32) -> Result<(), Error> {
        let settle_time_ms = u32::try_from(settle_time_ms).map_err(|_| Error::IllegalParameter)?;
        self.state.settle_time_ms = settle_time_ms;
        Ok(())
    }

    pub fn filter(&self) -> u16 {
        self.state.filter
    }

    /// Rewrites the filter registers and waits the settle time
    pub fn set_filter(&mut self, filter: u32) -> Result<(), Error> {
        let filter = u16::try_from(filter)
            .ok()
            .filter(|filter| (FILTER_MIN..=FILTER_MAX).contains(filter))
            .ok_or(Error::IllegalParameter)?;
        self.state.filter = filter;
        self.write_filter_reg();
        self.settle();
        Ok(())
    }

    pub fn permit_measurement(&self) -> bool {
        self.state.permit_measurement
    }

    /// Allow measurements despite a bad calibration checksum
    pub fn set_permit_measurement(&mut self, permit: bool) {
        if permit && !self.state.checksum_valid {
            warn!("M76 measuring with unverified calibration");
        }
        self.state.permit_measurement = permit;
    }

    pub fn checksum_valid(&self) -> bool {
        self.state.checksum_valid
    }

    /// The current range has usable calibration values
    pub fn calibration_valid(&self) -> bool {
        self.state.calibration_valid
    }

    pub fn irq_enabled(&self) -> bool {
        self.state.irq_enabled
    }

    pub fn set_irq_enabled(&mut self, irq_enabled: bool) {
        self.state.irq_enabled = irq_enabled;
    }

    pub fn irq_count(&self) -> u32 {
        self.completion.count()
    }

    pub fn set_irq_count(&mut self, count: u32) {
        self.completion.set_count(count);
    }

    pub fn calibration_table(&self) -> &CalibrationTable {
        &self.table
    }

    /// Persist the calibration table. `confirm` must be the magic word.
    pub fn store_calibration(&mut self, confirm: u16) -> Result<(), Error> {
        if confirm != MAGIC {
            return Err(Error::IllegalParameter);
        }
        let table = &self.table;
        with_user_eeprom(&mut self.bus, &mut self.delay, |store| store.store(table))?;
        self.state.checksum_valid = true;
        self.state.permit_measurement = true;
        info!("M76 calibration stored");
        Ok(())
    }

    /// Invalidate the user EEPROM, so the next initialization starts from an
    /// empty table. `confirm` must be the magic word.
    pub fn erase_magic(&mut self, confirm: u16) -> Result<(), Error> {
        if confirm != MAGIC {
            return Err(Error::IllegalParameter);
        }
        with_user_eeprom(&mut self.bus, &mut self.delay, |store| store.erase_magic())?;
        info!("M76 calibration magic erased");
        Ok(())
    }

    /// Raw identity PROM contents, see [`identity::read_raw`]
    pub fn identity_prom(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut prom = identity::id_prom(RegisterPort::new(&mut self.bus), &mut self.delay);
        identity::read_raw(&mut prom, buf)
    }

    /// The module is input only
    pub fn write(&mut self, _value: u32) -> Result<(), Error> {
        Err(Error::IllegalFunction)
    }

    /// Revisions of the driver and of the serial EEPROM layer
    pub fn idents(&self) -> [&'static str; 2] {
        [Self::IDENT, microwire::IDENT]
    }
}

impl<'a, B, D> Ident for M76<'a, B, D>
where
    B: Registers,
    D: DelayMs<u32> + DelayUs<u32>,
{
    fn identify(&self) -> &'static str {
        Self::IDENT
    }
}
