//! Driver core for the M76 digital multimeter M-Module.
//!
//! The module carries an AD7714 sigma-delta converter behind a small PLD
//! register file, a 93C46 identity PROM and a user EEPROM holding the
//! per-range calibration table. [`M76`] owns one module instance; everything
//! touching hardware goes through the [`Registers`](bus::Registers) seam and
//! embedded-hal delays.

#![cfg_attr(not(test), no_std)]

pub mod ad7714;
pub mod bus;
pub mod calibration;
pub mod config;
pub mod driver;
pub mod error;
pub mod identity;
pub mod irq;
pub mod microwire;
pub mod range;

#[cfg(test)]
mod sim;

pub use calibration::{CalibrationPoint, CalibrationTable};
pub use config::Config;
pub use driver::M76;
pub use error::Error;
pub use identity::Ident;
pub use irq::{Completion, IrqHandler, IrqSource};
pub use range::Range;
