//! Completion of interrupt-driven transfers.
//!
//! The driver arms a transfer and waits on a [`Completion`]; the
//! platform's interrupt service routine calls [`IrqHandler::handle`], which
//! acknowledges the module and signals the waiter.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embedded_hal::blocking::delay::DelayMs;
use log::trace;

use crate::bus::{Registers, ACCESS_REG, STATUS_IRQ_PEND, STATUS_REG};

/// Binary ready signal plus a count of handled interrupts
pub struct Completion {
    ready: AtomicBool,
    count: AtomicU32,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub const fn new() -> Self {
        Completion { ready: AtomicBool::new(false), count: AtomicU32::new(0) }
    }

    pub fn signal(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Drop a signal nobody waited for
    pub fn clear(&self) {
        self.ready.store(false, Ordering::Release);
    }

    // Load then store: thumbv6 has no compare-and-swap, and only the waiter
    // clears the flag
    fn take(&self) -> bool {
        if self.ready.load(Ordering::Acquire) {
            self.ready.store(false, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Wait up to `timeout_ms` for a signal, consuming it
    pub fn wait<D: DelayMs<u32>>(&self, delay: &mut D, timeout_ms: u32) -> bool {
        for _ in 0..timeout_ms {
            if self.take() {
                return true;
            }
            delay.delay_ms(1);
        }
        self.take()
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn set_count(&self, count: u32) {
        self.count.store(count, Ordering::Relaxed);
    }

    // Only the interrupt handler increments, no read-modify-write needed
    fn increment(&self) {
        self.count.store(self.count().wrapping_add(1), Ordering::Relaxed);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqSource {
    /// The module raised the interrupt and has been acknowledged
    Device,
    /// Not ours, nothing touched
    NotDevice,
}

/// Interrupt service for one module. Holds its own handle to the
/// register file, the acquisition side keeps the other.
pub struct IrqHandler<'a, B> {
    bus: B,
    completion: &'a Completion,
}

impl<'a, B: Registers> IrqHandler<'a, B> {
    pub fn new(bus: B, completion: &'a Completion) -> Self {
        IrqHandler { bus, completion }
    }

    pub fn handle(&mut self) -> IrqSource {
        if self.bus.read(STATUS_REG) & STATUS_IRQ_PEND == 0 {
            return IrqSource::NotDevice;
        }
        // disarm transfer and interrupt
        self.bus.write(ACCESS_REG, 0);
        self.completion.signal();
        self.completion.increment();
        trace!("M76 interrupt #{}", self.completion.count());
        IrqSource::Device
    }
}
