use embedded_hal::digital::v2::{InputPin, OutputPin};

use super::{Lines, Port};
use crate::bus::{Registers, PLD_IF_REG};

const B_DAT: u16 = 0x1;
const B_CLK: u16 = 0x2;
const B_SEL: u16 = 0x4;

/// EEPROM lines behind the module's PLD interface register. Which chip
/// answers is chosen by the control register.
pub struct RegisterPort<B> {
    bus: B,
}

impl<B: Registers> RegisterPort<B> {
    pub fn new(bus: B) -> Self {
        RegisterPort { bus }
    }

    pub fn release(self) -> B {
        self.bus
    }
}

impl<B: Registers> Port for RegisterPort<B> {
    fn drive(&mut self, lines: Lines) {
        let mut value = 0;
        if lines.data {
            value |= B_DAT;
        }
        if lines.clock {
            value |= B_CLK;
        }
        if lines.select {
            value |= B_SEL;
        }
        self.bus.write(PLD_IF_REG, value);
    }

    fn data_in(&mut self) -> bool {
        self.bus.read(PLD_IF_REG) & B_DAT != 0
    }
}

/// EEPROM wired to GPIO pins
pub struct PinPort<CS, CLK, DI, DO> {
    cs: CS,
    clk: CLK,
    di: DI,
    dout: DO,
}

impl<CS: OutputPin, CLK: OutputPin, DI: OutputPin, DO: InputPin> PinPort<CS, CLK, DI, DO> {
    pub fn new(mut cs: CS, mut clk: CLK, mut di: DI, dout: DO) -> Self {
        let _ = cs.set_low();
        let _ = clk.set_low();
        let _ = di.set_low();
        PinPort { cs, clk, di, dout }
    }

    pub fn release(self) -> (CS, CLK, DI, DO) {
        (self.cs, self.clk, self.di, self.dout)
    }
}

fn set<P: OutputPin>(pin: &mut P, high: bool) {
    if high {
        let _ = pin.set_high();
    } else {
        let _ = pin.set_low();
    }
}

impl<CS: OutputPin, CLK: OutputPin, DI: OutputPin, DO: InputPin> Port for PinPort<CS, CLK, DI, DO> {
    fn drive(&mut self, lines: Lines) {
        // data before clock, so the rising edge sees a settled DI
        set(&mut self.di, lines.data);
        set(&mut self.cs, lines.select);
        set(&mut self.clk, lines.clock);
    }

    fn data_in(&mut self) -> bool {
        self.dout.is_high().unwrap_or(false)
    }
}
