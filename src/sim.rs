//! Board model for tests: the module register file with the AD7714 behind
//! the communication register, and both Microwire chips behind the PLD
//! interface register.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::bus::*;
use crate::calibration::{
    CaliPair, CalibrationTable, ResistancePair, CHECKSUM_INDEX, MAGIC, MAGIC_INDEX,
};
use crate::identity::{MOD_ID, MOD_ID_MAGIC};
use crate::microwire::{Lines, Port};

/// Rising clock edges a chip stays busy after an erase or write
const BUSY_CLOCKS: u32 = 3;

#[derive(Clone, Copy, Debug)]
enum ChipState {
    Idle,
    Command { code: u16, count: u8 },
    ReadOut { word: u16, remaining: u8 },
    WriteIn { address: usize, data: u16, count: u8 },
    Done,
}

#[derive(Clone, Copy, Debug)]
enum Cycle {
    Erase(usize),
    Write(usize, u16),
}

/// Microwire EEPROM at the pin level
pub struct MicrowireChip {
    pub words: Vec<u16>,
    pub erase_cycles: u32,
    pub write_cycles: u32,
    /// Number of upcoming erase cycles that never finish
    pub erase_failures: u32,
    /// Number of upcoming write cycles that never finish
    pub write_failures: u32,
    /// Bits that cannot be programmed to one
    pub stuck_low: u16,
    address_bits: u8,
    write_enabled: bool,
    state: ChipState,
    pending: Option<Cycle>,
    busy: u32,
    stuck: bool,
    lines: Lines,
    dout: bool,
}

impl MicrowireChip {
    pub fn new(address_bits: u8, size: usize) -> Self {
        MicrowireChip {
            words: vec![0xffff; size],
            erase_cycles: 0,
            write_cycles: 0,
            erase_failures: 0,
            write_failures: 0,
            stuck_low: 0,
            address_bits,
            write_enabled: false,
            state: ChipState::Idle,
            pending: None,
            busy: 0,
            stuck: false,
            lines: Lines::IDLE,
            dout: true,
        }
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    pub fn data_out(&self) -> bool {
        self.dout
    }

    pub fn drive(&mut self, lines: Lines) {
        let last = self.lines;
        self.lines = lines;
        if last.select && !lines.select {
            self.deselected();
        } else if !last.select && lines.select {
            self.state = ChipState::Idle;
        } else if lines.select && !last.clock && lines.clock {
            self.rising_edge(lines.data);
        }
    }

    fn deselected(&mut self) {
        self.state = ChipState::Idle;
        match self.pending.take() {
            Some(Cycle::Erase(address)) => {
                self.erase_cycles += 1;
                if self.erase_failures > 0 {
                    self.erase_failures -= 1;
                    self.stuck = true;
                } else if let Some(word) = self.words.get_mut(address) {
                    *word = 0xffff;
                }
                self.busy = BUSY_CLOCKS;
            }
            Some(Cycle::Write(address, data)) => {
                self.write_cycles += 1;
                if self.write_failures > 0 {
                    self.write_failures -= 1;
                    self.stuck = true;
                } else if let Some(word) = self.words.get_mut(address) {
                    *word &= data & !self.stuck_low;
                }
                self.busy = BUSY_CLOCKS;
            }
            None => {
                self.busy = 0;
                self.stuck = false;
            }
        }
    }

    fn rising_edge(&mut self, bit: bool) {
        match self.state {
            ChipState::Idle => {
                if self.stuck {
                    self.dout = false;
                } else if self.busy > 0 {
                    self.busy -= 1;
                    self.dout = self.busy == 0;
                } else {
                    self.dout = true;
                    if bit {
                        self.state = ChipState::Command { code: 0, count: 0 };
                    }
                }
            }
            ChipState::Command { code, count } => {
                let code = (code << 1) | u16::from(bit);
                let count = count + 1;
                if count < self.address_bits + 2 {
                    self.state = ChipState::Command { code, count };
                    return;
                }
                let address = usize::from(code & ((1 << self.address_bits) - 1));
                self.state = ChipState::Done;
                match code >> self.address_bits {
                    0b10 => {
                        // dummy zero
                        self.dout = false;
                        let word = self.words.get(address).copied().unwrap_or(0xffff);
                        self.state = ChipState::ReadOut { word, remaining: 16 };
                    }
                    0b01 => self.state = ChipState::WriteIn { address, data: 0, count: 0 },
                    0b11 => {
                        if self.write_enabled {
                            self.pending = Some(Cycle::Erase(address));
                        }
                    }
                    _ => match address >> (self.address_bits - 2) {
                        0b11 => self.write_enabled = true,
                        0b00 => self.write_enabled = false,
                        _ => {}
                    },
                }
            }
            ChipState::ReadOut { word, remaining } => {
                if remaining > 0 {
                    self.dout = (word >> (remaining - 1)) & 1 != 0;
                    self.state = ChipState::ReadOut { word, remaining: remaining - 1 };
                } else {
                    self.dout = false;
                }
            }
            ChipState::WriteIn { address, data, count } => {
                let data = (data << 1) | u16::from(bit);
                if count + 1 < 16 {
                    self.state = ChipState::WriteIn { address, data, count: count + 1 };
                } else {
                    if self.write_enabled {
                        self.pending = Some(Cycle::Write(address, data));
                    }
                    self.state = ChipState::Done;
                }
            }
            ChipState::Done => {}
        }
    }
}

impl Port for MicrowireChip {
    fn drive(&mut self, lines: Lines) {
        MicrowireChip::drive(self, lines)
    }

    fn data_in(&mut self) -> bool {
        self.dout
    }
}

#[derive(Clone, Copy, Debug)]
enum ComState {
    Idle,
    Byte { select: u8, channel: usize },
    Word { select: u8, channel: usize, high: Option<u16> },
}

pub struct Inner {
    pub ctrl: u16,
    pub id_prom: MicrowireChip,
    pub user_eeprom: MicrowireChip,
    pub config: u32,
    config_high: u16,
    com: ComState,
    pub mode: [u8; 8],
    pub filter_high: [u8; 8],
    pub filter_low: [u8; 8],
    /// AD7714 calibration registers, per channel
    pub zero: [u32; 8],
    pub full: [u32; 8],
    /// Sample the converter reports on each channel
    pub level: [u32; 8],
    /// What a system calibration on each channel measures
    pub measured_zero: [u32; 8],
    pub measured_full: [u32; 8],
    /// Never signal transfer ready
    pub stall: bool,
    /// Stop signalling transfer ready after this many transfers
    pub stall_after: Option<u32>,
    pending_read: Option<(u8, usize)>,
    latch: u32,
    pub status: u16,
    pub transfers: u32,
    /// Every register write except the EEPROM lines
    pub writes: Vec<(u8, u16)>,
    pub last_pld: Option<u16>,
}

impl Inner {
    fn com_write(&mut self, value: u16) {
        let byte = value as u8;
        match self.com {
            ComState::Idle => {
                let select = (byte >> 4) & 0x7;
                let channel = usize::from(byte & 0x7);
                if byte & 0x8 != 0 {
                    self.pending_read = Some((select, channel));
                } else {
                    self.com = match select {
                        1..=3 => ComState::Byte { select, channel },
                        6 | 7 => ComState::Word { select, channel, high: None },
                        _ => ComState::Idle,
                    };
                }
            }
            ComState::Byte { select, channel } => {
                match select {
                    1 => {
                        self.mode[channel] = byte;
                        match byte >> 5 {
                            0b010 => self.zero[channel] = self.measured_zero[channel],
                            0b011 => self.full[channel] = self.measured_full[channel],
                            _ => {}
                        }
                    }
                    2 => self.filter_high[channel] = byte,
                    _ => self.filter_low[channel] = byte,
                }
                self.com = ComState::Idle;
            }
            ComState::Word { .. } => self.com = ComState::Idle,
        }
    }

    fn data_write(&mut self, offset: u8, value: u16) {
        match (self.com, offset) {
            (ComState::Word { select, channel, high: None }, DATA_REG) => {
                self.com = ComState::Word { select, channel, high: Some(value) };
            }
            (ComState::Word { select, channel, high: Some(high) }, _) => {
                let word = (u32::from(high) << 16) | u32::from(value);
                if select == 6 {
                    self.zero[channel] = word;
                } else {
                    self.full[channel] = word;
                }
                self.com = ComState::Idle;
            }
            _ => {}
        }
    }

    fn access_write(&mut self, value: u16) {
        if value & ACCESS_TR24R == 0 {
            self.status &= !STATUS_IRQ_PEND;
            return;
        }
        self.status = 0;
        self.transfers += 1;
        if self.stall || self.stall_after.map_or(false, |n| self.transfers > n) {
            return;
        }
        self.latch = match self.pending_read.take() {
            Some((5, channel)) => self.level[channel] << 8,
            Some((6, channel)) => self.zero[channel],
            Some((7, channel)) => self.full[channel],
            _ => 0,
        };
        self.status |= STATUS_TRDYR;
        if value & ACCESS_IRQ != 0 {
            self.status |= STATUS_IRQ_PEND;
        }
    }

    fn selected_chip(&mut self) -> Option<&mut MicrowireChip> {
        match self.ctrl {
            CTRL_IDPROM_SEL => Some(&mut self.id_prom),
            CTRL_UEPROM_SEL => Some(&mut self.user_eeprom),
            _ => None,
        }
    }

    /// Writes to `offset` in order
    pub fn writes_to(&self, offset: u8) -> Vec<u16> {
        self.writes.iter().filter(|(o, _)| *o == offset).map(|(_, v)| *v).collect()
    }
}

#[derive(Clone)]
pub struct Board(Rc<RefCell<Inner>>);

impl Board {
    /// Genuine identity PROM, blank user EEPROM
    pub fn new() -> Self {
        let mut id_prom = MicrowireChip::new(6, 64);
        id_prom.words[0] = MOD_ID_MAGIC;
        id_prom.words[1] = MOD_ID;
        id_prom.words[2] = 0x0102;
        let mut measured_zero = [0; 8];
        let mut measured_full = [0; 8];
        for channel in 0..8 {
            measured_zero[channel] = 0x0012_3400 | channel as u32;
            measured_full[channel] = 0x00ab_cd00 | channel as u32;
        }
        Board(Rc::new(RefCell::new(Inner {
            ctrl: 0,
            id_prom,
            user_eeprom: MicrowireChip::new(8, 256),
            config: 0,
            config_high: 0,
            com: ComState::Idle,
            mode: [0; 8],
            filter_high: [0; 8],
            filter_low: [0; 8],
            zero: [0; 8],
            full: [0; 8],
            level: [0; 8],
            measured_zero,
            measured_full,
            stall: false,
            stall_after: None,
            pending_read: None,
            latch: 0,
            status: 0,
            transfers: 0,
            writes: Vec::new(),
            last_pld: None,
        })))
    }

    /// User EEPROM holding `sample_table()` with magic and checksum
    pub fn calibrated() -> Self {
        let board = Board::new();
        board.load_table(&sample_table());
        board
    }

    pub fn load_table(&self, table: &CalibrationTable) {
        self.user_eeprom_mut(|chip| {
            for (index, word) in table.words().enumerate() {
                chip.words[index] = word;
            }
            chip.words[usize::from(CHECKSUM_INDEX)] = table.checksum();
            chip.words[usize::from(MAGIC_INDEX)] = MAGIC;
        });
    }

    pub fn bus(&self) -> SimBus {
        SimBus(self.0.clone())
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        f(&mut self.0.borrow_mut())
    }

    pub fn user_eeprom_mut<T>(&self, f: impl FnOnce(&mut MicrowireChip) -> T) -> T {
        f(&mut self.0.borrow_mut().user_eeprom)
    }

    pub fn select_user_eeprom(&self) {
        self.0.borrow_mut().ctrl = CTRL_UEPROM_SEL;
    }

    pub fn last_pld_write(&self) -> Option<u16> {
        self.0.borrow().last_pld
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().writes.clear();
    }
}

/// Distinct, valid values in every slot
pub fn sample_table() -> CalibrationTable {
    let mut table = CalibrationTable::uncalibrated();
    for (index, pair) in table.pairs.iter_mut().enumerate() {
        *pair = CaliPair { zero: 0x0010_0000 + index as u32, full: 0x00e0_0000 + index as u32 };
    }
    for (index, entry) in table.resistance.iter_mut().enumerate() {
        let index = index as u32;
        *entry = ResistancePair {
            ux: CaliPair { zero: 0x0020_0000 + index, full: 0x00d0_0000 + index },
            im: CaliPair { zero: 0x0030_0000 + index, full: 0x00c0_0000 + index },
        };
    }
    table
}

pub struct SimBus(Rc<RefCell<Inner>>);

impl Registers for SimBus {
    fn read(&mut self, offset: u8) -> u16 {
        let mut inner = self.0.borrow_mut();
        match offset {
            DATA_REG => (inner.latch >> 16) as u16,
            o if o == DATA_REG + 2 => inner.latch as u16,
            STATUS_REG => inner.status,
            CTRL_REG => inner.ctrl,
            PLD_IF_REG => inner.selected_chip().map_or(1, |chip| u16::from(chip.data_out())),
            _ => 0,
        }
    }

    fn write(&mut self, offset: u8, value: u16) {
        let mut inner = self.0.borrow_mut();
        if offset == PLD_IF_REG {
            inner.last_pld = Some(value);
            let lines = Lines {
                data: value & 0x1 != 0,
                clock: value & 0x2 != 0,
                select: value & 0x4 != 0,
            };
            if let Some(chip) = inner.selected_chip() {
                chip.drive(lines);
            }
            return;
        }
        inner.writes.push((offset, value));
        match offset {
            DATA_REG => inner.data_write(offset, value),
            o if o == DATA_REG + 2 => inner.data_write(offset, value),
            CONFIG_REG => inner.config_high = value,
            o if o == CONFIG_REG + 2 => {
                inner.config = (u32::from(inner.config_high) << 16) | u32::from(value)
            }
            COM_REG => inner.com_write(value),
            ACCESS_REG => inner.access_write(value),
            CTRL_REG => inner.ctrl = value,
            _ => {}
        }
    }
}

/// Delay that only counts, and optionally runs an "interrupt" on every
/// millisecond tick
pub struct SimDelay<'a> {
    elapsed_us: Rc<Cell<u64>>,
    tick: Option<Box<dyn FnMut() + 'a>>,
}

impl<'a> SimDelay<'a> {
    pub fn new() -> Self {
        SimDelay { elapsed_us: Rc::new(Cell::new(0)), tick: None }
    }

    pub fn with_tick(tick: impl FnMut() + 'a) -> Self {
        SimDelay { elapsed_us: Rc::new(Cell::new(0)), tick: Some(Box::new(tick)) }
    }

    /// Shared counter of simulated microseconds
    pub fn elapsed(&self) -> Rc<Cell<u64>> {
        self.elapsed_us.clone()
    }
}

impl<'a> DelayMs<u32> for SimDelay<'a> {
    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_us.set(self.elapsed_us.get() + u64::from(ms) * 1_000);
        if let Some(tick) = self.tick.as_mut() {
            tick();
        }
    }
}

impl<'a> DelayUs<u32> for SimDelay<'a> {
    fn delay_us(&mut self, us: u32) {
        self.elapsed_us.set(self.elapsed_us.get() + u64::from(us));
    }
}
