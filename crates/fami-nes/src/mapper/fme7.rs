//! Sunsoft FME-7 (mapper 69).
//!
//! A command/parameter register pair: $8000 selects one of sixteen
//! commands, $A000 carries the value. Commands cover eight 1 KiB CHR
//! banks, three 8 KiB PRG banks, the $6000 window (ROM or RAM), the
//! mirroring latch and a 16-bit CPU-cycle IRQ down-counter.

use crate::cartridge::{Mirroring, Rom};
use crate::error::StateError;

use super::{Cart, ChrMap, Mapper, MapperState, PrgMap};

pub struct Fme7 {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,

    command: u8,
    /// [$6000 window, $8000, $A000, $C000]; $E000 is fixed to the last bank.
    prg_banks: [u8; 4],
    chr_banks: [u8; 8],
    mirroring: Mirroring,
    ram_at_6000: bool,
    ram_enable: bool,

    irq_counter: u16,
    irq_enabled: bool,
    irq_counter_enabled: bool,
    irq_pending: bool,
}

impl Fme7 {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            command: 0,
            prg_banks: [0, 0, 1, 2],
            chr_banks: [0, 1, 2, 3, 4, 5, 6, 7],
            mirroring,
            ram_at_6000: true,
            ram_enable: true,
            irq_counter: 0,
            irq_enabled: false,
            irq_counter_enabled: false,
            irq_pending: false,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        let prg_len = self.cart.prg_rom.len();
        for (slot, &bank) in self.prg_banks[1..].iter().enumerate() {
            self.prg.set_8k(slot, i32::from(bank & 0x3F), prg_len);
        }
        self.prg.set_8k(3, -1, prg_len);

        let chr_len = self.cart.chr.len();
        for (slot, &bank) in self.chr_banks.iter().enumerate() {
            self.chr.set_1k(slot, i32::from(bank), chr_len);
        }
    }

    fn write_parameter(&mut self, value: u8) {
        match self.command {
            0x0..=0x7 => {
                self.chr_banks[usize::from(self.command)] = value;
                self.apply();
            }
            0x8 => {
                self.prg_banks[0] = value & 0x3F;
                self.ram_at_6000 = value & 0x40 != 0;
                self.ram_enable = value & 0x80 != 0;
            }
            0x9..=0xB => {
                self.prg_banks[usize::from(self.command) - 0x08] = value & 0x3F;
                self.apply();
            }
            0xC => {
                self.mirroring = match value & 0x03 {
                    0 => Mirroring::Vertical,
                    1 => Mirroring::Horizontal,
                    2 => Mirroring::SingleScreenLower,
                    _ => Mirroring::SingleScreenUpper,
                };
            }
            0xD => {
                // Writing IRQ control acknowledges any pending IRQ.
                self.irq_pending = false;
                self.irq_enabled = value & 0x01 != 0;
                self.irq_counter_enabled = value & 0x80 != 0;
            }
            0xE => {
                self.irq_counter = (self.irq_counter & 0xFF00) | u16::from(value);
            }
            _ => {
                self.irq_counter = (self.irq_counter & 0x00FF) | (u16::from(value) << 8);
            }
        }
    }
}

impl Mapper for Fme7 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => {
                if self.ram_at_6000 {
                    self.ram_enable.then(|| self.cart.prg_ram_read(addr))
                } else {
                    let offset = usize::from(addr) - 0x6000;
                    let bank = usize::from(self.prg_banks[0]);
                    let idx = bank * 0x2000 + offset;
                    Some(self.cart.prg_rom[idx % self.cart.prg_rom.len()])
                }
            }
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.ram_at_6000 && self.ram_enable {
                    self.cart.prg_ram_write(addr, value);
                }
            }
            0x8000..=0x9FFF => self.command = value & 0x0F,
            0xA000..=0xBFFF => self.write_parameter(value),
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.cart.chr_read(&self.chr, addr)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.cart.chr_write(&self.chr, addr, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn on_cpu_cycle(&mut self) {
        if !self.irq_counter_enabled {
            return;
        }
        let previous = self.irq_counter;
        self.irq_counter = self.irq_counter.wrapping_sub(1);
        if previous == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.cart.battery_slice()
    }

    fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.cart.load_battery(bytes);
    }

    fn save_state(&self) -> MapperState {
        MapperState::Fme7 {
            common: self.cart.common_state(),
            command: self.command,
            prg_banks: self.prg_banks,
            chr_banks: self.chr_banks,
            mirroring: self.mirroring,
            ram_at_6000: self.ram_at_6000,
            ram_enable: self.ram_enable,
            irq_counter: self.irq_counter,
            irq_enabled: self.irq_enabled,
            irq_counter_enabled: self.irq_counter_enabled,
            irq_pending: self.irq_pending,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Fme7 {
            common,
            command,
            prg_banks,
            chr_banks,
            mirroring,
            ram_at_6000,
            ram_enable,
            irq_counter,
            irq_enabled,
            irq_counter_enabled,
            irq_pending,
        } = state
        else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.command = *command;
        self.prg_banks = *prg_banks;
        self.chr_banks = *chr_banks;
        self.mirroring = *mirroring;
        self.ram_at_6000 = *ram_at_6000;
        self.ram_enable = *ram_enable;
        self.irq_counter = *irq_counter;
        self.irq_enabled = *irq_enabled;
        self.irq_counter_enabled = *irq_counter_enabled;
        self.irq_pending = *irq_pending;
        self.apply();
        Ok(())
    }
}
