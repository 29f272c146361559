//! MMC3 family (mappers 4 and 206).
//!
//! Eight bank registers behind a select port, a PRG mode bit that swaps
//! the switchable and fixed-second-to-last 8 KiB windows, a CHR mode bit
//! that swaps the 2 KiB and 1 KiB halves, and the scanline IRQ counter
//! clocked by filtered A12 rising edges.
//!
//! Mapper 206 (DxROM / Namco 108) is the same banking core with no IRQ,
//! no mirroring control and narrower bank registers. MMC6 boards
//! (StarTropics) share mapper 4; their 1 KiB internal RAM switches in
//! when bank-select bit 5 is raised, with per-512-byte protection from
//! $A001.
//!
//! Bank registers persist across soft reset.

use crate::cartridge::{Mirroring, Rom};
use crate::error::StateError;

use super::{Cart, ChrMap, Mapper, MapperState, PrgMap};

/// Which board carries the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mmc3Kind {
    Mmc3,
    /// Namco 108: banking core only.
    Dxrom,
}

pub struct Mmc3 {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    kind: Mmc3Kind,
    four_screen: bool,

    bank_select: u8,
    bank_regs: [u8; 8],
    mirroring: Mirroring,
    /// $A001: bit 7 write-protect, bit 6 PRG-RAM chip enable (MMC3);
    /// per-half MMC6 protection bits when bank-select bit 5 is up.
    ram_protect: u8,

    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,
}

impl Mmc3 {
    #[must_use]
    pub fn new(rom: Rom, kind: Mmc3Kind) -> Self {
        let mirroring = rom.mirroring;
        let four_screen = rom.four_screen;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            kind,
            four_screen,
            bank_select: 0,
            bank_regs: [0; 8],
            mirroring,
            ram_protect: 0,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
        };
        m.apply();
        m
    }

    fn mmc6_mode(&self) -> bool {
        self.kind == Mmc3Kind::Mmc3 && self.bank_select & 0x20 != 0
    }

    fn apply(&mut self) {
        let prg_len = self.cart.prg_rom.len();
        let prg_mode = self.kind == Mmc3Kind::Mmc3 && self.bank_select & 0x40 != 0;
        let r6 = i32::from(self.bank_regs[6]);
        let r7 = i32::from(self.bank_regs[7]);
        if prg_mode {
            self.prg.set_8k(0, -2, prg_len);
            self.prg.set_8k(2, r6, prg_len);
        } else {
            self.prg.set_8k(0, r6, prg_len);
            self.prg.set_8k(2, -2, prg_len);
        }
        self.prg.set_8k(1, r7, prg_len);
        self.prg.set_8k(3, -1, prg_len);

        let chr_len = self.cart.chr.len();
        let chr_mode = self.kind == Mmc3Kind::Mmc3 && self.bank_select & 0x80 != 0;
        // R0/R1 are 2 KiB (even), R2-R5 are 1 KiB; the mode bit swaps the
        // pattern-table halves.
        let big = usize::from(chr_mode) * 4;
        let small = 4 - big;
        self.chr
            .set_2k(big / 2, i32::from(self.bank_regs[0] >> 1), chr_len);
        self.chr
            .set_2k(big / 2 + 1, i32::from(self.bank_regs[1] >> 1), chr_len);
        for i in 0..4 {
            self.chr
                .set_1k(small + i, i32::from(self.bank_regs[2 + i]), chr_len);
        }
    }

    fn write_even(&mut self, addr: u16, value: u8) {
        match addr & 0xE000 {
            0x8000 => {
                self.bank_select = if self.kind == Mmc3Kind::Dxrom {
                    value & 0x07
                } else {
                    value
                };
                self.apply();
            }
            0xA000 => {
                if self.kind == Mmc3Kind::Mmc3 && !self.four_screen {
                    self.mirroring = if value & 0x01 == 0 {
                        Mirroring::Vertical
                    } else {
                        Mirroring::Horizontal
                    };
                }
            }
            0xC000 => {
                if self.kind == Mmc3Kind::Mmc3 {
                    self.irq_latch = value;
                }
            }
            0xE000 => {
                if self.kind == Mmc3Kind::Mmc3 {
                    self.irq_enabled = false;
                    self.irq_pending = false;
                }
            }
            _ => {}
        }
    }

    fn write_odd(&mut self, addr: u16, value: u8) {
        match addr & 0xE000 {
            0x8000 => {
                let target = (self.bank_select & 0x07) as usize;
                let mask = if self.kind == Mmc3Kind::Dxrom { 0x3F } else { 0xFF };
                self.bank_regs[target] = value & mask;
                self.apply();
            }
            0xA000 => {
                if self.kind == Mmc3Kind::Mmc3 {
                    self.ram_protect = value;
                }
            }
            0xC000 => {
                if self.kind == Mmc3Kind::Mmc3 {
                    self.irq_reload = true;
                }
            }
            0xE000 => {
                if self.kind == Mmc3Kind::Mmc3 {
                    self.irq_enabled = true;
                }
            }
            _ => {}
        }
    }

    fn prg_ram_read(&self, addr: u16) -> Option<u8> {
        if self.mmc6_mode() {
            // 1 KiB internal RAM mirrored through $7000-$7FFF; reads need
            // the per-half read-enable bit.
            if addr < 0x7000 {
                return None;
            }
            let offset = usize::from(addr) & 0x03FF;
            let hi_half = offset & 0x0200 != 0;
            let enabled = if hi_half {
                self.ram_protect & 0x80 != 0
            } else {
                self.ram_protect & 0x20 != 0
            };
            return enabled.then(|| self.cart.prg_ram[offset]);
        }
        // MMC3: $A001 bit 6 enables the chip.
        (self.ram_protect & 0x80 != 0).then(|| self.cart.prg_ram_read(addr))
    }

    fn prg_ram_write(&mut self, addr: u16, value: u8) {
        if self.mmc6_mode() {
            if addr < 0x7000 {
                return;
            }
            let offset = usize::from(addr) & 0x03FF;
            let hi_half = offset & 0x0200 != 0;
            let writable = if hi_half {
                self.ram_protect & 0xC0 == 0xC0
            } else {
                self.ram_protect & 0x30 == 0x30
            };
            if writable {
                self.cart.prg_ram[offset] = value;
            }
            return;
        }
        if self.ram_protect & 0x80 != 0 && self.ram_protect & 0x40 == 0 {
            self.cart.prg_ram_write(addr, value);
        }
    }
}

impl Mapper for Mmc3 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => self.prg_ram_read(addr),
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.prg_ram_write(addr, value),
            0x8000..=0xFFFF => {
                if addr & 0x01 == 0 {
                    self.write_even(addr, value);
                } else {
                    self.write_odd(addr, value);
                }
            }
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
        if self.four_screen {
            Mirroring::FourScreen
        } else {
            self.mirroring
        }
    }

    fn on_a12_rising(&mut self) {
        if self.kind != Mmc3Kind::Mmc3 {
            return;
        }
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
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
        MapperState::Mmc3 {
            common: self.cart.common_state(),
            bank_select: self.bank_select,
            bank_regs: self.bank_regs,
            mirroring: self.mirroring,
            irq_latch: self.irq_latch,
            irq_counter: self.irq_counter,
            irq_reload: self.irq_reload,
            irq_enabled: self.irq_enabled,
            irq_pending: self.irq_pending,
            ram_protect: self.ram_protect,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Mmc3 {
            common,
            bank_select,
            bank_regs,
            mirroring,
            irq_latch,
            irq_counter,
            irq_reload,
            irq_enabled,
            irq_pending,
            ram_protect,
        } = state
        else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.bank_select = *bank_select;
        self.bank_regs = *bank_regs;
        self.mirroring = *mirroring;
        self.irq_latch = *irq_latch;
        self.irq_counter = *irq_counter;
        self.irq_reload = *irq_reload;
        self.irq_enabled = *irq_enabled;
        self.irq_pending = *irq_pending;
        self.ram_protect = *ram_protect;
        self.apply();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::test_rom;

    fn mmc3() -> Mmc3 {
        Mmc3::new(
            Rom::parse(&test_rom::build(8, 4, 0)).expect("parse"),
            Mmc3Kind::Mmc3,
        )
    }

    #[test]
    fn irq_fires_when_counter_decrements_to_zero() {
        let mut m = mmc3();
        m.cpu_write(0xC000, 0x10); // latch = 16
        m.cpu_write(0xC001, 0); // reload
        m.cpu_write(0xE001, 0); // enable

        // Edge 1 loads the counter; edges 2..17 decrement 16 -> 0.
        for edge in 1..=16 {
            m.on_a12_rising();
            assert!(!m.irq_pending(), "no IRQ after edge {edge}");
        }
        m.on_a12_rising();
        assert!(m.irq_pending(), "IRQ asserted on the 17th edge");

        m.cpu_write(0xE000, 0); // acknowledge + disable
        assert!(!m.irq_pending());
    }

    #[test]
    fn irq_disabled_counter_still_counts() {
        let mut m = mmc3();
        m.cpu_write(0xC000, 0x01);
        m.cpu_write(0xC001, 0);
        for _ in 0..4 {
            m.on_a12_rising();
        }
        assert!(!m.irq_pending(), "disabled: pending stays clear");
        m.cpu_write(0xE001, 0);
        m.on_a12_rising(); // counter 0 -> reload 1
        m.on_a12_rising(); // 1 -> 0: IRQ
        assert!(m.irq_pending());
    }

    #[test]
    fn prg_mode_swaps_windows() {
        let mut data = test_rom::build(8, 4, 0);
        data[16 + 2 * 0x2000] = 0xB2; // 8 KiB bank 2
        data[16 + 14 * 0x2000] = 0xBE; // second-to-last bank
        let mut m = Mmc3::new(Rom::parse(&data).unwrap(), Mmc3Kind::Mmc3);

        m.cpu_write(0x8000, 6);
        m.cpu_write(0x8001, 2); // R6 = bank 2
        assert_eq!(m.cpu_read(0x8000), Some(0xB2));
        assert_eq!(m.cpu_read(0xC000), Some(0xBE));

        m.cpu_write(0x8000, 0x46); // PRG mode 1
        assert_eq!(m.cpu_read(0x8000), Some(0xBE));
        assert_eq!(m.cpu_read(0xC000), Some(0xB2));
    }

    #[test]
    fn chr_mode_inverts_halves() {
        let mut data = test_rom::build(8, 4, 0);
        let prg_size = 8 * 16384;
        data[16 + prg_size + 4 * 0x0800] = 0xC4; // 2 KiB bank 4
        let mut m = Mmc3::new(Rom::parse(&data).unwrap(), Mmc3Kind::Mmc3);

        m.cpu_write(0x8000, 0);
        m.cpu_write(0x8001, 8); // R0 = 1 KiB bank 8 = 2 KiB bank 4
        assert_eq!(m.ppu_read(0x0000), 0xC4);

        m.cpu_write(0x8000, 0x80); // CHR mode 1: R0 moves to $1000
        assert_eq!(m.ppu_read(0x1000), 0xC4);
    }

    #[test]
    fn mirroring_register() {
        let mut m = mmc3();
        m.cpu_write(0xA000, 0);
        assert_eq!(m.mirroring(), Mirroring::Vertical);
        m.cpu_write(0xA000, 1);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn registers_survive_soft_reset() {
        let mut m = mmc3();
        m.cpu_write(0x8000, 6);
        m.cpu_write(0x8001, 3);
        let before = m.cpu_read(0x8000);
        m.reset();
        assert_eq!(m.cpu_read(0x8000), before);
    }

    #[test]
    fn dxrom_has_no_irq_or_mirroring_control() {
        let mut m = Mmc3::new(
            Rom::parse(&test_rom::build(8, 4, 0)).unwrap(),
            Mmc3Kind::Dxrom,
        );
        let before = m.mirroring();
        m.cpu_write(0xA000, 0);
        assert_eq!(m.mirroring(), before);
        m.cpu_write(0xC000, 1);
        m.cpu_write(0xC001, 0);
        m.cpu_write(0xE001, 0);
        for _ in 0..8 {
            m.on_a12_rising();
        }
        assert!(!m.irq_pending());
    }

    #[test]
    fn mmc3_ram_protect_bits() {
        let mut m = mmc3();
        assert_eq!(m.cpu_read(0x6000), None, "RAM disabled at power-on");
        m.cpu_write(0xA001, 0x80); // enable
        m.cpu_write(0x6000, 0x12);
        assert_eq!(m.cpu_read(0x6000), Some(0x12));
        m.cpu_write(0xA001, 0xC0); // write-protect
        m.cpu_write(0x6000, 0x34);
        assert_eq!(m.cpu_read(0x6000), Some(0x12));
    }
}
