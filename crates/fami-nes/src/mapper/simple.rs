//! Discrete-logic boards: a latch or two and no IRQ.
//!
//! NROM (0), UxROM (2), CNROM (3), AxROM (7), Color Dreams (11),
//! BNROM/NINA-001 (34), GxROM (66), NINA-03/06 (79).

use crate::cartridge::{Mirroring, Rom};
use crate::error::StateError;

use super::{Cart, ChrMap, Mapper, MapperState, PrgMap};

/// NROM (mapper 0): no banking. 16 KiB PRG mirrors into $C000.
pub struct Nrom {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    mirroring: Mirroring,
}

impl Nrom {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let cart = Cart::from_rom(rom);
        let mut prg = PrgMap::new();
        prg.set_16k(0, 0, cart.prg_rom.len());
        prg.set_16k(1, -1, cart.prg_rom.len());
        let mut chr = ChrMap::new();
        chr.set_8k(0, cart.chr.len());
        Self {
            cart,
            prg,
            chr,
            mirroring,
        }
    }
}

impl Mapper for Nrom {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => Some(self.cart.prg_ram_read(addr)),
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if let 0x6000..=0x7FFF = addr {
            self.cart.prg_ram_write(addr, value);
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

    fn battery_ram(&self) -> Option<&[u8]> {
        self.cart.battery_slice()
    }

    fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.cart.load_battery(bytes);
    }

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [0; 4],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple { common, .. } = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        Ok(())
    }
}

/// UxROM (mapper 2): switchable 16 KiB at $8000, last bank fixed.
pub struct Uxrom {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    prg_bank: u8,
    mirroring: Mirroring,
}

impl Uxrom {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            prg_bank: 0,
            mirroring,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        let len = self.cart.prg_rom.len();
        self.prg.set_16k(0, i32::from(self.prg_bank), len);
        self.prg.set_16k(1, -1, len);
        self.chr.set_8k(0, self.cart.chr.len());
    }
}

impl Mapper for Uxrom {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => Some(self.cart.prg_ram_read(addr)),
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.cart.prg_ram_write(addr, value),
            0x8000..=0xFFFF => {
                self.prg_bank = value & 0x0F;
                self.apply();
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
        self.mirroring
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.cart.battery_slice()
    }

    fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.cart.load_battery(bytes);
    }

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [self.prg_bank, 0, 0, 0],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple { common, regs, .. } = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.prg_bank = regs[0];
        self.apply();
        Ok(())
    }
}

/// CNROM (mapper 3): fixed PRG, switchable 8 KiB CHR. The latch has bus
/// conflicts: the written value is ANDed with the ROM byte at the same
/// address.
pub struct Cnrom {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    chr_bank: u8,
    mirroring: Mirroring,
}

impl Cnrom {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            chr_bank: 0,
            mirroring,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        let len = self.cart.prg_rom.len();
        self.prg.set_16k(0, 0, len);
        self.prg.set_16k(1, -1, len);
        self.chr
            .set_8k(i32::from(self.chr_bank), self.cart.chr.len());
    }
}

impl Mapper for Cnrom {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => Some(self.cart.prg_ram_read(addr)),
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.cart.prg_ram_write(addr, value),
            0x8000..=0xFFFF => {
                let rom_byte = self.prg.read(&self.cart.prg_rom, addr);
                self.chr_bank = value & rom_byte & 0x03;
                self.apply();
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
        self.mirroring
    }

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [self.chr_bank, 0, 0, 0],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple { common, regs, .. } = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.chr_bank = regs[0];
        self.apply();
        Ok(())
    }
}

/// AxROM (mapper 7): 32 KiB PRG switch, single-screen mirroring picked
/// by bit 4.
pub struct Axrom {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    prg_bank: u8,
    mirroring: Mirroring,
}

impl Axrom {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            prg_bank: 0,
            mirroring: Mirroring::SingleScreenLower,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        self.prg
            .set_32k(i32::from(self.prg_bank), self.cart.prg_rom.len());
        self.chr.set_8k(0, self.cart.chr.len());
    }
}

impl Mapper for Axrom {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => Some(self.cart.prg_ram_read(addr)),
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.cart.prg_ram_write(addr, value),
            0x8000..=0xFFFF => {
                self.prg_bank = value & 0x07;
                self.mirroring = if value & 0x10 != 0 {
                    Mirroring::SingleScreenUpper
                } else {
                    Mirroring::SingleScreenLower
                };
                self.apply();
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
        self.mirroring
    }

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [self.prg_bank, 0, 0, 0],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple {
            common,
            regs,
            mirroring,
        } = state
        else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.prg_bank = regs[0];
        self.mirroring = *mirroring;
        self.apply();
        Ok(())
    }
}

/// Color Dreams (mapper 11): 32 KiB PRG in the low nibble, 8 KiB CHR in
/// the high nibble.
pub struct ColorDreams {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    prg_bank: u8,
    chr_bank: u8,
    mirroring: Mirroring,
}

impl ColorDreams {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            prg_bank: 0,
            chr_bank: 0,
            mirroring,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        self.prg
            .set_32k(i32::from(self.prg_bank), self.cart.prg_rom.len());
        self.chr
            .set_8k(i32::from(self.chr_bank), self.cart.chr.len());
    }
}

impl Mapper for ColorDreams {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.prg_bank = value & 0x03;
            self.chr_bank = value >> 4;
            self.apply();
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

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [self.prg_bank, self.chr_bank, 0, 0],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple { common, regs, .. } = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.prg_bank = regs[0];
        self.chr_bank = regs[1];
        self.apply();
        Ok(())
    }
}

/// Mapper 34 covers two unrelated boards. BNROM (CHR-RAM) switches
/// 32 KiB PRG via $8000+; NINA-001 (CHR-ROM) has registers shadowing the
/// top of PRG-RAM: $7FFD selects 32 KiB PRG, $7FFE/$7FFF select the two
/// 4 KiB CHR halves.
pub struct BnromNina {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    nina: bool,
    prg_bank: u8,
    chr_banks: [u8; 2],
    mirroring: Mirroring,
}

impl BnromNina {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let nina = !rom.chr_is_ram;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            nina,
            prg_bank: 0,
            chr_banks: [0, 1],
            mirroring,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        self.prg
            .set_32k(i32::from(self.prg_bank), self.cart.prg_rom.len());
        let chr_len = self.cart.chr.len();
        if self.nina {
            self.chr.set_4k(0, i32::from(self.chr_banks[0]), chr_len);
            self.chr.set_4k(1, i32::from(self.chr_banks[1]), chr_len);
        } else {
            self.chr.set_8k(0, chr_len);
        }
    }
}

impl Mapper for BnromNina {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => Some(self.cart.prg_ram_read(addr)),
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => {
                self.cart.prg_ram_write(addr, value);
                if self.nina {
                    match addr {
                        0x7FFD => self.prg_bank = value & 0x01,
                        0x7FFE => self.chr_banks[0] = value & 0x0F,
                        0x7FFF => self.chr_banks[1] = value & 0x0F,
                        _ => {}
                    }
                    self.apply();
                }
            }
            0x8000..=0xFFFF => {
                if !self.nina {
                    self.prg_bank = value;
                    self.apply();
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
        self.mirroring
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.cart.battery_slice()
    }

    fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.cart.load_battery(bytes);
    }

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [self.prg_bank, self.chr_banks[0], self.chr_banks[1], 0],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple { common, regs, .. } = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.prg_bank = regs[0];
        self.chr_banks = [regs[1], regs[2]];
        self.apply();
        Ok(())
    }
}

/// GxROM (mapper 66): 32 KiB PRG in bits 4-5, 8 KiB CHR in bits 0-1.
pub struct Gxrom {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    prg_bank: u8,
    chr_bank: u8,
    mirroring: Mirroring,
}

impl Gxrom {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            prg_bank: 0,
            chr_bank: 0,
            mirroring,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        self.prg
            .set_32k(i32::from(self.prg_bank), self.cart.prg_rom.len());
        self.chr
            .set_8k(i32::from(self.chr_bank), self.cart.chr.len());
    }
}

impl Mapper for Gxrom {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.prg_bank = (value >> 4) & 0x03;
            self.chr_bank = value & 0x03;
            self.apply();
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

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [self.prg_bank, self.chr_bank, 0, 0],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple { common, regs, .. } = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.prg_bank = regs[0];
        self.chr_bank = regs[1];
        self.apply();
        Ok(())
    }
}

/// NINA-03/06 (mapper 79): the latch sits in the $4100-$5FFF expansion
/// hole and responds when address bit 8 is set.
pub struct Nina03 {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,
    prg_bank: u8,
    chr_bank: u8,
    mirroring: Mirroring,
}

impl Nina03 {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            prg_bank: 0,
            chr_bank: 0,
            mirroring,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        self.prg
            .set_32k(i32::from(self.prg_bank), self.cart.prg_rom.len());
        self.chr
            .set_8k(i32::from(self.chr_bank), self.cart.chr.len());
    }
}

impl Mapper for Nina03 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if (0x4100..=0x5FFF).contains(&addr) && addr & 0x0100 != 0 {
            self.chr_bank = value & 0x07;
            self.prg_bank = (value >> 3) & 0x01;
            self.apply();
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

    fn save_state(&self) -> MapperState {
        MapperState::Simple {
            common: self.cart.common_state(),
            regs: [self.prg_bank, self.chr_bank, 0, 0],
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Simple { common, regs, .. } = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.prg_bank = regs[0];
        self.chr_bank = regs[1];
        self.apply();
        Ok(())
    }
}
