//! MMC2 (mapper 9).
//!
//! Two 4 KiB CHR windows, each with an FD/FE latch pair flipped by the
//! PPU fetching the trigger tiles ($FD/$FE rows). The latch takes effect
//! after the triggering fetch completes, which is what lets Punch-Out!!
//! switch mid-scanline.

use crate::cartridge::{Mirroring, Rom};
use crate::error::StateError;

use super::{Cart, ChrMap, Mapper, MapperState, PrgMap};

pub struct Mmc2 {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,

    prg_bank: u8,
    /// CHR banks selected while the latch reads FD: [low half, high half].
    chr_fd: [u8; 2],
    /// CHR banks selected while the latch reads FE.
    chr_fe: [u8; 2],
    /// Current latch values: true = FE.
    latch_fe: [bool; 2],
    mirroring: Mirroring,
}

impl Mmc2 {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.mirroring;
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            prg_bank: 0,
            chr_fd: [0; 2],
            chr_fe: [0; 2],
            latch_fe: [true; 2],
            mirroring,
        };
        m.apply();
        m
    }

    fn apply(&mut self) {
        let prg_len = self.cart.prg_rom.len();
        self.prg.set_8k(0, i32::from(self.prg_bank), prg_len);
        self.prg.set_8k(1, -3, prg_len);
        self.prg.set_8k(2, -2, prg_len);
        self.prg.set_8k(3, -1, prg_len);

        let chr_len = self.cart.chr.len();
        for half in 0..2 {
            let bank = if self.latch_fe[half] {
                self.chr_fe[half]
            } else {
                self.chr_fd[half]
            };
            self.chr.set_4k(half, i32::from(bank), chr_len);
        }
    }

    fn update_latches(&mut self, addr: u16) {
        match addr & 0x1FFF {
            0x0FD8 => self.latch_fe[0] = false,
            0x0FE8 => self.latch_fe[0] = true,
            0x1FD8..=0x1FDF => self.latch_fe[1] = false,
            0x1FE8..=0x1FEF => self.latch_fe[1] = true,
            _ => return,
        }
        self.apply();
    }
}

impl Mapper for Mmc2 {
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
            0xA000..=0xAFFF => {
                self.prg_bank = value & 0x0F;
                self.apply();
            }
            0xB000..=0xBFFF => {
                self.chr_fd[0] = value & 0x1F;
                self.apply();
            }
            0xC000..=0xCFFF => {
                self.chr_fe[0] = value & 0x1F;
                self.apply();
            }
            0xD000..=0xDFFF => {
                self.chr_fd[1] = value & 0x1F;
                self.apply();
            }
            0xE000..=0xEFFF => {
                self.chr_fe[1] = value & 0x1F;
                self.apply();
            }
            0xF000..=0xFFFF => {
                self.mirroring = if value & 0x01 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                };
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        // The fetch completes with the old banking, then flips the latch.
        let value = self.cart.chr_read(&self.chr, addr);
        self.update_latches(addr);
        value
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.cart.chr_write(&self.chr, addr, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn save_state(&self) -> MapperState {
        MapperState::Mmc2 {
            common: self.cart.common_state(),
            prg_bank: self.prg_bank,
            chr_fd: self.chr_fd,
            chr_fe: self.chr_fe,
            latch_fe: self.latch_fe,
            mirroring: self.mirroring,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Mmc2 {
            common,
            prg_bank,
            chr_fd,
            chr_fe,
            latch_fe,
            mirroring,
        } = state
        else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.prg_bank = *prg_bank;
        self.chr_fd = *chr_fd;
        self.chr_fe = *chr_fe;
        self.latch_fe = *latch_fe;
        self.mirroring = *mirroring;
        self.apply();
        Ok(())
    }
}
