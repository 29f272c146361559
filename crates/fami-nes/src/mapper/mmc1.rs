//! MMC1 (mapper 1).
//!
//! All registers load through a 5-bit serial shift register: writes to
//! $8000-$FFFF shift in bit 0, and the fifth write commits the value to
//! the register selected by address bits 13-14. A write with bit 7 set
//! clears the shift register and forces the PRG mode to "fix last bank".

use crate::cartridge::{Mirroring, Rom};
use crate::error::StateError;

use super::{Cart, ChrMap, Mapper, MapperState, PrgMap};

pub struct Mmc1 {
    cart: Cart,
    prg: PrgMap,
    chr: ChrMap,

    shift: u8,
    write_count: u8,
    /// %CPPMM: CHR mode, PRG mode, mirroring.
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    /// Bits 0-3 PRG bank, bit 4 PRG-RAM disable.
    prg_bank: u8,
}

impl Mmc1 {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mut m = Self {
            cart: Cart::from_rom(rom),
            prg: PrgMap::new(),
            chr: ChrMap::new(),
            shift: 0,
            write_count: 0,
            control: 0x0C, // power-on: 16 KiB PRG, last bank fixed
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
        };
        m.apply();
        m
    }

    fn prg_ram_enabled(&self) -> bool {
        self.prg_bank & 0x10 == 0
    }

    fn serial_write(&mut self, addr: u16, value: u8) {
        if value & 0x80 != 0 {
            self.shift = 0;
            self.write_count = 0;
            self.control |= 0x0C;
            self.apply();
            return;
        }

        self.shift |= (value & 0x01) << self.write_count;
        self.write_count += 1;
        if self.write_count < 5 {
            return;
        }

        let data = self.shift;
        self.shift = 0;
        self.write_count = 0;
        match addr {
            0x8000..=0x9FFF => self.control = data,
            0xA000..=0xBFFF => self.chr_bank0 = data,
            0xC000..=0xDFFF => self.chr_bank1 = data,
            _ => self.prg_bank = data,
        }
        self.apply();
    }

    fn apply(&mut self) {
        let prg_len = self.cart.prg_rom.len();
        let chr_len = self.cart.chr.len();
        let bank = i32::from(self.prg_bank & 0x0F);

        match (self.control >> 2) & 0x03 {
            0 | 1 => self.prg.set_32k(bank >> 1, prg_len),
            2 => {
                self.prg.set_16k(0, 0, prg_len);
                self.prg.set_16k(1, bank, prg_len);
            }
            _ => {
                self.prg.set_16k(0, bank, prg_len);
                self.prg.set_16k(1, -1, prg_len);
            }
        }

        if self.control & 0x10 == 0 {
            self.chr.set_8k(i32::from(self.chr_bank0 >> 1), chr_len);
        } else {
            self.chr.set_4k(0, i32::from(self.chr_bank0), chr_len);
            self.chr.set_4k(1, i32::from(self.chr_bank1), chr_len);
        }
    }
}

impl Mapper for Mmc1 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled() => Some(self.cart.prg_ram_read(addr)),
            0x8000..=0xFFFF => Some(self.prg.read(&self.cart.prg_rom, addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled() {
                    self.cart.prg_ram_write(addr, value);
                }
            }
            0x8000..=0xFFFF => self.serial_write(addr, value),
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
        match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn reset(&mut self) {
        self.shift = 0;
        self.write_count = 0;
        self.control |= 0x0C;
        self.apply();
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.cart.battery_slice()
    }

    fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.cart.load_battery(bytes);
    }

    fn save_state(&self) -> MapperState {
        MapperState::Mmc1 {
            common: self.cart.common_state(),
            shift: self.shift,
            write_count: self.write_count,
            control: self.control,
            chr_bank0: self.chr_bank0,
            chr_bank1: self.chr_bank1,
            prg_bank: self.prg_bank,
        }
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Mmc1 {
            common,
            shift,
            write_count,
            control,
            chr_bank0,
            chr_bank1,
            prg_bank,
        } = state
        else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(common);
        self.shift = *shift;
        self.write_count = *write_count;
        self.control = *control;
        self.chr_bank0 = *chr_bank0;
        self.chr_bank1 = *chr_bank1;
        self.prg_bank = *prg_bank;
        self.apply();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::test_rom;

    fn mmc1(prg_banks: u8, chr_banks: u8) -> Mmc1 {
        Mmc1::new(Rom::parse(&test_rom::build(prg_banks, chr_banks, 0)).expect("parse"))
    }

    /// Shift a full 5-bit value into a register, LSB first.
    fn load_register(m: &mut Mmc1, addr: u16, value: u8) {
        for i in 0..5 {
            m.cpu_write(addr, (value >> i) & 0x01);
        }
    }

    #[test]
    fn five_writes_commit_lsb_first() {
        let mut m = mmc1(8, 2);
        // Bits {0,0,0,0,1} assemble %10000 into the control register.
        for bit in [0, 0, 0, 0, 1] {
            m.cpu_write(0x8000, bit);
        }
        assert_eq!(m.control, 0x10);
        assert_eq!(m.mirroring(), Mirroring::SingleScreenLower);
    }

    #[test]
    fn reset_bit_clears_shift_and_fixes_last_bank() {
        let mut m = mmc1(8, 2);
        m.cpu_write(0x8000, 1);
        m.cpu_write(0x8000, 1);
        m.cpu_write(0x8000, 0x80); // reset mid-sequence
        assert_eq!(m.write_count, 0);
        assert_eq!(m.control & 0x0C, 0x0C, "PRG mode forced to fix-last");

        // The interrupted sequence left no residue: a fresh 5-write load
        // still works.
        load_register(&mut m, 0x8000, 0x02);
        assert_eq!(m.mirroring(), Mirroring::Vertical);
    }

    #[test]
    fn prg_modes() {
        let mut data = test_rom::build(8, 2, 0);
        data[16 + 3 * 0x4000] = 0xA3; // 16 KiB bank 3 marker
        data[16 + 7 * 0x4000] = 0xA7; // last bank marker
        let mut m = Mmc1::new(Rom::parse(&data).unwrap());

        // Power-on mode 3: switchable low, fixed last.
        load_register(&mut m, 0xE000, 3);
        assert_eq!(m.cpu_read(0x8000), Some(0xA3));
        assert_eq!(m.cpu_read(0xC000), Some(0xA7));

        // Mode 2: fixed first, switchable last.
        load_register(&mut m, 0x8000, 0x08);
        load_register(&mut m, 0xE000, 3);
        assert_eq!(m.cpu_read(0x8000), Some(0x00));
        assert_eq!(m.cpu_read(0xC000), Some(0xA3));

        // 32 KiB mode: bank pairs.
        load_register(&mut m, 0x8000, 0x00);
        load_register(&mut m, 0xE000, 2); // pair 1 = banks 2+3
        assert_eq!(m.cpu_read(0xC000), Some(0xA3));
    }

    #[test]
    fn chr_4k_mode_banks_independently() {
        let mut data = test_rom::build(2, 4, 0);
        let prg_size = 2 * 16384;
        data[16 + prg_size + 3 * 0x1000] = 0x3C; // 4 KiB bank 3
        data[16 + prg_size + 5 * 0x1000] = 0x5C; // 4 KiB bank 5
        let mut m = Mmc1::new(Rom::parse(&data).unwrap());

        load_register(&mut m, 0x8000, 0x10); // CHR 4K mode
        load_register(&mut m, 0xA000, 3);
        load_register(&mut m, 0xC000, 5);
        assert_eq!(m.ppu_read(0x0000), 0x3C);
        assert_eq!(m.ppu_read(0x1000), 0x5C);
    }

    #[test]
    fn prg_ram_disable_bit() {
        let mut m = mmc1(2, 1);
        m.cpu_write(0x6000, 0x99);
        assert_eq!(m.cpu_read(0x6000), Some(0x99));

        load_register(&mut m, 0xE000, 0x10); // bit 4: RAM disabled
        assert_eq!(m.cpu_read(0x6000), None, "disabled RAM floats the bus");
        m.cpu_write(0x6000, 0x55); // ignored
        load_register(&mut m, 0xE000, 0x00);
        assert_eq!(m.cpu_read(0x6000), Some(0x99));
    }
}
