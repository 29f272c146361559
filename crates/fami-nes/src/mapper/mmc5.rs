//! MMC5 (mapper 5).
//!
//! The most elaborate licensed board: banked PRG that can point at ROM
//! or RAM per window, four CHR granularities with separate sprite and
//! background bank sets in 8×16 sprite mode, a 1 KiB ExRAM with four
//! operating modes, fill-mode and ExRAM nametables, a vertical-split
//! renderer, a scanline IRQ driven by watching the PPU's fetch pattern,
//! an 8×8-bit multiplier, and two pulse channels plus raw PCM.
//!
//! The chip has no A12 counter; it infers scanlines by recognising the
//! three consecutive reads of one nametable address the PPU performs at
//! the end of each rendered line, and it decides "in frame" from the
//! fetch cadence. Reading the NMI vector resets the in-frame flag.

use serde::{Deserialize, Serialize};

use crate::apu::Pulse;
use crate::cartridge::{Mirroring, Rom};
use crate::error::StateError;

use super::{Cart, Mapper, MapperState};

/// Where a PRG window points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrgTarget {
    Rom,
    Ram,
}

pub struct Mmc5 {
    cart: Cart,
    exram: [u8; 0x400],

    // $5100-$5107, $5113-$5117, $5120-$5130
    prg_mode: u8,
    chr_mode: u8,
    ram_protect_a: u8,
    ram_protect_b: u8,
    exram_mode: u8,
    nametable_map: [u8; 4],
    fill_tile: u8,
    fill_attr: u8,
    prg_regs: [u8; 5],
    chr_regs: [u16; 12],
    chr_upper: u8,

    // Vertical split ($5200-$5202)
    split_enable: bool,
    split_right: bool,
    split_threshold: u8,
    split_scroll: u8,
    split_bank: u8,
    split_active: bool,

    // Scanline IRQ ($5203-$5204)
    irq_compare: u8,
    irq_enabled: bool,
    irq_pending: bool,
    in_frame: bool,
    scanline_counter: u8,

    // Fetch-pattern observation
    last_nt_addr: u16,
    nt_repeat: u8,
    tile_fetch: u8,
    idle_cycles: u8,
    /// ExRAM attribute byte latched by the last tile fetch (mode 1).
    exattr: u8,

    // PPU snoops
    sprite_size_16: bool,
    rendering_enabled: bool,
    fetching_sprites: bool,

    // Multiplier ($5205-$5206)
    mul_a: u8,
    mul_b: u8,

    // Expansion audio ($5000-$5015)
    pulse1: Pulse,
    pulse2: Pulse,
    pcm_level: u8,
    audio_divider: u16,
    audio_half_clock: bool,
}

/// Full register state, boxed into [`MapperState::Mmc5`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mmc5State {
    pub common: super::CommonState,
    pub exram: Vec<u8>,
    pub prg_mode: u8,
    pub chr_mode: u8,
    pub ram_protect_a: u8,
    pub ram_protect_b: u8,
    pub exram_mode: u8,
    pub nametable_map: [u8; 4],
    pub fill_tile: u8,
    pub fill_attr: u8,
    pub prg_regs: [u8; 5],
    pub chr_regs: [u16; 12],
    pub chr_upper: u8,
    pub split_enable: bool,
    pub split_right: bool,
    pub split_threshold: u8,
    pub split_scroll: u8,
    pub split_bank: u8,
    pub irq_compare: u8,
    pub irq_enabled: bool,
    pub irq_pending: bool,
    pub in_frame: bool,
    pub scanline_counter: u8,
    pub mul_a: u8,
    pub mul_b: u8,
    pub pcm_level: u8,
}

impl Mmc5 {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        let mut cart = Cart::from_rom(rom);
        // MMC5 boards carry up to 64 KiB of PRG-RAM.
        cart.prg_ram = vec![0; 64 * 1024];
        let mut chr_regs = [0u16; 12];
        for (i, reg) in chr_regs.iter_mut().enumerate() {
            *reg = i as u16;
        }
        Self {
            cart,
            exram: [0; 0x400],
            prg_mode: 3,
            chr_mode: 3,
            ram_protect_a: 0,
            ram_protect_b: 0,
            exram_mode: 0,
            nametable_map: [0, 1, 0, 1],
            fill_tile: 0,
            fill_attr: 0,
            prg_regs: [0, 0, 0, 0, 0xFF],
            chr_regs,
            chr_upper: 0,
            split_enable: false,
            split_right: false,
            split_threshold: 0,
            split_scroll: 0,
            split_bank: 0,
            split_active: false,
            irq_compare: 0,
            irq_enabled: false,
            irq_pending: false,
            in_frame: false,
            scanline_counter: 0,
            last_nt_addr: 0,
            nt_repeat: 0,
            tile_fetch: 0,
            idle_cycles: 3,
            exattr: 0,
            sprite_size_16: false,
            rendering_enabled: false,
            fetching_sprites: false,
            mul_a: 0,
            mul_b: 0,
            pulse1: Pulse::new(false),
            pulse2: Pulse::new(false),
            pcm_level: 0,
            audio_divider: 0,
            audio_half_clock: false,
        }
    }

    fn prg_ram_writable(&self) -> bool {
        self.ram_protect_a & 0x03 == 0x02 && self.ram_protect_b & 0x03 == 0x01
    }

    /// Decode a CPU address into (target, 8 KiB bank, offset).
    fn map_prg(&self, addr: u16) -> Option<(PrgTarget, usize, usize)> {
        if (0x6000..=0x7FFF).contains(&addr) {
            return Some((
                PrgTarget::Ram,
                usize::from(self.prg_regs[0] & 0x0F),
                usize::from(addr) - 0x6000,
            ));
        }
        if addr < 0x8000 {
            return None;
        }

        // Each arm yields the register, window size in KiB, offset into
        // the window, and whether the window may select RAM (bit 7 of
        // the register picks ROM). $E000 always maps ROM.
        let a = usize::from(addr);
        let (reg, window_kb, offset, may_ram) = match self.prg_mode & 0x03 {
            0 => (self.prg_regs[4], 32, a - 0x8000, false),
            1 => {
                if addr < 0xC000 {
                    (self.prg_regs[2], 16, a - 0x8000, true)
                } else {
                    (self.prg_regs[4], 16, a - 0xC000, false)
                }
            }
            2 => {
                if addr < 0xC000 {
                    (self.prg_regs[2], 16, a - 0x8000, true)
                } else if addr < 0xE000 {
                    (self.prg_regs[3], 8, a - 0xC000, true)
                } else {
                    (self.prg_regs[4], 8, a - 0xE000, false)
                }
            }
            _ => {
                if addr < 0xA000 {
                    (self.prg_regs[1], 8, a - 0x8000, true)
                } else if addr < 0xC000 {
                    (self.prg_regs[2], 8, a - 0xA000, true)
                } else if addr < 0xE000 {
                    (self.prg_regs[3], 8, a - 0xC000, true)
                } else {
                    (self.prg_regs[4], 8, a - 0xE000, false)
                }
            }
        };

        let target = if may_ram && reg & 0x80 == 0 {
            PrgTarget::Ram
        } else {
            PrgTarget::Rom
        };
        // Convert the window-relative bank to 8 KiB granularity.
        let bank8 = match window_kb {
            8 => usize::from(reg & 0x7F),
            16 => (usize::from(reg & 0x7E)) + ((offset >> 13) & 0x01),
            _ => (usize::from(reg & 0x7C)) + ((offset >> 13) & 0x03),
        };
        Some((target, bank8, offset & 0x1FFF))
    }

    fn prg_rom_read(&self, bank8: usize, offset: usize) -> u8 {
        if self.cart.prg_rom.is_empty() {
            return 0;
        }
        let count = (self.cart.prg_rom.len() / 0x2000).max(1);
        let idx = (bank8 % count) * 0x2000 + offset;
        self.cart.prg_rom[idx % self.cart.prg_rom.len()]
    }

    fn prg_ram_index(&self, bank8: usize, offset: usize) -> usize {
        let count = (self.cart.prg_ram.len() / 0x2000).max(1);
        ((bank8 % count) * 0x2000 + offset) % self.cart.prg_ram.len()
    }

    /// 1 KiB CHR bank for a pattern slot, from set A (sprites) or set B
    /// (background in 8×16 mode).
    fn chr_bank_1k(&self, slot: usize, use_b: bool) -> usize {
        let reg = |i: usize| usize::from(self.chr_regs[i]);
        match self.chr_mode & 0x03 {
            0 => {
                let base = if use_b { reg(11) } else { reg(7) };
                base * 8 + slot
            }
            1 => {
                let r = if use_b {
                    reg(11)
                } else if slot < 4 {
                    reg(3)
                } else {
                    reg(7)
                };
                r * 4 + (slot & 0x03)
            }
            2 => {
                let r = if use_b {
                    if slot & 0x02 == 0 { reg(9) } else { reg(11) }
                } else {
                    match slot {
                        0 | 1 => reg(1),
                        2 | 3 => reg(3),
                        4 | 5 => reg(5),
                        _ => reg(7),
                    }
                };
                r * 2 + (slot & 0x01)
            }
            _ => {
                if use_b {
                    reg(8 + (slot & 0x03))
                } else {
                    reg(slot)
                }
            }
        }
    }

    fn chr_index(&self, addr: u16) -> usize {
        let slot = (usize::from(addr) >> 10) & 0x07;
        let use_b = self.sprite_size_16 && !self.fetching_sprites;
        let bank = self.chr_bank_1k(slot, use_b);
        let count = (self.cart.chr.len() / 0x0400).max(1);
        (bank % count) * 0x0400 + (usize::from(addr) & 0x03FF)
    }

    fn fill_attr_byte(&self) -> u8 {
        let bits = self.fill_attr & 0x03;
        bits | bits << 2 | bits << 4 | bits << 6
    }

    /// Replicate a 2-bit attribute into all four quadrants.
    fn replicate_attr(bits: u8) -> u8 {
        let bits = bits & 0x03;
        bits | bits << 2 | bits << 4 | bits << 6
    }

    fn clock_scanline(&mut self) {
        if !self.in_frame {
            self.in_frame = true;
            self.scanline_counter = 0;
            return;
        }
        self.scanline_counter = self.scanline_counter.wrapping_add(1);
        if self.irq_compare != 0 && self.scanline_counter == self.irq_compare {
            self.irq_pending = true;
        }
    }

    fn leave_frame(&mut self) {
        self.in_frame = false;
        self.scanline_counter = 0;
        self.nt_repeat = 0;
        self.tile_fetch = 0;
        self.split_active = false;
    }

    /// Split-region scanline, with the split's own vertical scroll.
    fn split_y(&self) -> usize {
        (usize::from(self.scanline_counter) + usize::from(self.split_scroll)) % 240
    }

    fn audio_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x5000 => self.pulse1.write_control(value),
            0x5002 => self.pulse1.write_timer_lo(value),
            0x5003 => self.pulse1.write_timer_hi(value),
            0x5004 => self.pulse2.write_control(value),
            0x5006 => self.pulse2.write_timer_lo(value),
            0x5007 => self.pulse2.write_timer_hi(value),
            0x5011 => self.pcm_level = value,
            0x5015 => {
                self.pulse1.set_enabled(value & 0x01 != 0);
                self.pulse2.set_enabled(value & 0x02 != 0);
            }
            _ => {}
        }
    }
}

impl Mapper for Mmc5 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x5015 => {
                let mut status = 0;
                if self.pulse1.length_nonzero() {
                    status |= 0x01;
                }
                if self.pulse2.length_nonzero() {
                    status |= 0x02;
                }
                Some(status)
            }
            0x5204 => {
                let status =
                    u8::from(self.irq_pending) << 7 | u8::from(self.in_frame) << 6;
                self.irq_pending = false;
                Some(status)
            }
            0x5205 => Some((u16::from(self.mul_a) * u16::from(self.mul_b)) as u8),
            0x5206 => Some(((u16::from(self.mul_a) * u16::from(self.mul_b)) >> 8) as u8),
            0x5C00..=0x5FFF => {
                // ExRAM reads back only in RAM modes 2 and 3.
                (self.exram_mode >= 2).then(|| self.exram[usize::from(addr) - 0x5C00])
            }
            0xFFFA | 0xFFFB => {
                // NMI vector fetch ends the frame.
                self.leave_frame();
                let (_, bank, offset) = self.map_prg(addr)?;
                Some(self.prg_rom_read(bank, offset))
            }
            _ => {
                let (target, bank, offset) = self.map_prg(addr)?;
                Some(match target {
                    PrgTarget::Rom => self.prg_rom_read(bank, offset),
                    PrgTarget::Ram => self.cart.prg_ram[self.prg_ram_index(bank, offset)],
                })
            }
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x5000..=0x5015 => self.audio_write(addr, value),
            0x5100 => self.prg_mode = value & 0x03,
            0x5101 => self.chr_mode = value & 0x03,
            0x5102 => self.ram_protect_a = value,
            0x5103 => self.ram_protect_b = value,
            0x5104 => self.exram_mode = value & 0x03,
            0x5105 => {
                for (i, slot) in self.nametable_map.iter_mut().enumerate() {
                    *slot = (value >> (i * 2)) & 0x03;
                }
            }
            0x5106 => self.fill_tile = value,
            0x5107 => self.fill_attr = value & 0x03,
            0x5113..=0x5117 => {
                self.prg_regs[usize::from(addr) - 0x5113] = value;
            }
            0x5120..=0x512B => {
                let idx = usize::from(addr) - 0x5120;
                self.chr_regs[idx] = u16::from(self.chr_upper) << 8 | u16::from(value);
            }
            0x5130 => self.chr_upper = value & 0x03,
            0x5200 => {
                self.split_enable = value & 0x80 != 0;
                self.split_right = value & 0x40 != 0;
                self.split_threshold = value & 0x1F;
            }
            0x5201 => self.split_scroll = value,
            0x5202 => self.split_bank = value,
            0x5203 => self.irq_compare = value,
            0x5204 => self.irq_enabled = value & 0x80 != 0,
            0x5205 => self.mul_a = value,
            0x5206 => self.mul_b = value,
            0x5C00..=0x5FFF => {
                // Mode 3 is read-only; modes 0/1 accept writes (they feed
                // the nametable/attribute paths), mode 2 is plain RAM.
                if self.exram_mode != 3 {
                    self.exram[usize::from(addr) - 0x5C00] = value;
                }
            }
            0x6000..=0xFFFF => {
                if !self.prg_ram_writable() {
                    return;
                }
                if let Some((PrgTarget::Ram, bank, offset)) = self.map_prg(addr) {
                    let idx = self.prg_ram_index(bank, offset);
                    self.cart.prg_ram[idx] = value;
                }
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.idle_cycles = 0;
        if self.split_active && !self.fetching_sprites {
            // Pattern fetch inside the split region: the split's 4 KiB
            // bank, with the split's own fine Y in the low bits.
            let base = usize::from(self.split_bank) * 0x1000;
            let idx = (base + (usize::from(addr) & 0x0FF8)) | (self.split_y() & 0x07);
            return self.cart.chr[idx % self.cart.chr.len().max(1)];
        }
        if self.exram_mode == 1 && !self.fetching_sprites {
            // Extended attributes: the latched ExRAM byte selects a 4 KiB
            // bank for this tile.
            let bank = (usize::from(self.exattr & 0x3F)
                | usize::from(self.chr_upper) << 6)
                * 0x1000;
            let idx = bank + (usize::from(addr) & 0x0FFF);
            return self.cart.chr[idx % self.cart.chr.len().max(1)];
        }
        let idx = self.chr_index(addr);
        self.cart.chr[idx % self.cart.chr.len().max(1)]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if self.cart.chr_is_ram {
            let idx = self.chr_index(addr) % self.cart.chr.len().max(1);
            self.cart.chr[idx] = value;
        }
    }

    fn mirroring(&self) -> Mirroring {
        // Nametable routing happens in `nametable_read`/`nametable_write`.
        Mirroring::FourScreen
    }

    fn nametable_read(&mut self, addr: u16, vram: &[u8; 4096]) -> Option<u8> {
        self.idle_cycles = 0;
        let offset = usize::from(addr) & 0x03FF;
        let table = (usize::from(addr) >> 10) & 0x03;
        let is_attr = offset >= 0x3C0;

        // Scanline detection (three consecutive fetches of one address)
        // and the tile-column counter the split renderer needs. For an
        // attribute fetch the current column is the one just fetched.
        let mut tile_col = self.tile_fetch.saturating_sub(1);
        if !is_attr {
            if addr == self.last_nt_addr {
                self.nt_repeat += 1;
                if self.nt_repeat == 2 {
                    self.clock_scanline();
                    self.tile_fetch = 0;
                }
                tile_col = 0;
            } else {
                self.last_nt_addr = addr;
                self.nt_repeat = 0;
                tile_col = self.tile_fetch;
                self.tile_fetch = self.tile_fetch.wrapping_add(1);
            }
        }

        // Vertical split handling (only meaningful for background).
        if self.split_enable && self.exram_mode < 2 && !self.fetching_sprites {
            let tile_col = tile_col.min(33);
            let in_region = if self.split_right {
                tile_col >= self.split_threshold
            } else {
                tile_col < self.split_threshold
            };
            self.split_active = in_region;
            if in_region {
                let y = self.split_y();
                let row = y / 8;
                let col = usize::from(tile_col);
                return Some(if is_attr {
                    // The attribute table only spans 32 tile columns; the
                    // two prefetch columns wrap.
                    let col = col & 0x1F;
                    let attr = self.exram[0x3C0 + (row / 4) * 8 + col / 4];
                    let shift = ((row & 0x02) << 1) | (col & 0x02);
                    Self::replicate_attr(attr >> shift)
                } else {
                    self.exram[row * 32 + (col & 0x1F)]
                });
            }
        }

        // Extended attributes substitute the attribute fetch and latch
        // the per-tile byte on the name fetch.
        if self.exram_mode == 1 && !self.fetching_sprites {
            if is_attr {
                return Some(Self::replicate_attr(self.exattr >> 6));
            }
            self.exattr = self.exram[offset];
        }

        Some(match self.nametable_map[table] {
            0 => vram[offset],
            1 => vram[0x400 + offset],
            2 => {
                if self.exram_mode < 2 {
                    self.exram[offset]
                } else {
                    0
                }
            }
            _ => {
                if is_attr {
                    self.fill_attr_byte()
                } else {
                    self.fill_tile
                }
            }
        })
    }

    fn nametable_write(&mut self, addr: u16, value: u8, vram: &mut [u8; 4096]) -> bool {
        let offset = usize::from(addr) & 0x03FF;
        let table = (usize::from(addr) >> 10) & 0x03;
        match self.nametable_map[table] {
            0 => vram[offset] = value,
            1 => vram[0x400 + offset] = value,
            2 => {
                if self.exram_mode != 3 {
                    self.exram[offset] = value;
                }
            }
            _ => {}
        }
        true
    }

    fn ppu_ctrl_write(&mut self, value: u8) {
        self.sprite_size_16 = value & 0x20 != 0;
    }

    fn ppu_mask_write(&mut self, value: u8) {
        self.rendering_enabled = value & 0x18 != 0;
        if !self.rendering_enabled {
            self.leave_frame();
        }
    }

    fn sprite_fetch(&mut self, active: bool) {
        self.fetching_sprites = active;
        if active {
            self.split_active = false;
        }
    }

    fn on_cpu_cycle(&mut self) {
        // The PPU stops fetching outside rendering; a few idle CPU
        // cycles mean the frame ended.
        self.idle_cycles = self.idle_cycles.saturating_add(1);
        if self.idle_cycles >= 3 && self.in_frame {
            self.leave_frame();
        }

        // Expansion audio: timers at CPU/2, sequencer at ~240 Hz.
        self.audio_half_clock = !self.audio_half_clock;
        if self.audio_half_clock {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
        }
        self.audio_divider += 1;
        if self.audio_divider >= 7457 {
            self.audio_divider = 0;
            self.pulse1.clock_envelope();
            self.pulse2.clock_envelope();
            self.pulse1.clock_length();
            self.pulse2.clock_length();
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending && self.irq_enabled
    }

    fn audio_output(&self) -> f32 {
        let pulses = f32::from(self.pulse1.output() + self.pulse2.output());
        pulses * 0.00752 + f32::from(self.pcm_level) * 0.002
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.cart.battery_slice()
    }

    fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.cart.load_battery(bytes);
    }

    fn save_state(&self) -> MapperState {
        MapperState::Mmc5(Box::new(Mmc5State {
            common: self.cart.common_state(),
            exram: self.exram.to_vec(),
            prg_mode: self.prg_mode,
            chr_mode: self.chr_mode,
            ram_protect_a: self.ram_protect_a,
            ram_protect_b: self.ram_protect_b,
            exram_mode: self.exram_mode,
            nametable_map: self.nametable_map,
            fill_tile: self.fill_tile,
            fill_attr: self.fill_attr,
            prg_regs: self.prg_regs,
            chr_regs: self.chr_regs,
            chr_upper: self.chr_upper,
            split_enable: self.split_enable,
            split_right: self.split_right,
            split_threshold: self.split_threshold,
            split_scroll: self.split_scroll,
            split_bank: self.split_bank,
            irq_compare: self.irq_compare,
            irq_enabled: self.irq_enabled,
            irq_pending: self.irq_pending,
            in_frame: self.in_frame,
            scanline_counter: self.scanline_counter,
            mul_a: self.mul_a,
            mul_b: self.mul_b,
            pcm_level: self.pcm_level,
        }))
    }

    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError> {
        let MapperState::Mmc5(s) = state else {
            return Err(StateError::MapperMismatch);
        };
        self.cart.load_common(&s.common);
        if s.exram.len() == self.exram.len() {
            self.exram.copy_from_slice(&s.exram);
        }
        self.prg_mode = s.prg_mode;
        self.chr_mode = s.chr_mode;
        self.ram_protect_a = s.ram_protect_a;
        self.ram_protect_b = s.ram_protect_b;
        self.exram_mode = s.exram_mode;
        self.nametable_map = s.nametable_map;
        self.fill_tile = s.fill_tile;
        self.fill_attr = s.fill_attr;
        self.prg_regs = s.prg_regs;
        self.chr_regs = s.chr_regs;
        self.chr_upper = s.chr_upper;
        self.split_enable = s.split_enable;
        self.split_right = s.split_right;
        self.split_threshold = s.split_threshold;
        self.split_scroll = s.split_scroll;
        self.split_bank = s.split_bank;
        self.irq_compare = s.irq_compare;
        self.irq_enabled = s.irq_enabled;
        self.irq_pending = s.irq_pending;
        self.in_frame = s.in_frame;
        self.scanline_counter = s.scanline_counter;
        self.mul_a = s.mul_a;
        self.mul_b = s.mul_b;
        self.pcm_level = s.pcm_level;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::test_rom;

    fn mmc5() -> Mmc5 {
        let mut data = test_rom::build(8, 8, 0);
        data[7] = 0x00;
        data[6] = 0x50; // mapper 5 low nibble
        Mmc5::new(Rom::parse(&data).expect("parse"))
    }

    #[test]
    fn multiplier_is_unsigned_16bit() {
        let mut m = mmc5();
        m.cpu_write(0x5205, 0xFF);
        m.cpu_write(0x5206, 0xFF);
        assert_eq!(m.cpu_read(0x5205), Some(0x01)); // $FE01 low
        assert_eq!(m.cpu_read(0x5206), Some(0xFE)); // $FE01 high

        m.cpu_write(0x5205, 12);
        m.cpu_write(0x5206, 34);
        assert_eq!(m.cpu_read(0x5205), Some((12 * 34u16) as u8));
        assert_eq!(m.cpu_read(0x5206), Some(0));
    }

    #[test]
    fn prg_mode_3_eight_k_windows() {
        let mut data = test_rom::build(8, 8, 0);
        data[6] = 0x50;
        data[16 + 5 * 0x2000] = 0x55;
        let mut m = Mmc5::new(Rom::parse(&data).unwrap());
        m.cpu_write(0x5100, 3);
        m.cpu_write(0x5114, 0x85); // $8000 window: ROM bank 5
        assert_eq!(m.cpu_read(0x8000), Some(0x55));
    }

    #[test]
    fn prg_window_can_map_ram() {
        let mut m = mmc5();
        m.cpu_write(0x5100, 3);
        m.cpu_write(0x5102, 0x02);
        m.cpu_write(0x5103, 0x01); // unlock RAM writes
        m.cpu_write(0x5114, 0x00); // $8000 window: RAM bank 0
        m.cpu_write(0x8000, 0xAB);
        assert_eq!(m.cpu_read(0x8000), Some(0xAB));
        // The $6000 window shares the RAM.
        m.cpu_write(0x5113, 0x00);
        assert_eq!(m.cpu_read(0x6000), Some(0xAB));
    }

    #[test]
    fn prg_ram_protect_requires_both_keys() {
        let mut m = mmc5();
        m.cpu_write(0x5113, 0);
        m.cpu_write(0x6000, 0x11); // protected at power-on
        assert_eq!(m.cpu_read(0x6000), Some(0x00));
        m.cpu_write(0x5102, 0x02);
        m.cpu_write(0x5103, 0x01);
        m.cpu_write(0x6000, 0x22);
        assert_eq!(m.cpu_read(0x6000), Some(0x22));
    }

    #[test]
    fn exram_cpu_access_by_mode() {
        let mut m = mmc5();
        m.cpu_write(0x5104, 0); // mode 0: write-only from the CPU
        m.cpu_write(0x5C00, 0x5A);
        assert_eq!(m.cpu_read(0x5C00), None, "mode 0 reads float");
        m.cpu_write(0x5104, 2); // mode 2: RW RAM
        assert_eq!(m.cpu_read(0x5C00), Some(0x5A));
        m.cpu_write(0x5104, 3); // mode 3: read-only
        m.cpu_write(0x5C00, 0xFF);
        assert_eq!(m.cpu_read(0x5C00), Some(0x5A));
    }

    #[test]
    fn fill_mode_nametable() {
        let mut m = mmc5();
        let vram = [0u8; 4096];
        m.cpu_write(0x5105, 0xFF); // all four tables -> fill mode
        m.cpu_write(0x5106, 0x42);
        m.cpu_write(0x5107, 0x03);
        assert_eq!(m.nametable_read(0x2000, &vram), Some(0x42));
        assert_eq!(m.nametable_read(0x23C0, &vram), Some(0xFF));
    }

    #[test]
    fn exram_nametable_mode() {
        let mut m = mmc5();
        m.cpu_write(0x5105, 0x02); // table 0 -> ExRAM
        m.cpu_write(0x5C05, 0x77);
        let vram = [0u8; 4096];
        assert_eq!(m.nametable_read(0x2005, &vram), Some(0x77));
        // ExRAM as nametable reads zero in RAM modes.
        m.cpu_write(0x5104, 2);
        assert_eq!(m.nametable_read(0x2005, &vram), Some(0x00));
    }

    #[test]
    fn scanline_detector_and_irq() {
        let mut m = mmc5();
        m.cpu_write(0x5203, 2); // compare line 2
        m.cpu_write(0x5204, 0x80); // enable
        let vram = [0u8; 4096];

        // Three identical fetches mark a scanline; the first one only
        // raises the in-frame flag.
        let mut fetch_line = |m: &mut Mmc5, addr: u16| {
            for _ in 0..3 {
                let _ = m.nametable_read(addr, &vram);
            }
        };
        fetch_line(&mut m, 0x2042); // enter frame (line 0)
        assert!(!m.irq_pending());
        fetch_line(&mut m, 0x2043); // line 1
        fetch_line(&mut m, 0x2044); // line 2 -> IRQ
        assert!(m.irq_pending());

        // $5204 read reports and acknowledges.
        let status = m.cpu_read(0x5204).unwrap();
        assert_eq!(status & 0xC0, 0xC0);
        assert!(!m.irq_pending());
    }

    #[test]
    fn nmi_vector_read_leaves_frame() {
        let mut m = mmc5();
        let vram = [0u8; 4096];
        for _ in 0..3 {
            let _ = m.nametable_read(0x2042, &vram);
        }
        assert_eq!(m.cpu_read(0x5204).map(|s| s & 0x40), Some(0x40));
        let _ = m.cpu_read(0xFFFA);
        assert_eq!(m.cpu_read(0x5204).map(|s| s & 0x40), Some(0x00));
    }

    #[test]
    fn sprite_and_bg_bank_sets_in_8x16() {
        let mut data = test_rom::build(8, 8, 0);
        data[6] = 0x50;
        let prg_size = 8 * 16384;
        data[16 + prg_size + 2 * 0x0400] = 0xA2; // 1 KiB bank 2 (set A)
        data[16 + prg_size + 9 * 0x0400] = 0xB9; // 1 KiB bank 9 (set B)
        let mut m = Mmc5::new(Rom::parse(&data).unwrap());

        m.cpu_write(0x5101, 3); // 1 KiB mode
        m.cpu_write(0x5120, 2); // set A slot 0 -> bank 2
        m.cpu_write(0x5128, 9); // set B slot 0 -> bank 9
        m.ppu_ctrl_write(0x20); // 8x16 sprites

        m.sprite_fetch(true);
        assert_eq!(m.ppu_read(0x0000), 0xA2);
        m.sprite_fetch(false);
        assert_eq!(m.ppu_read(0x0000), 0xB9);

        // In 8x8 mode everything uses set A.
        m.ppu_ctrl_write(0x00);
        assert_eq!(m.ppu_read(0x0000), 0xA2);
    }

    #[test]
    fn vertical_split_serves_exram_tiles() {
        let mut m = mmc5();
        m.cpu_write(0x5200, 0x88); // enable, left side, threshold 8 tiles
        m.cpu_write(0x5201, 0); // no extra scroll
        m.cpu_write(0x5C00, 0x31); // ExRAM tile (0,0)
        let vram = [0u8; 4096];

        // Start a scanline (three identical fetches), then fetch tile 0.
        for _ in 0..3 {
            let _ = m.nametable_read(0x2ABC, &vram);
        }
        let v = m.nametable_read(0x2000, &vram);
        assert_eq!(v, Some(0x31), "tile 0 comes from ExRAM in the split");
    }
}
