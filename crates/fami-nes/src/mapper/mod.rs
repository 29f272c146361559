//! Cartridge mapper framework.
//!
//! Each board implements [`Mapper`]: address translation for both buses,
//! mirroring, and the optional hooks (A12-clocked IRQ counters, CPU-cycle
//! counters, nametable overrides, expansion audio). The framework
//! provides the PRG/CHR page maps every banking scheme switches into.
//!
//! Boards: NROM (0), MMC1 (1), UxROM (2), CNROM (3), MMC3/MMC6 (4),
//! MMC5 (5), AxROM (7), MMC2 (9), Color Dreams (11), VRC4 (21/23/25),
//! BNROM/NINA-001 (34), GxROM (66), FME-7 (69), NINA-03/06 (79),
//! DxROM (206).

mod fme7;
mod mmc1;
mod mmc2;
mod mmc3;
mod mmc5;
mod simple;
mod vrc4;

pub use fme7::Fme7;
pub use mmc1::Mmc1;
pub use mmc2::Mmc2;
pub use mmc3::{Mmc3, Mmc3Kind};
pub use mmc5::Mmc5;
pub use simple::{Axrom, BnromNina, Cnrom, ColorDreams, Gxrom, Nina03, Nrom, Uxrom};
pub use vrc4::{Vrc4, Vrc4Variant};

use serde::{Deserialize, Serialize};

use crate::cartridge::{Mirroring, Rom};
use crate::error::{RomError, StateError};

/// A cartridge board.
///
/// `cpu_read` returns `None` when the cartridge does not drive the bus;
/// the caller substitutes the open-bus latch.
pub trait Mapper: Send {
    fn cpu_read(&mut self, addr: u16) -> Option<u8>;
    fn cpu_write(&mut self, addr: u16, value: u8);
    /// Pattern-table space ($0000-$1FFF).
    fn ppu_read(&mut self, addr: u16) -> u8;
    fn ppu_write(&mut self, addr: u16, value: u8);
    fn mirroring(&self) -> Mirroring;

    /// Filtered rising edge of PPU address bit 12 (MMC3-style clocks).
    fn on_a12_rising(&mut self) {}
    /// One CPU cycle elapsed (cycle-counted IRQs, expansion audio).
    fn on_cpu_cycle(&mut self) {}
    /// Level of the cartridge IRQ line.
    fn irq_pending(&self) -> bool {
        false
    }

    /// Intercept a nametable fetch ($2000-$2FFF after mirroring down).
    /// `None` falls through to the PPU's own mirroring of `vram`.
    fn nametable_read(&mut self, _addr: u16, _vram: &[u8; 4096]) -> Option<u8> {
        None
    }
    /// Intercept a nametable write. Returns true when handled.
    fn nametable_write(&mut self, _addr: u16, _value: u8, _vram: &mut [u8; 4096]) -> bool {
        false
    }

    /// Bus snoop of PPUCTRL writes (MMC5 watches sprite size).
    fn ppu_ctrl_write(&mut self, _value: u8) {}
    /// Bus snoop of PPUMASK writes (MMC5 watches rendering enable).
    fn ppu_mask_write(&mut self, _value: u8) {}
    /// The PPU is about to fetch sprite patterns (true) or background
    /// patterns (false). MMC5 banks sprites and background separately in
    /// 8×16 mode.
    fn sprite_fetch(&mut self, _active: bool) {}

    /// Expansion audio level, mixed into the APU output.
    fn audio_output(&self) -> f32 {
        0.0
    }

    /// Soft reset. Most boards keep their registers (MMC3 does); boards
    /// that clear state on reset override this.
    fn reset(&mut self) {}

    /// Battery-backed PRG-RAM contents, if this board persists them.
    fn battery_ram(&self) -> Option<&[u8]> {
        None
    }
    /// Restore battery-backed PRG-RAM.
    fn load_battery_ram(&mut self, _bytes: &[u8]) {}

    fn save_state(&self) -> MapperState;
    fn restore_state(&mut self, state: &MapperState) -> Result<(), StateError>;
}

/// Build the board for a parsed ROM.
///
/// # Errors
///
/// Returns [`RomError::UnsupportedMapper`] for mapper numbers outside
/// the implemented set.
pub fn create(rom: Rom) -> Result<Box<dyn Mapper>, RomError> {
    let id = rom.mapper_id;
    Ok(match id {
        0 => Box::new(Nrom::new(rom)),
        1 => Box::new(Mmc1::new(rom)),
        2 => Box::new(Uxrom::new(rom)),
        3 => Box::new(Cnrom::new(rom)),
        4 => Box::new(Mmc3::new(rom, Mmc3Kind::Mmc3)),
        5 => Box::new(Mmc5::new(rom)),
        7 => Box::new(Axrom::new(rom)),
        9 => Box::new(Mmc2::new(rom)),
        11 => Box::new(ColorDreams::new(rom)),
        21 => Box::new(Vrc4::new(rom, Vrc4Variant::A)),
        23 => Box::new(Vrc4::new(rom, Vrc4Variant::E)),
        25 => Box::new(Vrc4::new(rom, Vrc4Variant::B)),
        34 => Box::new(BnromNina::new(rom)),
        66 => Box::new(Gxrom::new(rom)),
        69 => Box::new(Fme7::new(rom)),
        79 => Box::new(Nina03::new(rom)),
        206 => Box::new(Mmc3::new(rom, Mmc3Kind::Dxrom)),
        n => return Err(RomError::UnsupportedMapper(n)),
    })
}

// ---------------------------------------------------------------------------
// Page maps
// ---------------------------------------------------------------------------

/// CPU $8000-$FFFF as four 8 KiB slots into linear PRG ROM.
///
/// Banks are taken modulo the available ROM, so undersized carts mirror
/// instead of indexing out of range. Negative bank numbers count from
/// the end (-1 is the last bank).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrgMap {
    offsets: [usize; 4],
}

impl PrgMap {
    #[must_use]
    pub fn new() -> Self {
        Self { offsets: [0; 4] }
    }

    pub fn set_8k(&mut self, slot: usize, bank: i32, prg_len: usize) {
        let count = (prg_len / 0x2000).max(1) as i32;
        let bank = bank.rem_euclid(count) as usize;
        self.offsets[slot] = bank * 0x2000;
    }

    pub fn set_16k(&mut self, half: usize, bank: i32, prg_len: usize) {
        let count = (prg_len / 0x4000).max(1) as i32;
        let bank = bank.rem_euclid(count) as usize;
        self.offsets[half * 2] = bank * 0x4000;
        self.offsets[half * 2 + 1] = bank * 0x4000 + 0x2000;
    }

    pub fn set_32k(&mut self, bank: i32, prg_len: usize) {
        let count = (prg_len / 0x8000).max(1) as i32;
        let bank = bank.rem_euclid(count) as usize;
        for slot in 0..4 {
            self.offsets[slot] = bank * 0x8000 + slot * 0x2000;
        }
    }

    /// Read through the map. `addr` must be in $8000-$FFFF. Reads from
    /// a ROM with no PRG at all yield 0 rather than faulting.
    #[must_use]
    pub fn read(&self, prg: &[u8], addr: u16) -> u8 {
        if prg.is_empty() {
            return 0;
        }
        let slot = (usize::from(addr) - 0x8000) / 0x2000;
        let idx = self.offsets[slot] + (usize::from(addr) & 0x1FFF);
        prg[idx % prg.len()]
    }
}

impl Default for PrgMap {
    fn default() -> Self {
        Self::new()
    }
}

/// PPU $0000-$1FFF as eight 1 KiB slots into linear CHR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChrMap {
    offsets: [usize; 8],
}

impl ChrMap {
    #[must_use]
    pub fn new() -> Self {
        let mut map = Self { offsets: [0; 8] };
        map.set_8k(0, 0x2000);
        map
    }

    pub fn set_1k(&mut self, slot: usize, bank: i32, chr_len: usize) {
        let count = (chr_len / 0x0400).max(1) as i32;
        let bank = bank.rem_euclid(count) as usize;
        self.offsets[slot] = bank * 0x0400;
    }

    pub fn set_2k(&mut self, pair: usize, bank: i32, chr_len: usize) {
        let count = (chr_len / 0x0800).max(1) as i32;
        let bank = bank.rem_euclid(count) as usize;
        self.offsets[pair * 2] = bank * 0x0800;
        self.offsets[pair * 2 + 1] = bank * 0x0800 + 0x0400;
    }

    pub fn set_4k(&mut self, half: usize, bank: i32, chr_len: usize) {
        let count = (chr_len / 0x1000).max(1) as i32;
        let bank = bank.rem_euclid(count) as usize;
        for i in 0..4 {
            self.offsets[half * 4 + i] = bank * 0x1000 + i * 0x0400;
        }
    }

    pub fn set_8k(&mut self, bank: i32, chr_len: usize) {
        let count = (chr_len / 0x2000).max(1) as i32;
        let bank = bank.rem_euclid(count) as usize;
        for (i, slot) in self.offsets.iter_mut().enumerate() {
            *slot = bank * 0x2000 + i * 0x0400;
        }
    }

    /// Linear CHR index for a pattern-space address.
    #[must_use]
    pub fn index(&self, addr: u16) -> usize {
        let slot = (usize::from(addr) >> 10) & 0x07;
        self.offsets[slot] + (usize::from(addr) & 0x03FF)
    }

    #[must_use]
    pub fn read(&self, chr: &[u8], addr: u16) -> u8 {
        if chr.is_empty() {
            return 0;
        }
        chr[self.index(addr) % chr.len()]
    }
}

impl Default for ChrMap {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Shared cartridge storage
// ---------------------------------------------------------------------------

/// ROM/RAM storage every board owns: linear PRG ROM, CHR (ROM or RAM),
/// and 8 KiB of PRG-RAM at $6000-$7FFF.
#[derive(Debug, Clone)]
pub struct Cart {
    pub prg_rom: Vec<u8>,
    pub chr: Vec<u8>,
    pub chr_is_ram: bool,
    pub prg_ram: Vec<u8>,
    pub has_battery: bool,
}

impl Cart {
    #[must_use]
    pub fn from_rom(rom: Rom) -> Self {
        Self {
            prg_rom: rom.prg_rom,
            chr: rom.chr,
            chr_is_ram: rom.chr_is_ram,
            prg_ram: vec![0; 8 * 1024],
            has_battery: rom.has_battery,
        }
    }

    #[must_use]
    pub fn prg_ram_read(&self, addr: u16) -> u8 {
        self.prg_ram[(usize::from(addr) - 0x6000) % self.prg_ram.len()]
    }

    pub fn prg_ram_write(&mut self, addr: u16, value: u8) {
        let len = self.prg_ram.len();
        self.prg_ram[(usize::from(addr) - 0x6000) % len] = value;
    }

    #[must_use]
    pub fn chr_read(&self, map: &ChrMap, addr: u16) -> u8 {
        map.read(&self.chr, addr)
    }

    pub fn chr_write(&mut self, map: &ChrMap, addr: u16, value: u8) {
        if self.chr_is_ram {
            let len = self.chr.len();
            let idx = map.index(addr) % len.max(1);
            self.chr[idx] = value;
        } else {
            log::debug!("dropped write to CHR ROM at ${addr:04X}");
        }
    }

    #[must_use]
    pub fn common_state(&self) -> CommonState {
        CommonState {
            prg_ram: self.prg_ram.clone(),
            chr_ram: self.chr_is_ram.then(|| self.chr.clone()),
        }
    }

    pub fn load_common(&mut self, common: &CommonState) {
        if common.prg_ram.len() == self.prg_ram.len() {
            self.prg_ram.copy_from_slice(&common.prg_ram);
        }
        if let Some(chr) = &common.chr_ram {
            if self.chr_is_ram && chr.len() == self.chr.len() {
                self.chr.copy_from_slice(chr);
            }
        }
    }

    #[must_use]
    pub fn battery_slice(&self) -> Option<&[u8]> {
        self.has_battery.then_some(self.prg_ram.as_slice())
    }

    pub fn load_battery(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.prg_ram.len());
        self.prg_ram[..n].copy_from_slice(&bytes[..n]);
    }
}

// ---------------------------------------------------------------------------
// Serializable state
// ---------------------------------------------------------------------------

/// RAM shared by every board: PRG-RAM plus CHR contents when writable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonState {
    pub prg_ram: Vec<u8>,
    pub chr_ram: Option<Vec<u8>>,
}

/// Per-board register state, gathered into one serializable enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MapperState {
    /// NROM, UxROM, CNROM, AxROM, Color Dreams, BNROM/NINA-001, GxROM,
    /// NINA-03: at most two bank registers plus a mirroring latch.
    Simple {
        common: CommonState,
        regs: [u8; 4],
        mirroring: Mirroring,
    },
    Mmc1 {
        common: CommonState,
        shift: u8,
        write_count: u8,
        control: u8,
        chr_bank0: u8,
        chr_bank1: u8,
        prg_bank: u8,
    },
    Mmc2 {
        common: CommonState,
        prg_bank: u8,
        chr_fd: [u8; 2],
        chr_fe: [u8; 2],
        latch_fe: [bool; 2],
        mirroring: Mirroring,
    },
    Mmc3 {
        common: CommonState,
        bank_select: u8,
        bank_regs: [u8; 8],
        mirroring: Mirroring,
        irq_latch: u8,
        irq_counter: u8,
        irq_reload: bool,
        irq_enabled: bool,
        irq_pending: bool,
        ram_protect: u8,
    },
    Mmc5(Box<mmc5::Mmc5State>),
    Fme7 {
        common: CommonState,
        command: u8,
        prg_banks: [u8; 4],
        chr_banks: [u8; 8],
        mirroring: Mirroring,
        ram_at_6000: bool,
        ram_enable: bool,
        irq_counter: u16,
        irq_enabled: bool,
        irq_counter_enabled: bool,
        irq_pending: bool,
    },
    Vrc4 {
        common: CommonState,
        prg_banks: [u8; 2],
        swap_mode: bool,
        chr_banks: [u16; 8],
        mirroring: Mirroring,
        irq_latch: u8,
        irq_counter: u8,
        irq_control: u8,
        irq_pending: bool,
        irq_prescaler: i16,
    },
}
