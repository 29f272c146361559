//! The CPU bus: address routing and subordinate-chip catch-up.
//!
//! Memory map: $0000-$1FFF work RAM (2 KiB, mirrored), $2000-$3FFF PPU
//! registers (mirrored every 8), $4000-$4017 APU and I/O, $4020-$FFFF
//! cartridge.
//!
//! Timing: every bus access is one CPU cycle, and `clock()` runs first,
//! advancing the PPU (3 dots per cycle NTSC, 16/5 PAL), the APU and the
//! mapper. A CPU read at cycle T therefore observes the PPU at its
//! cycle 3T, which is the catch-up guarantee the rest of the machine
//! relies on; the owed-cycle balance never exceeds one access.
//!
//! Open bus: the latch updates on every driven transfer, and any read
//! from a region nothing drives (disabled PRG-RAM, write-only registers,
//! the $4018-$401F hole) returns it.

use serde::{Deserialize, Serialize};

use fami_core::Bus;

use crate::apu::Apu;
use crate::config::NesConfig;
use crate::controller::{Controller, Zapper};
use crate::mapper::Mapper;
use crate::ppu::Ppu;

/// Serializable bus state (everything outside the sub-components).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusState {
    pub ram: Vec<u8>,
    pub open_bus: u8,
    pub cycles: u64,
    pub dot_remainder: u32,
    pub controllers: [Controller; 2],
    pub zapper: Option<Zapper>,
}

/// The NES CPU bus.
pub struct NesBus {
    /// 2 KiB work RAM, mirrored through $1FFF.
    pub ram: [u8; 2048],
    pub ppu: Ppu,
    pub apu: Apu,
    pub mapper: Box<dyn Mapper>,
    pub controller1: Controller,
    pub controller2: Controller,
    pub zapper: Option<Zapper>,

    /// Last byte driven on the bus.
    open_bus: u8,
    /// CPU cycles elapsed since power-on.
    cycles: u64,
    /// PPU dots per CPU cycle, as a ratio (3/1 NTSC, 16/5 PAL).
    dots_num: u32,
    dots_den: u32,
    dot_remainder: u32,
    /// OAM DMA stall owed to the CPU after a $4014 write.
    pending_dma_stall: Option<u32>,
}

impl NesBus {
    #[must_use]
    pub fn new(mapper: Box<dyn Mapper>, config: &NesConfig) -> Self {
        let (dots_num, dots_den) = config.region.dots_per_cpu_cycle();
        let mut ram = [0u8; 2048];
        config.ram_init.fill(&mut ram);
        Self {
            ram,
            ppu: Ppu::new(config.region.pre_render_line()),
            apu: Apu::new(config.region, config.sample_rate),
            mapper,
            controller1: Controller::new(),
            controller2: Controller::new(),
            zapper: config.zapper.then(Zapper::new),
            open_bus: 0,
            cycles: 0,
            dots_num,
            dots_den,
            dot_remainder: 0,
            pending_dma_stall: None,
        }
    }

    /// Advance subordinate hardware by `cpu_cycles`.
    fn clock(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            self.cycles += 1;
            self.dot_remainder += self.dots_num;
            while self.dot_remainder >= self.dots_den {
                self.dot_remainder -= self.dots_den;
                self.ppu.tick(self.mapper.as_mut());
            }
            let external = self.mapper.audio_output();
            self.apu.tick(external);
            self.mapper.on_cpu_cycle();
        }
    }

    /// Level of the combined IRQ line (APU frame, DMC, cartridge).
    #[must_use]
    pub fn irq_line(&self) -> bool {
        self.apu.irq_pending() || self.mapper.irq_pending()
    }

    /// Take the stall owed for a just-triggered OAM DMA.
    pub fn take_dma_stall(&mut self) -> Option<u32> {
        self.pending_dma_stall.take()
    }

    /// CPU cycles elapsed since power-on.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Read without clocking or side effects (DMA sources, debuggers).
    pub fn peek(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr) & 0x07FF],
            0x4020..=0xFFFF => self.mapper.cpu_read(addr).unwrap_or(self.open_bus),
            // PPU/APU registers have read side effects; a peek floats.
            _ => self.open_bus,
        }
    }

    /// OAM DMA: copy a 256-byte page into OAM and owe the CPU its stall
    /// (513 cycles, 514 when triggered on an odd cycle).
    fn oam_dma(&mut self, page: u8) {
        let base = u16::from(page) << 8;
        for i in 0..=255u8 {
            let value = self.peek(base | u16::from(i));
            self.ppu.dma_write_oam(i, value);
        }
        let parity = (self.cycles & 1) as u32;
        self.pending_dma_stall = Some(513 + parity);
    }

    /// Capture bus-level state.
    #[must_use]
    pub(crate) fn save_state(&self) -> BusState {
        BusState {
            ram: self.ram.to_vec(),
            open_bus: self.open_bus,
            cycles: self.cycles,
            dot_remainder: self.dot_remainder,
            controllers: [self.controller1.clone(), self.controller2.clone()],
            zapper: self.zapper.clone(),
        }
    }

    /// Restore bus-level state.
    pub(crate) fn load_state(&mut self, s: &BusState) {
        if s.ram.len() == 2048 {
            self.ram.copy_from_slice(&s.ram);
        }
        self.open_bus = s.open_bus;
        self.cycles = s.cycles;
        self.dot_remainder = s.dot_remainder;
        self.controller1 = s.controllers[0].clone();
        self.controller2 = s.controllers[1].clone();
        self.zapper = s.zapper.clone();
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.clock(1);
        let value = match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr) & 0x07FF],
            0x2000..=0x3FFF => {
                self.ppu
                    .cpu_read(addr & 0x0007, self.mapper.as_mut(), self.open_bus)
            }
            0x4015 => self.apu.read_status(self.open_bus),
            0x4016 => (self.open_bus & 0xE0) | self.controller1.read(),
            0x4017 => {
                let mut value = self.controller2.read();
                if let Some(zapper) = &self.zapper {
                    value = (value & !0x18)
                        | zapper.read_bits(
                            self.ppu.framebuffer(),
                            self.ppu.scanline(),
                            self.ppu.dot(),
                        );
                }
                (self.open_bus & 0xE0) | value
            }
            // $4000-$4014 are write-only; $4018-$401F is the disabled
            // test-mode hole.
            0x4000..=0x401F => self.open_bus,
            0x4020..=0xFFFF => match self.mapper.cpu_read(addr) {
                Some(value) => value,
                None => {
                    log::trace!("open-bus read at ${addr:04X}");
                    self.open_bus
                }
            },
        };
        self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.clock(1);
        self.open_bus = value;
        match addr {
            0x0000..=0x1FFF => self.ram[usize::from(addr) & 0x07FF] = value,
            0x2000..=0x3FFF => {
                let reg = addr & 0x0007;
                // MMC5 snoops the PPU control registers off the bus.
                match reg {
                    0 => self.mapper.ppu_ctrl_write(value),
                    1 => self.mapper.ppu_mask_write(value),
                    _ => {}
                }
                self.ppu.cpu_write(reg, value, self.mapper.as_mut());
            }
            0x4014 => self.oam_dma(value),
            0x4016 => {
                self.controller1.write_strobe(value);
                self.controller2.write_strobe(value);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, value),
            0x4018..=0x401F => {}
            0x4020..=0xFFFF => self.mapper.cpu_write(addr, value),
        }
    }

    fn tick(&mut self, cycles: u32) {
        self.clock(cycles);
    }
}
