//! Top-level NES machine.
//!
//! The CPU drives everything: `step()` executes one instruction (the
//! bus clocks the PPU, APU and mapper under it), then services DMA
//! requests and polls the interrupt lines. `run_frame()` steps until the
//! PPU crosses into vblank.

use fami_core::Cpu;
use fami_6502::{Cpu6502, Interrupt};

use crate::bus::NesBus;
use crate::cartridge::Rom;
use crate::config::NesConfig;
use crate::controller::Button;
use crate::error::{RomError, StateError};
use crate::input::InputQueue;
use crate::mapper;
use crate::ppu;
use crate::state::{Snapshot, SNAPSHOT_VERSION};

/// NES system.
pub struct Nes {
    cpu: Cpu6502,
    bus: NesBus,
    config: NesConfig,
    rom_crc32: u32,
    input_queue: InputQueue,
}

impl Nes {
    /// Build a machine from configuration and power it on.
    ///
    /// # Errors
    ///
    /// Returns a [`RomError`] when the iNES image is malformed or uses
    /// an unimplemented mapper.
    pub fn new(config: NesConfig) -> Result<Self, RomError> {
        let rom = Rom::parse(&config.rom_data)?;
        let rom_crc32 = rom.crc32;
        log::info!(
            "loaded ROM: mapper {}, {} KiB PRG, {} KiB CHR{}, crc32 ${rom_crc32:08X}",
            rom.mapper_id,
            rom.prg_rom.len() / 1024,
            rom.chr.len() / 1024,
            if rom.chr_is_ram { " RAM" } else { "" },
        );
        let mapper = mapper::create(rom)?;
        let bus = NesBus::new(mapper, &config);
        let mut nes = Self {
            cpu: Cpu6502::new(),
            bus,
            config,
            rom_crc32,
            input_queue: InputQueue::new(),
        };
        nes.power_on();
        Ok(nes)
    }

    /// Power-on: deterministic RAM pattern, CPU through the reset
    /// vector.
    pub fn power_on(&mut self) {
        self.config.ram_init.fill(&mut self.bus.ram);
        self.cpu = Cpu6502::new();
        self.cpu.reset(&mut self.bus);
    }

    /// Soft reset: the console's reset button. RAM and most mapper
    /// registers survive; the CPU re-vectors, the PPU drops its control
    /// registers and the APU is silenced.
    pub fn reset(&mut self) {
        self.bus.ppu.reset();
        self.bus.apu.reset();
        self.bus.mapper.reset();
        self.cpu.reset(&mut self.bus);
    }

    /// Execute one CPU instruction (or one stall cycle) and service DMA
    /// and interrupt lines. Returns CPU cycles elapsed.
    pub fn step(&mut self) -> u32 {
        let cycles = self.cpu.step(&mut self.bus);

        // OAM DMA triggered by a $4014 write inside the instruction.
        if let Some(stall) = self.bus.take_dma_stall() {
            self.cpu.halt(stall);
        }

        // DMC sample fetch: read through the cartridge path and steal up
        // to four cycles.
        if let Some(addr) = self.bus.apu.dmc.take_dma_request() {
            let value = self.bus.peek(addr);
            self.bus.apu.dmc.complete_dma(value);
            self.cpu.halt(4);
        }

        // Interrupt lines: NMI is an edge from the PPU, IRQ is the ORed
        // level of the APU and cartridge lines.
        if self.bus.ppu.take_nmi() {
            self.cpu.request_irq(Interrupt::Nmi);
        }
        if self.bus.irq_line() {
            self.cpu.request_irq(Interrupt::Irq);
        } else {
            self.cpu.clear_irq(Interrupt::Irq);
        }

        cycles
    }

    /// Run until the PPU enters vblank. Returns CPU cycles executed.
    pub fn run_frame(&mut self) -> u64 {
        let frame = self.bus.ppu.frame_count();
        let mut pads = [self.bus.controller1.clone(), self.bus.controller2.clone()];
        self.input_queue.process(frame, &mut pads);
        [self.bus.controller1, self.bus.controller2] = pads;

        let mut cycles = 0u64;
        while self.bus.ppu.frame_count() == frame {
            cycles += u64::from(self.step());
        }
        cycles
    }

    // === Host I/O ===

    /// Press a button.
    pub fn button_down(&mut self, port: usize, button: Button) {
        self.controller_mut(port).set_button(button, true);
    }

    /// Release a button.
    pub fn button_up(&mut self, port: usize, button: Button) {
        self.controller_mut(port).set_button(button, false);
    }

    fn controller_mut(&mut self, port: usize) -> &mut crate::Controller {
        if port == 0 {
            &mut self.bus.controller1
        } else {
            &mut self.bus.controller2
        }
    }

    /// Update the Zapper's aim and trigger. Ignored unless the Zapper
    /// was enabled in the configuration.
    pub fn zapper(&mut self, x: u16, y: u16, trigger: bool) {
        if let Some(zapper) = &mut self.bus.zapper {
            zapper.aim(x, y);
            zapper.set_trigger(trigger);
        }
    }

    /// Timed input queue (applied at frame starts).
    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input_queue
    }

    /// The 256×240 ARGB framebuffer.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ppu.framebuffer()
    }

    #[must_use]
    pub fn framebuffer_width(&self) -> u32 {
        ppu::FB_WIDTH
    }

    #[must_use]
    pub fn framebuffer_height(&self) -> u32 {
        ppu::FB_HEIGHT
    }

    /// Drain the audio buffer (mono f32 at the configured rate).
    pub fn take_audio(&mut self) -> Vec<f32> {
        self.bus.apu.take_buffer()
    }

    /// CRC32 of the loaded ROM (PRG+CHR).
    #[must_use]
    pub fn rom_crc32(&self) -> u32 {
        self.rom_crc32
    }

    /// Battery-backed PRG-RAM, if the cartridge has any.
    #[must_use]
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.bus.mapper.battery_ram()
    }

    /// Restore battery-backed PRG-RAM (host persistence, keyed by CRC).
    pub fn load_battery_ram(&mut self, bytes: &[u8]) {
        self.bus.mapper.load_battery_ram(bytes);
    }

    // === Save states ===

    /// Capture the full machine as an opaque blob.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        Snapshot {
            version: SNAPSHOT_VERSION,
            rom_crc32: self.rom_crc32,
            cpu: self.cpu.save_state(),
            bus: self.bus.save_state(),
            ppu: self.bus.ppu.save_state(),
            apu: self.bus.apu.clone(),
            mapper: self.bus.mapper.save_state(),
        }
        .to_bytes()
    }

    /// Restore a blob captured by [`Nes::snapshot`].
    ///
    /// # Errors
    ///
    /// Rejects blobs from another ROM, another format version, or with
    /// mismatched mapper state.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let snapshot = Snapshot::from_bytes(bytes, self.rom_crc32)?;
        self.bus.mapper.restore_state(&snapshot.mapper)?;
        self.cpu.load_state(&snapshot.cpu);
        self.bus.load_state(&snapshot.bus);
        self.bus.ppu.load_state(&snapshot.ppu);
        self.bus.apu = snapshot.apu;
        self.bus
            .apu
            .configure(self.config.region, self.config.sample_rate);
        Ok(())
    }

    // === Observation ===

    #[must_use]
    pub fn cpu(&self) -> &Cpu6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu6502 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &NesBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut NesBus {
        &mut self.bus
    }
}
