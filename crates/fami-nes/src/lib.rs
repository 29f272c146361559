//! Cycle-accurate NES emulator core.
//!
//! The NTSC master crystal runs at 21,477,272 Hz; the PPU ticks at
//! crystal/4 and the CPU at crystal/12, a 3:1 dot:cycle ratio (PAL is
//! 16:5). The CPU drives everything: each of its bus accesses first
//! clocks the PPU, APU and mapper up to date, so a write at CPU cycle T
//! is visible to the PPU at its cycle 3T.
//!
//! One frame is 341 dots × 262 scanlines (NTSC). `Nes::run_frame` runs
//! until the PPU enters vblank and returns; the host reads the 256×240
//! ARGB framebuffer and drains the audio buffer between frames.

mod apu;
mod bus;
mod cartridge;
mod config;
mod controller;
mod error;
pub mod input;
pub mod mapper;
mod nes;
mod palette;
pub mod ppu;
mod state;

pub use apu::Apu;
pub use bus::NesBus;
pub use cartridge::{Mirroring, Rom};
pub use config::{NesConfig, NesRegion, RamInit};
pub use controller::{Button, Controller, Zapper};
pub use error::{RomError, StateError};
pub use input::{InputEvent, InputQueue};
pub use nes::Nes;
