//! Versioned save-state schema.
//!
//! Every component contributes an explicit, named-field state struct;
//! the gathered [`Snapshot`] serializes to an opaque bincode blob. The
//! blob embeds a format version and the ROM's CRC32 so a restore against
//! the wrong build or the wrong cartridge fails cleanly instead of
//! corrupting the machine.

use serde::{Deserialize, Serialize};

use fami_6502::CpuState;

use crate::apu::Apu;
use crate::bus::BusState;
use crate::error::StateError;
use crate::mapper::MapperState;
use crate::ppu::PpuState;

/// Bumped whenever any component's state layout changes.
pub const SNAPSHOT_VERSION: u32 = 3;

/// A full machine snapshot.
#[derive(Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub rom_crc32: u32,
    pub cpu: CpuState,
    pub bus: BusState,
    pub ppu: PpuState,
    pub apu: Apu,
    pub mapper: MapperState,
}

impl Snapshot {
    /// Encode to an opaque blob.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("snapshot serialization cannot fail")
    }

    /// Decode and validate a blob against the loaded ROM.
    ///
    /// # Errors
    ///
    /// Rejects corrupt blobs, unknown format versions, and snapshots
    /// taken from a different ROM.
    pub fn from_bytes(bytes: &[u8], rom_crc32: u32) -> Result<Self, StateError> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| StateError::Corrupt(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StateError::BadVersion(snapshot.version));
        }
        if snapshot.rom_crc32 != rom_crc32 {
            return Err(StateError::RomMismatch {
                expected: rom_crc32,
                found: snapshot.rom_crc32,
            });
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{test_rom, Rom};
    use crate::config::NesConfig;
    use crate::mapper;
    use crate::NesBus;

    fn sample_snapshot(crc: u32) -> Snapshot {
        let rom = Rom::parse(&test_rom::build(2, 1, 0)).unwrap();
        let bus = NesBus::new(mapper::create(rom).unwrap(), &NesConfig::new(Vec::new()));
        Snapshot {
            version: SNAPSHOT_VERSION,
            rom_crc32: crc,
            cpu: fami_6502::Cpu6502::new().save_state(),
            bus: bus.save_state(),
            ppu: bus.ppu.save_state(),
            apu: bus.apu.clone(),
            mapper: bus.mapper.save_state(),
        }
    }

    #[test]
    fn blob_round_trips() {
        let snap = sample_snapshot(0x1234_5678);
        let bytes = snap.to_bytes();
        let back = Snapshot::from_bytes(&bytes, 0x1234_5678).expect("restore");
        assert_eq!(back.version, SNAPSHOT_VERSION);
        assert_eq!(back.bus.ram.len(), 2048);
    }

    #[test]
    fn wrong_rom_rejected() {
        let bytes = sample_snapshot(0xAAAA_AAAA).to_bytes();
        assert!(matches!(
            Snapshot::from_bytes(&bytes, 0xBBBB_BBBB),
            Err(StateError::RomMismatch { .. })
        ));
    }

    #[test]
    fn wrong_version_rejected() {
        let mut snap = sample_snapshot(1);
        snap.version = 999;
        let bytes = snap.to_bytes();
        assert!(matches!(
            Snapshot::from_bytes(&bytes, 1),
            Err(StateError::BadVersion(999))
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            Snapshot::from_bytes(&[1, 2, 3], 0),
            Err(StateError::Corrupt(_))
        ));
    }
}
