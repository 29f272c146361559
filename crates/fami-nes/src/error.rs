//! Error types for the load and restore boundaries.
//!
//! Runtime anomalies (out-of-range VRAM reads, writes to ROM, pokes at
//! unimplemented registers) are not errors: they recover locally with
//! open-bus or ignored-write semantics and at most a log line. Only ROM
//! loading and snapshot restore report failures to the caller.

use thiserror::Error;

/// iNES image rejection reasons.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("iNES file too short ({0} bytes, need at least 16)")]
    TooShort(usize),

    #[error("invalid iNES magic (expected NES\\x1A)")]
    BadMagic,

    #[error("iNES file truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),
}

/// Snapshot restore rejection reasons.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("snapshot blob is corrupt: {0}")]
    Corrupt(String),

    #[error("snapshot format version {0} is not supported")]
    BadVersion(u32),

    #[error("snapshot belongs to a different ROM (crc ${found:08X}, expected ${expected:08X})")]
    RomMismatch { expected: u32, found: u32 },

    #[error("snapshot mapper state does not match the loaded mapper")]
    MapperMismatch,
}
