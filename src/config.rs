//! `KernelOptions` — the entire configuration surface.
//!
//! There is no external config-file format here: spec.md's option table
//! *is* the configuration surface, so a plain validated struct is the
//! complete, idiomatic expression of it — reaching for `config`/`toml` would
//! invent a file format the spec never describes.

use std::path::PathBuf;
use sysinfo::System;

/// Default chunk size `C`: total bytes per chunk record.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
/// Default soft track capacity `T`: 50 GiB.
pub const DEFAULT_TRACK_SIZE: u64 = 50 * 1024 * 1024 * 1024;
/// Minimum legal chunk size.
pub const MIN_CHUNK_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct KernelOptions {
    /// Root folder for the index file and all `<id>.track` files.
    pub directory: PathBuf,
    /// Total bytes per chunk record (`C`).
    pub chunk_size: usize,
    /// Soft cap per track file in bytes (`T`).
    pub track_size: u64,
    /// Advisory cache budget for the name index, in bytes.
    pub max_memory: u64,
}

impl KernelOptions {
    /// Start from the required `directory`; all other fields take their
    /// documented defaults (`chunk_size = 4096`, `track_size = 50 GiB`,
    /// `max_memory` = half of currently-available host memory).
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            track_size: DEFAULT_TRACK_SIZE,
            max_memory: default_max_memory(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_track_size(mut self, track_size: u64) -> Self {
        self.track_size = track_size;
        self
    }

    pub fn with_max_memory(mut self, max_memory: u64) -> Self {
        self.max_memory = max_memory;
        self
    }

    /// Validate the constraints spec.md §6 lists. Called by `Kernel::open`.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(format!(
                "chunk_size {} is below the minimum of {MIN_CHUNK_SIZE}",
                self.chunk_size
            ));
        }
        if self.chunk_size <= crate::chunk::CHUNK_HEADER_SIZE {
            return Err(format!(
                "chunk_size {} leaves no room for payload (header is {} bytes)",
                self.chunk_size,
                crate::chunk::CHUNK_HEADER_SIZE
            ));
        }
        let min_track = 16 + self.chunk_size as u64;
        if self.track_size < min_track {
            return Err(format!(
                "track_size {} is below the minimum of {min_track} (16-byte header + one chunk)",
                self.track_size
            ));
        }
        Ok(())
    }

    /// Usable payload bytes per chunk (`D = C - 17`).
    #[inline]
    pub fn payload_capacity(&self) -> usize {
        self.chunk_size - crate::chunk::CHUNK_HEADER_SIZE
    }
}

fn default_max_memory() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory() / 2
}
