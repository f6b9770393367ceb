//! The facade: binds a [`Volume`] and an [`Index`] behind the three public
//! operations a caller actually uses.

use tracing::{error, info};

use crate::config::KernelOptions;
use crate::error::{Error, Result};
use crate::index::{Heads, Index};
use crate::volume::Volume;

/// A head pair where the payload chain is this reserved sentinel marks a
/// genuinely empty object (`write(name, &[])`). No chunk is ever allocated
/// for it — see `Kernel::write` — which sidesteps the chunk codec's
/// zero-vs-full payload-length ambiguity (`payload_len == 0` otherwise means
/// "full chunk") for the one input length where it would be unresolvable.
const EMPTY_OBJECT_TRACK: u16 = u16::MAX;
const EMPTY_OBJECT_OFFSET: u64 = u64::MAX;

pub struct Kernel {
    volume: Volume,
    index: Index,
}

impl Kernel {
    /// Validate `options`, then open the volume and index rooted at
    /// `options.directory`.
    pub fn open(options: KernelOptions) -> Result<Self> {
        options.validate().map_err(Error::Config)?;

        let volume = Volume::open(options.directory.clone(), options.chunk_size, options.track_size)?;
        let index = Index::open(&options.directory)?;

        info!(
            directory = %options.directory.display(),
            chunk_size = options.chunk_size,
            track_size = options.track_size,
            "kernel opened"
        );

        Ok(Self { volume, index })
    }

    /// Read the object stored under `name` and stream its bytes to `sink`.
    pub fn read(&self, name: &[u8], sink: &mut impl std::io::Write) -> Result<()> {
        let heads = self.index.get(name)?.ok_or(Error::NotFound)?;

        if heads.chunk_track == EMPTY_OBJECT_TRACK && heads.chunk_offset == EMPTY_OBJECT_OFFSET {
            info!(name_len = name.len(), bytes = 0, "kernel read (empty object)");
            return Ok(());
        }

        let mut reader = self.volume.reader(heads.chunk_track, heads.chunk_offset);
        let mut total = 0usize;
        let result = (|| -> Result<()> {
            while let Some(payload) = reader.next_chunk()? {
                total += payload.len();
                sink.write_all(&payload)?;
            }
            Ok(())
        })();

        match &result {
            Ok(()) => info!(name_len = name.len(), bytes = total, "kernel read"),
            Err(e) => error!(name_len = name.len(), error = %e, "kernel read failed"),
        }
        result
    }

    /// Write `source`'s bytes under `name`. Fails with `AlreadyExists` if
    /// `name` already has a live entry.
    pub fn write(&mut self, name: &[u8], source: &mut impl std::io::Read) -> Result<()> {
        let mut buf = [0u8; 8192];
        let mut total = 0usize;
        let mut any_bytes = false;

        let heads = {
            let mut writer = self.volume.writer();
            loop {
                let n = source.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                any_bytes = true;
                total += n;
                writer.push(&buf[..n])?;
            }

            if any_bytes {
                let (track, offset) = writer.finish()?;
                Heads { meta_track: 0, meta_offset: 0, chunk_track: track, chunk_offset: offset }
            } else {
                drop(writer);
                Heads { meta_track: 0, meta_offset: 0, chunk_track: EMPTY_OBJECT_TRACK, chunk_offset: EMPTY_OBJECT_OFFSET }
            }
        };

        let inserted = self.index.set(name, heads)?;
        if !inserted {
            info!(name_len = name.len(), "kernel write rejected: already exists");
            return Err(Error::AlreadyExists);
        }

        info!(name_len = name.len(), bytes = total, "kernel write");
        Ok(())
    }

    /// Remove the object stored under `name`.
    pub fn delete(&mut self, name: &[u8]) -> Result<()> {
        let heads = self.index.get(name)?.ok_or(Error::NotFound)?;

        if !(heads.chunk_track == EMPTY_OBJECT_TRACK && heads.chunk_offset == EMPTY_OBJECT_OFFSET) {
            self.volume.remove(heads.chunk_track, heads.chunk_offset)?;
        }
        self.index.remove(name)?;

        info!(name_len = name.len(), "kernel delete");
        Ok(())
    }
}
