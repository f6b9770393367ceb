//! Error taxonomy.
//!
//! Each component (`Track`, `Volume`, `Index`) has its own narrow error
//! enum so it can be unit-tested in isolation; [`Error`] is the four-variant
//! taxonomy the `Kernel` facade exposes to callers and everything else
//! collapses into via `#[from]`.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error("no writable track is available and track creation failed")]
    NoWritableTrack,
    /// An internal writer-side lookup against a track id the writer itself
    /// just opened/ensured moments earlier came up empty. This never
    /// reflects untrusted on-disk data, so it carries no `(track, offset)`
    /// diagnostic.
    #[error("track {0} is not open in this volume")]
    TrackNotFound(u16),
    /// A read or delete traversal followed a chunk's `(next_track,
    /// next_offset)` link to a track id this volume does not have open —
    /// i.e. a link it cannot trust. `(track, offset)` names where in the
    /// chain the break was found; the caller converting this logs it before
    /// it collapses to `Error::Io` (spec'd taxonomy has no `Corruption` value
    /// for this case, only for index-scan decode failures).
    #[error("chunk link at track {track}, offset {offset} points to a track that is not open in this volume")]
    BrokenLink { track: u16, offset: u64 },
    #[error("writer closed with no bytes ever pushed")]
    EmptyWrite,
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced at the [`crate::Kernel`] boundary.
///
/// `Corruption` names the index-scan case where a record has the correct
/// length but fails to decode (bad magic). Per spec that case is
/// skip-and-continue — non-fatal, the scan just moves to the next record —
/// so in practice `Corruption` is never constructed by this crate today; the
/// variant is kept because the taxonomy names it. A broken chunk link hit
/// during a read or delete traversal is a different case and is surfaced as
/// `Io`, with the offending `(track, offset)` logged before the conversion
/// (see `VolumeError::BrokenLink` and its `From` impl below).
#[derive(Error, Debug)]
pub enum Error {
    /// No live index entry for the given name.
    #[error("no entry found for the requested name")]
    NotFound,
    /// `write` attempted against a name with an existing live index entry.
    #[error("an entry already exists for this name")]
    AlreadyExists,
    /// Any underlying storage error; fatal for the current operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Reserved by the taxonomy for an index-scan record that has the
    /// correct length but fails to decode (bad magic). Never constructed by
    /// this crate today: that case is skip-and-continue at the scan site,
    /// not escalated to an error. A broken chunk link during a read/delete
    /// traversal is a different case and surfaces as `Io` instead (see
    /// `VolumeError::BrokenLink`).
    #[error("corruption detected at track {track}, offset {offset}")]
    Corruption { track: u16, offset: u64 },
    /// `KernelOptions` failed validation at `Kernel::open`.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<TrackError> for Error {
    fn from(e: TrackError) -> Self {
        match e {
            TrackError::Io(e) => Error::Io(e),
        }
    }
}

impl From<VolumeError> for Error {
    fn from(e: VolumeError) -> Self {
        match e {
            VolumeError::Io(e) => Error::Io(e),
            VolumeError::Track(e) => e.into(),
            VolumeError::NoWritableTrack => {
                Error::Io(io::Error::new(io::ErrorKind::Other, "no writable track available"))
            }
            VolumeError::TrackNotFound(id) => {
                Error::Io(io::Error::new(io::ErrorKind::NotFound, format!("track {id} is not open")))
            }
            VolumeError::BrokenLink { track, offset } => Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("corrupted chunk link at track {track}, offset {offset}"),
            )),
            VolumeError::EmptyWrite => {
                Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "writer closed with no bytes ever pushed"))
            }
        }
    }
}

impl From<IndexError> for Error {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Io(e) => Error::Io(e),
        }
    }
}

pub type TrackResult<T> = Result<T, TrackError>;
pub type VolumeResult<T> = Result<T, VolumeError>;
pub type IndexResult<T> = Result<T, IndexError>;
pub type Result<T> = std::result::Result<T, Error>;
