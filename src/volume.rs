//! A volume is a set of tracks behind one logical append/read/delete
//! interface: a streaming [`Writer`] turns a byte stream into a chunk chain
//! that may span tracks, a streaming [`Reader`] walks a chain back out, and
//! [`Volume::remove`] is the cross-track delete trampoline.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, trace};

use crate::chunk::Chunk;
use crate::error::{VolumeError, VolumeResult};
use crate::track::Track;

pub struct Volume {
    directory: PathBuf,
    chunk_size: usize,
    track_size: u64,
    tracks: BTreeMap<u16, Track>,
}

impl Volume {
    /// Open a volume directory, creating `0.track` if this is a brand-new
    /// volume, then opening every existing `<id>.track` file found.
    pub fn open(directory: PathBuf, chunk_size: usize, track_size: u64) -> VolumeResult<Self> {
        fs::create_dir_all(&directory)?;

        if !directory.join("index").exists() {
            Track::open(0, &directory, chunk_size, track_size)?;
        }

        let mut tracks = BTreeMap::new();
        for entry in fs::read_dir(&directory)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("track") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u16>().ok()) else {
                continue;
            };
            let track = Track::open(id, &directory, chunk_size, track_size)?;
            tracks.insert(id, track);
        }

        if tracks.is_empty() {
            let track = Track::open(0, &directory, chunk_size, track_size)?;
            tracks.insert(0, track);
        }

        debug!(tracks = tracks.len(), "volume opened");
        Ok(Self { directory, chunk_size, track_size, tracks })
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn payload_capacity(&self) -> usize {
        self.chunk_size - crate::chunk::CHUNK_HEADER_SIZE
    }

    /// Ensure `*track_id` names a track that is open and has room for one
    /// more chunk, rolling forward to the next id (creating it if needed)
    /// when the current one is full.
    fn ensure_writable_track(&mut self, track_id: &mut u16) -> VolumeResult<()> {
        loop {
            match self.tracks.get(track_id) {
                None => {
                    let track = Track::open(*track_id, &self.directory, self.chunk_size, self.track_size)?;
                    self.tracks.insert(*track_id, track);
                    debug!(track = *track_id, "volume: opened new track for writing");
                    return Ok(());
                }
                Some(track) => {
                    if track.size() + self.chunk_size as u64 > self.track_size {
                        let from = *track_id;
                        *track_id = track_id.checked_add(1).ok_or(VolumeError::NoWritableTrack)?;
                        debug!(from, to = *track_id, "volume: track rollover");
                        continue;
                    }
                    return Ok(());
                }
            }
        }
    }

    pub fn writer(&mut self) -> Writer<'_> {
        let start = *self.tracks.keys().next().unwrap_or(&0);
        Writer {
            volume: self,
            buffer: Vec::new(),
            current_track_id: start,
            next_id: 0,
            write_set: HashSet::new(),
            previous: None,
            first_head: None,
        }
    }

    pub fn reader(&self, start_track: u16, start_offset: u64) -> Reader<'_> {
        Reader { volume: self, current: Some((start_track, start_offset)) }
    }

    /// Cross-track delete trampoline (spec §4.4, §9): repeatedly call
    /// `Track::remove` on the current track, following it to whatever track
    /// it says the chain escapes to, until it reports local termination.
    pub fn remove(&mut self, track: u16, offset: u64) -> VolumeResult<()> {
        let mut t = track;
        let mut o = offset;
        loop {
            let trk = self.tracks.get_mut(&t).ok_or_else(|| {
                error!(track = t, offset = o, "delete traversal hit a chunk link to a track that is not open");
                VolumeError::BrokenLink { track: t, offset: o }
            })?;
            match trk.remove(o)? {
                Some((next_track, next_offset)) => {
                    t = next_track;
                    o = next_offset;
                }
                None => return Ok(()),
            }
        }
    }
}

struct PendingChunk {
    chunk: Chunk,
    track_id: u16,
    offset: u64,
}

/// Accumulates pushed bytes into `D`-sized chunks and chains them across
/// tracks as needed. Borrows the volume exclusively for the writer's
/// lifetime (§5: single-writer discipline per volume).
pub struct Writer<'a> {
    volume: &'a mut Volume,
    buffer: Vec<u8>,
    current_track_id: u16,
    next_id: u32,
    write_set: HashSet<u16>,
    previous: Option<PendingChunk>,
    first_head: Option<(u16, u64)>,
}

impl<'a> Writer<'a> {
    /// Append bytes to the internal buffer, draining full `D`-sized chunks
    /// as they accumulate. Any already-staged `previous` chunk is patched
    /// to point at the newly allocated one before it is written out.
    pub fn push(&mut self, bytes: &[u8]) -> VolumeResult<()> {
        self.buffer.extend_from_slice(bytes);
        let d = self.volume.payload_capacity();

        while self.buffer.len() >= d {
            let dst_offset = self.alloc_and_link()?;
            let payload: Vec<u8> = self.buffer.drain(0..d).collect();
            self.stage(payload, dst_offset);
        }
        Ok(())
    }

    /// Ensure a writable track, record it in the write set, allocate a slot,
    /// and — if a chunk is already staged — patch it to point here and
    /// write it out. Returns the freshly allocated `(track, offset)`'s
    /// offset (the track id is `self.current_track_id`).
    fn alloc_and_link(&mut self) -> VolumeResult<u64> {
        self.volume.ensure_writable_track(&mut self.current_track_id)?;
        let track_id = self.current_track_id;
        let track = self.volume.tracks.get_mut(&track_id).ok_or(VolumeError::TrackNotFound(track_id))?;
        let dst_offset = track.alloc()?;

        if let Some(prev) = self.previous.take() {
            let mut chunk = prev.chunk;
            chunk.next_track = track_id;
            chunk.next_offset = dst_offset;
            let prev_track = self.volume.tracks.get_mut(&prev.track_id).ok_or(VolumeError::TrackNotFound(prev.track_id))?;
            prev_track.write(&chunk, prev.offset)?;
            self.write_set.insert(prev.track_id);
        }

        if self.first_head.is_none() {
            self.first_head = Some((track_id, dst_offset));
        }
        Ok(dst_offset)
    }

    fn stage(&mut self, payload: Vec<u8>, dst_offset: u64) {
        let chunk = Chunk {
            id: self.next_id,
            valid: true,
            next_track: 0,
            next_offset: 0,
            payload,
        };
        self.next_id += 1;
        self.write_set.insert(self.current_track_id);
        self.previous = Some(PendingChunk { chunk, track_id: self.current_track_id, offset: dst_offset });
    }

    /// Close the stream: flush whatever residual bytes remain (< `D`) as the
    /// final chunk, terminate the chain, persist every touched track's
    /// header, and report the chain's head `(track, offset)`.
    ///
    /// Returns [`VolumeError::EmptyWrite`] if nothing was ever pushed and no
    /// residual remains — callers representing a genuinely empty object
    /// should special-case that before opening a writer at all (see
    /// `Kernel::write`).
    pub fn finish(mut self) -> VolumeResult<(u16, u64)> {
        if !self.buffer.is_empty() {
            let dst_offset = self.alloc_and_link()?;
            let payload = std::mem::take(&mut self.buffer);
            self.stage(payload, dst_offset);
        }

        match self.previous.take() {
            Some(prev) => {
                // `prev.chunk` already carries next_track = next_offset = 0
                // (terminal) unless a later push/finish patched it — which
                // cannot happen once it's the final staged chunk.
                let track = self.volume.tracks.get_mut(&prev.track_id).ok_or(VolumeError::TrackNotFound(prev.track_id))?;
                track.write(&prev.chunk, prev.offset)?;
                self.write_set.insert(prev.track_id);
            }
            None => return Err(VolumeError::EmptyWrite),
        }

        for track_id in &self.write_set {
            if let Some(track) = self.volume.tracks.get_mut(track_id) {
                track.write_end()?;
            }
        }

        let head = self.first_head.expect("first_head is set whenever a chunk was staged");
        trace!(track = head.0, offset = head.1, chunks = self.next_id, "writer finished");
        Ok(head)
    }
}

/// Walks a chunk chain forward from `(start_track, start_offset)`, one
/// chunk payload per pull.
pub struct Reader<'a> {
    volume: &'a Volume,
    current: Option<(u16, u64)>,
}

impl<'a> Reader<'a> {
    /// Pull the next payload in the chain, or `None` once the chain (already
    /// emitted its terminal chunk) is exhausted.
    pub fn next_chunk(&mut self) -> VolumeResult<Option<Vec<u8>>> {
        let Some((track_id, offset)) = self.current else {
            return Ok(None);
        };

        let track = self.volume.tracks.get(&track_id).ok_or_else(|| {
            error!(track = track_id, offset, "read traversal hit a chunk link to a track that is not open");
            VolumeError::BrokenLink { track: track_id, offset }
        })?;
        let chunk = track.read(offset)?;

        self.current = if chunk.next_offset == 0 { None } else { Some((chunk.next_track, chunk.next_offset)) };

        Ok(Some(chunk.payload))
    }
}
