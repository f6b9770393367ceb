//! One physical backing file — owns the per-track header (free-list head and
//! tail, `16`-byte), and the dense array of chunk records that follows it.
//!
//! # On-disk layout
//!
//! ```text
//! Offset  Size   Field
//!    0      8    free_head   byte offset of first freed chunk, 0 if none
//!    8      8    free_tail   byte offset of last freed chunk, 0 if none
//!   16    k*C    chunks      dense array of chunk records
//! ```
//!
//! Track file size is always `16 + k*C`. `size` here is the *live-bytes*
//! cursor, not the physical file length — see [`Track::size`] and the
//! "Open questions" resolution in `SPEC_FULL.md` §4.3a(3).

use std::path::Path;
use tracing::{debug, trace};

use crate::chunk::{self, Chunk, NEXT_OFFSET_FIELD, VALID_FIELD};
use crate::error::{TrackError, TrackResult};
use crate::file_handle::FileHandle;

const HEADER_SIZE: u64 = 16;

pub struct Track {
    id: u16,
    file: FileHandle,
    chunk_size: usize,
    track_size: u64,
    free_head: u64,
    free_tail: u64,
    /// Live-bytes cursor: grows when a chunk is appended, shrinks when one
    /// is freed. Distinct from the physical file length, which never
    /// shrinks outside compaction.
    size: u64,
}

impl Track {
    /// Open (or create) `<directory>/<id>.track`. If the file is empty, a
    /// zeroed 16-byte header is written and `size` starts at 16; otherwise
    /// the header is read back to recover `free_head`/`free_tail`, and
    /// `size` starts at the file's physical length.
    pub fn open(id: u16, directory: &Path, chunk_size: usize, track_size: u64) -> TrackResult<Self> {
        let path = directory.join(format!("{id}.track"));
        let file = FileHandle::open_or_create(&path)?;
        let file_len = file.size()?;

        let (free_head, free_tail, size) = if file_len == 0 {
            file.write(&[0u8; HEADER_SIZE as usize], 0)?;
            (0u64, 0u64, HEADER_SIZE)
        } else {
            let mut header = [0u8; HEADER_SIZE as usize];
            file.read_exact_at(&mut header, 0)?;
            let free_head = u64::from_be_bytes(header[0..8].try_into().unwrap());
            let free_tail = u64::from_be_bytes(header[8..16].try_into().unwrap());
            (free_head, free_tail, file_len)
        };

        debug!(track = id, free_head, free_tail, size, "track initialised");

        Ok(Self {
            id,
            file,
            chunk_size,
            track_size,
            free_head,
            free_tail,
            size,
        })
    }

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Live-bytes cursor (see module docs) — not the physical file length.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The track's configured soft capacity (`T`).
    #[inline]
    pub fn track_size(&self) -> u64 {
        self.track_size
    }

    /// Physical length of the backing file, for diagnostics.
    pub fn file_len(&self) -> std::io::Result<u64> {
        self.file.size()
    }

    /// Offset of the first chunk slot that would not fit within `track_size`
    /// — the resolved stop predicate for `remove`'s traversal bound (Open
    /// Question #2).
    fn slot_bound(&self) -> u64 {
        HEADER_SIZE + ((self.track_size - HEADER_SIZE) / self.chunk_size as u64) * self.chunk_size as u64
    }

    /// Allocate a slot for the next chunk write, without writing payload.
    ///
    /// Pops from the head of the free list (LIFO at the head) if one
    /// exists; otherwise returns the current append position. `size` is
    /// *not* grown here — `write` grows it when it lands exactly at the
    /// previous append position.
    pub fn alloc(&mut self) -> TrackResult<u64> {
        if self.free_head == 0 {
            trace!(track = self.id, offset = self.size, "alloc: appending");
            return Ok(self.size);
        }

        let mut link_buf = [0u8; 10];
        self.file.read_exact_at(&mut link_buf, self.free_head + NEXT_OFFSET_FIELD as u64)?;
        let link = chunk::decode_lazy(&link_buf);

        let popped = self.free_head;
        self.free_head = link.next_offset;
        if self.free_head == 0 {
            self.free_tail = 0;
        }
        trace!(track = self.id, offset = popped, "alloc: reused from free list");
        Ok(popped)
    }

    /// Encode and write a chunk record at `offset`. Grows the live-bytes
    /// cursor by `chunk_size` when `offset` is exactly the current cursor
    /// (i.e. this is a genuine append, not a free-slot reuse).
    pub fn write(&mut self, chunk: &Chunk, offset: u64) -> TrackResult<()> {
        let buf = chunk::encode(self.chunk_size, chunk);
        self.file.write(&buf, offset)?;
        if offset == self.size {
            self.size += self.chunk_size as u64;
        }
        Ok(())
    }

    /// Read and fully decode the chunk record at `offset`.
    pub fn read(&self, offset: u64) -> TrackResult<Chunk> {
        let mut buf = vec![0u8; self.chunk_size];
        self.file.read_exact_at(&mut buf, offset)?;
        Ok(chunk::decode(self.chunk_size, &buf))
    }

    /// Walk the live chain from `head_offset`, freeing chunks until the
    /// chain terminates locally (`None`) or escapes to another track
    /// (`Some((next_track, next_offset))`, for the caller to resume there).
    ///
    /// Open Question #1 resolution: when the free list is empty at the
    /// start of this call (`free_head == 0`), both `free_head` and
    /// `free_tail` are initialised to the first freed offset in a single
    /// 16-byte write, rather than leaving `free_tail` to be set later (or
    /// never, if this object's chain escapes before terminating).
    pub fn remove(&mut self, head_offset: u64) -> TrackResult<Option<(u16, u64)>> {
        let stop_bound = self.slot_bound();
        let mut offset = head_offset;
        let mut first_iteration = true;

        loop {
            if offset >= stop_bound {
                return Ok(None);
            }

            let mut buf = vec![0u8; self.chunk_size];
            let n = self.file.read(&mut buf, offset)?;
            if n == 0 {
                return Ok(None);
            }

            self.size = self.size.saturating_sub(self.chunk_size as u64);
            self.file.write(&[0u8], offset + VALID_FIELD as u64)?;
            let link = chunk::decode_lazy(&buf[NEXT_OFFSET_FIELD..]);

            if self.free_head == 0 {
                self.free_head = offset;
                self.free_tail = offset;
                let mut header = [0u8; 16];
                header[0..8].copy_from_slice(&offset.to_be_bytes());
                header[8..16].copy_from_slice(&offset.to_be_bytes());
                self.file.write(&header, 0)?;
            } else if first_iteration {
                self.file.write(&offset.to_be_bytes(), self.free_tail + NEXT_OFFSET_FIELD as u64)?;
            }

            if link.is_terminal() {
                self.free_tail = offset;
                self.file.write(&offset.to_be_bytes(), 8)?;
                debug!(track = self.id, head_offset, tail = offset, "remove: chain terminated locally");
                return Ok(None);
            }

            if link.next_track != self.id {
                debug!(
                    track = self.id,
                    head_offset,
                    next_track = link.next_track,
                    next_offset = link.next_offset,
                    "remove: chain escapes to another track"
                );
                return Ok(Some((link.next_track, link.next_offset)));
            }

            first_iteration = false;
            offset = link.next_offset;
        }
    }

    /// Persist the in-memory `free_head`/`free_tail` header. Called once per
    /// touched track when a write stream closes.
    pub fn write_end(&mut self) -> TrackResult<()> {
        let mut header = [0u8; 16];
        header[0..8].copy_from_slice(&self.free_head.to_be_bytes());
        header[8..16].copy_from_slice(&self.free_tail.to_be_bytes());
        self.file.write(&header, 0)?;
        Ok(())
    }
}
