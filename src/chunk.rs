//! Chunk format — fixed-size on-disk record, linked into per-object chains.
//!
//! # On-disk layout (17-byte header + payload, all multi-byte fields big-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   id           position in the owning object's chain (BE u32)
//!    4      1   valid        1 = live, 0 = freed
//!    5      2   payload_len  valid payload bytes; 0 = sentinel for "full chunk" (BE u16)
//!    7      8   next_offset  byte offset of the next chunk; 0 = no successor (BE u64)
//!   15      2   next_track   track id of the next chunk (BE u16)
//!   17    C-17  payload      raw user bytes
//! ```
//!
//! # Lazy decode
//! Free-list and delete traversal only need `(next_track, next_offset)`, the
//! 10 bytes at offset 7. [`decode_lazy`] reads only that window instead of
//! pulling the whole chunk (including the payload) off disk.
//!
//! # Endianness
//! Every multi-byte field is big-endian, matching the on-disk index record
//! format in [`crate::index`].

pub const CHUNK_HEADER_SIZE: usize = 17;

/// A fully decoded chunk record.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: u32,
    pub valid: bool,
    pub next_track: u16,
    pub next_offset: u64,
    pub payload: Vec<u8>,
}

/// The linkage-only fields of a chunk, decoded without touching the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLink {
    pub next_track: u16,
    pub next_offset: u64,
}

impl ChunkLink {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.next_offset == 0
    }
}

/// Encode a chunk record into exactly `chunk_size` bytes.
///
/// `payload.len()` must be `<= chunk_size - CHUNK_HEADER_SIZE` (the usable
/// payload capacity `D`). When `payload.len() == D`, `payload_len` is written
/// as the `0` sentinel ("full chunk"); otherwise the true length is stored.
pub fn encode(chunk_size: usize, c: &Chunk) -> Vec<u8> {
    let d = chunk_size - CHUNK_HEADER_SIZE;
    assert!(
        c.payload.len() <= d,
        "chunk payload {} exceeds capacity {d}",
        c.payload.len()
    );

    let mut buf = vec![0u8; chunk_size];
    buf[0..4].copy_from_slice(&c.id.to_be_bytes());
    buf[4] = c.valid as u8;
    let payload_len = if c.payload.len() == d { 0u16 } else { c.payload.len() as u16 };
    buf[5..7].copy_from_slice(&payload_len.to_be_bytes());
    buf[7..15].copy_from_slice(&c.next_offset.to_be_bytes());
    buf[15..17].copy_from_slice(&c.next_track.to_be_bytes());
    buf[17..17 + c.payload.len()].copy_from_slice(&c.payload);
    buf
}

/// Fully decode a `chunk_size`-byte buffer into a [`Chunk`].
///
/// `payload_len == 0` is the "full chunk" sentinel: the payload slice spans
/// the entire remainder, `chunk_size - CHUNK_HEADER_SIZE` bytes.
pub fn decode(chunk_size: usize, buf: &[u8]) -> Chunk {
    debug_assert_eq!(buf.len(), chunk_size);
    let d = chunk_size - CHUNK_HEADER_SIZE;

    let id = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    let valid = buf[4] != 0;
    let payload_len = u16::from_be_bytes(buf[5..7].try_into().unwrap()) as usize;
    let next_offset = u64::from_be_bytes(buf[7..15].try_into().unwrap());
    let next_track = u16::from_be_bytes(buf[15..17].try_into().unwrap());
    let len = if payload_len == 0 { d } else { payload_len };

    Chunk {
        id,
        valid,
        next_track,
        next_offset,
        payload: buf[17..17 + len].to_vec(),
    }
}

/// Decode only the linkage fields (`next_track`, `next_offset`) from the
/// fixed 10-byte window at offset 7. `buf` need only contain those 10 bytes
/// (e.g. a targeted 10-byte read), or a full chunk buffer.
pub fn decode_lazy(buf: &[u8]) -> ChunkLink {
    debug_assert!(buf.len() >= 10);
    ChunkLink {
        next_offset: u64::from_be_bytes(buf[0..8].try_into().unwrap()),
        next_track: u16::from_be_bytes(buf[8..10].try_into().unwrap()),
    }
}

/// Byte offset of the `next_offset` field within a chunk record — used by
/// `Track::remove` to splice the free list without a full encode/decode.
pub const NEXT_OFFSET_FIELD: usize = 7;
/// Byte offset of the `valid` field within a chunk record.
pub const VALID_FIELD: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    const C: usize = 64;
    const D: usize = C - CHUNK_HEADER_SIZE;

    #[test]
    fn round_trip_partial_payload() {
        let chunk = Chunk {
            id: 7,
            valid: true,
            next_track: 3,
            next_offset: 128,
            payload: vec![0xABu8; 10],
        };
        let buf = encode(C, &chunk);
        assert_eq!(buf.len(), C);
        let back = decode(C, &buf);
        assert_eq!(back.id, 7);
        assert!(back.valid);
        assert_eq!(back.next_track, 3);
        assert_eq!(back.next_offset, 128);
        assert_eq!(back.payload, vec![0xABu8; 10]);
    }

    #[test]
    fn round_trip_full_payload_sentinel() {
        let chunk = Chunk {
            id: 0,
            valid: true,
            next_track: 0,
            next_offset: 0,
            payload: vec![0x11u8; D],
        };
        let buf = encode(C, &chunk);
        // payload_len field must be the 0 sentinel.
        assert_eq!(u16::from_be_bytes(buf[5..7].try_into().unwrap()), 0);
        let back = decode(C, &buf);
        assert_eq!(back.payload.len(), D);
    }

    #[test]
    fn lazy_matches_full_decode() {
        let chunk = Chunk {
            id: 1,
            valid: false,
            next_track: 9,
            next_offset: 4096,
            payload: vec![],
        };
        let buf = encode(C, &chunk);
        let lazy = decode_lazy(&buf[NEXT_OFFSET_FIELD..]);
        assert_eq!(lazy.next_track, 9);
        assert_eq!(lazy.next_offset, 4096);
        assert!(!lazy.is_terminal());
    }

    #[test]
    fn terminal_link_detected() {
        let link = ChunkLink { next_track: 0, next_offset: 0 };
        assert!(link.is_terminal());
    }
}
