//! Name index — an append-only, fixed-record `key -> (meta_head, chunk_head)`
//! map with an in-memory hot cache and a lazy linear scan on miss.
//!
//! # On-disk record (54 bytes, big-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      2   magic        0x9900
//!    2     32   key          SHA-256(name)
//!   34      2   meta_track
//!   36      8   meta_offset
//!   44      2   chunk_track
//!   46      8   chunk_offset
//! ```
//!
//! `set()` is serialised through a dedicated worker thread that exclusively
//! owns the append handle — see [`Index::open`] and the module-level notes
//! below for why a rendezvous channel rather than a mutex.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::error::{IndexError, IndexResult};
use crate::file_handle::FileHandle;

const MAGIC: u16 = 0x9900;
const RECORD_SIZE: usize = 54;

/// The two chain heads a name resolves to. The metadata chain is reserved
/// for future use and is always `(0, 0)` in this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heads {
    pub meta_track: u16,
    pub meta_offset: u64,
    pub chunk_track: u16,
    pub chunk_offset: u64,
}

fn encode_record(key: &[u8; 32], heads: &Heads) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..2].copy_from_slice(&MAGIC.to_be_bytes());
    buf[2..34].copy_from_slice(key);
    buf[34..36].copy_from_slice(&heads.meta_track.to_be_bytes());
    buf[36..44].copy_from_slice(&heads.meta_offset.to_be_bytes());
    buf[44..46].copy_from_slice(&heads.chunk_track.to_be_bytes());
    buf[46..54].copy_from_slice(&heads.chunk_offset.to_be_bytes());
    buf
}

/// Decode a record, returning `None` for a bad magic (corrupt or
/// non-record bytes) — skip-and-continue per spec.md §7, never fatal.
fn decode_record(buf: &[u8; RECORD_SIZE]) -> Option<([u8; 32], Heads)> {
    let magic = u16::from_be_bytes(buf[0..2].try_into().unwrap());
    if magic != MAGIC {
        return None;
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&buf[2..34]);
    let heads = Heads {
        meta_track: u16::from_be_bytes(buf[34..36].try_into().unwrap()),
        meta_offset: u64::from_be_bytes(buf[36..44].try_into().unwrap()),
        chunk_track: u16::from_be_bytes(buf[44..46].try_into().unwrap()),
        chunk_offset: u64::from_be_bytes(buf[46..54].try_into().unwrap()),
    };
    Some((key, heads))
}

fn digest(name: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(name);
    hasher.finalize().into()
}

/// In-memory cache entry. `cache_cycle_ts` is a logical tick (not wall
/// time) bumped on every touch — the substrate spec.md §9 reserves for a
/// future LRU/LFU eviction policy bounded by `max_memory`; eviction itself
/// is stubbed (never evicts) but the fields are preserved as instructed.
#[derive(Debug, Clone)]
struct CacheEntry {
    cache_cycle_ts: u64,
    hit_count: u64,
    file_offset: u64,
    heads: Heads,
}

struct SetRequest {
    name: Vec<u8>,
    key: [u8; 32],
    heads: Heads,
    reply: SyncSender<IndexResult<bool>>,
}

type SharedCache = Arc<Mutex<HashMap<[u8; 32], CacheEntry>>>;
type SharedSeen = Arc<Mutex<HashSet<u64>>>;

pub struct Index {
    cache: SharedCache,
    seen_offsets: SharedSeen,
    clock: Arc<AtomicU64>,
    read_file: FileHandle,
    set_tx: Option<SyncSender<SetRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl Index {
    /// Open (or create) `<directory>/index`, scanning every existing record
    /// into the cache, and spawn the worker thread that owns the append
    /// handle for `set()`.
    pub fn open(directory: &Path) -> IndexResult<Self> {
        let path = directory.join("index");
        let scan_file = FileHandle::open_or_create(&path)?;
        let file_size = scan_file.size()?;

        let cache: SharedCache = Arc::new(Mutex::new(HashMap::new()));
        let seen_offsets: SharedSeen = Arc::new(Mutex::new(HashSet::new()));
        let clock = Arc::new(AtomicU64::new(0));

        {
            let mut cache_guard = cache.lock().unwrap();
            let mut seen_guard = seen_offsets.lock().unwrap();
            let mut offset = 0u64;
            let mut loaded = 0u64;
            while offset + RECORD_SIZE as u64 <= file_size {
                let mut buf = [0u8; RECORD_SIZE];
                if scan_file.read_exact_at(&mut buf, offset).is_err() {
                    break;
                }
                if let Some((key, heads)) = decode_record(&buf) {
                    let tick = clock.fetch_add(1, Ordering::Relaxed);
                    cache_guard.insert(key, CacheEntry { cache_cycle_ts: tick, hit_count: 0, file_offset: offset, heads });
                    seen_guard.insert(offset);
                    loaded += 1;
                }
                offset += RECORD_SIZE as u64;
            }
            debug!(records = loaded, file_size, "index scanned at open");
        }

        let append_file = FileHandle::open_or_create(&path)?;
        let read_file = FileHandle::open_or_create(&path)?;

        let (tx, rx): (SyncSender<SetRequest>, Receiver<SetRequest>) = sync_channel(0);
        let worker = Self::spawn_worker(append_file, rx, cache.clone(), seen_offsets.clone(), clock.clone());

        Ok(Self { cache, seen_offsets, clock, read_file, set_tx: Some(tx), worker: Some(worker) })
    }

    /// The worker exclusively owns the append handle and, for the duration
    /// of each request, the cache/seen-offsets locks — so a duplicate check,
    /// the append, and the cache insert happen as one atomic step from the
    /// caller's perspective, matching spec.md §4.5's "file_size -> append ->
    /// cache insert" atomicity requirement.
    fn spawn_worker(file: FileHandle, rx: Receiver<SetRequest>, cache: SharedCache, seen_offsets: SharedSeen, clock: Arc<AtomicU64>) -> JoinHandle<()> {
        std::thread::spawn(move || {
            for req in rx.iter() {
                let result = (|| -> IndexResult<bool> {
                    if cache.lock().unwrap().contains_key(&req.key) {
                        return Ok(false);
                    }
                    let record = encode_record(&req.key, &req.heads);
                    let offset = file.size()?;
                    file.append(&record)?;

                    let tick = clock.fetch_add(1, Ordering::Relaxed);
                    cache.lock().unwrap().insert(
                        req.key,
                        CacheEntry { cache_cycle_ts: tick, hit_count: 0, file_offset: offset, heads: req.heads },
                    );
                    seen_offsets.lock().unwrap().insert(offset);
                    debug!(key_prefix = %hex::encode(&req.key[..4]), offset, name_len = req.name.len(), "index set");
                    Ok(true)
                })();
                let _ = req.reply.send(result);
            }
        })
    }

    /// Resolve `name` to its chain heads.
    pub fn get(&self, name: &[u8]) -> IndexResult<Option<Heads>> {
        let key = digest(name);

        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(entry) = cache.get_mut(&key) {
                entry.hit_count += 1;
                entry.cache_cycle_ts = self.clock.fetch_add(1, Ordering::Relaxed);
                trace!(hit_count = entry.hit_count, "index cache hit");
                return Ok(Some(entry.heads));
            }
        }

        let file_size = self.read_file.size()?;
        let seen = self.seen_offsets.lock().unwrap().clone();
        let mut found = None;
        let mut scanned = 0u64;
        let mut offset = 0u64;

        while offset + RECORD_SIZE as u64 <= file_size {
            if seen.contains(&offset) {
                offset += RECORD_SIZE as u64;
                continue;
            }
            let mut buf = [0u8; RECORD_SIZE];
            if self.read_file.read_exact_at(&mut buf, offset).is_err() {
                break;
            }
            scanned += 1;
            if let Some((record_key, heads)) = decode_record(&buf) {
                self.seen_offsets.lock().unwrap().insert(offset);
                if record_key == key {
                    found = Some((offset, heads));
                }
            }
            offset += RECORD_SIZE as u64;
        }

        debug!(scanned, hit = found.is_some(), "index linear scan on cache miss");

        match found {
            Some((offset, heads)) => {
                let tick = self.clock.fetch_add(1, Ordering::Relaxed);
                self.cache
                    .lock()
                    .unwrap()
                    .insert(key, CacheEntry { cache_cycle_ts: tick, hit_count: 1, file_offset: offset, heads });
                Ok(Some(heads))
            }
            None => Ok(None),
        }
    }

    /// Insert a new mapping. Returns `Ok(false)` if `name` already has a
    /// live cache entry (the `Kernel` surfaces this as `AlreadyExists`). The
    /// duplicate check, append, and cache insert all happen inside the
    /// worker thread (see `spawn_worker`), not here, so a concurrent caller
    /// can never race this one into a double append.
    pub fn set(&self, name: &[u8], heads: Heads) -> IndexResult<bool> {
        let key = digest(name);
        let (reply_tx, reply_rx) = sync_channel(0);
        let tx = self
            .set_tx
            .as_ref()
            .expect("set_tx is only taken in Drop, after which no call can observe self");
        tx.send(SetRequest { name: name.to_vec(), key, heads, reply: reply_tx })
            .map_err(|_| IndexError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "index worker thread is gone")))?;
        reply_rx
            .recv()
            .map_err(|_| IndexError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "index worker thread dropped the reply channel")))?
    }

    /// Drop the cache entry for `name`. The on-disk record remains as a
    /// tombstone candidate for a future compaction pass.
    pub fn remove(&self, name: &[u8]) -> IndexResult<()> {
        let key = digest(name);
        self.cache.lock().unwrap().remove(&key);
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        // Drop the sender first so the worker's `rx.iter()` loop observes a
        // closed channel and exits; only then is it safe to join.
        self.set_tx.take();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
