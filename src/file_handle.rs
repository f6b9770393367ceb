//! Positional file handle — the leaf I/O primitive every other component
//! builds on.
//!
//! `Track` and `Index` never rely on a shared file cursor: every read and
//! write names its own byte offset, so concurrent logical operations against
//! the same `File` (the index worker thread, for instance) never race on
//! `seek`. This is built on `std::os::unix::fs::FileExt`, which gives true
//! `pread`/`pwrite` semantics without a `Mutex<Seek>` wrapper.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

/// Thin positional wrapper around an open file descriptor.
///
/// `FileHandle` exclusively owns its descriptor for its lifetime; it is
/// dropped (and the descriptor released) when the owning `Track`/`Index`
/// is dropped.
pub struct FileHandle {
    file: File,
}

impl FileHandle {
    /// Open `path` for reading and writing, creating it if it does not exist.
    pub fn open_or_create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Current file length in bytes.
    pub fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Single positional read. Returns the number of bytes actually read;
    /// `0` means end-of-file, anything less than `buf.len()` is a partial
    /// read (the caller decides whether that is an error).
    pub fn read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        loop {
            match self.file.read_at(buf, offset) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read exactly `buf.len()` bytes starting at `offset`, looping over
    /// short reads. Fails with `UnexpectedEof` if the file ends first.
    pub fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read(buf, offset)? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "file ended before the requested region was fully read",
                    ))
                }
                n => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
            }
        }
        Ok(())
    }

    /// Positional write that *completes fully*: it loops internally until
    /// every byte has been accepted by the OS, or a genuine device error
    /// occurs. Upper layers treat every `write` as a transactional unit over
    /// a fixed region (a chunk record, an index record); a silently partial
    /// write would corrupt a linked-list pointer.
    pub fn write(&self, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.file.write_at(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "write_at returned 0 bytes written",
                    ))
                }
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Atomic append — used only by the name index, whose on-disk semantics
    /// depend on every record landing strictly after the previous one.
    pub fn append(&self, buf: &[u8]) -> io::Result<()> {
        let mut remaining = buf;
        while !remaining.is_empty() {
            // O_APPEND-equivalent: std::fs::File opened without append(true)
            // here, so emulate atomic append via the file's current length.
            // Reopening with append(true) would share a cursor across
            // operations we otherwise keep offset-addressed; instead we
            // serialize at the call site (Index's single-slot queue) and
            // write at the observed end-of-file.
            let offset = self.size()?;
            match self.file.write_at(remaining, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "append write_at returned 0 bytes written",
                    ))
                }
                Ok(n) => remaining = &remaining[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let h = FileHandle::open_or_create(&path).unwrap();
        h.write(b"hello world", 0).unwrap();
        let mut buf = [0u8; 5];
        h.read_exact_at(&mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn read_past_eof_reports_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let h = FileHandle::open_or_create(&path).unwrap();
        h.write(b"ab", 0).unwrap();
        let mut buf = [0u8; 4];
        let n = h.read(&mut buf, 10).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn append_grows_file_and_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let h = FileHandle::open_or_create(&path).unwrap();
        h.append(b"AAAA").unwrap();
        h.append(b"BBBB").unwrap();
        assert_eq!(h.size().unwrap(), 8);
        let mut buf = [0u8; 8];
        h.read_exact_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"AAAABBBB");
    }

    #[test]
    fn size_reflects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let h = FileHandle::open_or_create(&path).unwrap();
        assert_eq!(h.size().unwrap(), 0);
        h.write(b"1234567890", 0).unwrap();
        assert_eq!(h.size().unwrap(), 10);
    }
}
