//! Block-granularity I/O collaborator interface.
//!
//! The header codec does not perform I/O itself; it consumes this narrow
//! trait, implemented in the full engine by the cache/file layer. The
//! locked-read variant exists for the header's fixed blocks: a locked read
//! must not observe a concurrently in-flight header rewrite.
//!
//! `FileBlockIo` is a plain file-backed implementation used by integration
//! tests and single-file deployments.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Address of a block, in block-size units from the start of the file.
pub type BlockAddress = u64;

/// Block read/write surface consumed by the header codec.
pub trait BlockIo {
    /// Block size this device reads and writes, in bytes.
    fn block_size(&self) -> usize;

    /// Read the block at `addr` into `buf` (`buf.len() == block_size()`).
    fn read_block(&mut self, addr: BlockAddress, buf: &mut [u8]) -> io::Result<()>;

    /// Read the block at `addr`, excluding concurrent writers of the same
    /// block for the duration of the read.
    ///
    /// Implementations without shared-cache concurrency may forward to
    /// [`BlockIo::read_block`].
    fn read_block_locked(&mut self, addr: BlockAddress, buf: &mut [u8]) -> io::Result<()> {
        self.read_block(addr, buf)
    }

    /// Write `buf` as the block at `addr`.
    fn write_block(&mut self, addr: BlockAddress, buf: &[u8]) -> io::Result<()>;

    /// Flush written blocks to durable storage.
    fn flush(&mut self) -> io::Result<()>;
}

/// File-backed block device with a fixed block size.
pub struct FileBlockIo {
    file: File,
    block_size: usize,
}

impl FileBlockIo {
    /// Create a new database file, failing if it already exists.
    pub fn create(path: &Path, block_size: usize) -> io::Result<FileBlockIo> {
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;
        Ok(FileBlockIo { file, block_size })
    }

    /// Open an existing database file.
    pub fn open(path: &Path, block_size: usize) -> io::Result<FileBlockIo> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(FileBlockIo { file, block_size })
    }

    fn seek_to(&mut self, addr: BlockAddress) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(addr * self.block_size as u64))?;
        Ok(())
    }
}

impl BlockIo for FileBlockIo {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&mut self, addr: BlockAddress, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), self.block_size);
        self.seek_to(addr)?;
        self.file.read_exact(buf)
    }

    fn write_block(&mut self, addr: BlockAddress, buf: &[u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), self.block_size);
        self.seek_to(addr)?;
        self.file.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_write_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.keel");

        let mut io = FileBlockIo::create(&path, 512).unwrap();
        let block = vec![0xA5u8; 512];
        io.write_block(0, &block).unwrap();
        io.write_block(3, &block).unwrap();
        io.flush().unwrap();
        drop(io);

        let mut io = FileBlockIo::open(&path, 512).unwrap();
        let mut buf = vec![0u8; 512];
        io.read_block(3, &mut buf).unwrap();
        assert_eq!(buf, block);

        // Locked read falls back to the plain read for the file device.
        io.read_block_locked(0, &mut buf).unwrap();
        assert_eq!(buf, block);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.keel");
        FileBlockIo::create(&path, 512).unwrap();
        assert!(FileBlockIo::create(&path, 512).is_err());
    }

    #[test]
    fn test_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.keel");
        let mut io = FileBlockIo::create(&path, 512).unwrap();
        let mut buf = vec![0u8; 512];
        assert!(io.read_block(7, &mut buf).is_err());
    }
}
