#![forbid(unsafe_code)]
//! Read-only byte and block I/O over a disk image.
//!
//! Provides the `ByteDevice` trait for fixed-offset reads (pread
//! semantics), a file-backed implementation, and `BlockReader`, which
//! carries the block size established at mount time so callers address
//! the image by block number.

use e4nav_error::{NavError, Result};
use e4nav_types::{
    BlockNumber, BlockSize, ByteOffset, EXT4_SUPERBLOCK_OFFSET, EXT4_SUPERBLOCK_SIZE,
};
use std::fs::File;
use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::sync::Arc;

/// Owned block buffer.
///
/// Invariant: length == the block size of the originating reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBuf {
    bytes: Vec<u8>,
}

impl BlockBuf {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

/// Byte-addressed device for fixed-offset reads (pread semantics).
pub trait ByteDevice: Send + Sync {
    /// Total length in bytes.
    fn len_bytes(&self) -> u64;

    /// Read exactly `buf.len()` bytes from `offset` into `buf`.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

/// File-backed byte device using Linux `pread` style I/O.
///
/// Opened read-only. `std::os::unix::fs::FileExt` is thread-safe and does
/// not require a shared seek position.
#[derive(Debug, Clone)]
pub struct FileByteDevice {
    file: Arc<File>,
    len: u64,
}

impl FileByteDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        let len = file.metadata()?.len();
        Ok(Self {
            file: Arc::new(file),
            len,
        })
    }
}

impl ByteDevice for FileByteDevice {
    fn len_bytes(&self) -> u64 {
        self.len
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset
            .checked_add(
                u64::try_from(buf.len())
                    .map_err(|_| NavError::Format("read length overflows u64".to_owned()))?,
            )
            .ok_or_else(|| NavError::Format("read range overflows u64".to_owned()))?;
        if end > self.len {
            return Err(NavError::Format(format!(
                "read out of bounds: offset={offset} len={} image_len={}",
                buf.len(),
                self.len
            )));
        }

        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }
}

/// In-memory byte device, handy when a test builds an image in a `Vec`.
#[derive(Debug, Clone)]
pub struct MemByteDevice {
    bytes: Arc<Vec<u8>>,
}

impl MemByteDevice {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }
}

impl ByteDevice for MemByteDevice {
    fn len_bytes(&self) -> u64 {
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let offset = usize::try_from(offset)
            .map_err(|_| NavError::Format("offset overflows usize".to_owned()))?;
        let end = offset
            .checked_add(buf.len())
            .ok_or_else(|| NavError::Format("read range overflows usize".to_owned()))?;
        if end > self.bytes.len() {
            return Err(NavError::Format(format!(
                "read out of bounds: offset={offset} len={} image_len={}",
                buf.len(),
                self.bytes.len()
            )));
        }
        buf.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }
}

/// Read the 1024-byte superblock region at its fixed offset.
pub fn read_superblock_region(dev: &dyn ByteDevice) -> Result<[u8; EXT4_SUPERBLOCK_SIZE]> {
    let mut buf = [0_u8; EXT4_SUPERBLOCK_SIZE];
    dev.read_exact_at(EXT4_SUPERBLOCK_OFFSET, &mut buf)?;
    Ok(buf)
}

/// Block-addressed reads over a byte device, with the block size fixed
/// when the session is established.
pub struct BlockReader {
    dev: Box<dyn ByteDevice>,
    block_size: BlockSize,
    block_count: u64,
}

impl BlockReader {
    /// Wrap a device with a validated block size.
    ///
    /// The image length does not have to be block-aligned; a trailing
    /// partial block is simply not addressable as a block.
    #[must_use]
    pub fn new(dev: Box<dyn ByteDevice>, block_size: BlockSize) -> Self {
        let block_count = dev.len_bytes() / u64::from(block_size.get());
        Self {
            dev,
            block_size,
            block_count,
        }
    }

    #[must_use]
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Read one whole block into an owned buffer.
    pub fn read_block(&self, block: BlockNumber) -> Result<BlockBuf> {
        if block.0 >= self.block_count {
            return Err(NavError::Format(format!(
                "block out of range: block={} block_count={}",
                block.0, self.block_count
            )));
        }

        let offset = self
            .block_size
            .block_to_byte(block)
            .ok_or_else(|| NavError::Format("block offset overflow".to_owned()))?;
        let len = usize::try_from(self.block_size.get())
            .map_err(|_| NavError::Format("block_size does not fit usize".to_owned()))?;
        let mut buf = vec![0_u8; len];
        self.dev.read_exact_at(offset.0, &mut buf)?;
        Ok(BlockBuf::new(buf))
    }

    /// Read `len` bytes at an arbitrary byte offset.
    ///
    /// Used for structures that are not block-aligned, like an inode in
    /// the middle of the inode table.
    pub fn read_at(&self, offset: ByteOffset, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0_u8; len];
        self.dev.read_exact_at(offset.0, &mut buf)?;
        Ok(buf)
    }

    /// Read the superblock region through the underlying device.
    pub fn read_superblock_region(&self) -> Result<[u8; EXT4_SUPERBLOCK_SIZE]> {
        read_superblock_region(self.dev.as_ref())
    }
}

impl std::fmt::Debug for BlockReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockReader")
            .field("block_size", &self.block_size)
            .field("block_count", &self.block_count)
            .finish_non_exhaustive()
    }
}
