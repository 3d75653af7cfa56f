#![forbid(unsafe_code)]
//! Navigation engine over a read-only ext4 disk image.
//!
//! [`Ext4Image`] is a mounted session: it opens the image, parses and
//! validates the superblock and the first group descriptor once, and then
//! answers inode reads, directory listings, path resolution, and file
//! content reads against that cached state.
//!
//! Per-block and per-inode failures inside a walk are logged and skipped
//! so a partially damaged image still yields partial output; only the
//! mount itself is all-or-nothing.

use e4nav_block::{BlockReader, FileByteDevice};
use e4nav_ondisk::{Ext4GroupDesc, parse_dir_block, parse_inline_extents};
use e4nav_types::{BlockSize, ParseError};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

pub use e4nav_block::{ByteDevice, MemByteDevice};
pub use e4nav_error::{NavError, Result};
pub use e4nav_ondisk::{Ext4DirEntry, Ext4FileType, Ext4Inode, Ext4Superblock};
pub use e4nav_types::{BlockNumber, InodeNumber};

/// Convert a parse-layer error into the user-facing error taxonomy.
///
/// `InvalidField` is mapped by field name: extent tree depth means the
/// image uses a feature outside this tool's scope, everything else is a
/// format violation. The original error text is preserved.
fn parse_error_to_nav(e: &ParseError) -> NavError {
    match e {
        ParseError::InvalidField { field, .. } if field.contains("eh_depth") => {
            NavError::Unsupported(e.to_string())
        }
        _ => NavError::Parse(e.to_string()),
    }
}

/// Mount-level facts about the image, suitable for structured output.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub volume_name: String,
    pub block_size: u32,
    pub blocks_count: u64,
    pub inodes_count: u32,
    pub free_blocks_count: u64,
    pub free_inodes_count: u32,
}

/// A mounted read-only ext4 image.
///
/// The block size, superblock, and first group descriptor are fixed at
/// mount time. Inode table lookups address the first block group only,
/// which covers small single-group images.
#[derive(Debug)]
pub struct Ext4Image {
    reader: BlockReader,
    sb: Ext4Superblock,
    gd: Ext4GroupDesc,
}

impl Ext4Image {
    /// Mount the image file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let dev = FileByteDevice::open(path)?;
        Self::from_device(Box::new(dev))
    }

    /// Mount an already-open byte device.
    pub fn from_device(dev: Box<dyn ByteDevice>) -> Result<Self> {
        let region = e4nav_block::read_superblock_region(dev.as_ref())?;
        let sb = Ext4Superblock::parse_superblock_region(&region)
            .map_err(|e| parse_error_to_nav(&e))?;
        sb.validate_geometry().map_err(|e| parse_error_to_nav(&e))?;

        let block_size = BlockSize::new(sb.block_size).map_err(|e| parse_error_to_nav(&e))?;
        let reader = BlockReader::new(dev, block_size);

        let gd_offset = sb
            .group_desc_offset()
            .ok_or_else(|| NavError::Format("group descriptor offset overflow".to_owned()))?;
        let gd_bytes = reader.read_at(gd_offset, Ext4GroupDesc::SIZE)?;
        let gd = Ext4GroupDesc::parse_from_bytes(&gd_bytes).map_err(|e| parse_error_to_nav(&e))?;

        debug!(
            volume = %sb.volume_name,
            block_size = sb.block_size,
            inode_table = gd.inode_table,
            "mounted image"
        );

        Ok(Self { reader, sb, gd })
    }

    #[must_use]
    pub fn superblock(&self) -> &Ext4Superblock {
        &self.sb
    }

    /// Volume label from the superblock. Empty when unset.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.sb.volume_name
    }

    #[must_use]
    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            volume_name: self.sb.volume_name.clone(),
            block_size: self.sb.block_size,
            blocks_count: self.sb.blocks_count,
            inodes_count: self.sb.inodes_count,
            free_blocks_count: self.sb.free_blocks_count,
            free_inodes_count: self.sb.free_inodes_count,
        }
    }

    /// Read and parse an inode from the first group's inode table.
    pub fn read_inode(&self, ino: InodeNumber) -> Result<Ext4Inode> {
        if ino.0 == 0 {
            return Err(NavError::Format("inode 0 is invalid".to_owned()));
        }
        if ino.0 > self.sb.inodes_count {
            return Err(NavError::NotFound(format!(
                "inode {ino} (image has {} inodes)",
                self.sb.inodes_count
            )));
        }

        let table_byte = self
            .reader
            .block_size()
            .block_to_byte(self.gd.inode_table_block())
            .ok_or_else(|| NavError::Format("inode table offset overflow".to_owned()))?;
        let within = self
            .sb
            .inode_offset_in_table(ino)
            .ok_or_else(|| NavError::Format("inode offset overflow".to_owned()))?;
        let offset = table_byte
            .checked_add(within)
            .ok_or_else(|| NavError::Format("inode offset overflow".to_owned()))?;

        let bytes = self.reader.read_at(offset, usize::from(self.sb.inode_size))?;
        Ext4Inode::parse_from_bytes(&bytes).map_err(|e| parse_error_to_nav(&e))
    }

    /// Resolve an inode's data block numbers from its inline extent root.
    ///
    /// Blocks appear in extent record order, each extent expanded to its
    /// full run. A fully zeroed extent area yields an empty list. Extents
    /// addressing above 32 bits are truncated to their low half, with a
    /// diagnostic.
    pub fn data_blocks(&self, inode: &Ext4Inode) -> Result<Vec<BlockNumber>> {
        let (_, extents) =
            parse_inline_extents(&inode.block_area).map_err(|e| parse_error_to_nav(&e))?;

        let mut blocks = Vec::new();
        for ext in &extents {
            if ext.has_high_bits() {
                warn!(
                    physical_hi = ext.physical_hi,
                    "extent uses 48-bit block addressing, using low 32 bits only"
                );
            }
            let start = ext.physical_start_lo();
            for i in 0..u64::from(ext.actual_len()) {
                let block = start
                    .checked_add(i)
                    .ok_or_else(|| NavError::Format("extent block number overflow".to_owned()))?;
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    /// List the live entries of a directory inode, in on-disk order.
    ///
    /// Only file and directory entries are returned. Unreadable or
    /// malformed data blocks are skipped with a diagnostic.
    pub fn list_dir(&self, inode: &Ext4Inode) -> Result<Vec<Ext4DirEntry>> {
        let mut entries = Vec::new();
        self.walk_dir_blocks(inode, |block_entries| {
            entries.extend(
                block_entries
                    .into_iter()
                    .filter(|e| matches!(e.file_type, Ext4FileType::RegFile | Ext4FileType::Dir)),
            );
            false
        })?;
        Ok(entries)
    }

    /// Find a name in a directory inode by exact byte comparison.
    pub fn find_entry(&self, inode: &Ext4Inode, name: &[u8]) -> Result<Option<Ext4DirEntry>> {
        let mut found = None;
        self.walk_dir_blocks(inode, |block_entries| {
            found = block_entries.into_iter().find(|e| {
                matches!(e.file_type, Ext4FileType::RegFile | Ext4FileType::Dir)
                    && e.name == name
            });
            found.is_some()
        })?;
        Ok(found)
    }

    /// Run `visit` over the parsed entries of each directory data block.
    /// `visit` returns true to stop early. Failing blocks are skipped.
    fn walk_dir_blocks(
        &self,
        inode: &Ext4Inode,
        mut visit: impl FnMut(Vec<Ext4DirEntry>) -> bool,
    ) -> Result<()> {
        if !inode.is_dir() {
            return Err(NavError::NotDirectory(format!(
                "inode mode {:#o}",
                inode.mode
            )));
        }

        for block in self.data_blocks(inode)? {
            let buf = match self.reader.read_block(block) {
                Ok(buf) => buf,
                Err(err) => {
                    warn!(block = %block, error = %err, "skipping unreadable directory block");
                    continue;
                }
            };
            let block_entries = match parse_dir_block(buf.as_slice()) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(block = %block, error = %err, "skipping malformed directory block");
                    continue;
                }
            };
            if visit(block_entries) {
                break;
            }
        }
        Ok(())
    }

    /// Resolve an absolute slash-separated path to its inode.
    ///
    /// `"/"` resolves to the root directory. Empty components (trailing
    /// or doubled slashes) are ignored. Every non-terminal component must
    /// be a directory. Relative paths are rejected.
    pub fn resolve_path(&self, path: &str) -> Result<(InodeNumber, Ext4Inode)> {
        if !path.starts_with('/') {
            return Err(NavError::NotFound(format!("path must be absolute: {path:?}")));
        }

        let mut ino = InodeNumber::ROOT;
        let mut inode = self.read_inode(ino)?;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !inode.is_dir() {
                return Err(NavError::NotDirectory(format!(
                    "{path}: component before {component:?} is not a directory"
                )));
            }
            let entry = self
                .find_entry(&inode, component.as_bytes())?
                .ok_or_else(|| NavError::NotFound(format!("{component:?} in {path}")))?;
            ino = InodeNumber(entry.inode);
            inode = self.read_inode(ino)?;
        }

        Ok((ino, inode))
    }

    /// Read a file's text content: each data block contributes its bytes up
    /// to the first NUL. Unreadable blocks are skipped with a diagnostic.
    pub fn file_text(&self, inode: &Ext4Inode) -> Result<Vec<u8>> {
        if !inode.is_regular() {
            return Err(NavError::NotRegularFile(format!(
                "inode mode {:#o}",
                inode.mode
            )));
        }

        let mut text = Vec::new();
        for block in self.data_blocks(inode)? {
            let buf = match self.reader.read_block(block) {
                Ok(buf) => buf,
                Err(err) => {
                    warn!(block = %block, error = %err, "skipping unreadable file block");
                    continue;
                }
            };
            let bytes = buf.as_slice();
            let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
            text.extend_from_slice(&bytes[..end]);
        }
        Ok(text)
    }
}

/// One directory entry formatted for display: the name, with a trailing
/// slash for directories.
#[must_use]
pub fn format_entry(entry: &Ext4DirEntry) -> String {
    match entry.file_type {
        Ext4FileType::Dir => format!("{}/", entry.name_str()),
        _ => entry.name_str(),
    }
}
