#![forbid(unsafe_code)]

use e4nav_types::{
    BlockNumber, ByteOffset, EXT4_EXTENT_MAGIC, EXT4_INODE_BLOCK_AREA, EXT4_SUPER_MAGIC,
    EXT4_SUPERBLOCK_SIZE, InodeNumber, ParseError, S_IFDIR, S_IFMT, S_IFREG, ensure_slice,
    ext4_block_size_from_log, read_fixed, read_le_u16, read_le_u32, trim_nul_padded,
};
use serde::{Deserialize, Serialize};

/// The inode flag marking that `i_block` holds an extent tree root.
const EXT4_EXTENTS_FL: u32 = 0x0008_0000;

/// Length values above this mark an extent as unwritten (preallocated).
const EXT_INIT_MAX_LEN: u16 = 1_u16 << 15;

// ── Superblock ──────────────────────────────────────────────────────────────

/// The subset of the ext4 superblock needed to locate and walk on-disk
/// structures, parsed from the 1024-byte region at byte offset 1024.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext4Superblock {
    pub inodes_count: u32,
    pub blocks_count: u64,
    pub free_blocks_count: u64,
    pub free_inodes_count: u32,
    pub first_data_block: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub inode_size: u16,
    pub magic: u16,
    pub uuid: [u8; 16],
    pub volume_name: String,
    pub rev_level: u32,
    pub state: u16,
}

impl Ext4Superblock {
    /// Parse the fields above from a 1024-byte superblock region.
    pub fn parse_superblock_region(region: &[u8]) -> Result<Self, ParseError> {
        if region.len() < EXT4_SUPERBLOCK_SIZE {
            return Err(ParseError::InsufficientData {
                needed: EXT4_SUPERBLOCK_SIZE,
                offset: 0,
                actual: region.len(),
            });
        }

        let magic = read_le_u16(region, 0x38)?;
        if magic != EXT4_SUPER_MAGIC {
            return Err(ParseError::InvalidMagic {
                expected: u32::from(EXT4_SUPER_MAGIC),
                actual: u32::from(magic),
            });
        }

        let log_block_size = read_le_u32(region, 0x18)?;
        let Some(block_size) = ext4_block_size_from_log(log_block_size) else {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "invalid shift",
            });
        };
        if !matches!(block_size, 1024 | 2048 | 4096) {
            return Err(ParseError::InvalidField {
                field: "s_log_block_size",
                reason: "unsupported block size",
            });
        }

        let blocks_lo = u64::from(read_le_u32(region, 0x04)?);
        let blocks_hi = u64::from(read_le_u32(region, 0x150)?);
        let free_blocks_lo = u64::from(read_le_u32(region, 0x0C)?);
        let free_blocks_hi = u64::from(read_le_u32(region, 0x158)?);

        Ok(Self {
            inodes_count: read_le_u32(region, 0x00)?,
            blocks_count: blocks_lo | (blocks_hi << 32),
            free_blocks_count: free_blocks_lo | (free_blocks_hi << 32),
            free_inodes_count: read_le_u32(region, 0x10)?,
            first_data_block: read_le_u32(region, 0x14)?,
            block_size,
            blocks_per_group: read_le_u32(region, 0x20)?,
            inodes_per_group: read_le_u32(region, 0x28)?,
            inode_size: read_le_u16(region, 0x58)?,
            magic,
            uuid: read_fixed::<16>(region, 0x68)?,
            volume_name: trim_nul_padded(&read_fixed::<16>(region, 0x78)?),
            rev_level: read_le_u32(region, 0x4C)?,
            state: read_le_u16(region, 0x3A)?,
        })
    }

    /// Validate field values that later offset arithmetic relies on.
    pub fn validate_geometry(&self) -> Result<(), ParseError> {
        if self.inode_size < 128 {
            return Err(ParseError::InvalidField {
                field: "s_inode_size",
                reason: "must be >= 128",
            });
        }
        if !self.inode_size.is_power_of_two() {
            return Err(ParseError::InvalidField {
                field: "s_inode_size",
                reason: "must be a power of two",
            });
        }
        if u32::from(self.inode_size) > self.block_size {
            return Err(ParseError::InvalidField {
                field: "s_inode_size",
                reason: "inode_size exceeds block_size",
            });
        }
        if self.inodes_per_group == 0 {
            return Err(ParseError::InvalidField {
                field: "s_inodes_per_group",
                reason: "cannot be zero",
            });
        }
        if self.blocks_count == 0 {
            return Err(ParseError::InvalidField {
                field: "s_blocks_count",
                reason: "cannot be zero",
            });
        }
        Ok(())
    }

    /// Byte offset of the first group descriptor.
    ///
    /// The descriptor table occupies the block after the superblock: block 2
    /// for 1K block size (the superblock fills block 1), block 1 otherwise.
    #[must_use]
    pub fn group_desc_offset(&self) -> Option<ByteOffset> {
        let gdt_start_block = if self.block_size == 1024 { 2_u64 } else { 1_u64 };
        gdt_start_block
            .checked_mul(u64::from(self.block_size))
            .map(ByteOffset)
    }

    /// Byte offset of inode `ino` relative to the start of the inode table.
    ///
    /// Inode numbers are 1-indexed; `None` for inode 0 or on overflow.
    /// Only the first block group's table is addressed, so images where
    /// every interesting inode lives in group 0 are the supported shape.
    #[must_use]
    pub fn inode_offset_in_table(&self, ino: InodeNumber) -> Option<u64> {
        let index = u64::from(ino.0.checked_sub(1)?);
        index.checked_mul(u64::from(self.inode_size))
    }
}

// ── Group descriptor ────────────────────────────────────────────────────────

/// A 32-byte ext4 block group descriptor (classic layout, no 64-bit fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext4GroupDesc {
    pub block_bitmap: u32,
    pub inode_bitmap: u32,
    pub inode_table: u32,
    pub free_blocks_count: u16,
    pub free_inodes_count: u16,
    pub used_dirs_count: u16,
}

impl Ext4GroupDesc {
    pub const SIZE: usize = 32;

    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < Self::SIZE {
            return Err(ParseError::InsufficientData {
                needed: Self::SIZE,
                offset: 0,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            block_bitmap: read_le_u32(bytes, 0x00)?,
            inode_bitmap: read_le_u32(bytes, 0x04)?,
            inode_table: read_le_u32(bytes, 0x08)?,
            free_blocks_count: read_le_u16(bytes, 0x0C)?,
            free_inodes_count: read_le_u16(bytes, 0x0E)?,
            used_dirs_count: read_le_u16(bytes, 0x10)?,
        })
    }

    /// Inode table start as a block number.
    #[must_use]
    pub fn inode_table_block(&self) -> BlockNumber {
        BlockNumber(u64::from(self.inode_table))
    }
}

// ── Inode ───────────────────────────────────────────────────────────────────

/// The parts of an ext4 inode the navigator reads: type, size, link count,
/// flags, and the raw 60-byte `i_block` area holding the inline extent root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext4Inode {
    pub mode: u16,
    pub size: u64,
    pub links_count: u16,
    pub flags: u32,
    /// Raw `i_block` bytes (always 60). Interpreted by
    /// [`parse_inline_extents`] when the extents flag is set.
    pub block_area: Vec<u8>,
}

impl Ext4Inode {
    /// Parse an inode from raw bytes. Requires at least the 128-byte base.
    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 128 {
            return Err(ParseError::InsufficientData {
                needed: 128,
                offset: 0,
                actual: bytes.len(),
            });
        }

        let size_lo = u64::from(read_le_u32(bytes, 0x04)?);
        let size_hi = u64::from(read_le_u32(bytes, 0x6C)?);
        let block_area = read_fixed::<{ EXT4_INODE_BLOCK_AREA }>(bytes, 0x28)?.to_vec();

        Ok(Self {
            mode: read_le_u16(bytes, 0x00)?,
            size: size_lo | (size_hi << 32),
            links_count: read_le_u16(bytes, 0x1A)?,
            flags: read_le_u32(bytes, 0x20)?,
            block_area,
        })
    }

    /// File type bits from the mode field.
    #[must_use]
    pub fn file_type_mode(&self) -> u16 {
        self.mode & S_IFMT
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type_mode() == S_IFDIR
    }

    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.file_type_mode() == S_IFREG
    }

    /// Whether `i_block` holds an extent tree root.
    #[must_use]
    pub fn uses_extents(&self) -> bool {
        (self.flags & EXT4_EXTENTS_FL) != 0
    }
}

// ── Extents ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext4ExtentHeader {
    pub magic: u16,
    pub entries: u16,
    pub max_entries: u16,
    pub depth: u16,
    pub generation: u32,
}

/// One leaf extent record: a run of contiguous physical blocks backing a
/// contiguous range of logical file blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext4Extent {
    pub logical_block: u32,
    pub raw_len: u16,
    pub physical_lo: u32,
    pub physical_hi: u16,
}

impl Ext4Extent {
    #[must_use]
    pub fn is_unwritten(self) -> bool {
        self.raw_len > EXT_INIT_MAX_LEN
    }

    #[must_use]
    pub fn actual_len(self) -> u16 {
        if self.raw_len <= EXT_INIT_MAX_LEN {
            self.raw_len
        } else {
            self.raw_len - EXT_INIT_MAX_LEN
        }
    }

    /// Whether physical addressing uses the upper 16 bits.
    #[must_use]
    pub fn has_high_bits(self) -> bool {
        self.physical_hi != 0
    }

    /// Physical start block, low 32 bits only.
    #[must_use]
    pub fn physical_start_lo(self) -> BlockNumber {
        BlockNumber(u64::from(self.physical_lo))
    }
}

/// Parse the inline extent root from an inode's `i_block` area.
///
/// A fully zeroed header (as read from an unallocated inode slot) yields an
/// empty extent list rather than an error; any other bad magic is rejected.
/// Internal nodes (depth > 0) are out of scope and reported via `eh_depth`.
pub fn parse_inline_extents(
    area: &[u8],
) -> Result<(Ext4ExtentHeader, Vec<Ext4Extent>), ParseError> {
    if area.len() < 12 {
        return Err(ParseError::InsufficientData {
            needed: 12,
            offset: 0,
            actual: area.len(),
        });
    }

    let header = Ext4ExtentHeader {
        magic: read_le_u16(area, 0x00)?,
        entries: read_le_u16(area, 0x02)?,
        max_entries: read_le_u16(area, 0x04)?,
        depth: read_le_u16(area, 0x06)?,
        generation: read_le_u32(area, 0x08)?,
    };

    if area[..12].iter().all(|b| *b == 0) {
        return Ok((header, Vec::new()));
    }

    if header.magic != EXT4_EXTENT_MAGIC {
        return Err(ParseError::InvalidMagic {
            expected: u32::from(EXT4_EXTENT_MAGIC),
            actual: u32::from(header.magic),
        });
    }

    if header.entries > header.max_entries {
        return Err(ParseError::InvalidField {
            field: "eh_entries",
            reason: "entries exceed max",
        });
    }

    if header.depth != 0 {
        return Err(ParseError::InvalidField {
            field: "eh_depth",
            reason: "internal extent nodes not supported",
        });
    }

    let entries_len = usize::from(header.entries);
    let needed = 12_usize
        .checked_add(entries_len.saturating_mul(12))
        .ok_or(ParseError::InvalidField {
            field: "eh_entries",
            reason: "overflow",
        })?;
    if area.len() < needed {
        return Err(ParseError::InsufficientData {
            needed,
            offset: 12,
            actual: area.len().saturating_sub(12),
        });
    }

    let mut extents = Vec::with_capacity(entries_len);
    for idx in 0..entries_len {
        let base = 12 + idx * 12;
        extents.push(Ext4Extent {
            logical_block: read_le_u32(area, base)?,
            raw_len: read_le_u16(area, base + 4)?,
            physical_hi: read_le_u16(area, base + 6)?,
            physical_lo: read_le_u32(area, base + 8)?,
        });
    }

    Ok((header, extents))
}

// ── Directory entries ───────────────────────────────────────────────────────

/// File type tags stored in `ext4_dir_entry_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Ext4FileType {
    Unknown = 0,
    RegFile = 1,
    Dir = 2,
    Chrdev = 3,
    Blkdev = 4,
    Fifo = 5,
    Sock = 6,
    Symlink = 7,
}

impl Ext4FileType {
    #[must_use]
    pub fn from_raw(val: u8) -> Self {
        match val {
            1 => Self::RegFile,
            2 => Self::Dir,
            3 => Self::Chrdev,
            4 => Self::Blkdev,
            5 => Self::Fifo,
            6 => Self::Sock,
            7 => Self::Symlink,
            _ => Self::Unknown,
        }
    }
}

/// A parsed directory entry (`ext4_dir_entry_2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ext4DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: Ext4FileType,
    pub name: Vec<u8>,
}

impl Ext4DirEntry {
    /// Name as a UTF-8 string (lossy).
    #[must_use]
    pub fn name_str(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == b"."
    }

    #[must_use]
    pub fn is_dotdot(&self) -> bool {
        self.name == b".."
    }
}

/// Parse directory entries out of a single directory data block.
///
/// Scanning stops at the first record with a zero file type or zero
/// `rec_len`, which is how unwritten tail space reads. Records with a
/// nonzero `rec_len` below the 8-byte header, a `rec_len` extending past
/// the block, or a name extending past `rec_len` are rejected. Deleted
/// entries (inode 0) are skipped.
pub fn parse_dir_block(block: &[u8]) -> Result<Vec<Ext4DirEntry>, ParseError> {
    let mut entries = Vec::new();
    let mut offset = 0_usize;

    while offset + 8 <= block.len() {
        let inode = read_le_u32(block, offset)?;
        let rec_len = read_le_u16(block, offset + 4)?;
        let name_len = ensure_slice(block, offset + 6, 1)?[0];
        let file_type_raw = ensure_slice(block, offset + 7, 1)?[0];

        if file_type_raw == 0 || rec_len == 0 {
            break;
        }

        if rec_len < 8 {
            return Err(ParseError::InvalidField {
                field: "de_rec_len",
                reason: "directory entry rec_len < 8",
            });
        }
        let entry_end = offset + usize::from(rec_len);
        if entry_end > block.len() {
            return Err(ParseError::InvalidField {
                field: "de_rec_len",
                reason: "directory entry extends past block boundary",
            });
        }

        let name_end = offset + 8 + usize::from(name_len);
        if name_end > entry_end {
            return Err(ParseError::InvalidField {
                field: "de_name_len",
                reason: "name extends past rec_len",
            });
        }

        if inode != 0 {
            entries.push(Ext4DirEntry {
                inode,
                rec_len,
                name_len,
                file_type: Ext4FileType::from_raw(file_type_raw),
                name: block[offset + 8..name_end].to_vec(),
            });
        }

        offset = entry_end;
    }

    Ok(entries)
}

/// Look up a single name in a directory data block by exact byte match.
pub fn find_in_dir_block(block: &[u8], target: &[u8]) -> Result<Option<Ext4DirEntry>, ParseError> {
    let entries = parse_dir_block(block)?;
    Ok(entries.into_iter().find(|e| e.name == target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_superblock_region() -> Vec<u8> {
        let mut region = vec![0_u8; EXT4_SUPERBLOCK_SIZE];
        region[0x00..0x04].copy_from_slice(&64_u32.to_le_bytes()); // inodes_count
        region[0x04..0x08].copy_from_slice(&256_u32.to_le_bytes()); // blocks_count lo
        region[0x0C..0x10].copy_from_slice(&100_u32.to_le_bytes()); // free blocks lo
        region[0x10..0x14].copy_from_slice(&50_u32.to_le_bytes()); // free inodes
        region[0x14..0x18].copy_from_slice(&0_u32.to_le_bytes()); // first_data_block
        region[0x18..0x1C].copy_from_slice(&2_u32.to_le_bytes()); // log_block_size -> 4096
        region[0x20..0x24].copy_from_slice(&32_768_u32.to_le_bytes()); // blocks_per_group
        region[0x28..0x2C].copy_from_slice(&64_u32.to_le_bytes()); // inodes_per_group
        region[0x38..0x3A].copy_from_slice(&EXT4_SUPER_MAGIC.to_le_bytes());
        region[0x58..0x5A].copy_from_slice(&256_u16.to_le_bytes()); // inode_size
        region[0x78..0x7D].copy_from_slice(b"disk1"); // volume_name
        region
    }

    #[test]
    fn superblock_parses_geometry_and_label() {
        let region = sample_superblock_region();
        let sb = Ext4Superblock::parse_superblock_region(&region).expect("parse");
        assert_eq!(sb.block_size, 4096);
        assert_eq!(sb.inodes_count, 64);
        assert_eq!(sb.blocks_count, 256);
        assert_eq!(sb.inode_size, 256);
        assert_eq!(sb.volume_name, "disk1");
        sb.validate_geometry().expect("geometry");
    }

    #[test]
    fn superblock_rejects_bad_magic() {
        let mut region = sample_superblock_region();
        region[0x38] = 0x00;
        region[0x39] = 0x00;
        let err = Ext4Superblock::parse_superblock_region(&region).unwrap_err();
        assert!(matches!(err, ParseError::InvalidMagic { .. }));
    }

    #[test]
    fn superblock_rejects_short_region() {
        let err = Ext4Superblock::parse_superblock_region(&[0_u8; 100]).unwrap_err();
        assert!(matches!(err, ParseError::InsufficientData { .. }));
    }

    #[test]
    fn group_desc_table_follows_superblock() {
        let mut region = sample_superblock_region();
        let sb = Ext4Superblock::parse_superblock_region(&region).expect("parse");
        assert_eq!(sb.group_desc_offset(), Some(ByteOffset(4096)));

        // With 1K blocks the superblock fills block 1, so the table
        // starts at block 2.
        region[0x18..0x1C].copy_from_slice(&0_u32.to_le_bytes());
        region[0x58..0x5A].copy_from_slice(&128_u16.to_le_bytes());
        let sb_1k = Ext4Superblock::parse_superblock_region(&region).expect("parse");
        assert_eq!(sb_1k.group_desc_offset(), Some(ByteOffset(2048)));
    }

    #[test]
    fn inode_offset_is_one_indexed() {
        let region = sample_superblock_region();
        let sb = Ext4Superblock::parse_superblock_region(&region).expect("parse");
        assert_eq!(sb.inode_offset_in_table(InodeNumber(1)), Some(0));
        assert_eq!(sb.inode_offset_in_table(InodeNumber::ROOT), Some(256));
        assert_eq!(sb.inode_offset_in_table(InodeNumber(5)), Some(1024));
        assert_eq!(sb.inode_offset_in_table(InodeNumber(0)), None);
    }

    #[test]
    fn group_desc_parses_inode_table_location() {
        let mut bytes = [0_u8; 32];
        bytes[0x00..0x04].copy_from_slice(&3_u32.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&4_u32.to_le_bytes());
        bytes[0x08..0x0C].copy_from_slice(&5_u32.to_le_bytes());
        bytes[0x0C..0x0E].copy_from_slice(&10_u16.to_le_bytes());

        let gd = Ext4GroupDesc::parse_from_bytes(&bytes).expect("parse");
        assert_eq!(gd.block_bitmap, 3);
        assert_eq!(gd.inode_bitmap, 4);
        assert_eq!(gd.inode_table, 5);
        assert_eq!(gd.inode_table_block(), BlockNumber(5));
        assert_eq!(gd.free_blocks_count, 10);

        assert!(Ext4GroupDesc::parse_from_bytes(&bytes[..16]).is_err());
    }

    fn sample_inode(mode: u16, size: u32) -> Vec<u8> {
        let mut bytes = vec![0_u8; 256];
        bytes[0x00..0x02].copy_from_slice(&mode.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&size.to_le_bytes());
        bytes[0x1A..0x1C].copy_from_slice(&1_u16.to_le_bytes());
        bytes[0x20..0x24].copy_from_slice(&EXT4_EXTENTS_FL.to_le_bytes());
        bytes
    }

    #[test]
    fn inode_parses_type_and_size() {
        let file = Ext4Inode::parse_from_bytes(&sample_inode(0o100_644, 5)).expect("parse");
        assert!(file.is_regular());
        assert!(!file.is_dir());
        assert!(file.uses_extents());
        assert_eq!(file.size, 5);
        assert_eq!(file.links_count, 1);
        assert_eq!(file.block_area.len(), EXT4_INODE_BLOCK_AREA);

        let dir = Ext4Inode::parse_from_bytes(&sample_inode(0o040_755, 4096)).expect("parse");
        assert!(dir.is_dir());
        assert!(!dir.is_regular());
    }

    #[test]
    fn inode_combines_size_halves() {
        let mut bytes = sample_inode(0o100_644, 0xAAAA_BBBB);
        bytes[0x6C..0x70].copy_from_slice(&1_u32.to_le_bytes());
        let inode = Ext4Inode::parse_from_bytes(&bytes).expect("parse");
        assert_eq!(inode.size, 0x1_AAAA_BBBB);
    }

    #[test]
    fn inode_rejects_short_buffer() {
        let err = Ext4Inode::parse_from_bytes(&[0_u8; 64]).unwrap_err();
        assert!(matches!(err, ParseError::InsufficientData { .. }));
    }

    fn extent_area(entries: &[(u32, u16, u16, u32)]) -> Vec<u8> {
        let mut area = vec![0_u8; EXT4_INODE_BLOCK_AREA];
        area[0x00..0x02].copy_from_slice(&EXT4_EXTENT_MAGIC.to_le_bytes());
        area[0x02..0x04].copy_from_slice(&(entries.len() as u16).to_le_bytes());
        area[0x04..0x06].copy_from_slice(&4_u16.to_le_bytes());
        for (idx, (logical, len, hi, lo)) in entries.iter().enumerate() {
            let base = 12 + idx * 12;
            area[base..base + 4].copy_from_slice(&logical.to_le_bytes());
            area[base + 4..base + 6].copy_from_slice(&len.to_le_bytes());
            area[base + 6..base + 8].copy_from_slice(&hi.to_le_bytes());
            area[base + 8..base + 12].copy_from_slice(&lo.to_le_bytes());
        }
        area
    }

    #[test]
    fn extents_parse_leaf_records() {
        let area = extent_area(&[(0, 2, 0, 100), (2, 1, 0, 300)]);
        let (header, extents) = parse_inline_extents(&area).expect("parse");
        assert_eq!(header.entries, 2);
        assert_eq!(header.depth, 0);
        assert_eq!(extents.len(), 2);
        assert_eq!(extents[0].logical_block, 0);
        assert_eq!(extents[0].actual_len(), 2);
        assert_eq!(extents[0].physical_start_lo(), BlockNumber(100));
        assert!(!extents[0].has_high_bits());
        assert_eq!(extents[1].physical_start_lo(), BlockNumber(300));
    }

    #[test]
    fn extents_zeroed_header_is_empty() {
        let area = vec![0_u8; EXT4_INODE_BLOCK_AREA];
        let (_, extents) = parse_inline_extents(&area).expect("parse");
        assert!(extents.is_empty());
    }

    #[test]
    fn extents_reject_bad_magic() {
        let mut area = extent_area(&[(0, 1, 0, 100)]);
        area[0x00] = 0xFF;
        let err = parse_inline_extents(&area).unwrap_err();
        assert!(matches!(err, ParseError::InvalidMagic { .. }));
    }

    #[test]
    fn extents_reject_internal_nodes() {
        let mut area = extent_area(&[(0, 1, 0, 100)]);
        area[0x06..0x08].copy_from_slice(&1_u16.to_le_bytes());
        let err = parse_inline_extents(&area).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "eh_depth",
                ..
            }
        ));
    }

    #[test]
    fn extents_reject_entries_over_max() {
        let mut area = extent_area(&[(0, 1, 0, 100)]);
        area[0x02..0x04].copy_from_slice(&9_u16.to_le_bytes());
        let err = parse_inline_extents(&area).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "eh_entries",
                ..
            }
        ));
    }

    #[test]
    fn extent_unwritten_length() {
        let ext = Ext4Extent {
            logical_block: 0,
            raw_len: EXT_INIT_MAX_LEN + 3,
            physical_lo: 10,
            physical_hi: 0,
        };
        assert!(ext.is_unwritten());
        assert_eq!(ext.actual_len(), 3);
    }

    fn push_dirent(block: &mut Vec<u8>, inode: u32, rec_len: u16, file_type: u8, name: &[u8]) {
        block.extend_from_slice(&inode.to_le_bytes());
        block.extend_from_slice(&rec_len.to_le_bytes());
        block.push(name.len() as u8);
        block.push(file_type);
        block.extend_from_slice(name);
        let padding = usize::from(rec_len) - 8 - name.len();
        block.extend(std::iter::repeat(0_u8).take(padding));
    }

    fn sample_dir_block() -> Vec<u8> {
        let mut block = Vec::new();
        push_dirent(&mut block, 2, 12, 2, b".");
        push_dirent(&mut block, 2, 12, 2, b"..");
        push_dirent(&mut block, 12, 20, 1, b"readme.txt");
        push_dirent(&mut block, 13, 12, 2, b"docs");
        block.resize(1024, 0);
        block
    }

    #[test]
    fn dir_block_yields_entries_in_order() {
        let entries = parse_dir_block(&sample_dir_block()).expect("parse");
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].name_str(), ".");
        assert!(entries[0].is_dot());
        assert!(entries[1].is_dotdot());
        assert_eq!(entries[2].name_str(), "readme.txt");
        assert_eq!(entries[2].file_type, Ext4FileType::RegFile);
        assert_eq!(entries[3].name_str(), "docs");
        assert_eq!(entries[3].file_type, Ext4FileType::Dir);
        assert_eq!(entries[3].inode, 13);
    }

    #[test]
    fn dir_block_stops_at_unwritten_tail() {
        // An all-zero block reads as an immediate terminator, not an error.
        let entries = parse_dir_block(&[0_u8; 256]).expect("parse");
        assert!(entries.is_empty());
    }

    #[test]
    fn dir_block_skips_deleted_entries() {
        let mut block = Vec::new();
        push_dirent(&mut block, 0, 12, 1, b"gone");
        push_dirent(&mut block, 12, 16, 1, b"kept.txt");
        block.resize(512, 0);
        let entries = parse_dir_block(&block).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name_str(), "kept.txt");
    }

    #[test]
    fn dir_block_rejects_undersized_rec_len() {
        let mut block = Vec::new();
        push_dirent(&mut block, 5, 12, 1, b"ok");
        block.resize(64, 0);
        block[4] = 4; // rec_len 4, below the 8-byte header
        let err = parse_dir_block(&block).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "de_rec_len",
                ..
            }
        ));
    }

    #[test]
    fn dir_block_rejects_rec_len_past_end() {
        let mut block = Vec::new();
        push_dirent(&mut block, 5, 48, 1, b"ok");
        block.truncate(32);
        let err = parse_dir_block(&block).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "de_rec_len",
                ..
            }
        ));
    }

    #[test]
    fn dir_block_rejects_name_past_rec_len() {
        let mut block = Vec::new();
        push_dirent(&mut block, 5, 12, 1, b"ok");
        block.resize(64, 0);
        block[6] = 30; // name_len larger than rec_len allows
        let err = parse_dir_block(&block).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidField {
                field: "de_name_len",
                ..
            }
        ));
    }

    #[test]
    fn find_matches_exact_name_only() {
        let block = sample_dir_block();
        let hit = find_in_dir_block(&block, b"readme.txt").expect("parse");
        assert_eq!(hit.expect("found").inode, 12);

        // A prefix of a stored name is not a match.
        assert!(find_in_dir_block(&block, b"readme").expect("parse").is_none());
        assert!(find_in_dir_block(&block, b"readme.txt.bak").expect("parse").is_none());
    }
}
