#![forbid(unsafe_code)]
//! On-disk ext4 structure parsing.
//!
//! Pure parsing crate with no I/O and no side effects. Byte slices go in,
//! typed structures come out: superblock, group descriptor, inode, inline
//! extent records, and directory entries. All multi-byte fields are
//! little-endian as ext4 stores them.

pub mod ext4;

pub use ext4::{
    Ext4DirEntry, Ext4Extent, Ext4ExtentHeader, Ext4FileType, Ext4GroupDesc, Ext4Inode,
    Ext4Superblock, find_in_dir_block, parse_dir_block, parse_inline_extents,
};
