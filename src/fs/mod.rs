//! our custom filesystem
pub mod bitmap;
mod codec;
pub mod directory;
pub mod filekind;
mod fs_api_impl;
pub mod fs_layout;
pub mod inode;
pub mod path;
pub mod superblock;
pub mod tree;
pub use directory::{DentryRecord, DirEntry};
pub use filekind::*;
pub use fs_api_impl::Lookup;
pub use fs_layout::NewFS;
pub use inode::{Attributes, InodeRecord};
pub use superblock::SuperBlock;

pub const FS_MAGIC: u32 = 0x5241_5453;
pub const SUPERBLOCK_OFFSET: u64 = 0;
pub const ROOT_INODE: u32 = 0;
/// longest file name, in bytes
pub const MAX_FILE_NAME: usize = 128;
pub const DIRECT_POINTERS: usize = 6;
/// logical blocks are this many native I/O units
pub const IO_UNITS_PER_BLOCK: u32 = 2;

// region sizes, in logical blocks
pub const SUPERBLOCK_BLOCKS: u32 = 1;
pub const INODE_BITMAP_BLOCKS: u32 = 1;
pub const DATA_BITMAP_BLOCKS: u32 = 1;
pub const INODE_BLOCKS: u32 = 585;
pub const DATA_BLOCKS: u32 = 3508;

/// direct pointer value of the first data block; smaller values mean unassigned
pub const DATA_LOGICAL_BASE: u32 = 500;
