//! This module contains functions to calculate the size of different fs components

use crate::fs::{
    DATA_BITMAP_BLOCKS, DATA_BLOCKS, INODE_BITMAP_BLOCKS, INODE_BLOCKS, SUPERBLOCK_BLOCKS,
};

/// convert a count of logical blocks to bytes
/// # Example
/// ```
/// use newfs::utils::fs_size_calculator::blocks_to_bytes;
/// assert_eq!(blocks_to_bytes(3, 1024), 3072);
/// ```
pub const fn blocks_to_bytes(blocks: u32, block_size: u32) -> u64 {
    blocks as u64 * block_size as u64
}

/// number of bits a bitmap spanning `blocks` logical blocks can track
/// # Example
/// ```
/// use newfs::utils::fs_size_calculator::bitmap_bits;
/// assert_eq!(bitmap_bits(1, 1024), 8192);
/// ```
pub const fn bitmap_bits(blocks: u32, block_size: u32) -> usize {
    blocks as usize * block_size as usize * 8
}

/// total logical blocks of the fixed layout:
/// superblock, inode bitmap, data bitmap, inode region, data region
pub const fn layout_blocks() -> u32 {
    SUPERBLOCK_BLOCKS + INODE_BITMAP_BLOCKS + DATA_BITMAP_BLOCKS + INODE_BLOCKS + DATA_BLOCKS
}

/// bytes a device needs to hold the fixed layout
/// # Example
/// ```
/// use newfs::utils::fs_size_calculator::layout_size;
/// assert_eq!(layout_size(1024), 4 * 1024 * 1024);
/// ```
pub const fn layout_size(block_size: u32) -> u64 {
    blocks_to_bytes(layout_blocks(), block_size)
}
