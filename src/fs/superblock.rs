use bincode::{Decode, Encode};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    error::{FsError, FsResult},
    utils::{
        fs_size_calculator::{bitmap_bits, blocks_to_bytes},
        traits::{self, DigestInSelf, DiskRecord},
    },
};

use super::{
    directory::entries_per_block,
    inode::INODE_RECORD_SIZE,
    DATA_BITMAP_BLOCKS, DATA_BLOCKS, DATA_LOGICAL_BASE, FS_MAGIC, INODE_BITMAP_BLOCKS,
    INODE_BLOCKS, SUPERBLOCK_BLOCKS, SUPERBLOCK_OFFSET,
};

/// encoded length of a [SuperBlock]
pub static SUPERBLOCK_RECORD_SIZE: Lazy<usize> = Lazy::new(|| {
    SuperBlock::default()
        .to_bytes()
        .expect("encode blank superblock")
        .len()
});

/// The superblock of this filesystem
///
/// Region offsets are byte offsets from the start of the device and are
/// fixed at first mount; later mounts reuse them verbatim.
#[derive(Serialize, Deserialize, Encode, Decode, Debug, Clone, Default, PartialEq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    /// bytes of data blocks claimed so far
    pub usage: u64,
    /// logical block size the layout was computed with
    pub block_size: u32,
    pub max_inodes: u32,
    pub max_data_blocks: u32,
    pub inode_bitmap_blocks: u32,
    pub inode_bitmap_offset: u64,
    pub data_bitmap_blocks: u32,
    pub data_bitmap_offset: u64,
    pub inode_offset: u64,
    pub data_offset: u64,
    /// to verify the integrity of this superblock
    pub digest: [u8; 32],
}

impl SuperBlock {
    /// lay out a fresh device from the static capacity constants
    pub fn new(block_size: u32) -> Self {
        let inode_bitmap_offset =
            SUPERBLOCK_OFFSET + blocks_to_bytes(SUPERBLOCK_BLOCKS, block_size);
        let data_bitmap_offset =
            inode_bitmap_offset + blocks_to_bytes(INODE_BITMAP_BLOCKS, block_size);
        let inode_offset = data_bitmap_offset + blocks_to_bytes(DATA_BITMAP_BLOCKS, block_size);
        let data_offset = inode_offset + blocks_to_bytes(INODE_BLOCKS, block_size);
        Self {
            magic: FS_MAGIC,
            usage: 0,
            block_size,
            max_inodes: INODE_BLOCKS,
            max_data_blocks: DATA_BLOCKS,
            inode_bitmap_blocks: INODE_BITMAP_BLOCKS,
            inode_bitmap_offset,
            data_bitmap_blocks: DATA_BITMAP_BLOCKS,
            data_bitmap_offset,
            inode_offset,
            data_offset,
            digest: [0u8; 32],
        }
    }

    /// refuse block sizes the fixed layout cannot be laid out with
    ///
    /// The superblock and each inode record must fit one block, a directory
    /// block must hold at least one entry and each bitmap must cover its region.
    pub fn check_geometry(block_size: u32) -> FsResult<()> {
        let block = block_size as usize;
        let problem = if *SUPERBLOCK_RECORD_SIZE > block * SUPERBLOCK_BLOCKS as usize {
            "the superblock does not fit its region"
        } else if *INODE_RECORD_SIZE > block {
            "an inode record does not fit one block"
        } else if entries_per_block(block_size) == 0 {
            "a directory entry does not fit one block"
        } else if bitmap_bits(INODE_BITMAP_BLOCKS, block_size) < INODE_BLOCKS as usize {
            "the inode bitmap cannot cover every inode"
        } else if bitmap_bits(DATA_BITMAP_BLOCKS, block_size) < DATA_BLOCKS as usize {
            "the data bitmap cannot cover every data block"
        } else {
            return Ok(());
        };
        Err(FsError::Unsupported(format!(
            "{block_size} B blocks: {problem}"
        )))
    }

    /// bytes of device the layout occupies
    pub fn total_size(&self) -> u64 {
        self.data_offset + blocks_to_bytes(self.max_data_blocks, self.block_size)
    }

    pub fn inode_bitmap_len(&self) -> usize {
        blocks_to_bytes(self.inode_bitmap_blocks, self.block_size) as usize
    }

    pub fn data_bitmap_len(&self) -> usize {
        blocks_to_bytes(self.data_bitmap_blocks, self.block_size) as usize
    }

    /// byte offset of inode `ino`'s record; every inode owns one logical block
    pub fn inode_position(&self, ino: u32) -> FsResult<u64> {
        if ino >= self.max_inodes {
            return Err(FsError::invalid_data(format!(
                "inode index {ino} is outside the inode region"
            )));
        }
        Ok(self.inode_offset + blocks_to_bytes(ino, self.block_size))
    }

    /// byte offset of the data block a direct pointer names
    pub fn data_block_position(&self, pointer: u32) -> FsResult<u64> {
        match pointer.checked_sub(DATA_LOGICAL_BASE) {
            Some(index) if index < self.max_data_blocks => {
                Ok(self.data_offset + blocks_to_bytes(index, self.block_size))
            }
            _ => Err(FsError::invalid_data(format!(
                "direct pointer {pointer} does not name a data block"
            ))),
        }
    }
}

impl DigestInSelf for SuperBlock {
    fn digest(&mut self) -> FsResult<()> {
        self.digest = [0u8; 32];
        self.digest = traits::digest(self)?;
        Ok(())
    }

    fn verify_digest(&mut self) -> FsResult<bool> {
        let stored = self.digest;
        self.digest = [0u8; 32];
        let ok = stored == traits::digest(self)?;
        self.digest = stored;
        Ok(ok)
    }
}

impl DiskRecord for SuperBlock {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fs_size_calculator::layout_size;

    #[test]
    fn test_layout_regions_follow_each_other() {
        let superblock = SuperBlock::new(1024);
        assert_eq!(superblock.inode_bitmap_offset, 1024);
        assert_eq!(superblock.data_bitmap_offset, 2048);
        assert_eq!(superblock.inode_offset, 3072);
        assert_eq!(superblock.data_offset, 3072 + 585 * 1024);
        assert_eq!(superblock.total_size(), layout_size(1024));
        assert_eq!(superblock.inode_bitmap_len(), 1024);
    }

    #[test]
    fn test_geometry_limits() {
        assert!(SuperBlock::check_geometry(1024).is_ok());
        assert!(SuperBlock::check_geometry(512).is_ok());
        // 2048 data bitmap bits are too few for 3508 data blocks
        assert!(matches!(
            SuperBlock::check_geometry(256),
            Err(FsError::Unsupported(_))
        ));
        assert!(matches!(
            SuperBlock::check_geometry(64),
            Err(FsError::Unsupported(_))
        ));
    }

    #[test]
    fn test_positions() {
        let superblock = SuperBlock::new(1024);
        assert_eq!(superblock.inode_position(2).unwrap(), 3072 + 2048);
        assert!(superblock.inode_position(INODE_BLOCKS).is_err());
        assert_eq!(
            superblock.data_block_position(DATA_LOGICAL_BASE + 1).unwrap(),
            superblock.data_offset + 1024
        );
        // pointers below the logical base are unassigned slots
        assert!(superblock.data_block_position(0).is_err());
        assert!(superblock
            .data_block_position(DATA_LOGICAL_BASE + DATA_BLOCKS)
            .is_err());
    }

    #[test]
    fn test_record_fits_in_one_block_and_round_trips() -> anyhow::Result<()> {
        let mut superblock = SuperBlock::new(1024);
        superblock.usage = 7 * 1024;
        superblock.digest()?;
        let bytes = superblock.to_bytes()?;
        assert_eq!(bytes.len(), *SUPERBLOCK_RECORD_SIZE);
        assert!(bytes.len() <= 1024);

        let mut decoded = SuperBlock::from_bytes(&bytes)?;
        assert!(decoded.verify_digest()?);
        assert_eq!(decoded, superblock);
        Ok(())
    }

    #[test]
    fn test_tampered_superblock_fails_verification() -> anyhow::Result<()> {
        let mut superblock = SuperBlock::new(1024);
        superblock.digest()?;
        superblock.usage += 1;
        assert!(!superblock.verify_digest()?);
        Ok(())
    }
}
