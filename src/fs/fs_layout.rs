//! what does our filesystem look like in the memory, and how it gets there
//!
//! The on-disk layout, in fixed order from the start of the device:
//! - superblock
//! - inode bitmap
//! - data bitmap
//! - inode region, one logical block per inode
//! - data region

use byte_unit::Byte;
use log::{debug, info, warn};

use crate::{
    block_cursor::BlockCursor,
    device::{BlockDevice, ImageDevice},
    error::{FsError, FsResult},
    mount::{MountOptions, NameMatch},
    utils::traits::{DigestInSelf, DiskRecord},
};

use super::{
    bitmap::Bitmap,
    directory::Dentry,
    filekind::FileKind,
    inode::Inode,
    superblock::{SuperBlock, SUPERBLOCK_RECORD_SIZE},
    tree::{EntryId, Tree},
    DATA_LOGICAL_BASE, FS_MAGIC, IO_UNITS_PER_BLOCK, ROOT_INODE, SUPERBLOCK_OFFSET,
};

/// a filesystem that is either unmounted or owns one mounted device
#[derive(Debug)]
pub struct NewFS<D> {
    mounted: Option<Mounted<D>>,
}

/// everything a mount owns: the device, both bitmaps, the superblock and
/// the resident tree
#[derive(Debug)]
pub(crate) struct Mounted<D> {
    pub(crate) cursor: BlockCursor<D>,
    pub(crate) superblock: SuperBlock,
    pub(crate) inode_map: Bitmap,
    pub(crate) data_map: Bitmap,
    pub(crate) tree: Tree,
    pub(crate) root: EntryId,
    pub(crate) name_match: NameMatch,
}

impl<D> Default for NewFS<D> {
    fn default() -> Self {
        NewFS { mounted: None }
    }
}

impl NewFS<ImageDevice> {
    /// open the image named by `options` and mount it
    pub fn mount(&mut self, options: &MountOptions) -> FsResult<()> {
        info!("mount() called with device: {:?}", options.device);
        let device = ImageDevice::open(&options.device, options.io_size)?;
        self.mount_device(device, options.name_match)
    }
}

impl<D: BlockDevice> NewFS<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    /// attach to an already opened device, formatting it if it carries no filesystem
    pub fn mount_device(&mut self, device: D, name_match: NameMatch) -> FsResult<()> {
        if self.mounted.is_some() {
            return Err(FsError::Unsupported("filesystem is already mounted".into()));
        }
        self.mounted = Some(Mounted::attach(device, name_match)?);
        Ok(())
    }

    /// flush the whole tree, the superblock and both bitmaps, then release the device
    ///
    /// Returns `None` when nothing was mounted. A failed flush is not rolled
    /// back and still leaves the filesystem unmounted.
    pub fn unmount(&mut self) -> FsResult<Option<D>> {
        info!("unmount() called");
        match self.mounted.take() {
            Some(mounted) => mounted.detach().map(Some),
            None => Ok(None),
        }
    }

    pub fn superblock(&self) -> FsResult<&SuperBlock> {
        self.mounted
            .as_ref()
            .map(|mounted| &mounted.superblock)
            .ok_or(FsError::NotMounted)
    }

    #[inline]
    pub(crate) fn mounted(&mut self) -> FsResult<&mut Mounted<D>> {
        self.mounted.as_mut().ok_or(FsError::NotMounted)
    }
}

/// mount / unmount
impl<D: BlockDevice> Mounted<D> {
    fn attach(device: D, name_match: NameMatch) -> FsResult<Self> {
        let capacity = device.capacity();
        let io_size = device.io_size();
        if io_size == 0 {
            return Err(FsError::Unsupported("device reports a zero I/O unit".into()));
        }
        let block_size = io_size * IO_UNITS_PER_BLOCK;
        SuperBlock::check_geometry(block_size)?;
        info!(
            "device capacity {}, I/O unit {io_size} B, block size {block_size} B",
            Byte::from_bytes(capacity as _).get_appropriate_unit(true)
        );
        let mut cursor = BlockCursor::new(device, block_size as u64);

        let raw = cursor.read_at(SUPERBLOCK_OFFSET, *SUPERBLOCK_RECORD_SIZE)?;
        let mut superblock = SuperBlock::from_bytes(&raw)?;
        let fresh = superblock.magic != FS_MAGIC;
        if fresh {
            info!("no filesystem found, laying out a fresh one");
            superblock = SuperBlock::new(block_size);
        } else {
            if !superblock.verify_digest()? {
                warn!("superblock magic matches but its digest does not");
                return Err(FsError::invalid_data("superblock digest mismatch"));
            }
            if superblock.block_size != block_size {
                return Err(FsError::Unsupported(format!(
                    "filesystem uses {} B blocks but the device gives {block_size} B",
                    superblock.block_size
                )));
            }
        }
        if superblock.total_size() > capacity {
            return Err(FsError::Unsupported(format!(
                "device holds {} but the layout needs {}",
                Byte::from_bytes(capacity as _).get_appropriate_unit(true),
                Byte::from_bytes(superblock.total_size() as _).get_appropriate_unit(true)
            )));
        }

        // an unformatted device may hold anything, so fresh bitmaps start zeroed
        let (inode_map, data_map) = if fresh {
            (
                Bitmap::zeroed(
                    "inode",
                    superblock.inode_bitmap_len(),
                    superblock.max_inodes as usize,
                ),
                Bitmap::zeroed(
                    "data",
                    superblock.data_bitmap_len(),
                    superblock.max_data_blocks as usize,
                ),
            )
        } else {
            let inode_bytes =
                cursor.read_at(superblock.inode_bitmap_offset, superblock.inode_bitmap_len())?;
            let data_bytes =
                cursor.read_at(superblock.data_bitmap_offset, superblock.data_bitmap_len())?;
            (
                Bitmap::from_bytes("inode", &inode_bytes, superblock.max_inodes as usize),
                Bitmap::from_bytes("data", &data_bytes, superblock.max_data_blocks as usize),
            )
        };

        let mut tree = Tree::default();
        let root = tree.add_entry(Dentry::root());
        let mut mounted = Mounted {
            cursor,
            superblock,
            inode_map,
            data_map,
            tree,
            root,
            name_match,
        };

        if fresh {
            mounted.format_root()?;
        }
        mounted.load(mounted.root, ROOT_INODE)?;
        info!(
            "mounted: {} inodes and {} data blocks in use",
            mounted.inode_map.used(),
            mounted.data_map.used()
        );
        Ok(mounted)
    }

    /// allocate the root directory and write it out so it can be read back
    fn format_root(&mut self) -> FsResult<()> {
        let ino = self.inode_map.allocate()? as u32;
        if ino != ROOT_INODE {
            return Err(FsError::invalid_data(format!(
                "root inode index must be {ROOT_INODE}, not {ino}"
            )));
        }
        let inode = Inode::new(ino, FileKind::Directory, self.root, self.superblock.block_size);
        let id = self.tree.add_inode(inode);
        self.sync(id)?;
        // start over with a bare root entry; the inode is read back from disk
        self.tree = Tree::default();
        self.root = self.tree.add_entry(Dentry::root());
        Ok(())
    }

    fn detach(mut self) -> FsResult<D> {
        let root = self.ensure_resident(self.root)?;
        self.sync(root)?;

        self.superblock.magic = FS_MAGIC;
        self.superblock.digest()?;
        let record = self.superblock.to_bytes()?;
        self.cursor.write_at(SUPERBLOCK_OFFSET, &record)?;
        self.cursor
            .write_at(self.superblock.inode_bitmap_offset, self.inode_map.as_bytes())?;
        self.cursor
            .write_at(self.superblock.data_bitmap_offset, self.data_map.as_bytes())?;
        self.cursor.get_mut().flush()?;
        info!(
            "unmounted: {} inodes and {} data blocks in use",
            self.inode_map.used(),
            self.data_map.used()
        );
        Ok(self.cursor.into_inner())
    }
}

/// data block accounting
impl<D: BlockDevice> Mounted<D> {
    /// claim one data block and return the logical number stored in direct pointers
    pub(crate) fn claim_data_block(&mut self) -> FsResult<u32> {
        let index = self.data_map.allocate()? as u32;
        self.superblock.usage += self.superblock.block_size as u64;
        Ok(DATA_LOGICAL_BASE + index)
    }

    pub(crate) fn release_data_block(&mut self, pointer: u32) {
        if let Some(index) = pointer.checked_sub(DATA_LOGICAL_BASE) {
            debug!("releasing data block {pointer}");
            self.data_map.free(index as usize);
            self.superblock.usage = self
                .superblock
                .usage
                .saturating_sub(self.superblock.block_size as u64);
        }
    }
}
