//! moving inodes and directory entries between the device and the resident tree
use log::{debug, warn};

use crate::{
    device::BlockDevice,
    error::{FsError, FsResult},
    utils::traits::DiskRecord,
};

use super::{
    directory::{entries_per_block, Dentry, DentryRecord, DENTRY_RECORD_SIZE},
    fs_layout::Mounted,
    inode::{Inode, InodeRecord, INODE_RECORD_SIZE},
    tree::{EntryId, InodeId},
    DATA_LOGICAL_BASE, DIRECT_POINTERS,
};

impl<D: BlockDevice> Mounted<D> {
    /// byte offset of the `slot`th entry record of a directory
    fn entry_position(&self, pointers: &[u32; DIRECT_POINTERS], slot: usize) -> FsResult<u64> {
        let per_block = entries_per_block(self.superblock.block_size);
        let pointer = pointers.get(slot / per_block).copied().ok_or_else(|| {
            FsError::invalid_data(format!("directory entry {slot} is past the direct blocks"))
        })?;
        let block = self.superblock.data_block_position(pointer)?;
        Ok(block + ((slot % per_block) * *DENTRY_RECORD_SIZE) as u64)
    }

    /// write `inode` and everything resident below it
    ///
    /// Inodes are flushed pre-order: a directory's record and entries go out
    /// before the inodes they name. The first failed write stops the flush;
    /// whatever was already written stays written.
    pub(crate) fn sync(&mut self, inode: InodeId) -> FsResult<()> {
        let mut pending = vec![inode];
        while let Some(id) = pending.pop() {
            let resident = self.sync_one(id)?;
            // reversed so the chain head is flushed first
            pending.extend(resident.into_iter().rev());
        }
        Ok(())
    }

    /// write one inode's record and content, returning its resident children
    fn sync_one(&mut self, id: InodeId) -> FsResult<Vec<InodeId>> {
        let inode = self.tree.inode(id);
        let offset = self.superblock.inode_position(inode.ino)?;
        debug!("sync inode {} at {offset}", inode.ino);
        let record = inode.to_record().to_bytes()?;
        self.cursor.write_at(offset, &record)?;

        let mut resident = Vec::new();
        if inode.is_dir() {
            for (slot, child) in self.tree.children(id).enumerate() {
                let offset = self.entry_position(&inode.block_pointers, slot)?;
                let dentry = self.tree.entry(child);
                let record = dentry.to_record()?.to_bytes()?;
                self.cursor.write_at(offset, &record)?;
                resident.extend(dentry.inode);
            }
        } else {
            for (pointer, block) in inode.block_pointers.iter().zip(&inode.data) {
                if *pointer < DATA_LOGICAL_BASE {
                    continue;
                }
                let offset = self.superblock.data_block_position(*pointer)?;
                self.cursor.write_at(offset, block)?;
            }
        }
        Ok(resident)
    }

    /// read inode `ino` and attach it to `entry`
    ///
    /// A directory comes back with one child entry per stored record, in
    /// stored order and without inodes; a regular file comes back with all
    /// of its data blocks read.
    pub(crate) fn load(&mut self, entry: EntryId, ino: u32) -> FsResult<InodeId> {
        let offset = self.superblock.inode_position(ino)?;
        let bytes = self.cursor.read_at(offset, *INODE_RECORD_SIZE)?;
        let record = InodeRecord::from_bytes(&bytes)?;
        if record.ino != ino {
            warn!("inode record at index {ino} claims index {}", record.ino);
        }
        let mut inode = Inode::from_record(&record, entry);
        inode.ino = ino;
        debug!("load inode {ino} ({:?}, {} entries)", record.kind, record.dir_cnt);

        let mut children = Vec::new();
        if inode.is_dir() {
            let capacity = entries_per_block(self.superblock.block_size) * DIRECT_POINTERS;
            if record.dir_cnt as usize > capacity {
                return Err(FsError::invalid_data(format!(
                    "directory inode {ino} claims {} entries, at most {capacity} fit",
                    record.dir_cnt
                )));
            }
            for slot in 0..record.dir_cnt as usize {
                let offset = self.entry_position(&record.block_pointers, slot)?;
                let bytes = self.cursor.read_at(offset, *DENTRY_RECORD_SIZE)?;
                children.push(Dentry::from_record(&DentryRecord::from_bytes(&bytes)?));
            }
        } else {
            let block_size = self.superblock.block_size as usize;
            let capacity = block_size * DIRECT_POINTERS;
            if record.size as usize > capacity {
                return Err(FsError::invalid_data(format!(
                    "file inode {ino} claims {} bytes, at most {capacity} fit",
                    record.size
                )));
            }
            for pointer in record.block_pointers {
                let block = if pointer < DATA_LOGICAL_BASE {
                    vec![0u8; block_size]
                } else {
                    let offset = self.superblock.data_block_position(pointer)?;
                    self.cursor.read_at(offset, block_size)?
                };
                inode.data.push(block);
            }
        }

        let id = self.tree.add_inode(inode);
        let children: Vec<EntryId> = children
            .into_iter()
            .map(|dentry| self.tree.add_entry(dentry))
            .collect();
        // linking prepends, so link the last stored record first
        for child in children.into_iter().rev() {
            self.tree.link_child(id, child);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block_cursor::BlockCursor,
        device::MemoryDevice,
        fs::{
            bitmap::Bitmap, superblock::SuperBlock, tree::Tree, FileKind, ROOT_INODE,
        },
        mount::NameMatch,
        utils::init_test_environment::blank_device,
    };

    fn mounted() -> Mounted<MemoryDevice> {
        let superblock = SuperBlock::new(1024);
        let mut tree = Tree::default();
        let root = tree.add_entry(Dentry::root());
        Mounted {
            cursor: BlockCursor::new(blank_device(), 1024),
            inode_map: Bitmap::zeroed("inode", 1024, superblock.max_inodes as usize),
            data_map: Bitmap::zeroed("data", 1024, superblock.max_data_blocks as usize),
            superblock,
            tree,
            root,
            name_match: NameMatch::Exact,
        }
    }

    #[test]
    fn test_inode_scalars_round_trip() -> anyhow::Result<()> {
        let mut fs = mounted();
        let entry = fs.tree.add_entry(Dentry::new("f", FileKind::RegularFile, 7));
        let mut inode = Inode::new(7, FileKind::RegularFile, entry, 1024);
        inode.size = 77;
        inode.link = 3;
        inode.block_pointers = [500, 501, 502, 503, 504, 505];
        inode.data[2][10] = 0xab;
        let id = fs.tree.add_inode(inode);
        fs.sync(id)?;

        let fresh = fs.tree.add_entry(Dentry::new("f", FileKind::RegularFile, 7));
        let loaded = fs.load(fresh, 7)?;
        let (before, after) = (fs.tree.inode(id), fs.tree.inode(loaded));
        assert_eq!(before.to_record(), after.to_record());
        assert_eq!(after.data, before.data);
        assert_eq!(fs.tree.entry(fresh).inode, Some(loaded));
        Ok(())
    }

    #[test]
    fn test_directory_entries_spill_into_second_block() -> anyhow::Result<()> {
        let mut fs = mounted();
        let root_inode = Inode::new(ROOT_INODE, FileKind::Directory, fs.root, 1024);
        let root = fs.tree.add_inode(root_inode);
        let count = entries_per_block(1024) + 2;
        for i in 0..count {
            let entry = fs
                .tree
                .add_entry(Dentry::new(&format!("d{i}"), FileKind::Directory, i as u32 + 1));
            fs.attach_child(root, entry, true)?;
        }
        assert_eq!(fs.tree.inode(root).assigned_blocks().count(), 2);
        fs.sync(root)?;

        let fresh = fs.tree.add_entry(Dentry::root());
        let loaded = fs.load(fresh, ROOT_INODE)?;
        assert_eq!(fs.tree.inode(loaded).dir_cnt as usize, count);
        let names = |id| -> Vec<String> {
            fs.tree
                .children(id)
                .map(|e| fs.tree.entry(e).name.clone())
                .collect()
        };
        assert_eq!(names(loaded), names(root));
        assert!(fs.tree.children(loaded).all(|e| fs.tree.entry(e).inode.is_none()));
        Ok(())
    }

    #[test]
    fn test_sync_recurses_into_resident_children() -> anyhow::Result<()> {
        let mut fs = mounted();
        let root = fs
            .tree
            .add_inode(Inode::new(ROOT_INODE, FileKind::Directory, fs.root, 1024));
        let sub = fs.tree.add_entry(Dentry::new("sub", FileKind::Directory, 1));
        let sub_inode = fs.tree.add_inode(Inode::new(1, FileKind::Directory, sub, 1024));
        fs.attach_child(root, sub, true)?;
        let leaf = fs.tree.add_entry(Dentry::new("leaf", FileKind::Directory, 2));
        fs.tree.add_inode(Inode::new(2, FileKind::Directory, leaf, 1024));
        fs.attach_child(sub_inode, leaf, true)?;
        fs.sync(root)?;

        let fresh = fs.tree.add_entry(Dentry::new("sub", FileKind::Directory, 1));
        let loaded = fs.load(fresh, 1)?;
        let child = fs.tree.nth_child(loaded, 0).expect("leaf was flushed");
        assert_eq!(fs.tree.entry(child).name, "leaf");
        assert_eq!(fs.tree.entry(child).ino, 2);
        Ok(())
    }

    #[test]
    fn test_oversized_directory_record_is_rejected() -> anyhow::Result<()> {
        let mut fs = mounted();
        let record = InodeRecord {
            ino: 3,
            kind: FileKind::Directory,
            dir_cnt: 10_000,
            ..InodeRecord::default()
        };
        let offset = fs.superblock.inode_position(3)?;
        fs.cursor.write_at(offset, &record.to_bytes()?)?;
        let entry = fs.tree.add_entry(Dentry::new("big", FileKind::Directory, 3));
        assert!(matches!(fs.load(entry, 3), Err(FsError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_oversized_file_record_is_rejected() -> anyhow::Result<()> {
        let mut fs = mounted();
        let record = InodeRecord {
            ino: 4,
            size: 100_000,
            kind: FileKind::RegularFile,
            block_pointers: [500, 501, 502, 503, 504, 505],
            ..InodeRecord::default()
        };
        let offset = fs.superblock.inode_position(4)?;
        fs.cursor.write_at(offset, &record.to_bytes()?)?;
        let entry = fs.tree.add_entry(Dentry::new("f", FileKind::RegularFile, 4));
        assert!(matches!(fs.load(entry, 4), Err(FsError::Io(_))));
        assert!(fs.tree.entry(entry).inode.is_none());
        Ok(())
    }
}
