//! the entry points handed to the protocol glue
use std::time::SystemTime;

use log::{debug, info};

use crate::{
    device::BlockDevice,
    error::{FsError, FsResult},
};

use super::{
    directory::{validate_name, Dentry, DirEntry, DENTRY_RECORD_SIZE},
    filekind::FileKind,
    fs_layout::{Mounted, NewFS},
    inode::{Attributes, Inode},
    path::components,
    tree::InodeId,
};

/// what [NewFS::lookup] found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// the match, or the deepest directory reached when `found` is false
    pub entry: DirEntry,
    pub found: bool,
    pub is_root: bool,
}

impl<D: BlockDevice> NewFS<D> {
    pub fn lookup(&mut self, path: &str) -> FsResult<Lookup> {
        info!("lookup() called with path: {path:?}");
        let mounted = self.mounted()?;
        let resolution = mounted.resolve(path)?;
        Ok(Lookup {
            entry: mounted.tree.entry(resolution.entry).to_dir_entry(),
            found: resolution.found,
            is_root: resolution.is_root,
        })
    }

    pub fn create_directory(&mut self, path: &str) -> FsResult<()> {
        info!("mkdir() called with path: {path:?}");
        self.mounted()?.create(path, FileKind::Directory)
    }

    /// create an empty regular file with all of its direct blocks claimed up front
    pub fn create_file(&mut self, path: &str) -> FsResult<()> {
        info!("create() called with path: {path:?}");
        self.mounted()?.create(path, FileKind::RegularFile)
    }

    pub fn stat(&mut self, path: &str) -> FsResult<Attributes> {
        info!("getattr() called with path: {path:?}");
        let mounted = self.mounted()?;
        let (id, is_root) = mounted.existing(path)?;
        let block_size = mounted.superblock.block_size;
        let inode = mounted.tree.inode(id);
        let now = SystemTime::now();
        let mut attributes = Attributes {
            ino: inode.ino,
            kind: inode.kind,
            size: match inode.kind {
                FileKind::Directory => inode.dir_cnt as u64 * *DENTRY_RECORD_SIZE as u64,
                FileKind::RegularFile => inode.size as u64,
            },
            blocks: inode.assigned_blocks().count() as u64,
            nlink: inode.link,
            blksize: block_size,
            uid: users::get_effective_uid(),
            gid: users::get_effective_gid(),
            atime: now,
            mtime: now,
        };
        // the root stands for the whole filesystem
        if is_root {
            attributes.size = mounted.superblock.usage;
            attributes.blocks = mounted.cursor.get_ref().capacity() / block_size as u64;
            attributes.nlink = 2;
        }
        Ok(attributes)
    }

    /// the `index`th child of a directory, newest first
    pub fn list_children(&mut self, path: &str, index: usize) -> FsResult<Option<DirEntry>> {
        info!("readdir() called with path: {path:?}, index: {index}");
        let mounted = self.mounted()?;
        let (id, _) = mounted.existing(path)?;
        if !mounted.tree.inode(id).is_dir() {
            return Ok(None);
        }
        Ok(mounted
            .tree
            .nth_child(id, index)
            .map(|child| mounted.tree.entry(child).to_dir_entry()))
    }

    pub fn read(&mut self, path: &str, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        info!(
            "read() called with path: {path:?}, offset: {offset}, size: {}",
            buf.len()
        );
        let mounted = self.mounted()?;
        let id = mounted.existing_file(path)?;
        Ok(mounted.tree.inode(id).read(offset, buf))
    }

    /// write into the resident blocks; the device sees the bytes at unmount
    pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> FsResult<usize> {
        info!(
            "write() called with path: {path:?}, offset: {offset}, size: {}",
            data.len()
        );
        let mounted = self.mounted()?;
        let id = mounted.existing_file(path)?;
        mounted.tree.inode_mut(id).write(offset, data)
    }
}

impl<D: BlockDevice> Mounted<D> {
    /// the resident inode `path` names, and whether it is the root
    fn existing(&mut self, path: &str) -> FsResult<(InodeId, bool)> {
        let resolution = self.resolve(path)?;
        if !resolution.found {
            return Err(FsError::NotFound(path.to_string()));
        }
        Ok((self.ensure_resident(resolution.entry)?, resolution.is_root))
    }

    fn existing_file(&mut self, path: &str) -> FsResult<InodeId> {
        let (id, _) = self.existing(path)?;
        if self.tree.inode(id).is_dir() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        Ok(id)
    }

    /// Bitmap bits claimed here are given back if any later step fails, so a
    /// failed creation leaves both bitmaps and the tree as they were.
    fn create(&mut self, path: &str, kind: FileKind) -> FsResult<()> {
        let Some(name) = components(path).last().copied() else {
            return Err(FsError::AlreadyExists(path.to_string()));
        };
        let resolution = self.resolve(path)?;
        if resolution.found {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let parent = self.ensure_resident(resolution.entry)?;
        if self.tree.inode(parent).is_regular_file() {
            return Err(FsError::Unsupported(format!(
                "{path}: {} is not a directory",
                self.tree.entry(resolution.entry).name
            )));
        }
        if resolution.unresolved > 1 {
            return Err(FsError::NotFound(path.to_string()));
        }
        validate_name(name)?;

        let ino = self.inode_map.allocate()? as u32;
        let checkpoint = self.tree.checkpoint();
        let mut claimed = Vec::new();
        match self.link_new(parent, name, kind, ino, &mut claimed) {
            Ok(()) => {
                debug!("{path}: created {kind:?} with inode {ino}");
                Ok(())
            }
            Err(e) => {
                debug!("{path}: creation failed ({e}), rolling back");
                self.tree.rollback(checkpoint);
                self.inode_map.free(ino as usize);
                for pointer in claimed {
                    self.release_data_block(pointer);
                }
                Err(e)
            }
        }
    }

    fn link_new(
        &mut self,
        parent: InodeId,
        name: &str,
        kind: FileKind,
        ino: u32,
        claimed: &mut Vec<u32>,
    ) -> FsResult<()> {
        let entry = self.tree.add_entry(Dentry::new(name, kind, ino));
        let mut inode = Inode::new(ino, kind, entry, self.superblock.block_size);
        if kind == FileKind::RegularFile {
            for slot in inode.block_pointers.iter_mut() {
                *slot = self.claim_data_block()?;
                claimed.push(*slot);
            }
        }
        self.tree.add_inode(inode);
        self.attach_child(parent, entry, true)
    }
}
