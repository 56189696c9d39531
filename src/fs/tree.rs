//! the resident directory tree
//!
//! Entries and inodes live in two arenas and refer to each other by index,
//! so parent, sibling and entry/inode back-links are plain lookups.
use log::debug;

use crate::{device::BlockDevice, error::FsError, error::FsResult, mount::NameMatch};

use super::{
    directory::{entries_per_block, Dentry},
    fs_layout::Mounted,
    inode::Inode,
    DATA_LOGICAL_BASE, DIRECT_POINTERS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeId(usize);

/// arena lengths to roll back to
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    entries: usize,
    inodes: usize,
}

#[derive(Debug, Default)]
pub struct Tree {
    entries: Vec<Dentry>,
    inodes: Vec<Inode>,
}

impl Tree {
    pub fn add_entry(&mut self, dentry: Dentry) -> EntryId {
        self.entries.push(dentry);
        EntryId(self.entries.len() - 1)
    }

    /// store an inode and attach it to the entry it names
    pub fn add_inode(&mut self, inode: Inode) -> InodeId {
        let dentry = inode.dentry;
        self.inodes.push(inode);
        let id = InodeId(self.inodes.len() - 1);
        self.entry_mut(dentry).inode = Some(id);
        id
    }

    pub fn entry(&self, id: EntryId) -> &Dentry {
        &self.entries[id.0]
    }

    pub fn entry_mut(&mut self, id: EntryId) -> &mut Dentry {
        &mut self.entries[id.0]
    }

    pub fn inode(&self, id: InodeId) -> &Inode {
        &self.inodes[id.0]
    }

    pub fn inode_mut(&mut self, id: InodeId) -> &mut Inode {
        &mut self.inodes[id.0]
    }

    /// put `child` at the head of `dir`'s chain and count it
    pub fn link_child(&mut self, dir: InodeId, child: EntryId) {
        let (parent, head) = {
            let inode = self.inode(dir);
            (inode.dentry, inode.children)
        };
        let entry = self.entry_mut(child);
        entry.parent = Some(parent);
        entry.sibling = head;
        let inode = self.inode_mut(dir);
        inode.children = Some(child);
        inode.dir_cnt += 1;
    }

    /// walk `dir`'s chain, newest child first
    pub fn children(&self, dir: InodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.inode(dir).children,
        }
    }

    pub fn nth_child(&self, dir: InodeId, n: usize) -> Option<EntryId> {
        self.children(dir).nth(n)
    }

    pub fn find_child(&self, dir: InodeId, name: &str, name_match: NameMatch) -> Option<EntryId> {
        self.children(dir)
            .find(|child| name_match.matches(&self.entry(*child).name, name))
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            entries: self.entries.len(),
            inodes: self.inodes.len(),
        }
    }

    /// how many entries are resident, linked or not
    #[cfg(test)]
    pub(crate) fn resident_entries(&self) -> usize {
        self.entries.len()
    }

    /// drop everything added since `checkpoint`; only valid before any of it was linked
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.entries.truncate(checkpoint.entries);
        self.inodes.truncate(checkpoint.inodes);
        for entry in &mut self.entries {
            if entry.inode.is_some_and(|id| id.0 >= checkpoint.inodes) {
                entry.inode = None;
            }
        }
    }
}

pub struct Children<'a> {
    tree: &'a Tree,
    next: Option<EntryId>,
}

impl Iterator for Children<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.entry(current).sibling;
        Some(current)
    }
}

/// lazy inode cache and child insertion
impl<D: BlockDevice> Mounted<D> {
    /// the entry's inode, loading it from disk on first access
    pub(crate) fn ensure_resident(&mut self, entry: EntryId) -> FsResult<InodeId> {
        if let Some(inode) = self.tree.entry(entry).inode {
            return Ok(inode);
        }
        let ino = self.tree.entry(entry).ino;
        self.load(entry, ino)
    }

    /// link `entry` under `dir`
    ///
    /// With `preallocate`, a child that starts a new block first claims that
    /// block; if the claim fails nothing is linked.
    pub(crate) fn attach_child(
        &mut self,
        dir: InodeId,
        entry: EntryId,
        preallocate: bool,
    ) -> FsResult<()> {
        if preallocate {
            self.reserve_entry_slot(dir)?;
        }
        self.tree.link_child(dir, entry);
        Ok(())
    }

    fn reserve_entry_slot(&mut self, dir: InodeId) -> FsResult<()> {
        let per_block = entries_per_block(self.superblock.block_size);
        let (ino, count, pointers) = {
            let inode = self.tree.inode(dir);
            (inode.ino, inode.dir_cnt as usize, inode.block_pointers)
        };
        if count % per_block != 0 {
            return Ok(());
        }
        let slot = count / per_block;
        if slot >= DIRECT_POINTERS {
            return Err(FsError::NoSpace("directory entry blocks"));
        }
        if pointers[slot] >= DATA_LOGICAL_BASE {
            return Ok(());
        }
        let pointer = self.claim_data_block()?;
        debug!("directory inode {ino}: block {pointer} in slot {slot}");
        self.tree.inode_mut(dir).block_pointers[slot] = pointer;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{FileKind, ROOT_INODE};

    fn tree_with_root() -> (Tree, InodeId) {
        let mut tree = Tree::default();
        let root = tree.add_entry(Dentry::root());
        let inode = tree.add_inode(Inode::new(ROOT_INODE, FileKind::Directory, root, 1024));
        (tree, inode)
    }

    #[test]
    fn test_newest_child_is_listed_first() {
        let (mut tree, root) = tree_with_root();
        let e1 = tree.add_entry(Dentry::new("e1", FileKind::Directory, 1));
        let e2 = tree.add_entry(Dentry::new("e2", FileKind::RegularFile, 2));
        tree.link_child(root, e1);
        tree.link_child(root, e2);

        assert_eq!(tree.nth_child(root, 0), Some(e2));
        assert_eq!(tree.nth_child(root, 1), Some(e1));
        assert_eq!(tree.nth_child(root, 2), None);
        assert_eq!(tree.inode(root).dir_cnt, 2);
        assert_eq!(tree.entry(e1).parent, Some(tree.inode(root).dentry));
    }

    #[test]
    fn test_find_child_exact_and_prefix() {
        let (mut tree, root) = tree_with_root();
        let docs = tree.add_entry(Dentry::new("documents", FileKind::Directory, 1));
        tree.link_child(root, docs);

        assert_eq!(tree.find_child(root, "documents", NameMatch::Exact), Some(docs));
        assert_eq!(tree.find_child(root, "doc", NameMatch::Exact), None);
        assert_eq!(tree.find_child(root, "doc", NameMatch::Prefix), Some(docs));
        assert_eq!(tree.find_child(root, "documentsx", NameMatch::Prefix), None);
    }

    #[test]
    fn test_rollback_detaches_new_inodes() {
        let (mut tree, _root) = tree_with_root();
        let checkpoint = tree.checkpoint();
        let entry = tree.add_entry(Dentry::new("tmp", FileKind::RegularFile, 3));
        tree.add_inode(Inode::new(3, FileKind::RegularFile, entry, 1024));
        tree.rollback(checkpoint);
        assert_eq!(tree.checkpoint().entries, 1);
        assert_eq!(tree.checkpoint().inodes, 1);
    }
}
