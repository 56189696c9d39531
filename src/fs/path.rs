//! path resolution over the resident tree
use log::debug;

use crate::{device::BlockDevice, error::FsResult};

use super::{fs_layout::Mounted, tree::EntryId};

/// split a path into its non-empty components
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// where a walk from the root stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resolution {
    /// the match, or the deepest entry reached when nothing matched
    pub entry: EntryId,
    pub found: bool,
    pub is_root: bool,
    /// components left over when the walk stopped, the unmatched one included
    pub unresolved: usize,
}

impl<D: BlockDevice> Mounted<D> {
    /// walk `path` from the root, loading inodes on the way
    ///
    /// The returned entry always has its inode resident.
    pub(crate) fn resolve(&mut self, path: &str) -> FsResult<Resolution> {
        let components = components(path);
        if components.is_empty() {
            self.ensure_resident(self.root)?;
            return Ok(Resolution {
                entry: self.root,
                found: true,
                is_root: true,
                unresolved: 0,
            });
        }

        let mut current = self.root;
        for (depth, component) in components.iter().enumerate() {
            let inode = self.ensure_resident(current)?;
            let unresolved = components.len() - depth;
            if self.tree.inode(inode).is_regular_file() {
                debug!("resolve {path:?}: {:?} is not a directory", self.tree.entry(current).name);
                return Ok(self.stopped_at(current, unresolved));
            }
            match self.tree.find_child(inode, component, self.name_match) {
                Some(child) => current = child,
                None => return Ok(self.stopped_at(current, unresolved)),
            }
        }
        self.ensure_resident(current)?;
        Ok(Resolution {
            entry: current,
            found: true,
            is_root: current == self.root,
            unresolved: 0,
        })
    }

    fn stopped_at(&self, entry: EntryId, unresolved: usize) -> Resolution {
        Resolution {
            entry,
            found: false,
            is_root: entry == self.root,
            unresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fs::{directory::Dentry, FileKind, NewFS},
        mount::NameMatch,
        utils::init_test_environment::blank_device,
    };

    #[test]
    fn test_components_skip_empty_parts() {
        assert!(components("/").is_empty());
        assert!(components("").is_empty());
        assert_eq!(components("//a///b/"), vec!["a", "b"]);
    }

    fn mounted_with(name_match: NameMatch) -> anyhow::Result<NewFS<crate::device::MemoryDevice>> {
        let mut fs = NewFS::new();
        fs.mount_device(blank_device(), name_match)?;
        let mounted = fs.mounted()?;
        let root = mounted.ensure_resident(mounted.root)?;
        let ino = mounted.inode_map.allocate()? as u32;
        let entry = mounted
            .tree
            .add_entry(Dentry::new("documents", FileKind::Directory, ino));
        mounted.tree.add_inode(crate::fs::inode::Inode::new(
            ino,
            FileKind::Directory,
            entry,
            mounted.superblock.block_size,
        ));
        mounted.attach_child(root, entry, true)?;
        Ok(fs)
    }

    #[test]
    fn test_exact_match_reports_parent_when_missing() -> anyhow::Result<()> {
        let mut fs = mounted_with(NameMatch::Exact)?;
        let mounted = fs.mounted()?;
        let hit = mounted.resolve("/documents")?;
        assert!(hit.found && !hit.is_root);
        assert_eq!(mounted.tree.entry(hit.entry).name, "documents");

        let miss = mounted.resolve("/doc")?;
        assert!(!miss.found);
        assert!(miss.is_root);
        assert_eq!(miss.unresolved, 1);

        let deep = mounted.resolve("/documents/x/y")?;
        assert!(!deep.found);
        assert_eq!(mounted.tree.entry(deep.entry).name, "documents");
        assert_eq!(deep.unresolved, 2);
        Ok(())
    }

    #[test]
    fn test_prefix_match_resolves_shortened_names() -> anyhow::Result<()> {
        let mut fs = mounted_with(NameMatch::Prefix)?;
        let mounted = fs.mounted()?;
        let hit = mounted.resolve("/doc")?;
        assert!(hit.found);
        assert_eq!(mounted.tree.entry(hit.entry).name, "documents");
        assert!(mounted.tree.entry(hit.entry).inode.is_some());
        Ok(())
    }

    #[test]
    fn test_root_resolves_without_components() -> anyhow::Result<()> {
        let mut fs = mounted_with(NameMatch::Exact)?;
        let mounted = fs.mounted()?;
        for path in ["/", "", "///"] {
            let root = mounted.resolve(path)?;
            assert!(root.found && root.is_root);
            assert_eq!(root.entry, mounted.root);
        }
        Ok(())
    }
}
