use bincode::{Decode, Encode};
use once_cell::sync::Lazy;

use crate::{
    error::{FsError, FsResult},
    utils::traits::DiskRecord,
};

use super::{
    filekind::FileKind,
    tree::{EntryId, InodeId},
    MAX_FILE_NAME,
};

/// encoded length of a [DentryRecord]
pub static DENTRY_RECORD_SIZE: Lazy<usize> = Lazy::new(|| {
    DentryRecord::blank()
        .to_bytes()
        .expect("encode blank directory entry")
        .len()
});

/// how many entry records fit in one data block of a directory
pub fn entries_per_block(block_size: u32) -> usize {
    block_size as usize / *DENTRY_RECORD_SIZE
}

/// on-disk form of a directory entry: the (name, type, inode) triple
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct DentryRecord {
    /// NUL padded
    pub name: [u8; MAX_FILE_NAME],
    pub kind: FileKind,
    pub ino: u32,
}

impl DentryRecord {
    fn blank() -> Self {
        DentryRecord {
            name: [0u8; MAX_FILE_NAME],
            kind: FileKind::RegularFile,
            ino: 0,
        }
    }

    pub fn new(name: &str, kind: FileKind, ino: u32) -> FsResult<Self> {
        validate_name(name)?;
        let mut record = Self::blank();
        record.name[..name.len()].copy_from_slice(name.as_bytes());
        record.kind = kind;
        record.ino = ino;
        Ok(record)
    }

    pub fn name(&self) -> String {
        let len = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(MAX_FILE_NAME);
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }
}

impl DiskRecord for DentryRecord {}

/// names must fit the fixed record and must not contain separators or NUL
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.len() > MAX_FILE_NAME {
        return Err(FsError::NameTooLong(name.to_string()));
    }
    if name.is_empty() || name.contains(['/', '\0']) {
        return Err(FsError::Unsupported(format!("invalid file name {name:?}")));
    }
    Ok(())
}

/// a resident directory entry
#[derive(Debug, Clone)]
pub struct Dentry {
    pub name: String,
    pub kind: FileKind,
    pub ino: u32,
    pub parent: Option<EntryId>,
    /// next entry in the parent's child chain
    pub sibling: Option<EntryId>,
    /// set once the inode has been loaded or allocated
    pub inode: Option<InodeId>,
}

impl Dentry {
    pub fn new(name: &str, kind: FileKind, ino: u32) -> Self {
        Dentry {
            name: name.to_string(),
            kind,
            ino,
            parent: None,
            sibling: None,
            inode: None,
        }
    }

    pub fn root() -> Self {
        Dentry::new("/", FileKind::Directory, super::ROOT_INODE)
    }

    pub fn from_record(record: &DentryRecord) -> Self {
        Dentry::new(&record.name(), record.kind, record.ino)
    }

    pub fn to_record(&self) -> FsResult<DentryRecord> {
        DentryRecord::new(&self.name, self.kind, self.ino)
    }

    pub fn to_dir_entry(&self) -> DirEntry {
        DirEntry {
            name: self.name.clone(),
            kind: self.kind,
            ino: self.ino,
        }
    }
}

/// a detached view of an entry handed out by the public API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
    pub ino: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() -> anyhow::Result<()> {
        let record = DentryRecord::new("notes.txt", FileKind::RegularFile, 42)?;
        let bytes = record.to_bytes()?;
        assert_eq!(bytes.len(), *DENTRY_RECORD_SIZE);
        assert_eq!(&bytes[..9], b"notes.txt");
        assert!(bytes[9..MAX_FILE_NAME].iter().all(|b| *b == 0));

        let decoded = DentryRecord::from_bytes(&bytes)?;
        assert_eq!(decoded.name(), "notes.txt");
        assert_eq!(decoded.kind, FileKind::RegularFile);
        assert_eq!(decoded.ino, 42);
        Ok(())
    }

    #[test]
    fn test_name_limits() {
        let longest = "x".repeat(MAX_FILE_NAME);
        assert_eq!(DentryRecord::new(&longest, FileKind::Directory, 1).unwrap().name(), longest);
        assert!(matches!(
            DentryRecord::new(&"x".repeat(MAX_FILE_NAME + 1), FileKind::Directory, 1),
            Err(FsError::NameTooLong(_))
        ));
        assert!(matches!(validate_name("a/b"), Err(FsError::Unsupported(_))));
        assert!(matches!(validate_name(""), Err(FsError::Unsupported(_))));
    }

    #[test]
    fn test_entries_per_block() {
        assert!(entries_per_block(1024) >= 1);
        assert!(entries_per_block(1024) * *DENTRY_RECORD_SIZE <= 1024);
    }
}
