use bincode::{Decode, Encode};
use once_cell::sync::Lazy;
use std::time::SystemTime;

use crate::{
    error::{FsError, FsResult},
    utils::traits::DiskRecord,
};

use super::{filekind::FileKind, tree::EntryId, DATA_LOGICAL_BASE, DIRECT_POINTERS};

/// encoded length of an [InodeRecord]
pub static INODE_RECORD_SIZE: Lazy<usize> = Lazy::new(|| {
    InodeRecord::default()
        .to_bytes()
        .expect("encode blank inode record")
        .len()
});

/// on-disk form of an inode: scalars only
#[derive(Encode, Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct InodeRecord {
    pub ino: u32,
    pub size: u32,
    pub link: u32,
    pub kind: FileKind,
    pub block_pointers: [u32; DIRECT_POINTERS],
    pub dir_cnt: u32,
}

impl DiskRecord for InodeRecord {}

/// a resident inode
///
/// Directories keep their entries as a sibling chain inside the
/// [Tree](super::tree::Tree); regular files keep one buffer per direct block.
#[derive(Debug, Clone)]
pub struct Inode {
    pub ino: u32,
    pub size: u32,
    pub link: u32,
    pub kind: FileKind,
    /// logical data-block numbers, 0 while a slot is unassigned
    pub block_pointers: [u32; DIRECT_POINTERS],
    pub dir_cnt: u32,
    /// the entry naming this inode
    pub dentry: EntryId,
    /// head of the child chain, newest child first
    pub children: Option<EntryId>,
    pub data: Vec<Vec<u8>>,
}

impl Inode {
    /// a freshly allocated inode; files get zeroed buffers for every direct block
    pub fn new(ino: u32, kind: FileKind, dentry: EntryId, block_size: u32) -> Self {
        let data = match kind {
            FileKind::RegularFile => vec![vec![0u8; block_size as usize]; DIRECT_POINTERS],
            FileKind::Directory => Vec::new(),
        };
        Inode {
            ino,
            size: 0,
            link: 1,
            kind,
            block_pointers: [0u32; DIRECT_POINTERS],
            dir_cnt: 0,
            dentry,
            children: None,
            data,
        }
    }

    /// an empty shell for a record read back from disk:
    /// no children linked yet and no data buffers read yet
    pub fn from_record(record: &InodeRecord, dentry: EntryId) -> Self {
        Inode {
            ino: record.ino,
            size: record.size,
            link: record.link,
            kind: record.kind,
            block_pointers: record.block_pointers,
            dir_cnt: 0,
            dentry,
            children: None,
            data: Vec::new(),
        }
    }

    pub fn to_record(&self) -> InodeRecord {
        InodeRecord {
            ino: self.ino,
            size: self.size,
            link: self.link,
            kind: self.kind,
            block_pointers: self.block_pointers,
            dir_cnt: self.dir_cnt,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.kind == FileKind::RegularFile
    }

    /// direct pointers that name a claimed data block
    pub fn assigned_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.block_pointers
            .iter()
            .copied()
            .filter(|p| *p >= DATA_LOGICAL_BASE)
    }
}

/// This block is about file content
///
/// Content lives in the resident buffers, which reach the device when the
/// tree is flushed.
impl Inode {
    /// bytes a regular file can hold
    pub fn capacity(&self) -> u64 {
        self.data.iter().map(|block| block.len() as u64).sum()
    }

    /// copy bytes at `offset` into `buf`, stopping at the file size
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> usize {
        let size = self.size as u64;
        if offset >= size {
            return 0;
        }
        let should_read = buf.len().min((size - offset) as usize);
        self.copy_blocks(offset, should_read, |block, range, done| {
            buf[done..done + range.len()].copy_from_slice(&block[range]);
        });
        should_read
    }

    /// copy `data` in at `offset`, growing the size; the tail past capacity is dropped
    pub fn write(&mut self, offset: u64, data: &[u8]) -> FsResult<usize> {
        let capacity = self.capacity();
        if data.is_empty() {
            return Ok(0);
        }
        if offset >= capacity {
            return Err(FsError::NoSpace("direct blocks"));
        }
        let should_write = data.len().min((capacity - offset) as usize);
        let block_size = self.data.first().map_or(0, Vec::len);
        let mut done = 0;
        while done < should_write {
            let position = offset as usize + done;
            let block = &mut self.data[position / block_size];
            let in_block = position % block_size;
            let len = (block_size - in_block).min(should_write - done);
            block[in_block..in_block + len].copy_from_slice(&data[done..done + len]);
            done += len;
        }
        self.size = self.size.max((offset as usize + should_write) as u32);
        Ok(should_write)
    }

    fn copy_blocks<F>(&self, offset: u64, len: usize, mut f: F)
    where
        F: FnMut(&[u8], std::ops::Range<usize>, usize),
    {
        let block_size = self.data.first().map_or(0, Vec::len);
        let mut done = 0;
        while done < len {
            let position = offset as usize + done;
            let block = &self.data[position / block_size];
            let in_block = position % block_size;
            let chunk = (block_size - in_block).min(len - done);
            f(block, in_block..in_block + chunk, done);
            done += chunk;
        }
    }
}

/// what `stat` reports
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub ino: u32,
    pub kind: FileKind,
    pub size: u64,
    pub blocks: u64,
    pub nlink: u32,
    pub blksize: u32,
    pub uid: libc::uid_t,
    pub gid: libc::gid_t,
    pub atime: SystemTime,
    pub mtime: SystemTime,
}
