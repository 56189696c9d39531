//! options for attaching the filesystem to a device
use std::path::{Path, PathBuf};

/// native I/O unit assumed for image files
pub const DEFAULT_IO_SIZE: u32 = 512;

/// how a path component is compared with stored entry names
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// names must be identical
    #[default]
    Exact,
    /// a stored name matches when it starts with the component,
    /// so `/doc` resolves to an existing `/documents`; kept for images
    /// written by tools that relied on it
    Prefix,
}

impl NameMatch {
    pub fn matches(self, stored: &str, wanted: &str) -> bool {
        match self {
            NameMatch::Exact => stored == wanted,
            NameMatch::Prefix => stored.as_bytes().starts_with(wanted.as_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    /// image file or device node holding the filesystem
    pub device: PathBuf,
    /// native I/O unit of the device; logical blocks are twice this
    pub io_size: u32,
    pub name_match: NameMatch,
}

impl MountOptions {
    pub fn new<P>(device: P) -> Self
    where
        P: AsRef<Path>,
    {
        MountOptions {
            device: device.as_ref().to_path_buf(),
            io_size: DEFAULT_IO_SIZE,
            name_match: NameMatch::default(),
        }
    }

    pub fn io_size(mut self, io_size: u32) -> Self {
        self.io_size = io_size;
        self
    }

    pub fn name_match(mut self, name_match: NameMatch) -> Self {
        self.name_match = name_match;
        self
    }
}
