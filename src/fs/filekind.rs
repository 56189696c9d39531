use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// an enum to describe the type of a file
///
/// Stored as a `u32` discriminant: 0 for regular files, 1 for directories.
#[derive(Serialize, Deserialize, Encode, Decode, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    #[default]
    RegularFile,
    /// a directory
    Directory,
}
