//! error type shared by every layer of the filesystem
use libc::c_int;
use thiserror::Error;

/// failures surfaced by the storage engine
///
/// Inner failures propagate unchanged, so the variant a caller sees is
/// the one produced by the first failing step.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("entry already exists: {0}")]
    AlreadyExists(String),
    /// invalid creation topology, or a device/layout this build can't handle
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// the named bitmap (or a directory's direct slots) is exhausted
    #[error("no space left: {0}")]
    NoSpace(&'static str),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("name too long: {0}")]
    NameTooLong(String),
    #[error("filesystem is not mounted")]
    NotMounted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// errno the protocol glue should report for this failure
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::Unsupported(_) => libc::ENXIO,
            FsError::NoSpace(_) => libc::ENOSPC,
            FsError::IsDirectory(_) => libc::EISDIR,
            FsError::NameTooLong(_) => libc::ENAMETOOLONG,
            FsError::NotMounted => libc::ENODEV,
            FsError::Io(_) => libc::EIO,
        }
    }

    pub(crate) fn invalid_data(message: impl Into<String>) -> Self {
        FsError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        ))
    }
}

impl From<bincode::error::EncodeError> for FsError {
    fn from(e: bincode::error::EncodeError) -> Self {
        FsError::invalid_data(format!("encode record failed: {e}"))
    }
}

impl From<bincode::error::DecodeError> for FsError {
    fn from(e: bincode::error::DecodeError) -> Self {
        FsError::invalid_data(format!("decode record failed: {e}"))
    }
}
