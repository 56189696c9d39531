pub mod block_cursor;
pub mod device;
pub mod error;
mod fs;
pub mod mkfs;
pub mod mount;
pub mod utils;
pub use error::{FsError, FsResult};
pub use fs::*;
