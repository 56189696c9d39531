//! create blank device images
//!
//! An image is only zero-filled here; the layout is written the first time
//! it is mounted.
use byte_unit::Byte;
use log::info;
use std::{fs::OpenOptions, path::Path};

use crate::{
    error::{FsError, FsResult},
    fs::IO_UNITS_PER_BLOCK,
    utils::fs_size_calculator::layout_size,
};

/// the size the fixed layout needs with 512-byte I/O units
pub const DEFAULT_IMAGE_SIZE: u64 = layout_size(512 * IO_UNITS_PER_BLOCK);

/// create a new zero-filled image file
/// # Params
/// - `image_file_path`: the path of the image file, must not exist yet
/// - `file_size`: the size of the image file
/// - `io_size`: the native I/O unit the image will be mounted with
pub fn create_image<P>(image_file_path: P, file_size: u64, io_size: u32) -> FsResult<()>
where
    P: AsRef<Path>,
{
    let space_needed = layout_size(io_size * IO_UNITS_PER_BLOCK);
    if file_size < space_needed {
        return Err(FsError::Unsupported(format!(
            "image size must be at least {} for {io_size} B I/O units",
            Byte::from_bytes(space_needed as _).get_appropriate_unit(true),
        )));
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(image_file_path.as_ref())?;
    // all regions are zero after `set_len`
    file.set_len(file_size)?;
    info!(
        "created image {:?} of {}",
        image_file_path.as_ref(),
        Byte::from_bytes(file_size as _).get_appropriate_unit(true)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::init_test_environment::fresh_image_path;

    #[test]
    fn test_create_image() -> anyhow::Result<()> {
        let path = fresh_image_path("mkfs");
        create_image(&path, DEFAULT_IMAGE_SIZE, 512)?;
        assert_eq!(std::fs::metadata(&path)?.len(), 4 * 1024 * 1024);
        // refuses to clobber an existing image
        assert!(create_image(&path, DEFAULT_IMAGE_SIZE, 512).is_err());
        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn test_create_image_too_small() {
        let path = fresh_image_path("mkfs-small");
        assert!(matches!(
            create_image(&path, 1024 * 1024, 512),
            Err(FsError::Unsupported(_))
        ));
        assert!(!path.exists());
    }
}
