use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};

use crate::{
    device::{BlockDevice, MemoryDevice},
    utils::fs_size_calculator::layout_size,
};

pub const TEST_IO_SIZE: u32 = 512;

/// route `log` output through the test harness
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// a blank RAM disk exactly the size of the fixed layout
pub fn blank_device() -> MemoryDevice {
    init_test_logger();
    MemoryDevice::new(
        layout_size(TEST_IO_SIZE * crate::fs::IO_UNITS_PER_BLOCK) as usize,
        TEST_IO_SIZE,
    )
}

/// a per-test image path under the system temp directory, removed if it exists
pub fn fresh_image_path(name: &str) -> PathBuf {
    init_test_logger();
    let path = std::env::temp_dir().join(format!("newfs-{}-{name}.img", std::process::id()));
    if path.exists() {
        std::fs::remove_file(&path).expect("Failed to remove stale image");
    }
    path
}

/// a blank RAM disk whose unit reads and writes fail once their budgets are spent
#[derive(Debug)]
pub struct FaultyDevice {
    inner: MemoryDevice,
    pub reads_left: usize,
    pub writes_left: usize,
}

impl FaultyDevice {
    pub fn new(reads_left: usize, writes_left: usize) -> Self {
        FaultyDevice {
            inner: blank_device(),
            reads_left,
            writes_left,
        }
    }
}

impl BlockDevice for FaultyDevice {
    fn capacity(&self) -> u64 {
        self.inner.capacity()
    }

    fn io_size(&self) -> u32 {
        self.inner.io_size()
    }

    fn read_unit(&mut self, unit: u64, buf: &mut [u8]) -> io::Result<()> {
        if self.reads_left == 0 {
            return Err(io::Error::new(ErrorKind::Other, "injected read failure"));
        }
        self.reads_left -= 1;
        self.inner.read_unit(unit, buf)
    }

    fn write_unit(&mut self, unit: u64, buf: &[u8]) -> io::Result<()> {
        if self.writes_left == 0 {
            return Err(io::Error::new(ErrorKind::Other, "injected write failure"));
        }
        self.writes_left -= 1;
        self.inner.write_unit(unit, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
