//! raw devices the filesystem can be mounted on
//!
//! A device only understands whole native I/O units; alignment to logical
//! blocks is the job of [BlockCursor](crate::block_cursor::BlockCursor).
use memmap2::MmapMut;
use std::{
    fs::OpenOptions,
    io::{self, ErrorKind},
    path::Path,
};

/// a raw device addressed in native I/O units
pub trait BlockDevice {
    /// device size in bytes
    fn capacity(&self) -> u64;
    /// native I/O unit in bytes
    fn io_size(&self) -> u32;
    /// read unit number `unit` into `buf`, whose length is exactly [BlockDevice::io_size]
    fn read_unit(&mut self, unit: u64, buf: &mut [u8]) -> io::Result<()>;
    /// write `buf`, exactly [BlockDevice::io_size] bytes long, to unit number `unit`
    fn write_unit(&mut self, unit: u64, buf: &[u8]) -> io::Result<()>;
    /// push pending writes down to the backing store
    fn flush(&mut self) -> io::Result<()>;
}

/// locate the byte range of one unit inside a `capacity`-byte device
fn unit_range(unit: u64, io_size: u32, len: usize, capacity: u64) -> io::Result<(usize, usize)> {
    if len != io_size as usize {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("transfer of {len} bytes is not one {io_size}-byte unit"),
        ));
    }
    let start = unit * io_size as u64;
    let end = start + io_size as u64;
    if end > capacity {
        return Err(ErrorKind::UnexpectedEof.into());
    }
    Ok((start as usize, end as usize))
}

/// an image file (or device node) mapped into memory
#[derive(Debug)]
pub struct ImageDevice {
    mmap: MmapMut,
    io_size: u32,
}

impl ImageDevice {
    /// open the "device" for read and write
    pub fn open<P>(path: P, io_size: u32) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        if io_size == 0 {
            return Err(io::Error::new(ErrorKind::InvalidInput, "I/O unit must be non-zero"));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        // Safety
        // the mapping is owned by this device for the whole mount, nothing else
        // in this process touches the file while it is mapped.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap, io_size })
    }
}

impl BlockDevice for ImageDevice {
    fn capacity(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn io_size(&self) -> u32 {
        self.io_size
    }

    fn read_unit(&mut self, unit: u64, buf: &mut [u8]) -> io::Result<()> {
        let (start, end) = unit_range(unit, self.io_size, buf.len(), self.capacity())?;
        buf.copy_from_slice(&self.mmap[start..end]);
        Ok(())
    }

    fn write_unit(&mut self, unit: u64, buf: &[u8]) -> io::Result<()> {
        let (start, end) = unit_range(unit, self.io_size, buf.len(), self.capacity())?;
        self.mmap[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.mmap.flush()
    }
}

/// a zero-filled RAM disk
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    bytes: Vec<u8>,
    io_size: u32,
}

impl MemoryDevice {
    pub fn new(capacity: usize, io_size: u32) -> Self {
        Self {
            bytes: vec![0u8; capacity],
            io_size,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl BlockDevice for MemoryDevice {
    fn capacity(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn io_size(&self) -> u32 {
        self.io_size
    }

    fn read_unit(&mut self, unit: u64, buf: &mut [u8]) -> io::Result<()> {
        let (start, end) = unit_range(unit, self.io_size, buf.len(), self.capacity())?;
        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    fn write_unit(&mut self, unit: u64, buf: &[u8]) -> io::Result<()> {
        let (start, end) = unit_range(unit, self.io_size, buf.len(), self.capacity())?;
        self.bytes[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
