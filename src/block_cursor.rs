//! a cursor over a [BlockDevice] that hides the device's native I/O unit.
//!
//! Every request is rounded out to whole logical blocks and staged in a
//! scratch buffer; writes read the same aligned span first, so bytes outside
//! the caller's range survive.
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};

use crate::device::BlockDevice;

/// cursor struct
#[derive(Debug)]
pub struct BlockCursor<D> {
    inner: D,
    pos: u64,
    block_size: u64,
}

impl<D> BlockCursor<D> {
    /// creates a new BlockCursor staging I/O in `block_size` chunks
    pub fn new(inner: D, block_size: u64) -> Self {
        Self {
            inner,
            pos: 0,
            block_size,
        }
    }
    /// get underlying device
    pub fn into_inner(self) -> D {
        self.inner
    }
    /// get read only reference to underlying device
    pub const fn get_ref(&self) -> &D {
        &self.inner
    }
    /// get mutable reference to underlying device
    pub fn get_mut(&mut self) -> &mut D {
        &mut self.inner
    }
    /// get the current position of the cursor
    pub const fn position(&self) -> u64 {
        self.pos
    }
    /// `[start, end)` of the whole blocks covering `len` bytes at `offset`
    fn aligned_span(&self, offset: u64, len: usize) -> (u64, u64) {
        let start = self.block_size * (offset / self.block_size);
        let end = (offset + len as u64).div_ceil(self.block_size) * self.block_size;
        (start, end)
    }
}

impl<D> BlockCursor<D>
where
    D: BlockDevice,
{
    fn io_size(&self) -> io::Result<u64> {
        let io_size = self.inner.io_size() as u64;
        if io_size == 0 || self.block_size % io_size != 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "block size {} is not a multiple of the {io_size}-byte I/O unit",
                    self.block_size
                ),
            ));
        }
        Ok(io_size)
    }

    /// read the aligned span `[start, end)` unit by unit
    fn stage(&mut self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let io_size = self.io_size()?;
        if end > self.inner.capacity() {
            return Err(ErrorKind::UnexpectedEof.into());
        }
        let mut staged = vec![0u8; (end - start) as usize];
        let first_unit = start / io_size;
        for (i, chunk) in staged.chunks_mut(io_size as usize).enumerate() {
            self.inner.read_unit(first_unit + i as u64, chunk)?;
        }
        Ok(staged)
    }

    /// write a staged, aligned span back unit by unit
    fn commit(&mut self, start: u64, staged: &[u8]) -> io::Result<()> {
        let io_size = self.io_size()?;
        let first_unit = start / io_size;
        for (i, chunk) in staged.chunks(io_size as usize).enumerate() {
            self.inner.write_unit(first_unit + i as u64, chunk)?;
        }
        Ok(())
    }

    /// read `len` bytes starting at byte `offset`
    pub fn read_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let (start, end) = self.aligned_span(offset, len);
        let staged = self.stage(start, end)?;
        let bias = (offset - start) as usize;
        Ok(staged[bias..bias + len].to_vec())
    }

    /// write `data` starting at byte `offset`, preserving the rest of the touched blocks
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let (start, end) = self.aligned_span(offset, data.len());
        let mut staged = self.stage(start, end)?;
        let bias = (offset - start) as usize;
        staged[bias..bias + data.len()].copy_from_slice(data);
        self.commit(start, &staged)
    }
}

impl<D> Seek for BlockCursor<D>
where
    D: BlockDevice,
{
    fn seek(&mut self, style: SeekFrom) -> io::Result<u64> {
        let (base_pos, offset) = match style {
            SeekFrom::Start(n) => {
                self.pos = n;
                return Ok(n);
            }
            SeekFrom::End(n) => (self.inner.capacity(), n),
            SeekFrom::Current(n) => (self.pos, n),
        };
        match base_pos.checked_add_signed(offset) {
            Some(n) => {
                self.pos = n;
                Ok(self.pos)
            }
            None => Err(ErrorKind::InvalidInput.into()),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

impl<D> Read for BlockCursor<D>
where
    D: BlockDevice,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.inner.capacity().saturating_sub(self.pos);
        let n = buf.len().min(remaining as usize);
        let data = self.read_at(self.pos, n)?;
        buf[..n].copy_from_slice(&data);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<D> Write for BlockCursor<D>
where
    D: BlockDevice,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_at(self.pos, buf)?;
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
