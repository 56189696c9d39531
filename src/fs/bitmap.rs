use bitvec::prelude::*;
use log::debug;

use crate::error::{FsError, FsResult};

/// a first-fit bit allocator mirrored from one on-disk bitmap region
///
/// Bit `i` lives in byte `i / 8` at position `i % 8`, least significant bit
/// first, exactly as the bytes sit on disk. Only indices below `capacity`
/// are ever handed out, even when the region holds more bits.
#[derive(Debug, Default)]
pub struct Bitmap {
    name: &'static str,
    bits: BitVec<u8, Lsb0>,
    capacity: usize,
}

/// for serialize and deserialize
impl Bitmap {
    /// an all-free bitmap of `len` bytes
    pub fn zeroed(name: &'static str, len: usize, capacity: usize) -> Self {
        Self::from_bytes(name, &vec![0u8; len], capacity)
    }

    pub fn from_bytes(name: &'static str, bytes: &[u8], capacity: usize) -> Self {
        let bits = BitVec::<u8, Lsb0>::from_slice(bytes);
        let capacity = capacity.min(bits.len());
        Bitmap {
            name,
            bits,
            capacity,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }
}

/// for allocation
impl Bitmap {
    /// claim the lowest free index
    pub fn allocate(&mut self) -> FsResult<usize> {
        match self.bits.first_zero() {
            Some(index) if index < self.capacity => {
                self.bits.set(index, true);
                debug!("{} bitmap: allocated {index}", self.name);
                Ok(index)
            }
            _ => Err(FsError::NoSpace(self.name)),
        }
    }

    /// release an index; nothing in the tree frees yet, but rollbacks do
    pub fn free(&mut self, index: usize) {
        if index < self.capacity {
            self.bits.set(index, false);
            debug!("{} bitmap: freed {index}", self.name);
        }
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.bits.get(index).as_deref().copied().unwrap_or(false)
    }

    /// calculate the number of claimed indices
    pub fn used(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
