use bincode::{config, Decode, Encode};
use serde::Serialize;

use crate::error::FsResult;

/// Trait for digesting an object which stores digest in the object itself
pub trait DigestInSelf {
    fn digest(&mut self) -> FsResult<()>;
    fn verify_digest(&mut self) -> FsResult<bool>;
}

/// cacluate [blake3] hash of a serializable object
pub fn digest<T: Serialize>(t: &T) -> FsResult<[u8; 32]> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&bincode::serde::encode_to_vec(t, config::legacy())?);
    Ok(*hasher.finalize().as_bytes())
}

/// a fixed-size record stored verbatim on the device
///
/// Records use the legacy configuration, so integers are fixed-width
/// little-endian and every instance of a type encodes to the same length.
pub trait DiskRecord: Encode + Decode<()> {
    /// serialize into a [Vec](std::vec::Vec)
    fn to_bytes(&self) -> FsResult<Vec<u8>> {
        Ok(bincode::encode_to_vec(self, config::legacy())?)
    }

    /// deserialize from the start of a slice
    fn from_bytes(bytes: &[u8]) -> FsResult<Self> {
        let (record, _read) = bincode::decode_from_slice(bytes, config::legacy())?;
        Ok(record)
    }
}
