//! Core trait for reading physical memory.
//!
//! [`MemoryLayer`] is what the walker reads translation tables from: a
//! memory-mapped image file in production, an in-memory buffer in tests.

use crate::memory::error::{MemError, MemResult};

pub trait MemoryLayer: Send + Sync {
    /// Read `length` bytes starting at `offset`.
    fn read(&self, offset: u64, length: usize) -> MemResult<Vec<u8>>;

    fn name(&self) -> &str;

    /// Read a little-endian 64-bit word (one translation-table entry).
    fn read_u64(&self, offset: u64) -> MemResult<u64> {
        let bytes = self.read(offset, 8)?;
        let word: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            MemError::invalid_address(self.name(), offset, format!("short read of {} bytes", bytes.len()))
        })?;
        Ok(u64::from_le_bytes(word))
    }
}
