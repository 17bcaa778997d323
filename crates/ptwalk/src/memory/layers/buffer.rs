//! In-memory physical layer for assembling synthetic translation hierarchies.

use crate::memory::error::{MemError, MemResult};
use crate::memory::layers::copy_range;
use crate::memory::traits::MemoryLayer;

pub struct BufferLayer {
    name: String,
    data: Vec<u8>,
}

impl BufferLayer {
    /// A zero-filled layer of `size` bytes.
    pub fn zeroed(name: impl Into<String>, size: usize) -> Self {
        BufferLayer {
            name: name.into(),
            data: vec![0u8; size],
        }
    }

    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> MemResult<()> {
        let end = offset.checked_add(bytes.len() as u64);
        if end.map_or(true, |end| end > self.data.len() as u64) {
            return Err(MemError::invalid_address(
                &self.name,
                offset,
                format!("write of {} bytes past end of layer", bytes.len()),
            ));
        }
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Store one little-endian table entry.
    pub fn write_u64(&mut self, offset: u64, value: u64) -> MemResult<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Raw contents, e.g. for writing the layer out as an image file.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl MemoryLayer for BufferLayer {
    fn read(&self, offset: u64, length: usize) -> MemResult<Vec<u8>> {
        copy_range(&self.name, &self.data, offset, length)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_entry() {
        let mut layer = BufferLayer::zeroed("physical", 0x2000);
        layer.write_u64(0x1ff8, 0x0000_0000_0001_0067).unwrap();

        assert_eq!(layer.read_u64(0x1ff8).unwrap(), 0x1_0067);
        assert_eq!(layer.read_u64(0).unwrap(), 0);
        assert_eq!(layer.bytes().len(), 0x2000);
    }

    #[test]
    fn test_out_of_range() {
        let mut layer = BufferLayer::zeroed("physical", 16);
        assert!(layer.write_u64(12, 1).is_err());
        assert!(layer.write_u64(u64::MAX - 2, 1).is_err());
        assert!(layer.write_u64(8, 1).is_ok());
        assert!(layer.read(12, 8).is_err());
        assert!(layer.read_u64(16).is_err());
        assert_eq!(layer.read(8, 8).unwrap(), 1u64.to_le_bytes());
    }
}
