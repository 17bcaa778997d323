//! Physical memory layers.

#[cfg(test)]
pub mod buffer;
pub mod mmap_file;

#[cfg(test)]
pub use buffer::BufferLayer;
pub use mmap_file::MmapFileLayer;

use crate::memory::error::{MemError, MemResult};

/// Copy `[offset, offset+length)` out of `data`.
pub(crate) fn copy_range(
    layer_name: &str,
    data: &[u8],
    offset: u64,
    length: usize,
) -> MemResult<Vec<u8>> {
    let size = data.len() as u64;
    if offset > size || (offset == size && length > 0) {
        return Err(MemError::invalid_address(
            layer_name,
            offset,
            "Offset outside of the layer boundaries",
        ));
    }

    let start = offset as usize;
    let available = (size - offset) as usize;
    if length <= available {
        Ok(data[start..start + length].to_vec())
    } else {
        Err(MemError::invalid_address(
            layer_name,
            offset + available as u64,
            "Could not read sufficient bytes from the layer",
        ))
    }
}
