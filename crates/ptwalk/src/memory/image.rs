//! Physical memory image: a raw dump mapped read-only.

use crate::memory::error::MemResult;
use crate::memory::layers::MmapFileLayer;
use crate::memory::traits::MemoryLayer;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct MemoryImage {
    layer: Arc<MmapFileLayer>,
}

impl MemoryImage {
    pub fn open(path: impl AsRef<Path>) -> MemResult<Self> {
        let layer = MmapFileLayer::open("physical", path)?;
        info!("Opened memory image {} ({} bytes)", layer.path().display(), layer.size());
        Ok(MemoryImage {
            layer: Arc::new(layer),
        })
    }

    /// Shared handle for address spaces and the kernel reader.
    pub fn physical_layer(&self) -> Arc<dyn MemoryLayer> {
        self.layer.clone() as Arc<dyn MemoryLayer>
    }
}
