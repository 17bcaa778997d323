//! Memory-mapped physical memory image.
//!
//! A raw dump is mapped read-only and served through [`MemoryLayer`].

use crate::memory::error::MemResult;
use crate::memory::layers::copy_range;
use crate::memory::traits::MemoryLayer;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};

enum ImageData {
    Mapped(Mmap),
    /// memmap2 rejects zero-length mappings.
    Empty,
}

/// A read-only, memory-mapped image file.
pub struct MmapFileLayer {
    name: String,
    path: PathBuf,
    data: ImageData,
    size: u64,
}

impl MmapFileLayer {
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> MemResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();

        let data = if size == 0 {
            ImageData::Empty
        } else {
            // SAFETY: the mapping is read-only; a dump file modified underneath
            // us yields garbage entries, which the walker classifies as malformed.
            ImageData::Mapped(unsafe { MmapOptions::new().map(&file)? })
        };

        Ok(MmapFileLayer {
            name: name.into(),
            path,
            data,
            size,
        })
    }

    fn bytes(&self) -> &[u8] {
        match &self.data {
            ImageData::Mapped(mmap) => mmap.as_ref(),
            ImageData::Empty => &[],
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl MemoryLayer for MmapFileLayer {
    fn read(&self, offset: u64, length: usize) -> MemResult<Vec<u8>> {
        copy_range(&self.name, self.bytes(), offset, length)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
