//! Synthetic translation hierarchies for tests.

use crate::memory::error::MemResult;
use crate::memory::layers::BufferLayer;
use crate::memory::traits::MemoryLayer;
use crate::process::Pid;
use crate::walk::address_space::{AddressSpace, MemoryMap};
use crate::walk::entry::{EntryCodec, TableEntry};
use crate::walk::geometry::{PagingGeometry, PhysicalAddress, TableLevel, VirtualAddress, ENTRY_SIZE};
use parking_lot::Mutex;
use std::sync::Arc;

pub const IMAGE_SIZE: usize = 0x40000;
pub const ROOT: PhysicalAddress = 0x1000;
/// Outside every fixture image.
pub const OUTSIDE_IMAGE: PhysicalAddress = 0x80_0000;

/// Builds tables page by page inside a zeroed buffer, allocating
/// intermediate tables on demand.
pub struct HierarchyBuilder {
    geometry: PagingGeometry,
    codec: EntryCodec,
    layer: BufferLayer,
    next_free: PhysicalAddress,
}

impl HierarchyBuilder {
    pub fn new(geometry: PagingGeometry) -> Self {
        HierarchyBuilder {
            geometry,
            codec: EntryCodec::for_geometry(&geometry),
            layer: BufferLayer::zeroed("physical", IMAGE_SIZE),
            next_free: ROOT + geometry.page_size(),
        }
    }

    fn alloc(&mut self) -> PhysicalAddress {
        let table = self.next_free;
        self.next_free += self.geometry.page_size();
        table
    }

    /// Table holding the entry of `target` for `vaddr` (`None`: the leaf
    /// table), creating every table above it.
    fn table_for(&mut self, target: Option<TableLevel>, vaddr: VirtualAddress) -> PhysicalAddress {
        let mut table = ROOT;
        for level in TableLevel::ALL {
            if Some(level) == target {
                return table;
            }
            if self.geometry.is_folded(level) {
                continue;
            }
            let slot = table + self.geometry.index(level, vaddr) * ENTRY_SIZE;
            let entry = self.layer.read_u64(slot).unwrap();
            table = match self.codec.classify_table(level, entry) {
                TableEntry::Table(next) => next,
                _ => {
                    let next = self.alloc();
                    self.layer.write_u64(slot, self.codec.table_entry(next)).unwrap();
                    next
                }
            };
        }
        table
    }

    /// Store `pte` as the leaf entry of `vaddr`.
    pub fn map_leaf(mut self, vaddr: VirtualAddress, pte: u64) -> Self {
        let table = self.table_for(None, vaddr);
        let slot = table + self.geometry.leaf_index(vaddr) * ENTRY_SIZE;
        self.layer.write_u64(slot, pte).unwrap();
        self
    }

    pub fn map_frame(self, vaddr: VirtualAddress, frame: u64) -> Self {
        let pte = self.codec.resident_entry(frame);
        self.map_leaf(vaddr, pte)
    }

    /// Overwrite the `level` entry of `vaddr` with a raw value.
    pub fn set_entry(mut self, level: TableLevel, vaddr: VirtualAddress, raw: u64) -> Self {
        assert!(!self.geometry.is_folded(level), "{} has no table of its own", level);
        let table = self.table_for(Some(level), vaddr);
        let slot = table + self.geometry.index(level, vaddr) * ENTRY_SIZE;
        self.layer.write_u64(slot, raw).unwrap();
        self
    }

    pub fn into_layer(self) -> BufferLayer {
        self.layer
    }

    pub fn build(self, pid: Pid) -> (MemoryMap, Arc<RecordingLayer>) {
        let recorder = Arc::new(RecordingLayer::new(self.layer));
        let map = AddressSpace::new(pid, ROOT, recorder.clone());
        (map, recorder)
    }
}

/// Layer that remembers the offset of every read.
pub struct RecordingLayer {
    inner: BufferLayer,
    reads: Mutex<Vec<u64>>,
}

impl RecordingLayer {
    pub fn new(inner: BufferLayer) -> Self {
        RecordingLayer {
            inner,
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn reads(&self) -> Vec<u64> {
        self.reads.lock().clone()
    }
}

impl MemoryLayer for RecordingLayer {
    fn read(&self, offset: u64, length: usize) -> MemResult<Vec<u8>> {
        self.reads.lock().push(offset);
        self.inner.read(offset, length)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
