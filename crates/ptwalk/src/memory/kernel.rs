//! Kernel virtual memory on top of a physical image.
//!
//! Translates through the kernel's own top-level table with the same walker
//! used for processes, with large pages enabled. Implements ksym's
//! `MemoryAccess` so `StructReader` can read kernel structures directly.

use crate::memory::error::{MemError, MemResult};
use crate::memory::traits::MemoryLayer;
use crate::walk::{AddressSpace, MemoryMap, PagingMode, PhysicalAddress, TranslationOutcome, TranslationWalker};
use ksym::MemoryAccess;
use std::sync::Arc;

const LAYER_NAME: &str = "kernel_virtual";

pub struct KernelMemory {
    physical: Arc<dyn MemoryLayer>,
    space: MemoryMap,
    walker: TranslationWalker,
}

impl KernelMemory {
    /// `dtb` is the physical address of the kernel's top-level table
    /// (`init_mm.pgd`, or CR3 of any kernel context).
    pub fn new(physical: Arc<dyn MemoryLayer>, mode: PagingMode, dtb: PhysicalAddress) -> Self {
        KernelMemory {
            space: AddressSpace::new(0, dtb, physical.clone()),
            physical,
            walker: TranslationWalker::for_mode(mode).with_large_pages(true),
        }
    }

    pub fn physical(&self) -> Arc<dyn MemoryLayer> {
        self.physical.clone()
    }

    pub fn dtb(&self) -> PhysicalAddress {
        self.space.root()
    }

    /// Physical address backing the kernel virtual address `vaddr`.
    pub fn translate(&self, vaddr: u64) -> MemResult<PhysicalAddress> {
        match self.walker.translate(&self.space, vaddr) {
            TranslationOutcome::Resident(pa) => Ok(pa),
            TranslationOutcome::SwappedOut(id) => Err(MemError::invalid_address(
                LAYER_NAME,
                vaddr,
                format!("kernel page swapped out ({:#x})", id),
            )),
            TranslationOutcome::Unresolvable(reason) => {
                Err(MemError::invalid_address(LAYER_NAME, vaddr, reason.to_string()))
            }
        }
    }

    /// Read `length` bytes at a kernel virtual address, page by page.
    pub fn read_virtual(&self, offset: u64, length: usize) -> MemResult<Vec<u8>> {
        let page_size = self.walker.geometry().page_size();
        let mut output = Vec::with_capacity(length);
        let mut current = offset;

        while output.len() < length {
            let in_page = page_size - (current & (page_size - 1));
            let chunk = in_page.min((length - output.len()) as u64) as usize;
            let physical = self.translate(current)?;
            output.extend_from_slice(&self.physical.read(physical, chunk)?);
            current = current.checked_add(chunk as u64).ok_or_else(|| {
                MemError::invalid_address(LAYER_NAME, current, "read wraps the address space")
            })?;
        }

        Ok(output)
    }
}

impl MemoryAccess for KernelMemory {
    fn read(
        &self,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        self.read_virtual(offset, length)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::fixtures::{HierarchyBuilder, ROOT};
    use crate::walk::entry::PAGE_PSE;
    use crate::walk::{EntryCodec, PagingGeometry, TableLevel};

    const KERNEL_PAGE: u64 = 0xffff_ffff_8200_0000;

    fn kernel() -> KernelMemory {
        let mut layer = HierarchyBuilder::new(PagingGeometry::x86_64_four_level())
            .map_frame(KERNEL_PAGE, 0x30)
            .map_frame(KERNEL_PAGE + 0x1000, 0x32)
            .into_layer();
        layer.write_bytes(0x30ff8, b"straddle").unwrap();
        layer.write_bytes(0x32000, b"s page 2").unwrap();
        KernelMemory::new(Arc::new(layer), PagingMode::FourLevel, ROOT)
    }

    #[test]
    fn test_read_crosses_pages() {
        let kernel = kernel();
        assert_eq!(kernel.dtb(), ROOT);
        assert_eq!(kernel.translate(KERNEL_PAGE + 0x10).unwrap(), 0x30010);
        let bytes = kernel.read_virtual(KERNEL_PAGE + 0xff8, 16).unwrap();
        assert_eq!(&bytes, b"straddles page 2");
    }

    #[test]
    fn test_unmapped_reads_fail() {
        let kernel = kernel();
        assert!(kernel.read_virtual(KERNEL_PAGE + 0x2000, 8).is_err());
        assert!(kernel.read_virtual(KERNEL_PAGE + 0x1ff8, 16).is_err());
        assert!(MemoryAccess::read(&kernel, KERNEL_PAGE + 0xff0, 0x20).is_ok());
        assert!(MemoryAccess::read(&kernel, KERNEL_PAGE + 0x1ff0, 0x20).is_err());
    }

    #[test]
    fn test_large_kernel_mapping() {
        let codec = EntryCodec::default();
        let huge = codec.resident_entry(0x200) | PAGE_PSE;
        let layer = HierarchyBuilder::new(PagingGeometry::x86_64_four_level())
            .map_frame(KERNEL_PAGE, 0x30)
            .set_entry(TableLevel::LeafParent, KERNEL_PAGE, huge)
            .into_layer();
        let kernel = KernelMemory::new(Arc::new(layer), PagingMode::FourLevel, ROOT);
        assert_eq!(kernel.translate(KERNEL_PAGE + 0x1234).unwrap(), 0x20_1234);
    }
}
