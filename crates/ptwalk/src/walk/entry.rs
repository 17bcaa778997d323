//! Linux x86-64 page-table entry decoding.
//!
//! Table entries (pgd/p4d/pud/pmd) are checked the way the kernel's
//! `*_none` and `*_bad` helpers check them. Leaf entries (PTEs) are split
//! into resident, swapped and empty; swap PTEs are decoded into the
//! architecture-independent swap value `(type << 58) | offset`.

use crate::walk::geometry::{PagingGeometry, PhysicalAddress, TableLevel};

pub const PAGE_PRESENT: u64 = 1 << 0;
pub const PAGE_RW: u64 = 1 << 1;
pub const PAGE_USER: u64 = 1 << 2;
pub const PAGE_ACCESSED: u64 = 1 << 5;
pub const PAGE_DIRTY: u64 = 1 << 6;
pub const PAGE_PSE: u64 = 1 << 7;
/// Reuses the global bit on non-present entries.
pub const PAGE_PROTNONE: u64 = 1 << 8;
pub const PAGE_NX: u64 = 1 << 63;

/// Flags of a kernel page-table page.
const KERNPG_TABLE: u64 = PAGE_PRESENT | PAGE_RW | PAGE_ACCESSED | PAGE_DIRTY;

/// Bits some Knights Landing parts set spuriously in empty entries.
const KNL_ERRATUM_MASK: u64 = PAGE_DIRTY | PAGE_ACCESSED;

/// Maximum physical address bits.
const MAXPHYADDR: u32 = 52;

// Swap PTE layout: type in the top 5 bits, inverted offset from bit 9.
const SWP_TYPE_BITS: u32 = 5;
const SWP_OFFSET_FIRST_BIT: u32 = 9;
const SWP_OFFSET_SHIFT: u32 = SWP_OFFSET_FIRST_BIT + SWP_TYPE_BITS;
/// Software bits carried in swap PTEs that are not part of the entry.
const SWP_SOFT_DIRTY: u64 = PAGE_RW;
const SWP_UFFD_WP: u64 = PAGE_USER;
const SWP_EXCLUSIVE: u64 = PAGE_PSE;

// Generic swap value layout.
const SWP_TYPE_SHIFT: u32 = 58;
const SWP_OFFSET_MASK: u64 = (1u64 << SWP_TYPE_SHIFT) - 1;

/// Swap value reported as "no mapping" instead of as a swap location.
///
/// A non-present, non-empty PTE that decodes to swap value 0 (swap type 0,
/// offset 0) cannot be told apart from an unmapped page in the reported
/// record, so it is classified as unresolvable. Whether the kernel ever
/// hands out type 0 / offset 0 for a real page is not settled here; this
/// constant is the single place the policy lives.
pub const AMBIGUOUS_SWAP_ID: u64 = 0;

/// Classification of an entry above the leaf table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEntry {
    /// No mapping at or below this level.
    Absent,
    /// Fails the level's consistency check (including huge mappings).
    Malformed,
    /// Points at the next table.
    Table(PhysicalAddress),
}

/// Classification of a leaf entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafEntry {
    Empty,
    Resident { frame: u64 },
    Swapped(SwapEntry),
}

/// Architecture-independent swap value (`swp_entry_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapEntry(u64);

impl SwapEntry {
    pub fn new(swap_type: u8, offset: u64) -> Self {
        SwapEntry(((swap_type as u64) << SWP_TYPE_SHIFT) | (offset & SWP_OFFSET_MASK))
    }

    pub fn from_value(value: u64) -> Self {
        SwapEntry(value)
    }

    /// The raw value, which is what gets reported as the swap identifier.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Index of the swap device.
    pub fn swap_type(self) -> u8 {
        (self.0 >> SWP_TYPE_SHIFT) as u8
    }

    /// Page offset inside the swap device.
    pub fn offset(self) -> u64 {
        self.0 & SWP_OFFSET_MASK
    }

    /// Encode as a swap PTE (the inverse of [`EntryCodec::classify_leaf`]).
    pub fn to_pte(self) -> u64 {
        let offset = self.offset();
        let swap_type = self.swap_type() as u64;
        ((!offset) << SWP_OFFSET_SHIFT >> SWP_TYPE_BITS) | (swap_type << (64 - SWP_TYPE_BITS))
    }
}

/// Decoder for x86-64 entries under one paging geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryCodec {
    page_shift: u32,
    /// The pgd is a table of its own (p4d not folded), so `pgd_bad` applies.
    pgd_checked: bool,
}

impl EntryCodec {
    pub fn for_geometry(geometry: &PagingGeometry) -> Self {
        EntryCodec {
            page_shift: geometry.page_shift(),
            pgd_checked: !geometry.is_folded(TableLevel::Upper),
        }
    }

    /// Bits of an entry holding the physical frame.
    pub fn pfn_mask(&self) -> u64 {
        ((1u64 << MAXPHYADDR) - 1) & !((1u64 << self.page_shift) - 1)
    }

    fn flags(&self, entry: u64) -> u64 {
        entry & !self.pfn_mask()
    }

    pub fn is_none(entry: u64) -> bool {
        entry & !KNL_ERRATUM_MASK == 0
    }

    /// The level's `*_bad` check.
    pub fn is_bad(&self, level: TableLevel, entry: u64) -> bool {
        let flags = self.flags(entry);
        match level {
            // pgd_bad with five levels: exactly a table pointer, USER and NX aside.
            TableLevel::Top if self.pgd_checked => {
                flags & !(PAGE_USER | PAGE_NX) != KERNPG_TABLE
            }
            // p4d_bad, which a folded p4d applies to the pgd entry.
            // Under page-table isolation user entries carry NX.
            TableLevel::Top | TableLevel::Upper => {
                flags & !(KERNPG_TABLE | PAGE_USER | PAGE_NX) != 0
            }
            // pud_bad: anything beyond a table pointer, a 1 GiB page included.
            TableLevel::Middle => flags & !(KERNPG_TABLE | PAGE_USER) != 0,
            // pmd_bad: must be exactly a table pointer, so 2 MiB pages are bad.
            TableLevel::LeafParent => {
                flags & !(PAGE_USER | PAGE_ACCESSED) != KERNPG_TABLE & !PAGE_ACCESSED
            }
        }
    }

    pub fn classify_table(&self, level: TableLevel, entry: u64) -> TableEntry {
        if Self::is_none(entry) {
            TableEntry::Absent
        } else if entry & PAGE_PRESENT == 0 || self.is_bad(level, entry) {
            TableEntry::Malformed
        } else {
            TableEntry::Table(entry & self.pfn_mask())
        }
    }

    /// Frame base of a present 1 GiB (Middle) or 2 MiB (LeafParent) mapping.
    pub fn large_page(&self, level: TableLevel, entry: u64) -> Option<PhysicalAddress> {
        let huge = PAGE_PRESENT | PAGE_PSE;
        match level {
            TableLevel::Middle | TableLevel::LeafParent if entry & huge == huge => {
                Some(entry & self.pfn_mask())
            }
            _ => None,
        }
    }

    /// `pte_present`: PROT_NONE pages are present as far as translation goes.
    pub fn is_present(entry: u64) -> bool {
        entry & (PAGE_PRESENT | PAGE_PROTNONE) != 0
    }

    /// `pte_pfn`. Non-present PROT_NONE entries store the frame inverted.
    pub fn pfn(&self, entry: u64) -> u64 {
        let inverted = if entry != 0 && entry & PAGE_PRESENT == 0 {
            !entry
        } else {
            entry
        };
        (inverted & self.pfn_mask()) >> self.page_shift
    }

    /// `pte_to_swp_entry` for a non-present, non-empty PTE.
    pub fn swap_entry(entry: u64) -> SwapEntry {
        let pte = entry & !(SWP_SOFT_DIRTY | SWP_UFFD_WP | SWP_EXCLUSIVE);
        let swap_type = (pte >> (64 - SWP_TYPE_BITS)) as u8;
        let offset = (!pte) << SWP_TYPE_BITS >> SWP_OFFSET_SHIFT;
        SwapEntry::new(swap_type, offset)
    }

    pub fn classify_leaf(&self, entry: u64) -> LeafEntry {
        if Self::is_none(entry) {
            LeafEntry::Empty
        } else if Self::is_present(entry) {
            LeafEntry::Resident {
                frame: self.pfn(entry),
            }
        } else {
            LeafEntry::Swapped(Self::swap_entry(entry))
        }
    }

    /// Entry pointing at a table, with the flags Linux gives user tables.
    pub fn table_entry(&self, table: PhysicalAddress) -> u64 {
        (table & self.pfn_mask()) | KERNPG_TABLE | PAGE_USER
    }

    /// Present user PTE mapping `frame`.
    pub fn resident_entry(&self, frame: u64) -> u64 {
        ((frame << self.page_shift) & self.pfn_mask())
            | PAGE_PRESENT
            | PAGE_RW
            | PAGE_USER
            | PAGE_ACCESSED
            | PAGE_DIRTY
    }
}

impl Default for EntryCodec {
    fn default() -> Self {
        EntryCodec::for_geometry(&PagingGeometry::default())
    }
}
