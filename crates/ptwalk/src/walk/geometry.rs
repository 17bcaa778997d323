//! How a virtual address splits into table indices and a page offset.
//!
//! Linux x86-64 layouts:
//!
//! ```text
//! four-level:  pgd (9) | p4d (folded) | pud (9) | pmd (9) | pte (9) | offset (12)   48-bit
//! five-level:  pgd (9) | p4d (9)      | pud (9) | pmd (9) | pte (9) | offset (12)   57-bit
//! ```

use crate::memory::error::{MemError, MemResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type VirtualAddress = u64;
pub type PhysicalAddress = u64;

/// Bytes per translation-table entry.
pub const ENTRY_SIZE: u64 = 8;

/// Largest index width accepted for a single level.
const MAX_LEVEL_BITS: u32 = 16;

/// Page-table levels above the leaf table, in walk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableLevel {
    Top,
    Upper,
    Middle,
    LeafParent,
}

impl TableLevel {
    pub const ALL: [TableLevel; 4] = [
        TableLevel::Top,
        TableLevel::Upper,
        TableLevel::Middle,
        TableLevel::LeafParent,
    ];

    pub const fn next(self) -> Option<TableLevel> {
        match self {
            TableLevel::Top => Some(TableLevel::Upper),
            TableLevel::Upper => Some(TableLevel::Middle),
            TableLevel::Middle => Some(TableLevel::LeafParent),
            TableLevel::LeafParent => None,
        }
    }

    pub const fn depth(self) -> usize {
        match self {
            TableLevel::Top => 0,
            TableLevel::Upper => 1,
            TableLevel::Middle => 2,
            TableLevel::LeafParent => 3,
        }
    }

    /// The Linux name of the level's table type.
    pub const fn kernel_name(self) -> &'static str {
        match self {
            TableLevel::Top => "pgd",
            TableLevel::Upper => "p4d",
            TableLevel::Middle => "pud",
            TableLevel::LeafParent => "pmd",
        }
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kernel_name())
    }
}

/// Paging mode of the analysed kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PagingMode {
    #[default]
    FourLevel,
    FiveLevel,
}

/// Index widths of every level plus the page shift.
///
/// A level with zero index bits is folded: it has no table of its own and
/// reuses the entry of the level above, as Linux folds the p4d level when
/// running with four-level paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingGeometry {
    va_bits: u32,
    page_shift: u32,
    level_bits: [u32; 4],
    leaf_bits: u32,
}

impl PagingGeometry {
    pub const fn x86_64_four_level() -> Self {
        PagingGeometry {
            va_bits: 48,
            page_shift: 12,
            level_bits: [9, 0, 9, 9],
            leaf_bits: 9,
        }
    }

    pub const fn x86_64_five_level() -> Self {
        PagingGeometry {
            va_bits: 57,
            page_shift: 12,
            level_bits: [9, 9, 9, 9],
            leaf_bits: 9,
        }
    }

    pub const fn for_mode(mode: PagingMode) -> Self {
        match mode {
            PagingMode::FourLevel => Self::x86_64_four_level(),
            PagingMode::FiveLevel => Self::x86_64_five_level(),
        }
    }

    /// Build a custom geometry. The virtual-address width is the sum of
    /// all index widths and the page shift.
    ///
    /// The page shift must be at least 12: entry flag bits live below bit 12.
    pub fn new(page_shift: u32, level_bits: [u32; 4], leaf_bits: u32) -> MemResult<Self> {
        if !(12..=30).contains(&page_shift) {
            return Err(MemError::InvalidParameter(format!(
                "page shift {} outside 12..=30",
                page_shift
            )));
        }
        if level_bits[TableLevel::Top.depth()] == 0 || level_bits[TableLevel::LeafParent.depth()] == 0 {
            return Err(MemError::InvalidParameter(
                "top and leaf-parent levels cannot be folded".to_string(),
            ));
        }
        if leaf_bits == 0 {
            return Err(MemError::InvalidParameter("leaf table needs index bits".to_string()));
        }
        if level_bits.iter().chain(Some(&leaf_bits)).any(|&b| b > MAX_LEVEL_BITS) {
            return Err(MemError::InvalidParameter(format!(
                "level index wider than {} bits",
                MAX_LEVEL_BITS
            )));
        }

        let va_bits = page_shift + leaf_bits + level_bits.iter().sum::<u32>();
        if va_bits > 64 {
            return Err(MemError::InvalidParameter(format!(
                "{}-bit virtual addresses exceed the 64-bit address type",
                va_bits
            )));
        }

        Ok(PagingGeometry {
            va_bits,
            page_shift,
            level_bits,
            leaf_bits,
        })
    }

    pub fn va_bits(&self) -> u32 {
        self.va_bits
    }

    pub fn page_shift(&self) -> u32 {
        self.page_shift
    }

    pub fn page_size(&self) -> u64 {
        1u64 << self.page_shift
    }

    pub fn page_offset_mask(&self) -> u64 {
        self.page_size() - 1
    }

    pub fn level_bits(&self, level: TableLevel) -> u32 {
        self.level_bits[level.depth()]
    }

    pub fn is_folded(&self, level: TableLevel) -> bool {
        self.level_bits(level) == 0
    }

    /// Lowest address bit that indexes `level`.
    pub fn shift(&self, level: TableLevel) -> u32 {
        let below: u32 = self.level_bits[level.depth() + 1..].iter().sum();
        self.page_shift + self.leaf_bits + below
    }

    /// Index of `vaddr` in a table of `level`. Bits above the geometry's
    /// address width are discarded, as the kernel's `*_index` helpers do.
    pub fn index(&self, level: TableLevel, vaddr: VirtualAddress) -> u64 {
        let bits = self.level_bits(level);
        (vaddr >> self.shift(level)) & ((1u64 << bits) - 1)
    }

    pub fn leaf_index(&self, vaddr: VirtualAddress) -> u64 {
        (vaddr >> self.page_shift) & ((1u64 << self.leaf_bits) - 1)
    }

    /// Whether `vaddr` is sign-extended from the top translated bit.
    pub fn is_canonical(&self, vaddr: VirtualAddress) -> bool {
        if self.va_bits >= 64 {
            return true;
        }
        let upper = vaddr >> (self.va_bits - 1);
        upper == 0 || upper == u64::MAX >> (self.va_bits - 1)
    }
}

impl Default for PagingGeometry {
    fn default() -> Self {
        Self::x86_64_four_level()
    }
}
