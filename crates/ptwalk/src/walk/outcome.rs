//! Result of one translation walk.

use crate::process::ResolveError;
use crate::walk::geometry::{PhysicalAddress, TableLevel};
use std::fmt;

/// Why a table level stopped the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFault {
    Absent,
    Malformed(u64),
    /// The entry lies outside the image.
    Unreadable,
}

/// Reason behind an [`TranslationOutcome::Unresolvable`] outcome.
///
/// Every reason renders the same way in a record; it only feeds logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    Resolution(ResolveError),
    /// The address space was torn down before the walk could acquire it.
    MapReleased,
    Table {
        level: TableLevel,
        fault: TableFault,
    },
    EmptyLeaf,
    UnreadableLeaf,
    /// Non-present PTE whose swap value equals [`AMBIGUOUS_SWAP_ID`].
    ///
    /// [`AMBIGUOUS_SWAP_ID`]: crate::walk::entry::AMBIGUOUS_SWAP_ID
    AmbiguousSwap { entry: u64 },
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unresolved::Resolution(e) => write!(f, "{}", e),
            Unresolved::MapReleased => f.write_str("address space released"),
            Unresolved::Table { level, fault } => match fault {
                TableFault::Absent => write!(f, "{} entry absent", level),
                TableFault::Malformed(entry) => write!(f, "{} entry {:#x} is bad", level, entry),
                TableFault::Unreadable => write!(f, "{} entry not in image", level),
            },
            Unresolved::EmptyLeaf => f.write_str("pte empty"),
            Unresolved::UnreadableLeaf => f.write_str("pte not in image"),
            Unresolved::AmbiguousSwap { entry } => {
                write!(f, "pte {:#x} decodes to swap value 0", entry)
            }
        }
    }
}

/// Exactly one of resident, swapped out or unresolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationOutcome {
    Resident(PhysicalAddress),
    SwappedOut(u64),
    Unresolvable(Unresolved),
}

impl TranslationOutcome {
    pub fn physical_address(&self) -> Option<PhysicalAddress> {
        match self {
            TranslationOutcome::Resident(pa) => Some(*pa),
            _ => None,
        }
    }

    pub fn swap_id(&self) -> Option<u64> {
        match self {
            TranslationOutcome::SwappedOut(id) => Some(*id),
            _ => None,
        }
    }
}
