//! The translation walk.
//!
//! One walk is a small state machine. Each `At` state reads a single table
//! entry, each `Folded` state re-checks the entry of the level above, and
//! the LeafParent step fetches and classifies the leaf. A walk therefore
//! reads at most one entry per non-folded level plus the leaf, and stops at
//! the first level whose entry is absent, malformed or unreadable.

use crate::walk::address_space::{AddressSpace, MapGuard};
use crate::walk::entry::{EntryCodec, LeafEntry, TableEntry, AMBIGUOUS_SWAP_ID};
use crate::walk::geometry::{PagingGeometry, PagingMode, PhysicalAddress, TableLevel, VirtualAddress};
use crate::walk::outcome::{TableFault, TranslationOutcome, Unresolved};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    At {
        level: TableLevel,
        table: PhysicalAddress,
    },
    Folded {
        level: TableLevel,
        entry: u64,
    },
    Done(TranslationOutcome),
}

/// Outcome of a walk plus the levels whose entry it examined, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    pub outcome: TranslationOutcome,
    pub visited: Vec<TableLevel>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationWalker {
    geometry: PagingGeometry,
    codec: EntryCodec,
    large_pages: bool,
}

impl TranslationWalker {
    pub fn new(geometry: PagingGeometry) -> Self {
        TranslationWalker {
            geometry,
            codec: EntryCodec::for_geometry(&geometry),
            large_pages: false,
        }
    }

    /// Resolve 1 GiB and 2 MiB mappings instead of rejecting them.
    ///
    /// User translations leave this off: the pud/pmd checks treat a huge
    /// entry as bad. Kernel memory is mostly mapped with large pages, so
    /// reads of kernel structures turn it on.
    pub fn with_large_pages(mut self, enabled: bool) -> Self {
        self.large_pages = enabled;
        self
    }

    pub fn for_mode(mode: PagingMode) -> Self {
        Self::new(PagingGeometry::for_mode(mode))
    }

    pub fn geometry(&self) -> &PagingGeometry {
        &self.geometry
    }

    /// Classify `vaddr` in `map`'s address space.
    pub fn translate(&self, map: &AddressSpace, vaddr: VirtualAddress) -> TranslationOutcome {
        self.walk(map, vaddr).outcome
    }

    /// Like [`translate`](Self::translate), also reporting the levels visited.
    pub fn walk(&self, map: &AddressSpace, vaddr: VirtualAddress) -> Walk {
        if !self.geometry.is_canonical(vaddr) {
            warn!(
                "Address {:#x} is not canonical for {}-bit addresses, bits above are ignored",
                vaddr,
                self.geometry.va_bits()
            );
        }

        let Some(guard) = map.acquire() else {
            debug!("PID {}: address space released before the walk", map.pid());
            return Walk {
                outcome: TranslationOutcome::Unresolvable(Unresolved::MapReleased),
                visited: Vec::new(),
            };
        };

        let mut visited = Vec::with_capacity(TableLevel::ALL.len());
        let mut state = WalkState::At {
            level: TableLevel::Top,
            table: guard.root(),
        };
        loop {
            state = match state {
                WalkState::Done(outcome) => {
                    if let TranslationOutcome::Unresolvable(reason) = outcome {
                        debug!("PID {}: {:#x} unresolvable: {}", guard.pid(), vaddr, reason);
                    }
                    return Walk { outcome, visited };
                }
                WalkState::At { level, .. } | WalkState::Folded { level, .. } => {
                    visited.push(level);
                    self.step(&guard, vaddr, state)
                }
            };
        }
    }

    fn step(&self, map: &MapGuard<'_>, vaddr: VirtualAddress, state: WalkState) -> WalkState {
        match state {
            WalkState::At { level, table } => {
                let index = self.geometry.index(level, vaddr);
                match map.read_entry(table, index) {
                    Ok(entry) => {
                        debug!("{} {:#x}[{}] = {:#x}", level, table, index, entry);
                        self.descend(map, vaddr, level, entry)
                    }
                    Err(e) => {
                        debug!("{} table {:#x} unreadable: {}", level, table, e);
                        unresolvable(Unresolved::Table {
                            level,
                            fault: TableFault::Unreadable,
                        })
                    }
                }
            }
            WalkState::Folded { level, entry } => self.descend(map, vaddr, level, entry),
            WalkState::Done(_) => state,
        }
    }

    fn descend(&self, map: &MapGuard<'_>, vaddr: VirtualAddress, level: TableLevel, entry: u64) -> WalkState {
        if self.large_pages {
            if let Some(base) = self.codec.large_page(level, entry) {
                let mask = (1u64 << self.geometry.shift(level)) - 1;
                return WalkState::Done(TranslationOutcome::Resident((base & !mask) | (vaddr & mask)));
            }
        }

        let table = match self.codec.classify_table(level, entry) {
            TableEntry::Table(table) => table,
            TableEntry::Absent => {
                return unresolvable(Unresolved::Table {
                    level,
                    fault: TableFault::Absent,
                })
            }
            TableEntry::Malformed => {
                return unresolvable(Unresolved::Table {
                    level,
                    fault: TableFault::Malformed(entry),
                })
            }
        };

        match level.next() {
            Some(next) if self.geometry.is_folded(next) => WalkState::Folded { level: next, entry },
            Some(next) => WalkState::At { level: next, table },
            None => WalkState::Done(self.leaf(map, table, vaddr)),
        }
    }

    fn leaf(&self, map: &MapGuard<'_>, table: PhysicalAddress, vaddr: VirtualAddress) -> TranslationOutcome {
        let index = self.geometry.leaf_index(vaddr);
        let pte = match map.read_entry(table, index) {
            Ok(pte) => pte,
            Err(e) => {
                debug!("pte table {:#x} unreadable: {}", table, e);
                return TranslationOutcome::Unresolvable(Unresolved::UnreadableLeaf);
            }
        };
        debug!("pte {:#x}[{}] = {:#x}", table, index, pte);

        match self.codec.classify_leaf(pte) {
            LeafEntry::Empty => TranslationOutcome::Unresolvable(Unresolved::EmptyLeaf),
            LeafEntry::Resident { frame } => TranslationOutcome::Resident(
                (frame << self.geometry.page_shift()) | (vaddr & self.geometry.page_offset_mask()),
            ),
            LeafEntry::Swapped(swap) if swap.value() == AMBIGUOUS_SWAP_ID => {
                TranslationOutcome::Unresolvable(Unresolved::AmbiguousSwap { entry: pte })
            }
            LeafEntry::Swapped(swap) => {
                debug!(
                    "pte {:#x}: swap type {} offset {:#x}",
                    pte,
                    swap.swap_type(),
                    swap.offset()
                );
                TranslationOutcome::SwappedOut(swap.value())
            }
        }
    }
}

fn unresolvable(reason: Unresolved) -> WalkState {
    WalkState::Done(TranslationOutcome::Unresolvable(reason))
}
