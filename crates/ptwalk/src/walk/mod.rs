//! Address translation: geometry, entry decoding and the walk itself.

pub mod address_space;
pub mod entry;
pub mod geometry;
pub mod outcome;
pub mod walker;

#[cfg(test)]
pub(crate) mod fixtures;

pub use address_space::{AddressSpace, MapGuard, MemoryMap};
pub use entry::{EntryCodec, LeafEntry, SwapEntry, TableEntry, AMBIGUOUS_SWAP_ID};
pub use geometry::{PagingGeometry, PagingMode, PhysicalAddress, TableLevel, VirtualAddress};
pub use outcome::{TableFault, TranslationOutcome, Unresolved};
pub use walker::{TranslationWalker, Walk};
