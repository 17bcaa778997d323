//! Borrowed view of a process's translation hierarchy.
//!
//! Walks never touch an [`AddressSpace`] directly: they [`acquire`] a
//! [`MapGuard`] and read every entry through it. The guard holds the read
//! side of a `parking_lot::RwLock`, so [`tear_down`] waits for a walk in
//! progress, and the lock is released on whichever path the walk returns by.
//!
//! [`acquire`]: AddressSpace::acquire
//! [`tear_down`]: AddressSpace::tear_down

use crate::memory::error::{MemError, MemResult};
use crate::memory::traits::MemoryLayer;
use crate::process::Pid;
use crate::walk::geometry::{PhysicalAddress, ENTRY_SIZE};
use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::sync::Arc;

/// Shared handle to an address space, as handed out by resolvers.
pub type MemoryMap = Arc<AddressSpace>;

pub struct AddressSpace {
    pid: Pid,
    /// Physical address of the top-level table.
    root: PhysicalAddress,
    tables: Arc<dyn MemoryLayer>,
    live: RwLock<bool>,
}

impl AddressSpace {
    pub fn new(pid: Pid, root: PhysicalAddress, tables: Arc<dyn MemoryLayer>) -> MemoryMap {
        Arc::new(AddressSpace {
            pid,
            root,
            tables,
            live: RwLock::new(true),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn root(&self) -> PhysicalAddress {
        self.root
    }

    /// Borrow the hierarchy for one walk; `None` once torn down.
    pub fn acquire(&self) -> Option<MapGuard<'_>> {
        let live = self.live.read();
        if !*live {
            return None;
        }
        Some(MapGuard {
            space: self,
            _live: live,
        })
    }

    /// Mark the address space gone. Blocks until current walks finish.
    pub fn tear_down(&self) {
        *self.live.write() = false;
    }

    pub fn is_live(&self) -> bool {
        *self.live.read()
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("pid", &self.pid)
            .field("root", &format_args!("{:#x}", self.root))
            .field("layer", &self.tables.name())
            .finish()
    }
}

/// Read access to an address space for the duration of one walk.
pub struct MapGuard<'a> {
    space: &'a AddressSpace,
    _live: RwLockReadGuard<'a, bool>,
}

impl MapGuard<'_> {
    pub fn pid(&self) -> Pid {
        self.space.pid
    }

    pub fn root(&self) -> PhysicalAddress {
        self.space.root
    }

    /// Read entry `index` of the table at physical address `table`.
    pub fn read_entry(&self, table: PhysicalAddress, index: u64) -> MemResult<u64> {
        let offset = index
            .checked_mul(ENTRY_SIZE)
            .and_then(|delta| table.checked_add(delta))
            .ok_or_else(|| {
                MemError::invalid_address(
                    self.space.tables.name(),
                    table,
                    format!("entry {} overflows the physical address space", index),
                )
            })?;
        self.space.tables.read_u64(offset)
    }
}
