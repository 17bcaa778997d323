//! Static pid to page-table-root table.

use crate::memory::traits::MemoryLayer;
use crate::process::{Pid, ProcessResolver, ResolveError};
use crate::walk::{AddressSpace, MemoryMap, PhysicalAddress};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Processes with known roots, all sharing one physical layer.
///
/// A process without a root is a kernel thread.
pub struct ProcessTable {
    physical: Arc<dyn MemoryLayer>,
    entries: RwLock<HashMap<Pid, Option<MemoryMap>>>,
}

impl ProcessTable {
    pub fn new(physical: Arc<dyn MemoryLayer>) -> Self {
        ProcessTable {
            physical,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_entries(
        physical: Arc<dyn MemoryLayer>,
        entries: impl IntoIterator<Item = (Pid, Option<PhysicalAddress>)>,
    ) -> Self {
        let table = Self::new(physical);
        for (pid, root) in entries {
            table.insert(pid, root);
        }
        table
    }

    /// Add or replace a process. A replaced address space is torn down.
    pub fn insert(&self, pid: Pid, root: Option<PhysicalAddress>) {
        let map = root.map(|root| AddressSpace::new(pid, root, self.physical.clone()));
        let replaced = self.entries.write().insert(pid, map);
        if let Some(Some(old)) = replaced {
            old.tear_down();
        }
    }

    /// Remove a process and tear down its address space. Walks already
    /// holding the map finish first; later ones see it released.
    pub fn exit(&self, pid: Pid) -> bool {
        let removed = self.entries.write().remove(&pid);
        match removed {
            Some(map) => {
                if let Some(map) = map {
                    map.tear_down();
                }
                debug!("Process {} exited", pid);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ProcessResolver for ProcessTable {
    fn resolve(&self, pid: Pid) -> Result<MemoryMap, ResolveError> {
        match self.entries.read().get(&pid) {
            Some(Some(map)) => Ok(map.clone()),
            Some(None) => Err(ResolveError::NoAddressSpace(pid)),
            None => Err(ResolveError::NotFound(pid)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::fixtures::{HierarchyBuilder, ROOT};
    use crate::walk::{PagingGeometry, TranslationOutcome, TranslationWalker, Unresolved};

    fn table() -> ProcessTable {
        let layer = HierarchyBuilder::new(PagingGeometry::x86_64_four_level())
            .map_frame(0x40_0000, 0x21)
            .into_layer();
        ProcessTable::from_entries(Arc::new(layer), [(100, Some(ROOT)), (2, None)])
    }

    #[test]
    fn test_resolve() {
        let table = table();
        assert_eq!(table.len(), 2);

        let map = table.resolve(100).unwrap();
        assert_eq!(map.pid(), 100);
        assert_eq!(map.root(), ROOT);
        assert_eq!(
            TranslationWalker::default().translate(&map, 0x40_0123),
            TranslationOutcome::Resident(0x21123)
        );

        assert_eq!(table.resolve(2).unwrap_err(), ResolveError::NoAddressSpace(2));
        assert_eq!(table.resolve(7).unwrap_err(), ResolveError::NotFound(7));
    }

    #[test]
    fn test_exit_releases_map() {
        let table = table();
        let map = table.resolve(100).unwrap();

        assert!(table.exit(100));
        assert!(!table.exit(100));
        assert_eq!(table.resolve(100).unwrap_err(), ResolveError::NotFound(100));
        assert_eq!(
            TranslationWalker::default().translate(&map, 0x40_0123),
            TranslationOutcome::Unresolvable(Unresolved::MapReleased)
        );
    }

    #[test]
    fn test_insert_replaces_map() {
        let table = table();
        let old = table.resolve(100).unwrap();
        table.insert(100, Some(0x2000));
        assert!(!old.is_live());
        assert_eq!(table.resolve(100).unwrap().root(), 0x2000);
    }
}
