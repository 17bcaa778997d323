//! A single translation request, from raw input to record.

use crate::process::{Pid, ProcessResolver};
use crate::report::{report, Record};
use crate::walk::{TranslationOutcome, TranslationWalker, Unresolved, VirtualAddress};
use thiserror::Error;
use tracing::{debug, info};

/// Request rejected before any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("pid {0} is negative")]
    NegativePid(i64),

    #[error("pid {0} is outside the kernel pid range")]
    PidOutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationRequest {
    pub pid: i64,
    pub vaddr: VirtualAddress,
}

impl TranslationRequest {
    pub fn new(pid: i64, vaddr: VirtualAddress) -> Self {
        TranslationRequest { pid, vaddr }
    }

    /// Pids are C `int`s: anything outside `0..=i32::MAX` is rejected.
    pub fn validate(&self) -> Result<Pid, RequestError> {
        if self.pid < 0 {
            return Err(RequestError::NegativePid(self.pid));
        }
        if self.pid > i64::from(i32::MAX) {
            return Err(RequestError::PidOutOfRange(self.pid));
        }
        Ok(self.pid as Pid)
    }
}

/// Resolve and walk. Resolution failures become unresolvable outcomes and
/// the walker is not invoked for them.
pub fn translate(
    request: &TranslationRequest,
    resolver: &dyn ProcessResolver,
    walker: &TranslationWalker,
) -> Result<TranslationOutcome, RequestError> {
    let pid = request.validate()?;
    Ok(resolve_and_walk(pid, request.vaddr, resolver, walker))
}

/// [`translate`], rendered as a record.
pub fn run(
    request: &TranslationRequest,
    resolver: &dyn ProcessResolver,
    walker: &TranslationWalker,
) -> Result<Record, RequestError> {
    let pid = request.validate()?;
    let outcome = resolve_and_walk(pid, request.vaddr, resolver, walker);
    Ok(report(pid, request.vaddr, outcome))
}

fn resolve_and_walk(
    pid: Pid,
    vaddr: VirtualAddress,
    resolver: &dyn ProcessResolver,
    walker: &TranslationWalker,
) -> TranslationOutcome {
    info!("Translating {:#x} for PID {}", vaddr, pid);
    match resolver.resolve(pid) {
        Ok(map) => walker.translate(&map, vaddr),
        Err(e) => {
            debug!("Resolution failed: {}", e);
            TranslationOutcome::Unresolvable(Unresolved::Resolution(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessTable, ResolveError};
    use crate::walk::fixtures::{HierarchyBuilder, RecordingLayer, ROOT};
    use crate::walk::{MemoryMap, PagingGeometry};
    use std::cell::Cell;
    use std::sync::Arc;

    /// Counts lookups, delegating to a process table whose physical
    /// reads are recorded.
    struct CountingResolver {
        inner: ProcessTable,
        calls: Cell<usize>,
        memory: Arc<RecordingLayer>,
    }

    impl ProcessResolver for CountingResolver {
        fn resolve(&self, pid: Pid) -> Result<MemoryMap, ResolveError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.resolve(pid)
        }
    }

    fn resolver() -> CountingResolver {
        let layer = HierarchyBuilder::new(PagingGeometry::x86_64_four_level())
            .map_frame(0x1abc, 0x10)
            .into_layer();
        let memory = Arc::new(RecordingLayer::new(layer));
        CountingResolver {
            inner: ProcessTable::from_entries(memory.clone(), [(42, Some(ROOT))]),
            calls: Cell::new(0),
            memory,
        }
    }

    #[test]
    fn test_validate() {
        assert_eq!(TranslationRequest::new(0, 0).validate(), Ok(0));
        assert_eq!(
            TranslationRequest::new(i64::from(i32::MAX), 0).validate(),
            Ok(i32::MAX as Pid)
        );
        assert_eq!(
            TranslationRequest::new(-1, 0).validate(),
            Err(RequestError::NegativePid(-1))
        );
        assert_eq!(
            TranslationRequest::new(1 << 31, 0).validate(),
            Err(RequestError::PidOutOfRange(1 << 31))
        );
    }

    #[test]
    fn test_run_resident() {
        let resolver = resolver();
        let record = run(
            &TranslationRequest::new(42, 0x1abc),
            &resolver,
            &TranslationWalker::default(),
        )
        .unwrap();
        assert_eq!(record.physical_address, Some(0x10abc));
        assert_eq!(resolver.calls.get(), 1);
        assert_eq!(resolver.memory.reads().len(), 4);
    }

    #[test]
    fn test_unknown_pid_is_unresolvable() {
        let resolver = resolver();
        let outcome = translate(
            &TranslationRequest::new(77, 0x1abc),
            &resolver,
            &TranslationWalker::default(),
        )
        .unwrap();
        assert_eq!(
            outcome,
            TranslationOutcome::Unresolvable(Unresolved::Resolution(ResolveError::NotFound(77)))
        );
        assert_eq!(resolver.calls.get(), 1);
        assert!(resolver.memory.reads().is_empty());
    }

    #[test]
    fn test_negative_pid_never_resolves() {
        let resolver = resolver();
        let err = run(
            &TranslationRequest::new(-5, 0x1abc),
            &resolver,
            &TranslationWalker::default(),
        )
        .unwrap_err();
        assert_eq!(err, RequestError::NegativePid(-5));
        assert_eq!(resolver.calls.get(), 0);
        assert!(resolver.memory.reads().is_empty());
    }
}
