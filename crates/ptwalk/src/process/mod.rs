//! Mapping process identifiers to address spaces.

pub mod table;
pub mod tasks;

pub use table::ProcessTable;
pub use tasks::TaskListResolver;

use crate::walk::MemoryMap;
use thiserror::Error;

/// Kernel process identifier. Only the non-negative `int` range is valid.
pub type Pid = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no process with pid {0}")]
    NotFound(Pid),

    /// The process exists but has no user memory map (a kernel thread).
    #[error("process {0} has no user address space")]
    NoAddressSpace(Pid),
}

pub trait ProcessResolver {
    fn resolve(&self, pid: Pid) -> Result<MemoryMap, ResolveError>;
}
