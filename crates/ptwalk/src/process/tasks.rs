//! Resolve processes by walking the kernel task list in a memory image.
//!
//! Starts at `init_task.tasks` and follows `task_struct.tasks`, the list
//! `for_each_process` iterates, so `init_task` itself (pid 0) is never a
//! match. A task's `mm` is null for kernel threads. `mm_struct.pgd` is a
//! kernel virtual address and is translated to the physical root of the
//! process's hierarchy.

use crate::memory::kernel::KernelMemory;
use crate::process::{Pid, ProcessResolver, ResolveError};
use crate::walk::{AddressSpace, MemoryMap};
use ksym::{KernelSymbols, KsymError, KsymResult, StructReader};
use tracing::{debug, warn};

/// `PID_MAX_LIMIT`; a task list longer than this is corrupt.
const MAX_TASKS: usize = 4_194_304;

/// `TASK_COMM_LEN`.
const COMM_LEN: usize = 16;

pub struct TaskListResolver {
    symbols: KernelSymbols,
    kernel: KernelMemory,
    init_task: u64,
}

impl TaskListResolver {
    /// Check the symbol file has everything the walk reads and locate
    /// `init_task`, shifted by the KASLR slide.
    pub fn new(symbols: KernelSymbols, kernel: KernelMemory, kaslr_shift: u64) -> KsymResult<Self> {
        let init_task = symbols.require_symbol("init_task")?.wrapping_add(kaslr_shift);
        for field in ["pid", "tasks", "mm", "comm"] {
            symbols.require_field("task_struct", field)?;
        }
        symbols.require_field("mm_struct", "pgd")?;

        debug!(
            "init_task at {:#x} (KASLR shift {:#x}, kernel dtb {:#x})",
            init_task,
            kaslr_shift,
            kernel.dtb()
        );
        Ok(TaskListResolver {
            symbols,
            kernel,
            init_task,
        })
    }

    pub fn init_task(&self) -> u64 {
        self.init_task
    }

    /// Address space of a task known to have `pid`.
    fn address_space(&self, pid: Pid, task: &StructReader<'_>) -> Result<MemoryMap, ResolveError> {
        let mm = match task.deref("mm", "mm_struct") {
            Ok(mm) => mm,
            Err(KsymError::NullPointer { .. }) => return Err(ResolveError::NoAddressSpace(pid)),
            Err(e) => {
                warn!("Failed to read mm of PID {}: {}", pid, e);
                return Err(ResolveError::NoAddressSpace(pid));
            }
        };

        let pgd = match mm.read_pointer("pgd") {
            Ok(pgd) => pgd,
            Err(e) => {
                warn!("Failed to read mm_struct.pgd at {:#x}: {}", mm.base_addr(), e);
                return Err(ResolveError::NoAddressSpace(pid));
            }
        };

        match self.kernel.translate(pgd) {
            Ok(root) => {
                debug!("PID {}: mm {:#x} pgd {:#x} -> {:#x}", pid, mm.base_addr(), pgd, root);
                Ok(AddressSpace::new(pid, root, self.kernel.physical()))
            }
            Err(e) => {
                warn!("PID {}: pgd {:#x} not mapped in the kernel: {}", pid, pgd, e);
                Err(ResolveError::NoAddressSpace(pid))
            }
        }
    }
}

impl ProcessResolver for TaskListResolver {
    fn resolve(&self, pid: Pid) -> Result<MemoryMap, ResolveError> {
        let tasks = StructReader::new(&self.symbols, &self.kernel, self.init_task, "task_struct")
            .and_then(|init| init.walk_list("tasks", "task_struct", "tasks"));
        let tasks = match tasks {
            Ok(tasks) => tasks.with_limit(MAX_TASKS),
            Err(e) => {
                warn!("Cannot read init_task at {:#x}: {}", self.init_task, e);
                return Err(ResolveError::NotFound(pid));
            }
        };

        let mut seen = 0usize;
        for task in tasks {
            let task = match task {
                Ok(task) => task,
                Err(e) => {
                    warn!("Task list walk aborted after {} tasks: {}", seen, e);
                    break;
                }
            };
            seen += 1;

            let task_pid = match task.read_i32("pid") {
                Ok(task_pid) => task_pid,
                Err(e) => {
                    warn!("Failed to read task_struct at {:#x}: {}", task.base_addr(), e);
                    break;
                }
            };
            if i64::from(task_pid) != i64::from(pid) {
                continue;
            }

            let comm = task.read_string("comm", COMM_LEN).unwrap_or_default();
            debug!("Found process: PID={} name={} at {:#x}", pid, comm, task.base_addr());
            return self.address_space(pid, &task);
        }

        debug!("PID {} not among {} tasks", pid, seen);
        Err(ResolveError::NotFound(pid))
    }
}
