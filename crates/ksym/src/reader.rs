//! Reading Linux kernel structures through symbol-file offsets.
//!
//! [`StructReader`] reads fields of one structure instance at a kernel
//! virtual address; [`ListWalker`] follows an embedded `list_head` chain
//! (for example `init_task.tasks`) and yields a reader for every container.

use crate::error::{KsymError, KsymResult};
use crate::types::KernelSymbols;
use std::collections::HashSet;

/// Upper bound on nodes a [`ListWalker`] visits before giving up.
pub const DEFAULT_LIST_LIMIT: usize = 65536;

/// Byte-level access to an address space (usually kernel virtual memory).
pub trait MemoryAccess: Send + Sync {
    fn read(
        &self,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

fn read_exact(memory: &dyn MemoryAccess, addr: u64, length: usize) -> KsymResult<Vec<u8>> {
    let bytes = memory.read(addr, length).map_err(|e| KsymError::MemoryRead {
        offset: addr,
        msg: e.to_string(),
    })?;
    if bytes.len() < length {
        return Err(KsymError::MemoryRead {
            offset: addr,
            msg: format!("short read: {} of {} bytes", bytes.len(), length),
        });
    }
    Ok(bytes)
}

/// Read a little-endian pointer of `pointer_size` bytes at `addr`.
pub fn read_pointer_at(
    memory: &dyn MemoryAccess,
    addr: u64,
    pointer_size: usize,
) -> KsymResult<u64> {
    let bytes = read_exact(memory, addr, pointer_size)?;
    match pointer_size {
        4 => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64),
        8 => Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ])),
        n => Err(KsymError::UnsupportedPointerSize(n)),
    }
}

/// Field reader for a single structure instance.
///
/// ```rust,ignore
/// let task = StructReader::new(&symbols, &kernel, task_addr, "task_struct")?;
/// let pid = task.read_i32("pid")?;
/// let mm = task.read_pointer("mm")?;
/// ```
pub struct StructReader<'a> {
    symbols: &'a KernelSymbols,
    memory: &'a dyn MemoryAccess,
    base_addr: u64,
    type_name: String,
}

impl<'a> StructReader<'a> {
    pub fn new(
        symbols: &'a KernelSymbols,
        memory: &'a dyn MemoryAccess,
        base_addr: u64,
        type_name: &str,
    ) -> KsymResult<Self> {
        symbols.require_type(type_name)?;
        Ok(StructReader {
            symbols,
            memory,
            base_addr,
            type_name: type_name.to_string(),
        })
    }

    pub fn base_addr(&self) -> u64 {
        self.base_addr
    }

    /// Address of `field` inside this instance.
    pub fn field_addr(&self, field: &str) -> KsymResult<u64> {
        let offset = self.symbols.require_field(&self.type_name, field)?;
        Ok(self.base_addr.wrapping_add(offset as u64))
    }

    fn read_field(&self, field: &str, length: usize) -> KsymResult<Vec<u8>> {
        read_exact(self.memory, self.field_addr(field)?, length)
    }

    /// Read a C `int` (e.g. `task_struct.pid`).
    pub fn read_i32(&self, field: &str) -> KsymResult<i32> {
        let b = self.read_field(field, 4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_pointer(&self, field: &str) -> KsymResult<u64> {
        read_pointer_at(self.memory, self.field_addr(field)?, self.symbols.pointer_size())
    }

    /// Read a NUL-terminated char array such as `task_struct.comm`.
    pub fn read_string(&self, field: &str, max_length: usize) -> KsymResult<String> {
        let bytes = self.read_field(field, max_length)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Follow a pointer field to a reader for the pointed-to structure.
    pub fn deref(&self, field: &str, target_type: &str) -> KsymResult<StructReader<'a>> {
        let ptr = self.read_pointer(field)?;
        if ptr == 0 {
            return Err(KsymError::NullPointer {
                type_name: self.type_name.clone(),
                field: field.to_string(),
            });
        }
        StructReader::new(self.symbols, self.memory, ptr, target_type)
    }

    /// Walk the circular list anchored at this instance's `field`.
    ///
    /// Every node is assumed to be the `container_field` member of a
    /// `container_type`; the walker yields readers positioned at the
    /// containing structure. The anchor itself is not yielded.
    pub fn walk_list(
        &self,
        field: &str,
        container_type: &str,
        container_field: &str,
    ) -> KsymResult<ListWalker<'a>> {
        let head = self.field_addr(field)?;
        let link_offset = self.symbols.require_field(container_type, container_field)? as u64;
        let next_offset = self.symbols.field_offset("list_head", "next").unwrap_or(0) as u64;

        Ok(ListWalker {
            symbols: self.symbols,
            memory: self.memory,
            head,
            cursor: head,
            next_offset,
            link_offset,
            container_type: container_type.to_string(),
            seen: HashSet::new(),
            limit: DEFAULT_LIST_LIMIT,
            finished: false,
        })
    }
}

/// Iterator over the containers of a kernel `list_head` chain.
///
/// Stops at the anchor, at a null `next`, or after the first error. A node
/// seen twice before reaching the anchor yields [`KsymError::ListCycle`].
pub struct ListWalker<'a> {
    symbols: &'a KernelSymbols,
    memory: &'a dyn MemoryAccess,
    head: u64,
    cursor: u64,
    next_offset: u64,
    link_offset: u64,
    container_type: String,
    seen: HashSet<u64>,
    limit: usize,
    finished: bool,
}

impl<'a> ListWalker<'a> {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn fail(&mut self, err: KsymError) -> Option<KsymResult<StructReader<'a>>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for ListWalker<'a> {
    type Item = KsymResult<StructReader<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let next = match read_pointer_at(
            self.memory,
            self.cursor.wrapping_add(self.next_offset),
            self.symbols.pointer_size(),
        ) {
            Ok(ptr) => ptr,
            Err(e) => return self.fail(e),
        };

        if next == self.head || next == 0 {
            self.finished = true;
            return None;
        }
        if !self.seen.insert(next) {
            return self.fail(KsymError::ListCycle(next));
        }
        if self.seen.len() > self.limit {
            return self.fail(KsymError::ListTooLong(self.limit));
        }

        self.cursor = next;
        let container = next.wrapping_sub(self.link_offset);
        match StructReader::new(self.symbols, self.memory, container, &self.container_type) {
            Ok(reader) => Some(Ok(reader)),
            Err(e) => self.fail(e),
        }
    }
}
