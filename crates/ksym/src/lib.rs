//! Linux kernel symbol tables for memory-image analysis.
//!
//! Parses Volatility3 ISF files (as produced by `dwarf2json` for a Linux
//! kernel build) and reads kernel structures out of an address space:
//!
//! - `.json` and `.json.xz` symbol files
//! - symbol addresses and field offsets
//! - [`StructReader`] for fields of one structure instance
//! - [`ListWalker`] for embedded `list_head` chains such as `init_task.tasks`
//!
//! ```rust,ignore
//! use ksym::{parse_isf_file, StructReader};
//!
//! let symbols = parse_isf_file("linux-6.8.0.json.xz")?;
//! let init = StructReader::new(&symbols, &kernel, symbols.require_symbol("init_task")?, "task_struct")?;
//! for task in init.walk_list("tasks", "task_struct", "tasks")? {
//!     println!("{}", task?.read_i32("pid")?);
//! }
//! ```

pub mod error;
pub mod parser;
pub mod reader;
pub mod types;

pub use error::{KsymError, KsymResult};
pub use parser::{parse_isf_bytes, parse_isf_file, parse_isf_str};
pub use reader::{read_pointer_at, ListWalker, MemoryAccess, StructReader, DEFAULT_LIST_LIMIT};
pub use types::KernelSymbols;
