//! ptwalk: diagnostic page-table walker for Linux x86-64 memory images.
//!
//! Given a process and a virtual address, walks the process's page tables
//! in a physical memory image and classifies the address as resident (with
//! its physical address), swapped out (with its swap value) or
//! unresolvable.
//!
//! - [`walk`]: paging geometry, entry decoding and the walker
//! - [`process`]: pid to address-space resolution
//! - [`memory`]: physical image layers and kernel virtual reads
//! - [`report`], [`request`], [`config`]: the request pipeline around the walk

pub mod config;
pub mod memory;
pub mod process;
pub mod report;
pub mod request;
pub mod walk;
