//! `csopesy_emu` — a process-scheduler emulator library: a ready-queue/
//! CPU-worker scheduler (FCFS and preemptive round-robin), a per-process
//! instruction interpreter, a contiguous memory allocator, and a
//! demand-paged virtual memory layer with FIFO replacement over an
//! append-only backing-store file.
//!
//! The console, text-log emission, the periodic memory-snapshot dump, and
//! the `report-util` text report are external collaborators; this crate
//! exposes the data and operations they consume through [`system::System`].

pub mod config;
pub mod error;
pub mod generator;
pub mod interp;
pub mod mem;
pub mod process;
pub mod sched;
pub mod system;

pub use error::{Result, SystemError};
pub use system::System;
