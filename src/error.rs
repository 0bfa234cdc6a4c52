//! Crate-boundary errors.
//!
//! These are host-process failures — bad config, commands run out of order,
//! unknown process names. In-simulation failures (a memory access violation,
//! a full symbol table) are not errors here: they are normal simulated
//! outcomes recorded on the `Process` itself (see `process::Process::shutdown`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Please run the 'initialize' command first.")]
    NotInitialized,

    #[error("process '{0}' not found")]
    UnknownProcess(String),

    #[error("process '{0}' already exists")]
    DuplicateProcess(String),

    #[error("Invalid memory allocation.")]
    InvalidMemorySize,

    #[error("Memory allocation failed.")]
    AllocationFailed,

    #[error("invalid instruction text: {0}")]
    BadInstructionText(String),

    #[error("config error: {0}")]
    ConfigParse(String),

    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler is not running")]
    NotRunning,
}

pub type Result<T> = std::result::Result<T, SystemError>;
