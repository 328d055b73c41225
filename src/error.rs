// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Error taxonomy shared by the recovery agent and the flashing tool.
//!
//! Transient read failures never surface here; they are absorbed where
//! they happen and logged as warnings. Everything in [`RecoveryError`]
//! is either a usage problem or fatal for the current invocation.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors returned by recovery and flashing operations.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Unrecoverable I/O failure, reported with the system error text.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    /// Writing the boot control block failed. Fatal wherever it happens.
    #[error("control block: {context}: {source}")]
    ControlBlock {
        context: String,
        #[source]
        source: io::Error,
    },
    /// A `ROOT:path` string named a root that is not in the root table.
    #[error("unknown storage root {0:?}")]
    UnknownRoot(String),
    /// A `ROOT:path` string without the `ROOT:` prefix.
    #[error("bad root path {0:?}")]
    BadRootPath(String),
    /// No partition with this name was found by the scan.
    #[error("can't find {0} partition")]
    PartitionNotFound(String),
    /// The partition scan produced nothing.
    #[error("error scanning partitions")]
    NoPartitions,
    /// An external helper exited unsuccessfully.
    #[error("command `{command}` failed: {status}")]
    Command { command: String, status: ExitStatus },
    /// Configuration file could not be parsed.
    #[error("config: {0}")]
    Config(String),
}

/// Convenience alias used across the crate.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

impl RecoveryError {
    /// Wrap an [`io::Error`] with the step that failed.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        RecoveryError::Io {
            context: context.into(),
            source,
        }
    }

    /// Wrap a failed control block write.
    pub fn control_block(context: impl Into<String>, source: io::Error) -> Self {
        RecoveryError::ControlBlock {
            context: context.into(),
            source,
        }
    }

    /// True when the error is an I/O failure whose kind is `NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            RecoveryError::Io { source, .. } | RecoveryError::ControlBlock { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// True when the boot control block could not be written.
    pub fn is_control_block(&self) -> bool {
        matches!(self, RecoveryError::ControlBlock { .. })
    }
}

/// Attach a step description to an [`io::Result`].
pub trait IoResultExt<T> {
    fn context<C, F>(self, f: F) -> RecoveryResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn context<C, F>(self, f: F) -> RecoveryResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|source| RecoveryError::io(f(), source))
    }
}
