// Allow uppercase acronyms for industry-standard terms like LBA, ATA, NVMe
#![allow(clippy::upper_case_acronyms)]

pub mod cli;
pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod transport;
pub mod ui;

// Re-export the orchestration entry points for convenience
pub use config::RunConfig;
pub use orchestrator::{ExitCode, Orchestrator, RunSummary};
pub use transport::{DeviceHandle, DeviceIdentity, DeviceTransport};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Errors reported by the transport layer
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Device busy: {0}")]
    Busy(String),

    #[error("No such device: {0}")]
    NoSuchDevice(String),

    #[error("Invalid device handle: {0}")]
    InvalidHandle(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Failed to parse {what}: {detail}")]
    ParseFailed { what: String, detail: String },

    #[error("Operation aborted: {0}")]
    Aborted(String),
}

impl DeviceError {
    /// Map a transport error onto the operation outcome vocabulary
    pub fn outcome(&self) -> OperationOutcome {
        match self {
            DeviceError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                OperationOutcome::AccessDenied
            }
            DeviceError::IoError(_) => OperationOutcome::OperationFailed,
            DeviceError::AccessDenied(_) => OperationOutcome::AccessDenied,
            DeviceError::Unsupported(_) => OperationOutcome::NotSupported,
            DeviceError::Aborted(_) => OperationOutcome::Aborted,
            DeviceError::Busy(_)
            | DeviceError::NoSuchDevice(_)
            | DeviceError::InvalidHandle(_)
            | DeviceError::CommandFailed(_)
            | DeviceError::ParseFailed { .. } => OperationOutcome::OperationFailed,
        }
    }

    pub(crate) fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        DeviceError::ParseFailed {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Protocol family a device speaks natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ata,
    Scsi,
    Nvme,
    #[default]
    Unknown,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ata => write!(f, "ATA"),
            Protocol::Scsi => write!(f, "SCSI"),
            Protocol::Nvme => write!(f, "NVMe"),
            Protocol::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of invoking one operation against one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    NotSupported,
    AccessDenied,
    OperationFailed,
    Aborted,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationOutcome::Success => write!(f, "Success"),
            OperationOutcome::NotSupported => write!(f, "Not supported"),
            OperationOutcome::AccessDenied => write!(f, "Access denied"),
            OperationOutcome::OperationFailed => write!(f, "Failed"),
            OperationOutcome::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Whether the process runs with the privileges raw device access needs
pub fn is_running_elevated() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
