// Process exit status accumulation

use crate::OperationOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process exit codes. The numeric values are part of the command-line contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    NoError,
    CommandLineError,
    InvalidDeviceHandle,
    OperationFailure,
    OperationNotSupported,
    OperationAborted,
    InsecurePath,
    CannotOpenFile,
    NeedElevatedPrivileges,
    DeviceBusy,
    NoDevice,
}

impl ExitCode {
    pub const ALL: [ExitCode; 11] = [
        ExitCode::NoError,
        ExitCode::CommandLineError,
        ExitCode::InvalidDeviceHandle,
        ExitCode::OperationFailure,
        ExitCode::OperationNotSupported,
        ExitCode::OperationAborted,
        ExitCode::InsecurePath,
        ExitCode::CannotOpenFile,
        ExitCode::NeedElevatedPrivileges,
        ExitCode::DeviceBusy,
        ExitCode::NoDevice,
    ];

    pub fn value(&self) -> i32 {
        match self {
            ExitCode::NoError => 0,
            ExitCode::CommandLineError => 1,
            ExitCode::InvalidDeviceHandle => 2,
            ExitCode::OperationFailure => 3,
            ExitCode::OperationNotSupported => 4,
            ExitCode::OperationAborted => 5,
            ExitCode::InsecurePath => 6,
            ExitCode::CannotOpenFile => 7,
            ExitCode::NeedElevatedPrivileges => 9,
            ExitCode::DeviceBusy => 12,
            ExitCode::NoDevice => 13,
        }
    }

    /// Position in the severity order; the highest absorbed code wins
    pub fn severity(&self) -> u8 {
        match self {
            ExitCode::NoError => 0,
            ExitCode::CommandLineError => 1,
            ExitCode::CannotOpenFile => 2,
            ExitCode::InsecurePath => 3,
            ExitCode::OperationFailure => 4,
            ExitCode::OperationAborted => 5,
            ExitCode::OperationNotSupported => 6,
            ExitCode::InvalidDeviceHandle => 7,
            ExitCode::NoDevice => 8,
            ExitCode::DeviceBusy => 9,
            ExitCode::NeedElevatedPrivileges => 10,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::NoError)
    }
}

impl From<OperationOutcome> for ExitCode {
    fn from(outcome: OperationOutcome) -> Self {
        match outcome {
            OperationOutcome::Success => ExitCode::NoError,
            OperationOutcome::NotSupported => ExitCode::OperationNotSupported,
            OperationOutcome::AccessDenied => ExitCode::NeedElevatedPrivileges,
            OperationOutcome::OperationFailed => ExitCode::OperationFailure,
            OperationOutcome::Aborted => ExitCode::OperationAborted,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // Every value fits in a u8
        std::process::ExitCode::from(code.value() as u8)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitCode::NoError => "no error",
            ExitCode::CommandLineError => "command line error",
            ExitCode::InvalidDeviceHandle => "invalid device handle",
            ExitCode::OperationFailure => "operation failure",
            ExitCode::OperationNotSupported => "operation not supported",
            ExitCode::OperationAborted => "operation aborted",
            ExitCode::InsecurePath => "insecure path",
            ExitCode::CannotOpenFile => "cannot open file",
            ExitCode::NeedElevatedPrivileges => "need elevated privileges",
            ExitCode::DeviceBusy => "device busy",
            ExitCode::NoDevice => "no device",
        };
        write!(f, "{} ({})", name, self.value())
    }
}

/// Reduces every outcome of a run into one exit code.
///
/// `absorb` keeps the most severe code seen, so it is idempotent and order-independent.
#[derive(Debug, Clone, Default)]
pub struct ExitCodeAggregator {
    current: Option<ExitCode>,
    resolved: usize,
    skipped: usize,
}

impl ExitCodeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, code: ExitCode) {
        self.current = Some(match self.current {
            Some(current) if current.severity() >= code.severity() => current,
            _ => code,
        });
    }

    pub fn absorb_outcome(&mut self, outcome: OperationOutcome) {
        self.absorb(ExitCode::from(outcome));
    }

    pub fn record_resolved(&mut self, count: usize) {
        self.resolved += count;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn resolved(&self) -> usize {
        self.resolved
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Current code without the all-skipped rule
    pub fn current(&self) -> ExitCode {
        self.current.unwrap_or(ExitCode::NoError)
    }

    /// Final exit code. A run where every resolved device was filtered out is a
    /// command-line error whatever else was absorbed.
    pub fn finalize(self) -> ExitCode {
        if self.resolved > 0 && self.skipped >= self.resolved {
            return ExitCode::CommandLineError;
        }
        self.current()
    }
}
