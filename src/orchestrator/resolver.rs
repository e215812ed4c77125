// Turns the -d arguments into open device targets

use super::aggregator::ExitCode;
use super::handle::DeviceTarget;
use crate::config::{RunConfig, TargetSpec};
use crate::transport::DeviceTransport;
use crate::DeviceError;
use std::fmt;

/// Devices opened for the run plus non-fatal discovery notes
#[derive(Debug)]
pub struct Resolution<'t> {
    pub targets: Vec<DeviceTarget<'t>>,
    pub warnings: Vec<String>,
}

/// A discovery failure that ends the run before any operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveFailure {
    pub exit_code: ExitCode,
    /// Handle that failed to open, for explicit handle runs
    pub handle: Option<String>,
    pub message: String,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(handle) => write!(f, "{}: {}", handle, self.message),
            None => f.write_str(&self.message),
        }
    }
}

pub fn resolve<'t>(
    transport: &'t dyn DeviceTransport,
    config: &RunConfig,
    elevated: bool,
) -> Result<Resolution<'t>, ResolveFailure> {
    match &config.target {
        TargetSpec::AllDevices => resolve_all(transport, config, elevated),
        TargetSpec::Handles(handles) => resolve_handles(transport, config, handles, elevated),
    }
}

/// Exit code for a failure that may just be a lack of privileges
fn discovery_failure(elevated: bool) -> ExitCode {
    if elevated {
        ExitCode::OperationFailure
    } else {
        ExitCode::NeedElevatedPrivileges
    }
}

fn resolve_all<'t>(
    transport: &'t dyn DeviceTransport,
    config: &RunConfig,
    elevated: bool,
) -> Result<Resolution<'t>, ResolveFailure> {
    let count = transport
        .device_count(&config.scan_flags)
        .map_err(|e| ResolveFailure {
            exit_code: discovery_failure(elevated),
            handle: None,
            message: format!("Unable to count devices: {}", e),
        })?;

    if count == 0 {
        return Err(ResolveFailure {
            exit_code: ExitCode::NoDevice,
            handle: None,
            message: "No devices found".to_string(),
        });
    }

    let enumeration = transport
        .enumerate_devices(count, &config.scan_flags)
        .map_err(|e| ResolveFailure {
            exit_code: discovery_failure(elevated),
            handle: None,
            message: format!("Unable to enumerate devices: {}", e),
        })?;

    let mut warnings = Vec::new();
    if !enumeration.is_complete() {
        warnings.push(format!(
            "{} of {} devices could not be enumerated",
            enumeration.failures.len(),
            count
        ));
        for (handle, reason) in &enumeration.failures {
            tracing::warn!(device = %handle, reason = %reason, "Device dropped from enumeration");
            warnings.push(format!("{}: {}", handle, reason));
        }
    }

    tracing::debug!(count = enumeration.devices.len(), "Enumerated devices");

    let targets = enumeration
        .devices
        .into_iter()
        .map(|device| DeviceTarget::new(transport, device))
        .collect();

    Ok(Resolution { targets, warnings })
}

fn resolve_handles<'t>(
    transport: &'t dyn DeviceTransport,
    config: &RunConfig,
    handles: &[String],
    elevated: bool,
) -> Result<Resolution<'t>, ResolveFailure> {
    // Targets opened so far are released by their guards if a later handle fails
    let mut targets = Vec::with_capacity(handles.len());

    for handle in handles {
        if let Err(message) = validate_handle(handle) {
            return Err(ResolveFailure {
                exit_code: ExitCode::InvalidDeviceHandle,
                handle: Some(handle.clone()),
                message,
            });
        }

        let device = transport
            .open_device(handle, &config.open_flags)
            .map_err(|e| ResolveFailure {
                exit_code: open_failure(&e, elevated),
                handle: Some(handle.clone()),
                message: e.to_string(),
            })?;

        tracing::debug!(device = %handle, "Opened explicit device");
        targets.push(DeviceTarget::new(transport, device));
    }

    Ok(Resolution {
        targets,
        warnings: Vec::new(),
    })
}

/// Reject handles that cannot name a device on any platform
pub fn validate_handle(handle: &str) -> Result<(), String> {
    if handle.trim().is_empty() {
        return Err("device handle is empty".to_string());
    }
    if handle.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err("device handle contains whitespace or control characters".to_string());
    }
    Ok(())
}

pub fn open_failure(error: &DeviceError, elevated: bool) -> ExitCode {
    match error {
        DeviceError::AccessDenied(_) => ExitCode::NeedElevatedPrivileges,
        DeviceError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            ExitCode::NeedElevatedPrivileges
        }
        DeviceError::Busy(_) => ExitCode::DeviceBusy,
        DeviceError::NoSuchDevice(_) => ExitCode::NoDevice,
        DeviceError::InvalidHandle(_) => ExitCode::InvalidDeviceHandle,
        _ => discovery_failure(elevated),
    }
}
