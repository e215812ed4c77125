// Scoped ownership of an opened device

use crate::transport::{DeviceHandle, DeviceTransport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Closed,
    Open,
    Failed,
}

/// An open device borrowed from the transport.
///
/// Dropping the target closes the device, so every path out of the per-device loop
/// (including early returns and panics) releases the handle exactly once.
pub struct DeviceTarget<'t> {
    transport: &'t dyn DeviceTransport,
    device: DeviceHandle,
    state: TargetState,
}

impl<'t> DeviceTarget<'t> {
    pub fn new(transport: &'t dyn DeviceTransport, device: DeviceHandle) -> Self {
        Self {
            transport,
            device,
            state: TargetState::Open,
        }
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn handle(&self) -> &str {
        &self.device.path
    }

    /// Close the device now instead of at the end of the scope
    pub fn release(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.state == TargetState::Open {
            self.transport.close_device(&self.device);
            self.state = TargetState::Closed;
        }
    }
}

impl Drop for DeviceTarget<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTarget")
            .field("device", &self.device.path)
            .field("state", &self.state)
            .finish()
    }
}
