// Device transport capability
//
// Organized structure:
// - types.rs: request parameters and report types
// - command.rs: external command execution (smartctl, sg3_utils, nvme-cli, hdparm)
// - parse.rs: parsers for the command outputs
// - system.rs: the Linux implementation driving real devices

pub mod command;
pub mod parse;
pub mod system;
pub mod types;

#[cfg(test)]
mod parse_tests;


pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use system::SystemTransport;
pub use types::*;

use crate::{DeviceResult, Protocol};
use serde::{Deserialize, Serialize};

/// Identity strings and geometry gathered when a device is opened
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
    /// Drive behind a USB/SAS bridge; empty when there is no bridge
    pub child_model: String,
    pub child_firmware: String,
    pub protocol: Protocol,
    pub capacity_blocks: u64,
    pub logical_block_size: u32,
    pub physical_block_size: u32,
    pub namespace_id: Option<u32>,
}

/// An opened device as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub path: String,
    pub identity: DeviceIdentity,
    pub flags: OpenFlags,
}

impl DeviceHandle {
    /// Protocol used for commands: the forced one if any, otherwise the detected one
    pub fn effective_protocol(&self) -> Protocol {
        self.flags.forced_protocol.unwrap_or(self.identity.protocol)
    }
}

/// Result of enumerating every device on the system
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Enumeration {
    pub devices: Vec<DeviceHandle>,
    /// Handles that were counted but could not be opened, with the reason
    pub failures: Vec<(String, String)>,
}

impl Enumeration {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Capability interface consumed by the orchestrator.
///
/// Every method takes `&self`: the orchestrator holds one shared borrow of the transport
/// for the whole run and device guards borrow it to release their handle.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceTransport {
    /// Number of devices an enumeration with these flags would visit
    fn device_count(&self, flags: &ScanFlags) -> DeviceResult<usize>;

    /// Open up to `count` devices; devices that fail to open are listed in `failures`
    fn enumerate_devices(&self, count: usize, flags: &ScanFlags) -> DeviceResult<Enumeration>;

    fn open_device(&self, handle: &str, flags: &OpenFlags) -> DeviceResult<DeviceHandle>;

    /// Release a handle. Called exactly once per opened device.
    fn close_device(&self, device: &DeviceHandle);

    // Informational queries
    fn device_information(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>>;
    fn low_level_info(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>>;
    fn test_unit_ready(&self, device: &DeviceHandle) -> DeviceResult<UnitReadiness>;
    fn read_lba(&self, device: &DeviceHandle, lba: u64, count: u32) -> DeviceResult<Vec<u8>>;
    fn supported_formats(&self, device: &DeviceHandle) -> DeviceResult<Vec<SupportedFormat>>;
    fn format_status(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>>;
    fn physical_elements(&self, device: &DeviceHandle) -> DeviceResult<Vec<PhysicalElement>>;
    fn device_statistics(&self, device: &DeviceHandle) -> DeviceResult<Vec<Statistic>>;
    fn smart_attributes(&self, device: &DeviceHandle) -> DeviceResult<SmartData>;
    fn defect_list(
        &self,
        device: &DeviceHandle,
        request: &DefectListRequest,
    ) -> DeviceResult<DefectList>;
    fn concurrent_ranges(&self, device: &DeviceHandle) -> DeviceResult<Vec<ConcurrentRange>>;
    fn sata_phy_events(&self, device: &DeviceHandle) -> DeviceResult<Vec<PhyEventCounter>>;

    // State-changing operations
    fn format_unit(&self, device: &DeviceHandle, params: &FormatUnitParams) -> DeviceResult<()>;
    fn set_sector_size(&self, device: &DeviceHandle, sector_size: u32) -> DeviceResult<()>;
    fn remove_physical_element(&self, device: &DeviceHandle, element_id: u32)
        -> DeviceResult<()>;
    fn repopulate_physical_elements(&self, device: &DeviceHandle) -> DeviceResult<()>;
    fn nvm_format(&self, device: &DeviceHandle, params: &NvmFormatParams) -> DeviceResult<()>;
    fn reinitialize_phy_events(&self, device: &DeviceHandle) -> DeviceResult<()>;
    fn reinitialize_device_statistics(&self, device: &DeviceHandle) -> DeviceResult<()>;

    fn progress(&self, device: &DeviceHandle, kind: ProgressKind) -> DeviceResult<Progress>;
}
