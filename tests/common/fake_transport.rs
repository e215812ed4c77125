/// Recording transport for orchestration tests
///
/// Serves a fixed set of devices, records every call in order and counts opens
/// against closes so tests can check that each handle is released exactly once.
use seachest::transport::{
    ConcurrentRange, DefectList, DefectListRequest, DeviceHandle, DeviceIdentity,
    DeviceTransport, Enumeration, FormatUnitParams, InfoField, NvmFormatParams, OpenFlags,
    PhyEventCounter, PhysicalElement, Progress, ProgressKind, ScanFlags, SmartData, Statistic,
    SupportedFormat, UnitReadiness,
};
use seachest::{DeviceError, DeviceResult, Protocol};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Failure {
    Unsupported,
    Failed,
    Denied,
    Busy,
    Missing,
}

impl Failure {
    fn error(&self, what: &str) -> DeviceError {
        match self {
            Failure::Unsupported => DeviceError::Unsupported(what.to_string()),
            Failure::Failed => DeviceError::CommandFailed(what.to_string()),
            Failure::Denied => DeviceError::AccessDenied(what.to_string()),
            Failure::Busy => DeviceError::Busy(what.to_string()),
            Failure::Missing => DeviceError::NoSuchDevice(what.to_string()),
        }
    }
}

#[derive(Default)]
pub struct FakeTransport {
    devices: Vec<DeviceHandle>,
    /// Devices the enumeration counts but cannot open
    unopenable: Vec<String>,
    /// Forced failures keyed by (path, operation)
    failures: HashMap<(String, &'static str), Failure>,
    calls: RefCell<Vec<String>>,
    opens: Cell<usize>,
    closes: Cell<usize>,
}

#[allow(dead_code)]
impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, path: &str, model: &str, protocol: Protocol) -> Self {
        self.devices.push(device(path, model, protocol));
        self
    }

    pub fn with_unopenable(mut self, path: &str) -> Self {
        self.unopenable.push(path.to_string());
        self
    }

    pub fn failing(mut self, path: &str, operation: &'static str, failure: Failure) -> Self {
        self.failures.insert((path.to_string(), operation), failure);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls other than discovery and release
    pub fn operation_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !c.starts_with("device_count")
                    && !c.starts_with("enumerate")
                    && !c.starts_with("open")
                    && !c.starts_with("close")
            })
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.opens.get()
    }

    pub fn closes(&self) -> usize {
        self.closes.get()
    }

    fn record(&self, device: &DeviceHandle, operation: &'static str) -> DeviceResult<()> {
        self.calls
            .borrow_mut()
            .push(format!("{} {}", operation, device.path));
        match self.failures.get(&(device.path.clone(), operation)) {
            Some(failure) => Err(failure.error(operation)),
            None => Ok(()),
        }
    }
}

pub fn device(path: &str, model: &str, protocol: Protocol) -> DeviceHandle {
    DeviceHandle {
        path: path.to_string(),
        identity: DeviceIdentity {
            vendor: "ATA".to_string(),
            model: model.to_string(),
            serial: format!("ZA{}", path.len()),
            firmware: "SN04".to_string(),
            protocol,
            capacity_blocks: 7_814_037_168,
            logical_block_size: 512,
            physical_block_size: 4096,
            ..Default::default()
        },
        flags: OpenFlags::default(),
    }
}

impl DeviceTransport for FakeTransport {
    fn device_count(&self, _flags: &ScanFlags) -> DeviceResult<usize> {
        self.calls.borrow_mut().push("device_count".to_string());
        Ok(self.devices.len() + self.unopenable.len())
    }

    fn enumerate_devices(&self, count: usize, flags: &ScanFlags) -> DeviceResult<Enumeration> {
        self.calls.borrow_mut().push("enumerate".to_string());
        let mut enumeration = Enumeration::default();
        for device in self.devices.iter().take(count) {
            let mut device = device.clone();
            device.flags = flags.open;
            self.opens.set(self.opens.get() + 1);
            enumeration.devices.push(device);
        }
        for path in &self.unopenable {
            enumeration
                .failures
                .push((path.clone(), format!("Device busy: {}", path)));
        }
        Ok(enumeration)
    }

    fn open_device(&self, handle: &str, flags: &OpenFlags) -> DeviceResult<DeviceHandle> {
        self.calls.borrow_mut().push(format!("open {}", handle));
        if let Some(failure) = self.failures.get(&(handle.to_string(), "open")) {
            return Err(failure.error(handle));
        }
        let mut device = self
            .devices
            .iter()
            .find(|d| d.path == handle)
            .cloned()
            .ok_or_else(|| DeviceError::NoSuchDevice(handle.to_string()))?;
        device.flags = *flags;
        self.opens.set(self.opens.get() + 1);
        Ok(device)
    }

    fn close_device(&self, device: &DeviceHandle) {
        self.calls.borrow_mut().push(format!("close {}", device.path));
        self.closes.set(self.closes.get() + 1);
    }

    fn device_information(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>> {
        self.record(device, "device_information")?;
        Ok(vec![
            InfoField::new("Model Number", device.identity.model.clone()),
            InfoField::new("Firmware Revision", device.identity.firmware.clone()),
        ])
    }

    fn low_level_info(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>> {
        self.record(device, "low_level_info")?;
        Ok(vec![InfoField::new("Protocol", device.effective_protocol().to_string())])
    }

    fn test_unit_ready(&self, device: &DeviceHandle) -> DeviceResult<UnitReadiness> {
        self.record(device, "test_unit_ready")?;
        Ok(UnitReadiness {
            ready: true,
            detail: None,
        })
    }

    fn read_lba(&self, device: &DeviceHandle, _lba: u64, count: u32) -> DeviceResult<Vec<u8>> {
        self.record(device, "read_lba")?;
        Ok(vec![0u8; count as usize * device.identity.logical_block_size as usize])
    }

    fn supported_formats(&self, device: &DeviceHandle) -> DeviceResult<Vec<SupportedFormat>> {
        self.record(device, "supported_formats")?;
        Ok(Vec::new())
    }

    fn format_status(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>> {
        self.record(device, "format_status")?;
        Ok(Vec::new())
    }

    fn physical_elements(&self, device: &DeviceHandle) -> DeviceResult<Vec<PhysicalElement>> {
        self.record(device, "physical_elements")?;
        Ok(Vec::new())
    }

    fn device_statistics(&self, device: &DeviceHandle) -> DeviceResult<Vec<Statistic>> {
        self.record(device, "device_statistics")?;
        Ok(Vec::new())
    }

    fn smart_attributes(&self, device: &DeviceHandle) -> DeviceResult<SmartData> {
        self.record(device, "smart_attributes")?;
        Ok(SmartData {
            overall_passed: Some(true),
            ..Default::default()
        })
    }

    fn defect_list(
        &self,
        device: &DeviceHandle,
        request: &DefectListRequest,
    ) -> DeviceResult<DefectList> {
        self.record(device, "defect_list")?;
        Ok(DefectList {
            kind: request.kind,
            format: request.format,
            entries: Vec::new(),
        })
    }

    fn concurrent_ranges(&self, device: &DeviceHandle) -> DeviceResult<Vec<ConcurrentRange>> {
        self.record(device, "concurrent_ranges")?;
        Ok(Vec::new())
    }

    fn sata_phy_events(&self, device: &DeviceHandle) -> DeviceResult<Vec<PhyEventCounter>> {
        self.record(device, "sata_phy_events")?;
        Ok(Vec::new())
    }

    fn format_unit(&self, device: &DeviceHandle, _params: &FormatUnitParams) -> DeviceResult<()> {
        self.record(device, "format_unit")
    }

    fn set_sector_size(&self, device: &DeviceHandle, _sector_size: u32) -> DeviceResult<()> {
        self.record(device, "set_sector_size")
    }

    fn remove_physical_element(&self, device: &DeviceHandle, _element_id: u32) -> DeviceResult<()> {
        self.record(device, "remove_physical_element")
    }

    fn repopulate_physical_elements(&self, device: &DeviceHandle) -> DeviceResult<()> {
        self.record(device, "repopulate_physical_elements")
    }

    fn nvm_format(&self, device: &DeviceHandle, _params: &NvmFormatParams) -> DeviceResult<()> {
        self.record(device, "nvm_format")
    }

    fn reinitialize_phy_events(&self, device: &DeviceHandle) -> DeviceResult<()> {
        self.record(device, "reinitialize_phy_events")
    }

    fn reinitialize_device_statistics(&self, device: &DeviceHandle) -> DeviceResult<()> {
        self.record(device, "reinitialize_device_statistics")
    }

    fn progress(&self, device: &DeviceHandle, kind: ProgressKind) -> DeviceResult<Progress> {
        self.record(device, "progress")?;
        Ok(Progress {
            kind,
            in_progress: false,
            percent_complete: None,
        })
    }
}
