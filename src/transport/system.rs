use super::command::{args, run_checked, spawn, CommandOutput, CommandRunner, SystemCommandRunner};
use super::parse;
use super::types::*;
use super::{DeviceHandle, DeviceIdentity, DeviceTransport, Enumeration};
use crate::{DeviceError, DeviceResult, Protocol};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

// smartctl exit status bits that mean the command itself did not run
const SMARTCTL_COMMAND_LINE_ERROR: i32 = 0x01;
const SMARTCTL_DEVICE_OPEN_FAILED: i32 = 0x02;

// USB bridge pass-through types tried in order when legacy pass-through is enabled
const LEGACY_USB_BRIDGES: [&str; 3] = ["usbjmicron", "usbsunplus", "usbcypress"];

const SCSI_FORMAT_STATUS_PAGE: &str = "0x08";
const SCSI_GENERAL_STATISTICS_PAGE: &str = "0x19";
const NVME_ALL_NAMESPACES: u32 = 0xFFFF_FFFF;

/// Transport for Linux hosts backed by smartmontools, sg3_utils, nvme-cli and hdparm.
///
/// The sysfs and /dev roots are configurable so enumeration can run against a fixture tree.
pub struct SystemTransport<R: CommandRunner = SystemCommandRunner> {
    runner: R,
    sysfs_root: PathBuf,
    dev_root: PathBuf,
    open_files: RefCell<HashMap<String, Vec<File>>>,
}

impl SystemTransport<SystemCommandRunner> {
    pub fn new() -> Self {
        Self::with_runner(SystemCommandRunner, "/sys", "/dev")
    }
}

impl Default for SystemTransport<SystemCommandRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> SystemTransport<R> {
    pub fn with_runner(
        runner: R,
        sysfs_root: impl Into<PathBuf>,
        dev_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            sysfs_root: sysfs_root.into(),
            dev_root: dev_root.into(),
            open_files: RefCell::new(HashMap::new()),
        }
    }

    /// Check if a block device should be skipped during enumeration
    pub(crate) fn should_skip_device(device_name: &str) -> bool {
        // Skip loop devices, ram disks, device mapper, optical drives, etc.
        device_name.starts_with("loop")
            || device_name.starts_with("ram")
            || device_name.starts_with("dm-")
            || device_name.starts_with("sr")
            || device_name.starts_with("zram")
            || device_name.starts_with("md")
            || device_name.starts_with("nbd")
    }

    fn block_dir(&self, device_name: &str) -> PathBuf {
        self.sysfs_root.join("block").join(device_name)
    }

    fn read_sysfs(&self, device_name: &str, attribute: &str) -> Option<String> {
        fs::read_to_string(self.block_dir(device_name).join(attribute))
            .ok()
            .map(|s| s.trim().to_string())
    }

    fn is_usb_device(&self, device_name: &str) -> bool {
        fs::canonicalize(self.block_dir(device_name).join("device"))
            .map(|p| p.to_string_lossy().contains("/usb"))
            .unwrap_or(false)
    }

    fn interface_of(&self, device_name: &str) -> InterfaceFilter {
        if device_name.starts_with("nvme") {
            InterfaceFilter::Nvme
        } else if self.is_usb_device(device_name) {
            InterfaceFilter::Usb
        } else if self
            .read_sysfs(device_name, "device/vendor")
            .is_some_and(|v| v == "ATA")
        {
            // libata reports "ATA" as the SCSI vendor of every SATA/PATA disk
            InterfaceFilter::Ata
        } else {
            InterfaceFilter::Scsi
        }
    }

    /// Candidate device nodes in name order
    fn candidates(&self, flags: &ScanFlags) -> DeviceResult<Vec<String>> {
        let mut names = Vec::new();

        for entry in fs::read_dir(self.sysfs_root.join("block"))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            if Self::should_skip_device(&name) {
                continue;
            }
            if !flags.allows(self.interface_of(&name)) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names
            .into_iter()
            .map(|name| self.dev_root.join(name).to_string_lossy().to_string())
            .collect())
    }

    fn device_name(path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn validate_handle(&self, handle: &str) -> DeviceResult<()> {
        if !Path::new(handle).starts_with(&self.dev_root) || Self::device_name(handle).is_empty()
        {
            return Err(DeviceError::InvalidHandle(format!(
                "{} is not a device node under {}",
                handle,
                self.dev_root.display()
            )));
        }
        Ok(())
    }

    fn open_node(handle: &str) -> DeviceResult<File> {
        if let Err(e) = fs::metadata(handle) {
            return Err(match e.kind() {
                io::ErrorKind::NotFound => DeviceError::NoSuchDevice(handle.to_string()),
                io::ErrorKind::PermissionDenied => DeviceError::AccessDenied(handle.to_string()),
                _ => DeviceError::IoError(e),
            });
        }

        OpenOptions::new().read(true).open(handle).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                DeviceError::AccessDenied(handle.to_string())
            } else if e.raw_os_error() == Some(libc::EBUSY) {
                DeviceError::Busy(handle.to_string())
            } else {
                DeviceError::IoError(e)
            }
        })
    }

    /// smartctl `-d` value for the flags, if any
    fn smartctl_device_type(flags: &OpenFlags) -> Option<&'static str> {
        if flags.sat_12_byte {
            return Some("sat,12");
        }
        match flags.forced_protocol {
            Some(Protocol::Ata) => Some("ata"),
            Some(Protocol::Scsi) => Some("scsi"),
            Some(Protocol::Nvme) => Some("nvme"),
            Some(Protocol::Unknown) | None => None,
        }
    }

    /// Run smartctl with JSON output. Only the command-line and open-failure bits of the
    /// exit status are failures; the other bits describe drive health.
    fn smartctl(
        &self,
        path: &str,
        device_type: Option<&str>,
        options: &[&str],
    ) -> DeviceResult<String> {
        let mut command = args(options);
        command.push("-j".to_string());
        if let Some(device_type) = device_type {
            command.push("-d".to_string());
            command.push(device_type.to_string());
        }
        command.push(path.to_string());

        let output = spawn(&self.runner, "smartctl", &command)?;

        let status = output.status.ok_or_else(|| {
            DeviceError::Aborted("smartctl was terminated by a signal".to_string())
        })?;

        if status & (SMARTCTL_COMMAND_LINE_ERROR | SMARTCTL_DEVICE_OPEN_FAILED) != 0 {
            return Err(Self::smartctl_failure(path, status, &output));
        }

        Ok(output.stdout_str())
    }

    fn smartctl_failure(path: &str, status: i32, output: &CommandOutput) -> DeviceError {
        let detail = parse::parse_smartctl(&output.stdout_str())
            .ok()
            .and_then(|report| report.smartctl.messages.first().map(|m| m.string.clone()))
            .unwrap_or_else(|| output.stderr_str().trim().to_string());
        let message = format!("smartctl {} (status {}): {}", path, status, detail);
        let lower = detail.to_lowercase();

        if lower.contains("permission denied") || lower.contains("operation not permitted") {
            DeviceError::AccessDenied(message)
        } else if lower.contains("unsupported") || lower.contains("unknown usb bridge") {
            DeviceError::Unsupported(message)
        } else {
            DeviceError::CommandFailed(message)
        }
    }

    fn smartctl_for(&self, device: &DeviceHandle, options: &[&str]) -> DeviceResult<String> {
        self.smartctl(&device.path, Self::smartctl_device_type(&device.flags), options)
    }

    /// Identify the device with smartctl, falling back to the legacy USB bridge types
    fn identify(&self, path: &str, flags: &OpenFlags) -> DeviceResult<DeviceIdentity> {
        let first = self
            .smartctl(path, Self::smartctl_device_type(flags), &["-i"])
            .and_then(|json| parse::parse_smartctl(&json))
            .map(|report| parse::identity_from_smartctl(&report));

        match first {
            Ok(identity) if identity.protocol != Protocol::Unknown => return Ok(identity),
            Ok(identity) if !flags.legacy_usb_passthrough => return Ok(identity),
            Err(e) if !flags.legacy_usb_passthrough => return Err(e),
            _ => {}
        }

        for bridge in LEGACY_USB_BRIDGES {
            tracing::debug!(device = %path, bridge, "Trying legacy USB pass-through");
            if let Ok(report) = self
                .smartctl(path, Some(bridge), &["-i"])
                .and_then(|json| parse::parse_smartctl(&json))
            {
                let identity = parse::identity_from_smartctl(&report);
                if identity.protocol != Protocol::Unknown {
                    return Ok(identity);
                }
            }
        }

        Ok(DeviceIdentity::default())
    }

    /// Fill identity gaps from sysfs and split bridge and child identities for USB devices
    fn complete_identity(&self, device_name: &str, mut identity: DeviceIdentity) -> DeviceIdentity {
        if self.is_usb_device(device_name) {
            identity.child_model = std::mem::take(&mut identity.model);
            identity.child_firmware = std::mem::take(&mut identity.firmware);
            identity.vendor = self
                .read_sysfs(device_name, "device/vendor")
                .unwrap_or_default();
            identity.model = self
                .read_sysfs(device_name, "device/model")
                .unwrap_or_default();
            identity.firmware = self.read_sysfs(device_name, "device/rev").unwrap_or_default();
        } else if identity.model.is_empty() {
            identity.model = self
                .read_sysfs(device_name, "device/model")
                .unwrap_or_default();
            if identity.vendor.is_empty() {
                identity.vendor = self
                    .read_sysfs(device_name, "device/vendor")
                    .unwrap_or_default();
            }
        }

        if identity.capacity_blocks == 0 {
            let lbs = self
                .read_sysfs(device_name, "queue/logical_block_size")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(512);
            // sysfs reports size in 512-byte sectors regardless of the block size
            let sectors = self
                .read_sysfs(device_name, "size")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            identity.logical_block_size = lbs;
            identity.physical_block_size = identity.physical_block_size.max(lbs);
            identity.capacity_blocks = sectors * 512 / u64::from(lbs.max(1));
        }

        identity
    }

    fn require(device: &DeviceHandle, allowed: &[Protocol], operation: &str) -> DeviceResult<()> {
        let protocol = device.effective_protocol();
        if allowed.contains(&protocol) {
            Ok(())
        } else {
            Err(DeviceError::Unsupported(format!(
                "{} is not supported on {} devices",
                operation, protocol
            )))
        }
    }

    fn run_tool(&self, program: &str, mut options: Vec<String>, path: &str) -> DeviceResult<CommandOutput> {
        options.push(path.to_string());
        run_checked(&self.runner, program, &options)
    }

    fn nvme_id_ns(&self, device: &DeviceHandle) -> DeviceResult<String> {
        let mut options = args(&["id-ns", &device.path, "-o", "json"]);
        if let Some(nsid) = device.identity.namespace_id {
            options.push(format!("--namespace-id={}", nsid));
        }
        Ok(run_checked(&self.runner, "nvme", &options)?.stdout_str())
    }

    fn resolve_nvme_format_index(
        &self,
        device: &DeviceHandle,
        target: NvmFormatTarget,
    ) -> DeviceResult<u8> {
        match target {
            NvmFormatTarget::FormatIndex(index) => Ok(index),
            NvmFormatTarget::Current => parse::parse_nvme_current_format(&self.nvme_id_ns(device)?),
            NvmFormatTarget::SectorSize(size) => {
                let formats = parse::parse_nvme_lba_formats(&self.nvme_id_ns(device)?)?;
                formats
                    .iter()
                    .filter(|f| f.logical_block_size == size)
                    // Prefer a format without metadata
                    .min_by_key(|f| f.metadata_size)
                    .and_then(|f| f.index)
                    .ok_or_else(|| {
                        DeviceError::Unsupported(format!(
                            "no LBA format with a {} byte sector on {}",
                            size, device.path
                        ))
                    })
            }
        }
    }

    fn sysfs_link_name(&self, device_name: &str, link: &str) -> Option<String> {
        fs::read_link(self.block_dir(device_name).join(link))
            .ok()
            .and_then(|target| target.file_name().map(|n| n.to_string_lossy().to_string()))
    }
}

impl<R: CommandRunner> DeviceTransport for SystemTransport<R> {
    fn device_count(&self, flags: &ScanFlags) -> DeviceResult<usize> {
        Ok(self.candidates(flags)?.len())
    }

    fn enumerate_devices(&self, count: usize, flags: &ScanFlags) -> DeviceResult<Enumeration> {
        let mut enumeration = Enumeration::default();
        let mut first_error = None;

        for path in self.candidates(flags)?.into_iter().take(count) {
            match self.open_device(&path, &flags.open) {
                Ok(device) => enumeration.devices.push(device),
                Err(e) => {
                    tracing::warn!(device = %path, error = %e, "Device did not enumerate");
                    enumeration.failures.push((path, e.to_string()));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if enumeration.devices.is_empty() => Err(e),
            _ => Ok(enumeration),
        }
    }

    fn open_device(&self, handle: &str, flags: &OpenFlags) -> DeviceResult<DeviceHandle> {
        self.validate_handle(handle)?;
        let file = Self::open_node(handle)?;

        let identity = match self.identify(handle, flags) {
            Ok(identity) => identity,
            // A device smartctl cannot talk to still opens, with an unknown protocol
            Err(DeviceError::Unsupported(reason)) | Err(DeviceError::CommandFailed(reason)) => {
                tracing::debug!(device = %handle, reason = %reason, "Identification incomplete");
                DeviceIdentity::default()
            }
            Err(e) => return Err(e),
        };
        let identity = self.complete_identity(&Self::device_name(handle), identity);

        self.open_files
            .borrow_mut()
            .entry(handle.to_string())
            .or_default()
            .push(file);

        tracing::debug!(device = %handle, model = %identity.model, protocol = %identity.protocol, "Opened device");

        Ok(DeviceHandle {
            path: handle.to_string(),
            identity,
            flags: *flags,
        })
    }

    fn close_device(&self, device: &DeviceHandle) {
        let mut open_files = self.open_files.borrow_mut();
        if let Some(files) = open_files.get_mut(&device.path) {
            files.pop();
            if files.is_empty() {
                open_files.remove(&device.path);
            }
        }
        tracing::debug!(device = %device.path, "Closed device");
    }

    fn device_information(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>> {
        let json = self.smartctl_for(device, &["-i", "-H"])?;
        let mut fields = parse::info_fields_from_smartctl(&json)?;

        fields.insert(0, InfoField::new("Protocol", device.effective_protocol().to_string()));
        if !device.identity.child_model.is_empty() {
            fields.push(InfoField::new("Child Model", device.identity.child_model.clone()));
            fields.push(InfoField::new(
                "Child Firmware",
                device.identity.child_firmware.clone(),
            ));
        }
        fields.push(InfoField::new(
            "Logical Block Size",
            device.identity.logical_block_size.to_string(),
        ));
        fields.push(InfoField::new(
            "Physical Block Size",
            device.identity.physical_block_size.to_string(),
        ));
        if let Some(nsid) = device.identity.namespace_id {
            fields.push(InfoField::new("Namespace ID", nsid.to_string()));
        }

        Ok(fields)
    }

    fn low_level_info(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>> {
        let name = Self::device_name(&device.path);
        if !self.block_dir(&name).exists() {
            return Err(DeviceError::NoSuchDevice(format!(
                "{} has no sysfs entry",
                device.path
            )));
        }

        const ATTRIBUTES: [(&str, &str); 9] = [
            ("SCSI Vendor", "device/vendor"),
            ("SCSI Model", "device/model"),
            ("SCSI Revision", "device/rev"),
            ("SCSI Level", "device/scsi_level"),
            ("Queue Depth", "device/queue_depth"),
            ("Logical Block Size", "queue/logical_block_size"),
            ("Physical Block Size", "queue/physical_block_size"),
            ("Rotational", "queue/rotational"),
            ("Removable", "removable"),
        ];

        let mut fields = vec![
            InfoField::new("Handle", device.path.clone()),
            InfoField::new(
                "Interface",
                format!("{:?}", self.interface_of(&name)).to_uppercase(),
            ),
        ];
        if let Some(driver) = self.sysfs_link_name(&name, "device/driver") {
            fields.push(InfoField::new("Driver", driver));
        }
        fields.extend(ATTRIBUTES.iter().filter_map(|(label, attribute)| {
            self.read_sysfs(&name, attribute)
                .map(|value| InfoField::new(*label, value))
        }));
        if let Some(forced) = device.flags.forced_protocol {
            fields.push(InfoField::new("Forced Protocol", forced.to_string()));
        }
        if device.flags.sat_12_byte {
            fields.push(InfoField::new("SAT Pass-through", "12-byte"));
        }

        Ok(fields)
    }

    fn test_unit_ready(&self, device: &DeviceHandle) -> DeviceResult<UnitReadiness> {
        let output = if device.effective_protocol() == Protocol::Nvme {
            spawn(&self.runner, "nvme", &args(&["id-ctrl", &device.path, "-o", "json"]))?
        } else {
            spawn(&self.runner, "sg_turs", &args(&[&device.path]))?
        };

        match output.status {
            Some(0) => Ok(UnitReadiness {
                ready: true,
                detail: None,
            }),
            Some(_) => Ok(UnitReadiness {
                ready: false,
                detail: Some(output.stderr_str().trim().to_string()).filter(|s| !s.is_empty()),
            }),
            None => Err(DeviceError::Aborted(
                "test unit ready was terminated by a signal".to_string(),
            )),
        }
    }

    fn read_lba(&self, device: &DeviceHandle, lba: u64, count: u32) -> DeviceResult<Vec<u8>> {
        let block_size = u64::from(device.identity.logical_block_size.max(1));
        if device.identity.capacity_blocks > 0
            && lba.saturating_add(u64::from(count)) > device.identity.capacity_blocks
        {
            return Err(DeviceError::CommandFailed(format!(
                "LBA {} is beyond the last LBA {}",
                lba,
                device.identity.capacity_blocks - 1
            )));
        }

        let offset = lba.checked_mul(block_size).ok_or_else(|| {
            DeviceError::CommandFailed(format!("LBA {} is beyond the addressable range", lba))
        })?;
        let length = block_size
            .checked_mul(u64::from(count))
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| {
                DeviceError::CommandFailed(format!("reading {} blocks does not fit in memory", count))
            })?;

        let mut file = File::open(&device.path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; length];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn supported_formats(&self, device: &DeviceHandle) -> DeviceResult<Vec<SupportedFormat>> {
        match device.effective_protocol() {
            Protocol::Nvme => parse::parse_nvme_lba_formats(&self.nvme_id_ns(device)?),
            Protocol::Scsi => {
                let output = self.run_tool("sg_vpd", args(&["--page=sbl"]), &device.path)?;
                Ok(parse::parse_supported_block_lengths(
                    &output.stdout_str(),
                    device.identity.logical_block_size,
                ))
            }
            _ => Err(DeviceError::Unsupported(format!(
                "supported formats are not reported by {} devices",
                device.effective_protocol()
            ))),
        }
    }

    fn format_status(&self, device: &DeviceHandle) -> DeviceResult<Vec<InfoField>> {
        Self::require(device, &[Protocol::Scsi], "format status log")?;
        let output = self.run_tool(
            "sg_logs",
            vec![format!("--page={}", SCSI_FORMAT_STATUS_PAGE)],
            &device.path,
        )?;
        Ok(parse::parse_key_values(&output.stdout_str()))
    }

    fn physical_elements(&self, device: &DeviceHandle) -> DeviceResult<Vec<PhysicalElement>> {
        Self::require(device, &[Protocol::Scsi, Protocol::Ata], "physical element status")?;
        let output = self.run_tool("sg_get_elem_status", args(&["--raw"]), &device.path)?;
        parse::parse_physical_elements(&output.stdout)
    }

    fn device_statistics(&self, device: &DeviceHandle) -> DeviceResult<Vec<Statistic>> {
        match device.effective_protocol() {
            Protocol::Ata => {
                let json = self.smartctl_for(device, &["-l", "devstat"])?;
                Ok(parse::statistics_from_smartctl(&parse::parse_smartctl(&json)?))
            }
            Protocol::Nvme => {
                let json = self.smartctl_for(device, &["-A"])?;
                Ok(parse::statistics_from_smartctl(&parse::parse_smartctl(&json)?))
            }
            Protocol::Scsi => {
                let output = self.run_tool(
                    "sg_logs",
                    vec![format!("--page={}", SCSI_GENERAL_STATISTICS_PAGE)],
                    &device.path,
                )?;
                Ok(parse::parse_log_statistics(
                    "General Statistics and Performance",
                    &output.stdout_str(),
                ))
            }
            Protocol::Unknown => Err(DeviceError::Unsupported(
                "device statistics need a known protocol".to_string(),
            )),
        }
    }

    fn smart_attributes(&self, device: &DeviceHandle) -> DeviceResult<SmartData> {
        Self::require(device, &[Protocol::Ata, Protocol::Nvme], "SMART attributes")?;
        let json = self.smartctl_for(device, &["-A", "-H"])?;
        Ok(parse::smart_data_from_smartctl(&parse::parse_smartctl(&json)?))
    }

    fn defect_list(
        &self,
        device: &DeviceHandle,
        request: &DefectListRequest,
    ) -> DeviceResult<DefectList> {
        Self::require(device, &[Protocol::Scsi], "defect lists")?;

        let list = match request.kind {
            DefectListKind::Grown => "-G",
            DefectListKind::Primary | DefectListKind::Both => "-d",
        };
        let format = match request.format {
            DefectFormat::Block => "-Flogical",
            DefectFormat::BytesFromIndex => "-Findex",
            DefectFormat::Physical => "-Fphysical",
        };

        let output = self.run_tool("sginfo", args(&[list, format]), &device.path)?;
        Ok(parse::parse_defect_list(request, &output.stdout_str()))
    }

    fn concurrent_ranges(&self, device: &DeviceHandle) -> DeviceResult<Vec<ConcurrentRange>> {
        Self::require(device, &[Protocol::Scsi, Protocol::Ata], "concurrent positioning ranges")?;
        let output = self.run_tool("sg_vpd", args(&["--page=cpr"]), &device.path)?;
        parse::parse_concurrent_ranges(&output.stdout_str())
    }

    fn sata_phy_events(&self, device: &DeviceHandle) -> DeviceResult<Vec<PhyEventCounter>> {
        Self::require(device, &[Protocol::Ata], "SATA phy event counters")?;
        let json = self.smartctl_for(device, &["-l", "sataphy"])?;
        Ok(parse::phy_events_from_smartctl(&parse::parse_smartctl(&json)?))
    }

    fn format_unit(&self, device: &DeviceHandle, params: &FormatUnitParams) -> DeviceResult<()> {
        Self::require(device, &[Protocol::Scsi], "FORMAT UNIT")?;
        if params.pattern.is_some() {
            return Err(DeviceError::Unsupported(
                "sg_format cannot write a custom initialization pattern".to_string(),
            ));
        }

        // The operator already went through the confirmation gate, skip sg_format's own wait
        let mut options = args(&["--format", "--quick"]);
        if let Some(size) = params.new_sector_size {
            options.push(format!("--size={}", size));
        }
        if let Some(mode) = params.fast_format {
            options.push(format!("--ffmt={}", mode.ffmt()));
        }
        if let Some(protection) = params.protection_type {
            let (fmtpinfo, pfu) = match protection {
                0 => (0, 0),
                1 => (2, 0),
                2 => (3, 0),
                _ => (3, 1),
            };
            options.push(format!("--fmtpinfo={}", fmtpinfo));
            options.push(format!("--pfu={}", pfu));
        }
        if let Some(exponent) = params.protection_interval_exponent {
            options.push(format!("--pie={}", exponent));
        }
        options.push(format!("--cmplst={}", u8::from(params.discard_grown_list)));
        if params.disable_certification {
            options.push("--dcrt".to_string());
        }
        if params.immediate {
            options.push("--early".to_string());
        }

        tracing::info!(device = %device.path, "Starting FORMAT UNIT");
        self.run_tool("sg_format", options, &device.path)?;
        Ok(())
    }

    fn set_sector_size(&self, device: &DeviceHandle, sector_size: u32) -> DeviceResult<()> {
        tracing::info!(device = %device.path, sector_size, "Changing sector size");
        match device.effective_protocol() {
            Protocol::Scsi => {
                let options = vec![
                    "--format".to_string(),
                    "--quick".to_string(),
                    format!("--size={}", sector_size),
                    format!("--ffmt={}", FastFormatMode::Fast.ffmt()),
                ];
                self.run_tool("sg_format", options, &device.path)?;
            }
            Protocol::Ata => {
                let options = vec![
                    "--set-sector-size".to_string(),
                    sector_size.to_string(),
                    "--please-destroy-my-drive".to_string(),
                ];
                self.run_tool("hdparm", options, &device.path)?;
            }
            protocol => {
                return Err(DeviceError::Unsupported(format!(
                    "set sector size is not supported on {} devices, use NVM format",
                    protocol
                )))
            }
        }
        Ok(())
    }

    fn remove_physical_element(
        &self,
        device: &DeviceHandle,
        element_id: u32,
    ) -> DeviceResult<()> {
        Self::require(device, &[Protocol::Scsi, Protocol::Ata], "element depopulation")?;
        tracing::info!(device = %device.path, element_id, "Removing physical element");
        let options = vec![
            "--remove".to_string(),
            format!("--element={}", element_id),
            "--quick".to_string(),
        ];
        self.run_tool("sg_rem_rest_elem", options, &device.path)?;
        Ok(())
    }

    fn repopulate_physical_elements(&self, device: &DeviceHandle) -> DeviceResult<()> {
        Self::require(device, &[Protocol::Scsi, Protocol::Ata], "element repopulation")?;
        tracing::info!(device = %device.path, "Restoring physical elements");
        self.run_tool(
            "sg_rem_rest_elem",
            args(&["--restore", "--quick"]),
            &device.path,
        )?;
        Ok(())
    }

    fn nvm_format(&self, device: &DeviceHandle, params: &NvmFormatParams) -> DeviceResult<()> {
        Self::require(device, &[Protocol::Nvme], "NVM format")?;
        let lbaf = self.resolve_nvme_format_index(device, params.target)?;

        let mut options = vec![
            "format".to_string(),
            device.path.clone(),
            format!("--lbaf={}", lbaf),
            format!("--ses={}", params.secure_erase.ses()),
            format!(
                "--namespace-id={}",
                params.namespace_id.unwrap_or(NVME_ALL_NAMESPACES)
            ),
            "--force".to_string(),
        ];
        if let Some(protection) = params.protection_type {
            options.push(format!("--pi={}", protection));
            options.push(format!("--pil={}", u8::from(params.protection_first)));
        }
        if params.metadata_extended {
            options.push("--ms=1".to_string());
        }

        tracing::info!(device = %device.path, lbaf, "Starting NVM format");
        run_checked(&self.runner, "nvme", &options)?;
        Ok(())
    }

    fn reinitialize_phy_events(&self, device: &DeviceHandle) -> DeviceResult<()> {
        Self::require(device, &[Protocol::Ata], "SATA phy event reset")?;
        self.smartctl_for(device, &["-l", "sataphy,reset"])?;
        Ok(())
    }

    fn reinitialize_device_statistics(&self, device: &DeviceHandle) -> DeviceResult<()> {
        Self::require(device, &[Protocol::Scsi], "device statistics reset")?;
        self.run_tool(
            "sg_logs",
            vec![
                "--reset".to_string(),
                format!("--page={}", SCSI_GENERAL_STATISTICS_PAGE),
            ],
            &device.path,
        )?;
        Ok(())
    }

    fn progress(&self, device: &DeviceHandle, kind: ProgressKind) -> DeviceResult<Progress> {
        match (kind, device.effective_protocol()) {
            (ProgressKind::NvmFormat, Protocol::Nvme) => {
                parse::parse_nvme_format_progress(&self.nvme_id_ns(device)?)
            }
            (ProgressKind::NvmFormat, protocol) => Err(DeviceError::Unsupported(format!(
                "NVM format progress is not available on {} devices",
                protocol
            ))),
            (_, Protocol::Scsi) | (_, Protocol::Ata) => {
                let output =
                    self.run_tool("sg_requests", args(&["--progress"]), &device.path)?;
                Ok(parse::parse_progress(kind, &output.stdout_str()))
            }
            (kind, protocol) => Err(DeviceError::Unsupported(format!(
                "{} progress is not available on {} devices",
                kind, protocol
            ))),
        }
    }
}
