use super::{parse_sector_size, CommonArgs, NvmTargetArg, SizeArg, ToolCommand};
use crate::config::{
    load_pattern, ArmedOperations, ConfigError, DestructiveOperationRequest, QueryOperation,
    RunConfig, Tool,
};
use crate::transport::{FastFormatMode, FormatUnitParams, NvmFormatParams, ProgressKind, SecureErase};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "seachest-format")]
#[command(about = "Format, sector size, NVM format and depopulation operations for storage devices")]
#[command(version)]
pub struct FormatArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Confirmation token for destructive operations
    #[arg(long = "confirm", value_name = "TOKEN")]
    pub confirm: Option<String>,

    /// Show device information
    #[arg(short = 'i', long = "device-info")]
    pub device_info: bool,

    /// Show the formats the device supports
    #[arg(long = "show-supported-formats")]
    pub show_supported_formats: bool,

    /// Show the SCSI format status log page
    #[arg(long = "show-format-status-log")]
    pub show_format_status_log: bool,

    /// Show physical element status
    #[arg(long = "show-physical-element-status")]
    pub show_physical_element_status: bool,

    /// Report progress of a running operation
    #[arg(long = "progress", value_enum, value_name = "OPERATION")]
    pub progress: Option<ProgressKind>,

    /// SCSI FORMAT UNIT with the current block size or a new one
    #[arg(long = "format-unit", value_name = "current|SECTOR_SIZE")]
    pub format_unit: Option<SizeArg>,

    /// Fast format: change the block size without initializing the medium
    #[arg(long = "fast-format", value_enum, requires = "format_unit")]
    pub fast_format: Option<FastFormatMode>,

    /// Initialization pattern, repeat:<hex> or file:<path>
    #[arg(long = "pattern", value_name = "SOURCE", requires = "format_unit")]
    pub pattern: Option<String>,

    /// Protection type for format unit or NVM format
    #[arg(long = "protection-type", value_parser = clap::value_parser!(u8).range(0..=3))]
    pub protection_type: Option<u8>,

    /// Protection interval exponent for format unit
    #[arg(long = "protection-interval-exponent", value_parser = clap::value_parser!(u8).range(0..=15))]
    pub protection_interval_exponent: Option<u8>,

    /// Discard the grown defect list
    #[arg(long = "discard-grown-list")]
    pub discard_grown_list: bool,

    /// Disable media certification
    #[arg(long = "disable-certification")]
    pub disable_certification: bool,

    /// Return as soon as the device accepts the format command
    #[arg(long = "immediate")]
    pub immediate: bool,

    /// Change the logical sector size (ATA and SCSI)
    #[arg(long = "set-sector-size", value_name = "SECTOR_SIZE", value_parser = parse_sector_size)]
    pub set_sector_size: Option<u32>,

    /// Depopulate a physical element
    #[arg(long = "remove-physical-element", value_name = "ELEMENT")]
    pub remove_physical_element: Option<u32>,

    /// Restore every depopulated physical element
    #[arg(long = "repopulate-elements")]
    pub repopulate_elements: bool,

    /// NVM format with the current format, a sector size, or format:<index>
    #[arg(long = "nvm-format", value_name = "current|SECTOR_SIZE|format:INDEX")]
    pub nvm_format: Option<NvmTargetArg>,

    /// Secure erase setting for NVM format
    #[arg(long = "secure-erase", value_enum, default_value_t)]
    pub secure_erase: SecureErase,

    /// Put protection information in the first bytes of metadata
    #[arg(long = "pi-first")]
    pub protection_first: bool,

    /// Transfer metadata as part of an extended data LBA
    #[arg(long = "metadata-extended")]
    pub metadata_extended: bool,

    /// Namespace to format; all namespaces by default
    #[arg(long = "namespace", value_name = "NSID")]
    pub namespace: Option<u32>,
}

impl FormatArgs {
    fn armed_operations(&self) -> Result<ArmedOperations, ConfigError> {
        let mut operations = ArmedOperations::default();

        if self.device_info {
            operations.query(QueryOperation::DeviceInfo);
        }
        if self.show_supported_formats {
            operations.query(QueryOperation::SupportedFormats);
        }
        if self.show_format_status_log {
            operations.query(QueryOperation::FormatStatusLog);
        }
        if self.show_physical_element_status {
            operations.query(QueryOperation::PhysicalElementStatus);
        }

        if let Some(size) = self.format_unit {
            let pattern = self.pattern.as_deref().map(load_pattern).transpose()?;
            operations.arm(DestructiveOperationRequest::FormatUnit(FormatUnitParams {
                new_sector_size: size.bytes(),
                fast_format: self.fast_format,
                pattern,
                protection_type: self.protection_type,
                protection_interval_exponent: self.protection_interval_exponent,
                discard_grown_list: self.discard_grown_list,
                disable_certification: self.disable_certification,
                immediate: self.immediate,
            }))?;
        }
        if let Some(sector_size) = self.set_sector_size {
            operations.arm(DestructiveOperationRequest::SetSectorSize { sector_size })?;
        }
        if let Some(element_id) = self.remove_physical_element {
            operations.arm(DestructiveOperationRequest::RemovePhysicalElement { element_id })?;
        }
        if self.repopulate_elements {
            operations.arm(DestructiveOperationRequest::RepopulateElements)?;
        }
        if let Some(NvmTargetArg(target)) = self.nvm_format {
            operations.arm(DestructiveOperationRequest::NvmFormat(NvmFormatParams {
                target,
                secure_erase: self.secure_erase,
                protection_type: self.protection_type,
                protection_first: self.protection_first,
                metadata_extended: self.metadata_extended,
                namespace_id: self.namespace,
            }))?;
        }

        if let Some(kind) = self.progress {
            operations.poll_progress(kind)?;
        }

        Ok(operations)
    }
}

impl ToolCommand for FormatArgs {
    const TOOL: Tool = Tool::Format;

    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn into_config(self) -> Result<RunConfig, ConfigError> {
        let operations = self.armed_operations()?;
        let confirmation = self.confirm;
        let mut config = self.common.into_config(Self::TOOL)?;
        config.operations = operations;
        config.confirmation = confirmation;
        config.validate()
    }
}
