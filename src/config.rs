// Immutable run configuration shared by every front-end
//
// The binaries parse flags with clap (see cli/) and validate them once into a RunConfig.
// Nothing in the orchestrator reads global state; everything it needs is here.

use crate::orchestrator::ExitCode;
use crate::transport::{
    DefectListRequest, FormatUnitParams, NvmFormatParams, OpenFlags, ProgressKind, ScanFlags,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keyword selecting every device the transport can enumerate
pub const ALL_DEVICES: &str = "all";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No device specified, use -d <handle> or -d all")]
    NoDevice,

    #[error("No operation requested")]
    NothingToDo,

    #[error("Only one destructive operation can be requested at a time ({first} and {second} were both given)")]
    ConflictingDestructive { first: String, second: String },

    #[error("Only one protocol can be forced at a time")]
    ConflictingProtocols,

    #[error("Fast format requires an explicit new sector size")]
    FastFormatNeedsSectorSize,

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Refusing to read pattern from insecure path {}", .0.display())]
    InsecurePath(PathBuf),

    #[error("Cannot open {}: {source}", .path.display())]
    CannotOpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ConfigError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ConfigError::InsecurePath(_) => ExitCode::InsecurePath,
            ConfigError::CannotOpenFile { .. } => ExitCode::CannotOpenFile,
            _ => ExitCode::CommandLineError,
        }
    }
}

/// Which front-end is running; decides banner names and example invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    Format,
    Info,
    Sample,
}

impl Tool {
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Format => "seachest-format",
            Tool::Info => "seachest-info",
            Tool::Sample => "seachest-sample",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary_name())
    }
}

/// Devices selected on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "handles")]
pub enum TargetSpec {
    AllDevices,
    Handles(Vec<String>),
}

impl TargetSpec {
    /// Build the target from every `-d` value.
    ///
    /// `all` only selects every device when it is the sole handle; mixed with explicit
    /// handles it is dropped and a warning is returned.
    pub fn from_handles(handles: Vec<String>) -> Result<(Self, Option<String>), ConfigError> {
        if handles.is_empty() {
            return Err(ConfigError::NoDevice);
        }

        let (all, explicit): (Vec<String>, Vec<String>) = handles
            .into_iter()
            .partition(|h| h.eq_ignore_ascii_case(ALL_DEVICES));

        if explicit.is_empty() {
            return Ok((TargetSpec::AllDevices, None));
        }

        let warning = (!all.is_empty())
            .then(|| "\"-d all\" ignored because explicit device handles were given".to_string());

        let mut seen = BTreeSet::new();
        let handles = explicit
            .into_iter()
            .filter(|h| seen.insert(h.clone()))
            .collect();

        Ok((TargetSpec::Handles(handles), warning))
    }
}

/// Identity predicates applied to every resolved device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub seagate_only: bool,
    /// Substring of the model
    pub model: Option<String>,
    /// Exact firmware revision
    pub firmware: Option<String>,
    /// Substring of the model of the drive behind a bridge
    pub child_model: Option<String>,
    /// Exact firmware revision of the drive behind a bridge
    pub child_firmware: Option<String>,
}

/// Confirmation tokens. They are exact strings and the two are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationToken {
    DataErase,
    LowLevelFormat,
}

impl ConfirmationToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationToken::DataErase => "this-will-erase-data",
            ConfirmationToken::LowLevelFormat => {
                "this-will-erase-data-and-may-render-the-drive-inoperable"
            }
        }
    }

    pub fn matches(&self, supplied: &str) -> bool {
        self.as_str() == supplied
    }
}

impl fmt::Display for ConfirmationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational queries, in dispatch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "query", content = "argument")]
pub enum QueryOperation {
    DeviceInfo,
    LowLevelInfo,
    TestUnitReady,
    DisplayLba(u64),
    SupportedFormats,
    FormatStatusLog,
    PhysicalElementStatus,
    SmartAttributes,
    DefectList(DefectListRequest),
    DeviceStatistics,
    ConcurrentRanges,
    SataPhyEvents,
}

impl QueryOperation {
    pub fn name(&self) -> String {
        match self {
            QueryOperation::DeviceInfo => "device information".to_string(),
            QueryOperation::LowLevelInfo => "low-level information".to_string(),
            QueryOperation::TestUnitReady => "test unit ready".to_string(),
            QueryOperation::DisplayLba(lba) => format!("display LBA {}", lba),
            QueryOperation::SupportedFormats => "supported formats".to_string(),
            QueryOperation::FormatStatusLog => "format status log".to_string(),
            QueryOperation::PhysicalElementStatus => "physical element status".to_string(),
            QueryOperation::SmartAttributes => "SMART attributes".to_string(),
            QueryOperation::DefectList(_) => "defect list".to_string(),
            QueryOperation::DeviceStatistics => "device statistics".to_string(),
            QueryOperation::ConcurrentRanges => "concurrent positioning ranges".to_string(),
            QueryOperation::SataPhyEvents => "SATA phy event counters".to_string(),
        }
    }
}

/// Counter resets, run after any destructive operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceOperation {
    ReinitPhyEvents,
    ReinitDeviceStatistics,
}

impl MaintenanceOperation {
    pub fn name(&self) -> &'static str {
        match self {
            MaintenanceOperation::ReinitPhyEvents => "reinitialize SATA phy events",
            MaintenanceOperation::ReinitDeviceStatistics => "reinitialize device statistics",
        }
    }
}

/// Operations that can irreversibly change the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "operation")]
pub enum DestructiveOperationRequest {
    FormatUnit(FormatUnitParams),
    SetSectorSize { sector_size: u32 },
    RemovePhysicalElement { element_id: u32 },
    RepopulateElements,
    NvmFormat(NvmFormatParams),
}

impl DestructiveOperationRequest {
    pub fn name(&self) -> &'static str {
        match self {
            DestructiveOperationRequest::FormatUnit(params) if params.fast_format.is_some() => {
                "fast format"
            }
            DestructiveOperationRequest::FormatUnit(_) => "format unit",
            DestructiveOperationRequest::SetSectorSize { .. } => "set sector size",
            DestructiveOperationRequest::RemovePhysicalElement { .. } => {
                "remove physical element"
            }
            DestructiveOperationRequest::RepopulateElements => "repopulate elements",
            DestructiveOperationRequest::NvmFormat(_) => "NVM format",
        }
    }

    pub fn accepted_tokens(&self) -> &'static [ConfirmationToken] {
        match self {
            DestructiveOperationRequest::FormatUnit(params) if params.fast_format.is_some() => {
                &[ConfirmationToken::LowLevelFormat]
            }
            DestructiveOperationRequest::SetSectorSize { .. } => &[ConfirmationToken::LowLevelFormat],
            DestructiveOperationRequest::FormatUnit(_)
            | DestructiveOperationRequest::RemovePhysicalElement { .. }
            | DestructiveOperationRequest::RepopulateElements
            | DestructiveOperationRequest::NvmFormat(_) => &[ConfirmationToken::DataErase],
        }
    }

    /// Operations that can leave the drive unusable if interrupted
    pub fn is_uninterruptible(&self) -> bool {
        match self {
            DestructiveOperationRequest::FormatUnit(params) => params.fast_format.is_some(),
            DestructiveOperationRequest::SetSectorSize { .. }
            | DestructiveOperationRequest::RemovePhysicalElement { .. }
            | DestructiveOperationRequest::RepopulateElements => true,
            DestructiveOperationRequest::NvmFormat(_) => false,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DestructiveOperationRequest::FormatUnit(params)
                if params.fast_format.is_some() && params.new_sector_size.is_none() =>
            {
                Err(ConfigError::FastFormatNeedsSectorSize)
            }
            DestructiveOperationRequest::FormatUnit(FormatUnitParams {
                pattern: Some(pattern),
                ..
            }) if pattern.is_empty() => Err(ConfigError::InvalidPattern(
                "pattern must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Everything the run will do to each admitted device
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArmedOperations {
    pub queries: BTreeSet<QueryOperation>,
    pub destructive: Option<DestructiveOperationRequest>,
    pub maintenance: BTreeSet<MaintenanceOperation>,
    pub progress: Option<ProgressKind>,
}

impl ArmedOperations {
    pub fn query(&mut self, query: QueryOperation) -> &mut Self {
        self.queries.insert(query);
        self
    }

    pub fn maintain(&mut self, operation: MaintenanceOperation) -> &mut Self {
        self.maintenance.insert(operation);
        self
    }

    /// Arm the destructive operation. A second one is a command-line error.
    pub fn arm(&mut self, request: DestructiveOperationRequest) -> Result<&mut Self, ConfigError> {
        if let Some(existing) = &self.destructive {
            return Err(ConfigError::ConflictingDestructive {
                first: existing.name().to_string(),
                second: request.name().to_string(),
            });
        }
        self.destructive = Some(request);
        Ok(self)
    }

    pub fn poll_progress(&mut self, kind: ProgressKind) -> Result<&mut Self, ConfigError> {
        match self.progress {
            Some(existing) if existing != kind => Err(ConfigError::InvalidArgument(format!(
                "progress was requested for both {} and {}",
                existing, kind
            ))),
            _ => {
                self.progress = Some(kind);
                Ok(self)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
            && self.destructive.is_none()
            && self.maintenance.is_empty()
            && self.progress.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "level")]
pub enum Verbosity {
    Quiet,
    Level(u8),
}

impl Verbosity {
    pub const DEFAULT_LEVEL: u8 = 1;
    pub const MAX_LEVEL: u8 = 4;

    pub fn new(quiet: bool, level: u8) -> Self {
        if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Level(level.min(Self::MAX_LEVEL))
        }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Verbosity::Quiet)
    }

    pub fn level(&self) -> u8 {
        match self {
            Verbosity::Quiet => 0,
            Verbosity::Level(level) => *level,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Level(Self::DEFAULT_LEVEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Validated configuration for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub tool: Tool,
    pub target: TargetSpec,
    /// List resolved devices instead of running operations
    pub scan: bool,
    pub scan_flags: ScanFlags,
    pub open_flags: OpenFlags,
    pub filters: FilterCriteria,
    pub operations: ArmedOperations,
    /// Confirmation string exactly as typed
    pub confirmation: Option<String>,
    pub verbosity: Verbosity,
    pub output_format: OutputFormat,
    /// Non-fatal notes from argument parsing, carried into the summary
    pub warnings: Vec<String>,
}

impl RunConfig {
    pub fn new(tool: Tool, target: TargetSpec) -> Self {
        Self {
            tool,
            target,
            scan: false,
            scan_flags: ScanFlags::default(),
            open_flags: OpenFlags::default(),
            filters: FilterCriteria::default(),
            operations: ArmedOperations::default(),
            confirmation: None,
            verbosity: Verbosity::default(),
            output_format: OutputFormat::default(),
            warnings: Vec::new(),
        }
    }

    /// Check cross-field rules. Called once after every field is set.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !self.scan && self.operations.is_empty() {
            return Err(ConfigError::NothingToDo);
        }
        if let Some(request) = &self.operations.destructive {
            request.validate()?;
        }
        Ok(self)
    }
}

/// Load an initialization pattern from `repeat:<hex>` or `file:<path>`
pub fn load_pattern(source: &str) -> Result<Vec<u8>, ConfigError> {
    if let Some(hex) = source.strip_prefix("repeat:") {
        return parse_hex_pattern(hex);
    }
    if let Some(path) = source.strip_prefix("file:") {
        return read_pattern_file(Path::new(path));
    }
    Err(ConfigError::InvalidPattern(format!(
        "expected repeat:<hex> or file:<path>, got {}",
        source
    )))
}

fn parse_hex_pattern(hex: &str) -> Result<Vec<u8>, ConfigError> {
    let hex = hex.trim_start_matches("0x");
    if hex.is_empty() || hex.len() % 2 != 0 {
        return Err(ConfigError::InvalidPattern(format!(
            "{} is not an even number of hex digits",
            hex
        )));
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(|| ConfigError::InvalidPattern(format!("{} is not hexadecimal", hex)))
        })
        .collect()
}

fn read_pattern_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let metadata = fs::metadata(path).map_err(|source| ConfigError::CannotOpenFile {
        path: path.to_path_buf(),
        source,
    })?;

    if is_world_writable(&metadata) {
        return Err(ConfigError::InsecurePath(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if fs::metadata(parent).is_ok_and(|m| is_world_writable(&m)) {
            return Err(ConfigError::InsecurePath(path.to_path_buf()));
        }
    }

    let pattern = fs::read(path).map_err(|source| ConfigError::CannotOpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(pattern)
}

#[cfg(unix)]
fn is_world_writable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o002 != 0
}

#[cfg(not(unix))]
fn is_world_writable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
