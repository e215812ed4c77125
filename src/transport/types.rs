// Request parameters and report types exchanged with a DeviceTransport

use crate::Protocol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flags applied before a device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpenFlags {
    /// Talk to the device with this protocol instead of the detected one
    pub forced_protocol: Option<Protocol>,
    /// Try vendor-specific USB bridge pass-through when SAT does not work
    pub legacy_usb_passthrough: bool,
    /// Use 12-byte SAT pass-through instead of 16-byte
    pub sat_12_byte: bool,
}

/// Interface classes a scan can be restricted to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceFilter {
    Ata,
    Scsi,
    Nvme,
    Usb,
}

/// Flags for device enumeration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanFlags {
    /// Empty means every interface
    pub interfaces: Vec<InterfaceFilter>,
    pub open: OpenFlags,
}

impl ScanFlags {
    pub fn allows(&self, interface: InterfaceFilter) -> bool {
        self.interfaces.is_empty() || self.interfaces.contains(&interface)
    }
}

// ==================== DESTRUCTIVE OPERATION PARAMETERS ====================

/// SCSI FORMAT UNIT fast format modes (FFMT field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FastFormatMode {
    /// Change the block size without initializing media; data may become unreadable
    Fast,
    /// Change the block size and leave old data readable where possible
    FastPreserving,
}

impl FastFormatMode {
    pub fn ffmt(&self) -> u8 {
        match self {
            FastFormatMode::Fast => 1,
            FastFormatMode::FastPreserving => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatUnitParams {
    /// None keeps the current logical block size
    pub new_sector_size: Option<u32>,
    pub fast_format: Option<FastFormatMode>,
    /// Initialization pattern written to every block
    pub pattern: Option<Vec<u8>>,
    pub protection_type: Option<u8>,
    pub protection_interval_exponent: Option<u8>,
    pub discard_grown_list: bool,
    pub disable_certification: bool,
    /// Return as soon as the device accepts the command
    pub immediate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum NvmFormatTarget {
    Current,
    SectorSize(u32),
    FormatIndex(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SecureErase {
    #[default]
    None,
    UserData,
    Cryptographic,
}

impl SecureErase {
    pub fn ses(&self) -> u8 {
        match self {
            SecureErase::None => 0,
            SecureErase::UserData => 1,
            SecureErase::Cryptographic => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvmFormatParams {
    pub target: NvmFormatTarget,
    pub secure_erase: SecureErase,
    pub protection_type: Option<u8>,
    /// Protection information in the first bytes of metadata instead of the last
    pub protection_first: bool,
    pub metadata_extended: bool,
    /// None formats every namespace
    pub namespace_id: Option<u32>,
}

impl Default for NvmFormatParams {
    fn default() -> Self {
        Self {
            target: NvmFormatTarget::Current,
            secure_erase: SecureErase::None,
            protection_type: None,
            protection_first: false,
            metadata_extended: false,
            namespace_id: None,
        }
    }
}

/// Operations whose progress can be polled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    FormatUnit,
    NvmFormat,
    Depopulate,
    Repopulate,
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressKind::FormatUnit => write!(f, "format unit"),
            ProgressKind::NvmFormat => write!(f, "NVM format"),
            ProgressKind::Depopulate => write!(f, "depopulate"),
            ProgressKind::Repopulate => write!(f, "repopulate"),
        }
    }
}

// ==================== DEFECT LISTS ====================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DefectListKind {
    Primary,
    Grown,
    Both,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DefectFormat {
    Block,
    BytesFromIndex,
    Physical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefectListRequest {
    pub kind: DefectListKind,
    pub format: DefectFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectList {
    pub kind: DefectListKind,
    pub format: DefectFormat,
    pub entries: Vec<String>,
}

// ==================== REPORTS ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoField {
    pub name: String,
    pub value: String,
}

impl InfoField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReadiness {
    pub ready: bool,
    /// Sense information reported when the unit is not ready
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFormat {
    /// NVMe LBA format index; None for SCSI block lengths
    pub index: Option<u8>,
    pub logical_block_size: u32,
    pub metadata_size: u16,
    pub protection_supported: bool,
    pub relative_performance: Option<String>,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalElement {
    pub identifier: u32,
    pub element_type: u8,
    pub health: u8,
    pub associated_capacity: u64,
    pub restoration_allowed: bool,
}

impl PhysicalElement {
    pub fn type_description(&self) -> &'static str {
        match self.element_type {
            1 => "Storage",
            _ => "Reserved",
        }
    }

    pub fn health_description(&self) -> &'static str {
        match self.health {
            0x00 => "Not reported",
            0x01..=0x63 => "In limit",
            0x64 => "At limit",
            0x65..=0xCF => "Exceeded limit",
            0xFD => "Depopulation completed with errors",
            0xFE => "Depopulation in progress",
            0xFF => "Depopulated",
            _ => "Reserved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    pub page: String,
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartAttribute {
    pub id: u8,
    pub name: String,
    pub current: u8,
    pub worst: u8,
    pub threshold: u8,
    pub raw_value: u64,
    pub flags: String,
    pub failing_now: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SmartData {
    pub overall_passed: Option<bool>,
    /// ATA attribute table
    pub attributes: Vec<SmartAttribute>,
    /// NVMe SMART / health information log
    pub health_log: Vec<InfoField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrentRange {
    pub number: u8,
    pub storage_elements: u8,
    pub starting_lba: u64,
    pub lba_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhyEventCounter {
    pub id: u16,
    pub name: String,
    pub value: u64,
    pub overflow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub kind: ProgressKind,
    pub in_progress: bool,
    pub percent_complete: Option<f64>,
}
