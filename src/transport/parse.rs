//! Parsers for the output of the external storage tools.
//!
//! smartctl and nvme-cli are asked for JSON (`-j`, `-o json`); sg3_utils are parsed from
//! their text output, except GET PHYSICAL ELEMENT STATUS which is decoded from `--raw`.

use super::types::*;
use super::DeviceIdentity;
use crate::{DeviceError, DeviceResult, Protocol};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

// ==================== SMARTCTL JSON ====================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SmartctlReport {
    pub smartctl: SmartctlMeta,
    pub device: SmartctlDevice,
    pub model_name: String,
    #[serde(alias = "scsi_vendor")]
    pub vendor: String,
    #[serde(alias = "scsi_product")]
    pub product: String,
    #[serde(alias = "scsi_revision")]
    pub revision: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub logical_block_size: u32,
    pub physical_block_size: u32,
    pub user_capacity: UserCapacity,
    pub nvme_namespaces: Vec<NvmeNamespace>,
    pub smart_status: Option<SmartStatus>,
    pub ata_smart_attributes: Option<AtaSmartAttributes>,
    pub ata_device_statistics: Option<AtaDeviceStatistics>,
    pub sata_phy_event_counters: Option<SataPhyEventCounters>,
    pub nvme_smart_health_information_log: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SmartctlMeta {
    pub messages: Vec<SmartctlMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SmartctlMessage {
    pub string: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SmartctlDevice {
    pub protocol: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UserCapacity {
    pub blocks: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct NvmeNamespace {
    pub id: u32,
    pub size: UserCapacity,
    pub formatted_lba_size: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SmartStatus {
    pub passed: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AtaSmartAttributes {
    pub table: Vec<AtaAttributeEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AtaAttributeEntry {
    pub id: u8,
    pub name: String,
    pub value: u8,
    pub worst: u8,
    pub thresh: u8,
    pub when_failed: String,
    pub flags: AttributeFlags,
    pub raw: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AttributeFlags {
    pub string: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawValue {
    pub value: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AtaDeviceStatistics {
    pub pages: Vec<StatisticsPage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StatisticsPage {
    pub name: String,
    pub table: Vec<StatisticsEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StatisticsEntry {
    pub name: String,
    pub value: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SataPhyEventCounters {
    pub table: Vec<PhyEventEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PhyEventEntry {
    pub id: u16,
    pub name: String,
    pub value: u64,
    pub overflow: bool,
}

pub(crate) fn parse_smartctl(json: &str) -> DeviceResult<SmartctlReport> {
    serde_json::from_str(json).map_err(|e| DeviceError::parse("smartctl JSON", e.to_string()))
}

pub(crate) fn protocol_from_smartctl(protocol: &str) -> Protocol {
    match protocol.to_ascii_lowercase().as_str() {
        "ata" => Protocol::Ata,
        "scsi" => Protocol::Scsi,
        "nvme" => Protocol::Nvme,
        _ => Protocol::Unknown,
    }
}

/// Build a DeviceIdentity from `smartctl -i -j`
pub(crate) fn identity_from_smartctl(report: &SmartctlReport) -> DeviceIdentity {
    let model = if report.model_name.is_empty() {
        report.product.trim().to_string()
    } else {
        report.model_name.trim().to_string()
    };
    let firmware = if report.firmware_version.is_empty() {
        report.revision.trim().to_string()
    } else {
        report.firmware_version.trim().to_string()
    };

    let namespace = report.nvme_namespaces.first();
    let logical_block_size = match (report.logical_block_size, namespace) {
        (0, Some(ns)) if ns.formatted_lba_size > 0 => ns.formatted_lba_size,
        (0, _) => 512,
        (size, _) => size,
    };
    let capacity_blocks = match (report.user_capacity.blocks, namespace) {
        (0, Some(ns)) => ns.size.blocks,
        (blocks, _) => blocks,
    };

    DeviceIdentity {
        vendor: report.vendor.trim().to_string(),
        model,
        serial: report.serial_number.trim().to_string(),
        firmware,
        child_model: String::new(),
        child_firmware: String::new(),
        protocol: protocol_from_smartctl(&report.device.protocol),
        capacity_blocks,
        logical_block_size,
        physical_block_size: report.physical_block_size.max(logical_block_size),
        namespace_id: namespace.map(|ns| ns.id),
    }
}

pub(crate) fn smart_data_from_smartctl(report: &SmartctlReport) -> SmartData {
    let attributes = report
        .ata_smart_attributes
        .as_ref()
        .map(|attrs| {
            attrs
                .table
                .iter()
                .map(|entry| SmartAttribute {
                    id: entry.id,
                    name: entry.name.clone(),
                    current: entry.value,
                    worst: entry.worst,
                    threshold: entry.thresh,
                    raw_value: entry.raw.value,
                    flags: entry.flags.string.trim().to_string(),
                    failing_now: entry.when_failed == "now",
                })
                .collect()
        })
        .unwrap_or_default();

    let health_log = report
        .nvme_smart_health_information_log
        .as_ref()
        .map(|log| {
            log.iter()
                .map(|(name, value)| InfoField::new(name.clone(), json_scalar(value)))
                .collect()
        })
        .unwrap_or_default();

    SmartData {
        overall_passed: report.smart_status.as_ref().map(|s| s.passed),
        attributes,
        health_log,
    }
}

fn json_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn statistics_from_smartctl(report: &SmartctlReport) -> Vec<Statistic> {
    let mut statistics = Vec::new();

    if let Some(devstat) = &report.ata_device_statistics {
        for page in &devstat.pages {
            for entry in &page.table {
                // Entries without a valid value are flagged invalid by the drive
                if let Some(value) = entry.value {
                    statistics.push(Statistic {
                        page: page.name.clone(),
                        name: entry.name.clone(),
                        value,
                    });
                }
            }
        }
    }

    if let Some(log) = &report.nvme_smart_health_information_log {
        for (name, value) in log {
            if let Some(value) = value.as_i64() {
                statistics.push(Statistic {
                    page: "SMART / Health Information".to_string(),
                    name: name.clone(),
                    value,
                });
            }
        }
    }

    statistics
}

pub(crate) fn phy_events_from_smartctl(report: &SmartctlReport) -> Vec<PhyEventCounter> {
    report
        .sata_phy_event_counters
        .as_ref()
        .map(|counters| {
            counters
                .table
                .iter()
                .map(|entry| PhyEventCounter {
                    id: entry.id,
                    name: entry.name.clone(),
                    value: entry.value,
                    overflow: entry.overflow,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Descriptive fields from `smartctl -i -H -j`, in display order
pub(crate) fn info_fields_from_smartctl(json: &str) -> DeviceResult<Vec<InfoField>> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| DeviceError::parse("smartctl JSON", e.to_string()))?;

    const FIELDS: [(&str, &str); 14] = [
        ("Vendor", "/scsi_vendor"),
        ("Model", "/model_name"),
        ("Model Family", "/model_family"),
        ("Serial Number", "/serial_number"),
        ("Firmware", "/firmware_version"),
        ("WWN", "/wwn/id"),
        ("Capacity", "/user_capacity/bytes"),
        ("Rotation Rate", "/rotation_rate"),
        ("Form Factor", "/form_factor/name"),
        ("ATA Version", "/ata_version/string"),
        ("SATA Version", "/sata_version/string"),
        ("Interface Speed", "/interface_speed/current/string"),
        ("SMART Enabled", "/smart_support/enabled"),
        ("SMART Passed", "/smart_status/passed"),
    ];

    let mut fields: Vec<InfoField> = FIELDS
        .iter()
        .filter_map(|(name, pointer)| {
            let found = value.pointer(pointer)?;
            let text = json_scalar(found);
            (!text.is_empty()).then(|| InfoField::new(*name, text))
        })
        .collect();

    if let Some(hours) = value.pointer("/power_on_time/hours") {
        fields.push(InfoField::new("Power On Hours", json_scalar(hours)));
    }
    if let Some(temp) = value.pointer("/temperature/current") {
        fields.push(InfoField::new("Temperature (C)", json_scalar(temp)));
    }

    Ok(fields)
}

// ==================== NVME-CLI JSON ====================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NvmeIdNamespace {
    flbas: u8,
    dpc: u8,
    fpi: u8,
    lbafs: Vec<NvmeLbaFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NvmeLbaFormat {
    ms: u16,
    ds: u8,
    rp: u8,
}

/// Supported LBA formats from `nvme id-ns -o json`
pub(crate) fn parse_nvme_lba_formats(json: &str) -> DeviceResult<Vec<SupportedFormat>> {
    let ns: NvmeIdNamespace = serde_json::from_str(json)
        .map_err(|e| DeviceError::parse("nvme id-ns JSON", e.to_string()))?;

    let current = ns.flbas & 0x0F;
    let protection_supported = ns.dpc & 0x07 != 0;

    Ok(ns
        .lbafs
        .iter()
        .enumerate()
        // Unused format slots report a zero data size
        .filter(|(_, f)| f.ds >= 9)
        .map(|(index, format)| SupportedFormat {
            index: Some(index as u8),
            logical_block_size: 1u32 << format.ds,
            metadata_size: format.ms,
            protection_supported: protection_supported && format.ms > 0,
            relative_performance: Some(
                match format.rp & 0x03 {
                    0 => "Best",
                    1 => "Better",
                    2 => "Good",
                    _ => "Degraded",
                }
                .to_string(),
            ),
            current: index as u8 == current,
        })
        .collect())
}

/// Index of the LBA format currently in use
pub(crate) fn parse_nvme_current_format(json: &str) -> DeviceResult<u8> {
    let ns: NvmeIdNamespace = serde_json::from_str(json)
        .map_err(|e| DeviceError::parse("nvme id-ns JSON", e.to_string()))?;
    Ok(ns.flbas & 0x0F)
}

/// NVM format progress from the Format Progress Indicator of `nvme id-ns -o json`
pub(crate) fn parse_nvme_format_progress(json: &str) -> DeviceResult<Progress> {
    let ns: NvmeIdNamespace = serde_json::from_str(json)
        .map_err(|e| DeviceError::parse("nvme id-ns JSON", e.to_string()))?;

    if ns.fpi & 0x80 == 0 {
        return Err(DeviceError::Unsupported(
            "namespace does not report format progress".to_string(),
        ));
    }

    // Bits 6:0 hold the percentage remaining
    let remaining = ns.fpi & 0x7F;
    Ok(Progress {
        kind: ProgressKind::NvmFormat,
        in_progress: remaining > 0,
        percent_complete: (remaining > 0).then(|| f64::from(100 - remaining.min(100))),
    })
}

// ==================== SG3_UTILS TEXT ====================

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)progress indication:\s*([0-9]+(?:\.[0-9]+)?)%").unwrap())
}

fn key_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([^=:]+?)\s*[=:]\s*(.+?)\s*$").unwrap())
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(0x[0-9a-fA-F]+|[0-9]+)$").unwrap())
}

/// `sg_requests --progress`: no progress indication means nothing is running
pub(crate) fn parse_progress(kind: ProgressKind, output: &str) -> Progress {
    match progress_regex()
        .captures(output)
        .and_then(|caps| caps[1].parse::<f64>().ok())
    {
        Some(percent) => Progress {
            kind,
            in_progress: true,
            percent_complete: Some(percent),
        },
        None => Progress {
            kind,
            in_progress: false,
            percent_complete: None,
        },
    }
}

/// "name = value" and "name: value" lines as printed by sg_logs
pub(crate) fn parse_key_values(output: &str) -> Vec<InfoField> {
    output
        .lines()
        .filter_map(|line| {
            let caps = key_value_regex().captures(line)?;
            Some(InfoField::new(caps[1].trim(), caps[2].trim()))
        })
        .collect()
}

/// Integer-valued parameters of an sg_logs page
pub(crate) fn parse_log_statistics(page: &str, output: &str) -> Vec<Statistic> {
    parse_key_values(output)
        .into_iter()
        .filter_map(|field| {
            let value = parse_number(&field.value)?;
            Some(Statistic {
                page: page.to_string(),
                name: field.name,
                value: i64::try_from(value).ok()?,
            })
        })
        .collect()
}

pub(crate) fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    if !number_regex().is_match(text) {
        return None;
    }
    match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Supported block lengths VPD page from `sg_vpd --page=sbl`
pub(crate) fn parse_supported_block_lengths(output: &str, current: u32) -> Vec<SupportedFormat> {
    let mut formats: Vec<SupportedFormat> = Vec::new();

    for field in parse_key_values(output) {
        let name = field.name.to_lowercase();
        if name == "logical block length" {
            if let Some(size) = parse_number(&field.value) {
                formats.push(SupportedFormat {
                    index: None,
                    logical_block_size: size as u32,
                    metadata_size: 0,
                    protection_supported: false,
                    relative_performance: None,
                    current: size as u32 == current,
                });
            }
        } else if name.starts_with("p_i_i_sup") || name.starts_with("protection") {
            if let Some(last) = formats.last_mut() {
                last.protection_supported = field.value.trim_start().starts_with('1');
            }
        }
    }

    formats
}

/// Concurrent positioning ranges VPD page from `sg_vpd --page=cpr`
pub(crate) fn parse_concurrent_ranges(output: &str) -> DeviceResult<Vec<ConcurrentRange>> {
    let mut ranges: Vec<ConcurrentRange> = Vec::new();

    for field in parse_key_values(output) {
        let name = field.name.to_lowercase();
        let value = parse_number(&field.value);

        if name == "lba range number" {
            let number = value.ok_or_else(|| {
                DeviceError::parse("concurrent positioning ranges", field.value.clone())
            })?;
            ranges.push(ConcurrentRange {
                number: number as u8,
                storage_elements: 0,
                starting_lba: 0,
                lba_count: 0,
            });
            continue;
        }

        let (Some(range), Some(value)) = (ranges.last_mut(), value) else {
            continue;
        };
        match name.as_str() {
            "number of storage elements" => range.storage_elements = value as u8,
            "starting lba" => range.starting_lba = value,
            "number of lbas" => range.lba_count = value,
            _ => {}
        }
    }

    Ok(ranges)
}

/// Defect list entries from `sginfo -d` / `sginfo -G`.
///
/// sginfo prints a heading per list ("Primary defect list", "Grown defect list"); only the
/// sections matching the requested kind are collected. Block format yields one entry per
/// number, the cylinder/head based formats one joined entry per line.
pub(crate) fn parse_defect_list(request: &DefectListRequest, output: &str) -> DefectList {
    let mut entries = Vec::new();
    let mut collecting = false;

    for line in output.lines() {
        let lower = line.to_lowercase();
        if lower.contains("defect list") {
            collecting = match request.kind {
                DefectListKind::Primary => lower.contains("primary"),
                DefectListKind::Grown => lower.contains("grown"),
                DefectListKind::Both => true,
            };
            continue;
        }
        if !collecting {
            continue;
        }

        let numbers: Vec<&str> = line
            .split_whitespace()
            .filter(|token| number_regex().is_match(token))
            .collect();
        if numbers.is_empty() {
            continue;
        }

        match request.format {
            DefectFormat::Block => entries.extend(numbers.iter().map(|n| n.to_string())),
            DefectFormat::BytesFromIndex | DefectFormat::Physical => {
                entries.push(numbers.join("/"))
            }
        }
    }

    DefectList {
        kind: request.kind,
        format: request.format,
        entries,
    }
}

const ELEMENT_HEADER_LEN: usize = 32;
const ELEMENT_DESCRIPTOR_LEN: usize = 32;

/// Decode GET PHYSICAL ELEMENT STATUS parameter data from `sg_get_elem_status --raw`
pub(crate) fn parse_physical_elements(data: &[u8]) -> DeviceResult<Vec<PhysicalElement>> {
    if data.len() < ELEMENT_HEADER_LEN {
        return Err(DeviceError::parse(
            "physical element status",
            format!("{} bytes is shorter than the header", data.len()),
        ));
    }

    let returned = be_u32(&data[4..8]) as usize;
    let available = (data.len() - ELEMENT_HEADER_LEN) / ELEMENT_DESCRIPTOR_LEN;

    Ok(data[ELEMENT_HEADER_LEN..]
        .chunks_exact(ELEMENT_DESCRIPTOR_LEN)
        .take(returned.min(available))
        .map(|d| PhysicalElement {
            identifier: be_u32(&d[4..8]),
            restoration_allowed: d[13] & 0x01 != 0,
            element_type: d[14],
            health: d[15],
            associated_capacity: be_u64(&d[16..24]),
        })
        .collect())
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}
