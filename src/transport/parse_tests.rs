/// Tests for the tool output parsers

#[cfg(test)]
mod parse_tests {
    use super::super::parse::*;
    use super::super::types::*;
    use crate::{DeviceError, Protocol};

    const SATA_IDENTITY: &str = r#"{
        "smartctl": {"version": [7, 3], "exit_status": 0},
        "device": {"name": "/dev/sda", "type": "sat", "protocol": "ATA"},
        "model_name": "ST4000NM0035-1V4107",
        "serial_number": "ZC1234AB",
        "firmware_version": "TNC3",
        "user_capacity": {"blocks": 7814037168, "bytes": 4000787030016},
        "logical_block_size": 512,
        "physical_block_size": 4096,
        "smart_status": {"passed": true}
    }"#;

    const SAS_IDENTITY: &str = r#"{
        "device": {"name": "/dev/sdb", "type": "scsi", "protocol": "SCSI"},
        "scsi_vendor": "SEAGATE",
        "scsi_product": "ST600MM0088",
        "scsi_revision": "N003",
        "serial_number": "W0M1ABCD",
        "user_capacity": {"blocks": 1172123568, "bytes": 600127266816},
        "logical_block_size": 512
    }"#;

    const NVME_IDENTITY: &str = r#"{
        "device": {"name": "/dev/nvme0n1", "type": "nvme", "protocol": "NVMe"},
        "model_name": "Samsung SSD 980 PRO 1TB",
        "serial_number": "S5GXNF0R123456",
        "firmware_version": "5B2QGXA7",
        "nvme_namespaces": [
            {"id": 1, "size": {"blocks": 1953525168, "bytes": 1000204886016}, "formatted_lba_size": 512}
        ]
    }"#;

    #[test]
    fn test_identity_from_sata_report() {
        let report = parse_smartctl(SATA_IDENTITY).unwrap();
        let identity = identity_from_smartctl(&report);

        assert_eq!(identity.model, "ST4000NM0035-1V4107");
        assert_eq!(identity.firmware, "TNC3");
        assert_eq!(identity.protocol, Protocol::Ata);
        assert_eq!(identity.capacity_blocks, 7814037168);
        assert_eq!(identity.logical_block_size, 512);
        assert_eq!(identity.physical_block_size, 4096);
        assert_eq!(identity.namespace_id, None);
    }

    #[test]
    fn test_identity_from_scsi_report_uses_inquiry_strings() {
        let report = parse_smartctl(SAS_IDENTITY).unwrap();
        let identity = identity_from_smartctl(&report);

        assert_eq!(identity.vendor, "SEAGATE");
        assert_eq!(identity.model, "ST600MM0088");
        assert_eq!(identity.firmware, "N003");
        assert_eq!(identity.protocol, Protocol::Scsi);
        assert_eq!(identity.physical_block_size, 512);
    }

    #[test]
    fn test_identity_from_nvme_report_uses_namespace() {
        let report = parse_smartctl(NVME_IDENTITY).unwrap();
        let identity = identity_from_smartctl(&report);

        assert_eq!(identity.protocol, Protocol::Nvme);
        assert_eq!(identity.capacity_blocks, 1953525168);
        assert_eq!(identity.logical_block_size, 512);
        assert_eq!(identity.namespace_id, Some(1));
    }

    #[test]
    fn test_unknown_protocol_string() {
        assert_eq!(protocol_from_smartctl("ATA"), Protocol::Ata);
        assert_eq!(protocol_from_smartctl("nvme"), Protocol::Nvme);
        assert_eq!(protocol_from_smartctl(""), Protocol::Unknown);
        assert_eq!(protocol_from_smartctl("usbcypress"), Protocol::Unknown);
    }

    #[test]
    fn test_invalid_smartctl_json() {
        let err = parse_smartctl("not json").unwrap_err();
        assert!(matches!(err, DeviceError::ParseFailed { .. }));
    }

    #[test]
    fn test_smart_attributes_and_failing_flag() {
        let json = r#"{
            "smart_status": {"passed": false},
            "ata_smart_attributes": {"table": [
                {"id": 5, "name": "Reallocated_Sector_Ct", "value": 1, "worst": 1, "thresh": 10,
                 "when_failed": "now", "flags": {"string": "PO--CK "}, "raw": {"value": 4088}},
                {"id": 9, "name": "Power_On_Hours", "value": 91, "worst": 91, "thresh": 0,
                 "when_failed": "", "flags": {"string": "-O--CK "}, "raw": {"value": 8123}}
            ]}
        }"#;

        let data = smart_data_from_smartctl(&parse_smartctl(json).unwrap());

        assert_eq!(data.overall_passed, Some(false));
        assert_eq!(data.attributes.len(), 2);
        assert!(data.attributes[0].failing_now);
        assert_eq!(data.attributes[0].raw_value, 4088);
        assert_eq!(data.attributes[0].flags, "PO--CK");
        assert!(!data.attributes[1].failing_now);
        assert!(data.health_log.is_empty());
    }

    #[test]
    fn test_nvme_health_log_becomes_fields_and_statistics() {
        let json = r#"{
            "nvme_smart_health_information_log": {
                "critical_warning": 0,
                "temperature": 310,
                "percentage_used": 2
            }
        }"#;
        let report = parse_smartctl(json).unwrap();

        let data = smart_data_from_smartctl(&report);
        assert_eq!(data.overall_passed, None);
        assert_eq!(data.health_log.len(), 3);
        assert!(data
            .health_log
            .iter()
            .any(|f| f.name == "temperature" && f.value == "310"));

        let stats = statistics_from_smartctl(&report);
        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|s| s.page == "SMART / Health Information"));
    }

    #[test]
    fn test_ata_device_statistics_skip_invalid_entries() {
        let json = r#"{
            "ata_device_statistics": {"pages": [
                {"number": 1, "name": "General Statistics", "table": [
                    {"name": "Lifetime Power-On Resets", "value": 42},
                    {"name": "Power-on Hours", "value": 8123},
                    {"name": "Logical Sectors Written"}
                ]}
            ]}
        }"#;

        let stats = statistics_from_smartctl(&parse_smartctl(json).unwrap());

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].page, "General Statistics");
        assert_eq!(stats[1].value, 8123);
    }

    #[test]
    fn test_phy_event_counters() {
        let json = r#"{
            "sata_phy_event_counters": {"table": [
                {"id": 1, "name": "Command failed due to ICRC error", "value": 0, "overflow": false},
                {"id": 10, "name": "Device-to-host register FISes sent due to a COMRESET", "value": 3, "overflow": false}
            ]}
        }"#;

        let counters = phy_events_from_smartctl(&parse_smartctl(json).unwrap());

        assert_eq!(counters.len(), 2);
        assert_eq!(counters[1].id, 10);
        assert_eq!(counters[1].value, 3);
    }

    #[test]
    fn test_info_fields_skip_missing_entries() {
        let fields = info_fields_from_smartctl(SATA_IDENTITY).unwrap();

        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Model", "Serial Number", "Firmware", "Capacity", "SMART Passed"]
        );
        assert_eq!(fields[3].value, "4000787030016");
        assert_eq!(fields[4].value, "true");
    }

    const NVME_ID_NS: &str = r#"{
        "nsze": 1953525168,
        "flbas": 1,
        "dpc": 7,
        "fpi": 128,
        "lbafs": [
            {"ms": 0, "ds": 9, "rp": 2},
            {"ms": 0, "ds": 12, "rp": 0},
            {"ms": 8, "ds": 12, "rp": 1},
            {"ms": 0, "ds": 0, "rp": 0}
        ]
    }"#;

    #[test]
    fn test_nvme_lba_formats() {
        let formats = parse_nvme_lba_formats(NVME_ID_NS).unwrap();

        assert_eq!(formats.len(), 3);
        assert_eq!(formats[0].logical_block_size, 512);
        assert_eq!(formats[0].relative_performance.as_deref(), Some("Good"));
        assert!(!formats[0].current);
        assert_eq!(formats[1].index, Some(1));
        assert_eq!(formats[1].logical_block_size, 4096);
        assert!(formats[1].current);
        assert!(!formats[1].protection_supported);
        assert!(formats[2].protection_supported);
        assert_eq!(formats[2].metadata_size, 8);
    }

    #[test]
    fn test_nvme_current_format() {
        assert_eq!(parse_nvme_current_format(NVME_ID_NS).unwrap(), 1);
    }

    #[test]
    fn test_nvme_format_progress_idle() {
        let progress = parse_nvme_format_progress(NVME_ID_NS).unwrap();

        assert_eq!(progress.kind, ProgressKind::NvmFormat);
        assert!(!progress.in_progress);
        assert_eq!(progress.percent_complete, None);
    }

    #[test]
    fn test_nvme_format_progress_running() {
        // Supported bit set, 40 percent remaining
        let json = format!(r#"{{"fpi": {}}}"#, 0x80 | 40);
        let progress = parse_nvme_format_progress(&json).unwrap();

        assert!(progress.in_progress);
        assert_eq!(progress.percent_complete, Some(60.0));
    }

    #[test]
    fn test_nvme_format_progress_not_reported() {
        let err = parse_nvme_format_progress(r#"{"fpi": 0}"#).unwrap_err();
        assert!(matches!(err, DeviceError::Unsupported(_)));
    }

    #[test]
    fn test_sg_requests_progress() {
        let output = "Decode parameter data as sense data:\n Fixed format, current; Sense key: Not Ready\n  Progress indication: 37.25%\n";
        let progress = parse_progress(ProgressKind::FormatUnit, output);

        assert!(progress.in_progress);
        assert_eq!(progress.percent_complete, Some(37.25));
    }

    #[test]
    fn test_sg_requests_without_progress() {
        let progress = parse_progress(ProgressKind::Depopulate, "No sense data\n");

        assert_eq!(progress.kind, ProgressKind::Depopulate);
        assert!(!progress.in_progress);
        assert_eq!(progress.percent_complete, None);
    }

    #[test]
    fn test_key_values_accept_both_separators() {
        let fields = parse_key_values("Format status page  [0x8]\n  Last format data out: 0\n  Grown defects during certification = 12\n");

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "Last format data out");
        assert_eq!(fields[1].value, "12");
    }

    #[test]
    fn test_log_statistics_keep_numeric_values() {
        let output = "General statistics and performance [0x19]\n  Number of read commands = 1234\n  Logical blocks written = 0x10\n  Idle time = not available\n";
        let stats = parse_log_statistics("General", output);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].value, 1234);
        assert_eq!(stats[1].value, 16);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096"), Some(4096));
        assert_eq!(parse_number(" 0x1F "), Some(31));
        assert_eq!(parse_number("12 blocks"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_supported_block_lengths() {
        let output = "Supported block lengths and protection types VPD page:\n  Logical block length: 512\n    P_I_I_SUP: 1\n  Logical block length: 4096\n    P_I_I_SUP: 0\n";
        let formats = parse_supported_block_lengths(output, 4096);

        assert_eq!(formats.len(), 2);
        assert!(formats[0].protection_supported);
        assert!(!formats[0].current);
        assert!(!formats[1].protection_supported);
        assert!(formats[1].current);
        assert_eq!(formats[1].index, None);
    }

    #[test]
    fn test_concurrent_ranges() {
        let output = "Concurrent positioning ranges VPD page:\n  LBA range number: 0\n    Number of storage elements: 1\n    Starting LBA: 0x0\n    Number of LBAs: 0x3a386030\n  LBA range number: 1\n    Number of storage elements: 1\n    Starting LBA: 0x3a386030\n    Number of LBAs: 0x3a386030\n";
        let ranges = parse_concurrent_ranges(output).unwrap();

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].number, 1);
        assert_eq!(ranges[1].starting_lba, 0x3a386030);
        assert_eq!(ranges[0].lba_count, 0x3a386030);
        assert_eq!(ranges[0].storage_elements, 1);
    }

    #[test]
    fn test_concurrent_ranges_bad_range_number() {
        let err = parse_concurrent_ranges("LBA range number: first\n").unwrap_err();
        assert!(matches!(err, DeviceError::ParseFailed { .. }));
    }

    const SGINFO_DEFECTS: &str = "Primary defect list:\n  1024 2048\n  4096\nGrown defect list:\n  77\n";

    #[test]
    fn test_defect_list_primary_only() {
        let request = DefectListRequest {
            kind: DefectListKind::Primary,
            format: DefectFormat::Block,
        };
        let list = parse_defect_list(&request, SGINFO_DEFECTS);

        assert_eq!(list.entries, vec!["1024", "2048", "4096"]);
        assert_eq!(list.kind, DefectListKind::Primary);
    }

    #[test]
    fn test_defect_list_both_sections() {
        let request = DefectListRequest {
            kind: DefectListKind::Both,
            format: DefectFormat::Block,
        };
        let list = parse_defect_list(&request, SGINFO_DEFECTS);

        assert_eq!(list.entries.len(), 4);
        assert_eq!(list.entries[3], "77");
    }

    #[test]
    fn test_defect_list_physical_joins_line() {
        let request = DefectListRequest {
            kind: DefectListKind::Grown,
            format: DefectFormat::Physical,
        };
        let list = parse_defect_list(&request, "Grown defect list:\n  120 3 4410\n");

        assert_eq!(list.entries, vec!["120/3/4410"]);
    }

    fn element_descriptor(id: u32, restorable: bool, health: u8, capacity: u64) -> Vec<u8> {
        let mut d = vec![0u8; 32];
        d[4..8].copy_from_slice(&id.to_be_bytes());
        d[13] = u8::from(restorable);
        d[14] = 1;
        d[15] = health;
        d[16..24].copy_from_slice(&capacity.to_be_bytes());
        d
    }

    #[test]
    fn test_physical_elements() {
        let mut data = vec![0u8; 32];
        data[4..8].copy_from_slice(&2u32.to_be_bytes());
        data.extend(element_descriptor(1, false, 0x01, 1_000_000));
        data.extend(element_descriptor(2, true, 0xFF, 2_000_000));

        let elements = parse_physical_elements(&data).unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].identifier, 1);
        assert_eq!(elements[0].health_description(), "In limit");
        assert_eq!(elements[1].associated_capacity, 2_000_000);
        assert!(elements[1].restoration_allowed);
        assert_eq!(elements[1].health_description(), "Depopulated");
        assert_eq!(elements[1].type_description(), "Storage");
    }

    #[test]
    fn test_physical_elements_truncated_descriptors() {
        // Header claims three descriptors but only one is present
        let mut data = vec![0u8; 32];
        data[4..8].copy_from_slice(&3u32.to_be_bytes());
        data.extend(element_descriptor(7, false, 0x64, 10));

        let elements = parse_physical_elements(&data).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].health_description(), "At limit");
    }

    #[test]
    fn test_physical_elements_short_header() {
        let err = parse_physical_elements(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, DeviceError::ParseFailed { .. }));
    }
}
