// Tests for configuration validation and pattern loading

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::transport::{FastFormatMode, FormatUnitParams, NvmFormatParams, ProgressKind};
    use std::fs;
    use tempfile::TempDir;
    use test_case::test_case;

    fn fast_format(sector_size: Option<u32>) -> DestructiveOperationRequest {
        DestructiveOperationRequest::FormatUnit(FormatUnitParams {
            new_sector_size: sector_size,
            fast_format: Some(FastFormatMode::Fast),
            ..Default::default()
        })
    }

    #[test]
    fn test_tokens_are_distinct_exact_strings() {
        assert_eq!(ConfirmationToken::DataErase.as_str(), "this-will-erase-data");
        assert_eq!(
            ConfirmationToken::LowLevelFormat.as_str(),
            "this-will-erase-data-and-may-render-the-drive-inoperable"
        );
        assert!(!ConfirmationToken::DataErase.matches("this-will-erase-data-and-may-render-the-drive-inoperable"));
        assert!(!ConfirmationToken::LowLevelFormat.matches("this-will-erase-data"));
        assert!(!ConfirmationToken::DataErase.matches("THIS-WILL-ERASE-DATA"));
        assert!(!ConfirmationToken::DataErase.matches(" this-will-erase-data"));
    }

    #[test_case(DestructiveOperationRequest::FormatUnit(FormatUnitParams::default()), ConfirmationToken::DataErase, false ; "normal format unit")]
    #[test_case(fast_format(Some(4096)), ConfirmationToken::LowLevelFormat, true ; "fast format")]
    #[test_case(DestructiveOperationRequest::SetSectorSize { sector_size: 4096 }, ConfirmationToken::LowLevelFormat, true ; "set sector size")]
    #[test_case(DestructiveOperationRequest::RemovePhysicalElement { element_id: 3 }, ConfirmationToken::DataErase, true ; "remove element")]
    #[test_case(DestructiveOperationRequest::RepopulateElements, ConfirmationToken::DataErase, true ; "repopulate")]
    #[test_case(DestructiveOperationRequest::NvmFormat(NvmFormatParams::default()), ConfirmationToken::DataErase, false ; "nvm format")]
    fn test_destructive_token_and_risk(
        request: DestructiveOperationRequest,
        token: ConfirmationToken,
        uninterruptible: bool,
    ) {
        assert_eq!(request.accepted_tokens(), &[token]);
        assert_eq!(request.is_uninterruptible(), uninterruptible);
    }

    #[test]
    fn test_second_destructive_operation_is_rejected() {
        let mut operations = ArmedOperations::default();
        operations
            .arm(DestructiveOperationRequest::RepopulateElements)
            .unwrap();

        let err = operations
            .arm(DestructiveOperationRequest::SetSectorSize { sector_size: 512 })
            .unwrap_err();

        assert!(matches!(err, ConfigError::ConflictingDestructive { .. }));
        assert_eq!(err.exit_code(), ExitCode::CommandLineError);
        assert_eq!(
            operations.destructive,
            Some(DestructiveOperationRequest::RepopulateElements)
        );
    }

    #[test]
    fn test_queries_are_ordered_and_deduplicated() {
        let mut operations = ArmedOperations::default();
        operations
            .query(QueryOperation::SataPhyEvents)
            .query(QueryOperation::DeviceInfo)
            .query(QueryOperation::DisplayLba(10))
            .query(QueryOperation::DeviceInfo);

        let queries: Vec<_> = operations.queries.iter().copied().collect();
        assert_eq!(
            queries,
            vec![
                QueryOperation::DeviceInfo,
                QueryOperation::DisplayLba(10),
                QueryOperation::SataPhyEvents
            ]
        );
    }

    #[test]
    fn test_progress_kind_cannot_change() {
        let mut operations = ArmedOperations::default();
        operations.poll_progress(ProgressKind::FormatUnit).unwrap();
        operations.poll_progress(ProgressKind::FormatUnit).unwrap();

        assert!(operations.poll_progress(ProgressKind::NvmFormat).is_err());
    }

    #[test]
    fn test_fast_format_needs_sector_size() {
        let mut config = RunConfig::new(Tool::Format, TargetSpec::AllDevices);
        config.operations.arm(fast_format(None)).unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::FastFormatNeedsSectorSize));
        assert_eq!(err.exit_code(), ExitCode::CommandLineError);
    }

    #[test]
    fn test_fast_format_with_sector_size_is_valid() {
        let mut config = RunConfig::new(Tool::Format, TargetSpec::AllDevices);
        config.operations.arm(fast_format(Some(4096))).unwrap();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nothing_to_do() {
        let config = RunConfig::new(Tool::Info, TargetSpec::AllDevices);
        assert!(matches!(config.validate(), Err(ConfigError::NothingToDo)));
    }

    #[test]
    fn test_scan_needs_no_operations() {
        let mut config = RunConfig::new(Tool::Sample, TargetSpec::AllDevices);
        config.scan = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_all_alone() {
        let (target, warning) = TargetSpec::from_handles(vec!["all".to_string()]).unwrap();
        assert_eq!(target, TargetSpec::AllDevices);
        assert!(warning.is_none());
    }

    #[test]
    fn test_target_all_mixed_with_handles_is_ignored() {
        let handles = vec![
            "/dev/sda".to_string(),
            "all".to_string(),
            "/dev/sdb".to_string(),
            "/dev/sda".to_string(),
        ];
        let (target, warning) = TargetSpec::from_handles(handles).unwrap();

        assert_eq!(
            target,
            TargetSpec::Handles(vec!["/dev/sda".to_string(), "/dev/sdb".to_string()])
        );
        assert!(warning.is_some());
    }

    #[test]
    fn test_target_requires_a_handle() {
        assert!(matches!(
            TargetSpec::from_handles(Vec::new()),
            Err(ConfigError::NoDevice)
        ));
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Verbosity::new(true, 3), Verbosity::Quiet);
        assert_eq!(Verbosity::new(false, 9), Verbosity::Level(4));
        assert_eq!(Verbosity::default().level(), 1);
        assert!(Verbosity::Quiet.is_quiet());
    }

    #[test]
    fn test_repeat_pattern() {
        assert_eq!(load_pattern("repeat:DEADbeef").unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(load_pattern("repeat:0x00").unwrap(), vec![0x00]);
    }

    #[test_case("repeat:" ; "empty")]
    #[test_case("repeat:abc" ; "odd length")]
    #[test_case("repeat:zz" ; "not hex")]
    #[test_case("increment:1" ; "unknown source")]
    fn test_invalid_pattern(source: &str) {
        let err = load_pattern(source).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern(_)));
        assert_eq!(err.exit_code(), ExitCode::CommandLineError);
    }

    #[test]
    fn test_pattern_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pattern.bin");
        fs::write(&path, [0x11, 0x22, 0x33]).unwrap();

        let pattern = load_pattern(&format!("file:{}", path.display())).unwrap();
        assert_eq!(pattern, vec![0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_missing_pattern_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.bin");

        let err = load_pattern(&format!("file:{}", path.display())).unwrap_err();
        assert!(matches!(err, ConfigError::CannotOpenFile { .. }));
        assert_eq!(err.exit_code(), ExitCode::CannotOpenFile);
    }

    #[cfg(unix)]
    #[test]
    fn test_world_writable_pattern_file_is_insecure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pattern.bin");
        fs::write(&path, [0xAA]).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o666)).unwrap();

        let err = load_pattern(&format!("file:{}", path.display())).unwrap_err();
        assert!(matches!(err, ConfigError::InsecurePath(_)));
        assert_eq!(err.exit_code(), ExitCode::InsecurePath);
    }

    #[cfg(unix)]
    #[test]
    fn test_pattern_in_world_writable_directory_is_insecure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let shared = dir.path().join("shared");
        fs::create_dir(&shared).unwrap();
        let path = shared.join("pattern.bin");
        fs::write(&path, [0xAA]).unwrap();
        fs::set_permissions(&shared, fs::Permissions::from_mode(0o777)).unwrap();

        let err = load_pattern(&format!("file:{}", path.display())).unwrap_err();
        assert!(matches!(err, ConfigError::InsecurePath(_)));
    }
}
