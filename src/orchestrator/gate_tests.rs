// Tests for confirmation token checks and the countdown

#[cfg(test)]
mod tests {
    use super::super::gate::{arm, authorize, example_invocation};
    use crate::config::{
        ConfirmationToken, DestructiveOperationRequest, OutputFormat, Tool, Verbosity,
    };
    use crate::transport::{FastFormatMode, FormatUnitParams, NvmFormatParams};
    use crate::ui::{Reporter, SharedBuffer, Sleeper};
    use std::cell::Cell;
    use std::time::Duration;

    const DATA_ERASE: &str = "this-will-erase-data";
    const LOW_LEVEL: &str = "this-will-erase-data-and-may-render-the-drive-inoperable";

    #[derive(Default)]
    struct CountingSleeper {
        ticks: Cell<u32>,
        total: Cell<Duration>,
    }

    impl Sleeper for CountingSleeper {
        fn sleep(&self, duration: Duration) {
            self.ticks.set(self.ticks.get() + 1);
            self.total.set(self.total.get() + duration);
        }
    }

    fn fast_format() -> DestructiveOperationRequest {
        DestructiveOperationRequest::FormatUnit(FormatUnitParams {
            new_sector_size: Some(4096),
            fast_format: Some(FastFormatMode::Fast),
            ..Default::default()
        })
    }

    #[test]
    fn test_matching_token_is_accepted() {
        let request = DestructiveOperationRequest::NvmFormat(NvmFormatParams::default());
        assert_eq!(
            authorize(&request, Some(DATA_ERASE), Tool::Format),
            Ok(ConfirmationToken::DataErase)
        );

        assert_eq!(
            authorize(&fast_format(), Some(LOW_LEVEL), Tool::Format),
            Ok(ConfirmationToken::LowLevelFormat)
        );
    }

    #[test]
    fn test_missing_token_is_rejected_with_example() {
        let request = DestructiveOperationRequest::RemovePhysicalElement { element_id: 4 };
        let rejection = authorize(&request, None, Tool::Format).unwrap_err();

        assert_eq!(rejection.operation, "remove physical element");
        assert_eq!(rejection.required, ConfirmationToken::DataErase);
        assert_eq!(rejection.supplied, None);
        assert_eq!(
            rejection.example,
            "seachest-format -d /dev/sg2 --remove-physical-element 4 --confirm this-will-erase-data"
        );
        assert!(rejection.to_string().contains("--confirm this-will-erase-data"));
    }

    #[test]
    fn test_data_erase_token_does_not_allow_fast_format() {
        let rejection = authorize(&fast_format(), Some(DATA_ERASE), Tool::Format).unwrap_err();

        assert_eq!(rejection.operation, "fast format");
        assert_eq!(rejection.required, ConfirmationToken::LowLevelFormat);
        assert!(rejection.to_string().contains(LOW_LEVEL));
    }

    #[test]
    fn test_low_level_token_does_not_allow_normal_format() {
        let request = DestructiveOperationRequest::FormatUnit(FormatUnitParams::default());
        assert!(authorize(&request, Some(LOW_LEVEL), Tool::Format).is_err());
    }

    #[test]
    fn test_token_must_match_exactly() {
        let request = DestructiveOperationRequest::RepopulateElements;
        for supplied in ["this-will-erase-data ", "This-Will-Erase-Data", "erase", ""] {
            assert!(authorize(&request, Some(supplied), Tool::Format).is_err(), "{:?}", supplied);
        }
    }

    #[test]
    fn test_example_invocations() {
        assert_eq!(
            example_invocation(&fast_format(), Tool::Format),
            format!("seachest-format -d /dev/sg2 --format-unit 4096 --fast-format fast --confirm {}", LOW_LEVEL)
        );
        assert_eq!(
            example_invocation(&DestructiveOperationRequest::SetSectorSize { sector_size: 512 }, Tool::Format),
            format!("seachest-format -d /dev/sg2 --set-sector-size 512 --confirm {}", LOW_LEVEL)
        );
    }

    #[test]
    fn test_arm_counts_down_thirty_ticks() {
        let err = SharedBuffer::new();
        let mut reporter = Reporter::new(
            OutputFormat::Human,
            Verbosity::default(),
            Box::new(SharedBuffer::new()),
            Box::new(err.clone()),
        );
        let sleeper = CountingSleeper::default();

        arm(&fast_format(), &mut reporter, &sleeper);

        assert_eq!(sleeper.ticks.get(), 30);
        assert_eq!(sleeper.total.get(), Duration::from_secs(30));
        let text = err.contents();
        assert!(text.contains("fast format cannot be safely interrupted"));
        assert!(text.contains("Starting in 30 seconds"));
        assert!(text.contains("Starting in  1 seconds"));
    }

    #[test]
    fn test_countdown_is_shown_in_quiet_mode() {
        let err = SharedBuffer::new();
        let mut reporter = Reporter::new(
            OutputFormat::Human,
            Verbosity::Quiet,
            Box::new(SharedBuffer::new()),
            Box::new(err.clone()),
        );
        let sleeper = CountingSleeper::default();

        arm(&DestructiveOperationRequest::RepopulateElements, &mut reporter, &sleeper);

        assert_eq!(sleeper.ticks.get(), 30);
        assert!(err.contents().contains("cannot be safely interrupted"));
    }
}
