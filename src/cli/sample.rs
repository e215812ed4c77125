use super::{CommonArgs, ToolCommand};
use crate::config::{ArmedOperations, ConfigError, QueryOperation, RunConfig, Tool};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "seachest-sample")]
#[command(about = "Minimal device scan, identification and read utility")]
#[command(version)]
pub struct SampleArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Show device information
    #[arg(short = 'i', long = "device-info")]
    pub device_info: bool,

    /// Check whether the device is ready
    #[arg(long = "test-unit-ready")]
    pub test_unit_ready: bool,

    /// Print the contents of one logical block
    #[arg(long = "display-lba", value_name = "LBA")]
    pub display_lba: Option<u64>,
}

impl ToolCommand for SampleArgs {
    const TOOL: Tool = Tool::Sample;

    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn into_config(self) -> Result<RunConfig, ConfigError> {
        let mut operations = ArmedOperations::default();
        if self.device_info {
            operations.query(QueryOperation::DeviceInfo);
        }
        if self.test_unit_ready {
            operations.query(QueryOperation::TestUnitReady);
        }
        if let Some(lba) = self.display_lba {
            operations.query(QueryOperation::DisplayLba(lba));
        }

        let mut config = self.common.into_config(Self::TOOL)?;
        config.operations = operations;
        config.validate()
    }
}
