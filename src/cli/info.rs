use super::{CommonArgs, ToolCommand};
use crate::config::{
    ArmedOperations, ConfigError, MaintenanceOperation, QueryOperation, RunConfig, Tool,
};
use crate::transport::{DefectFormat, DefectListKind, DefectListRequest};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "seachest-info")]
#[command(about = "Identification, SMART, defect and statistics reports for storage devices")]
#[command(version)]
pub struct InfoArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Show device information
    #[arg(short = 'i', long = "device-info")]
    pub device_info: bool,

    /// Show low-level transport information
    #[arg(long = "low-level-info")]
    pub low_level_info: bool,

    /// Show SMART attributes or the NVMe health log
    #[arg(long = "smart-attributes")]
    pub smart_attributes: bool,

    /// Show a defect list
    #[arg(long = "show-defects", value_enum, value_name = "LIST")]
    pub show_defects: Option<DefectListKind>,

    /// Address format for --show-defects
    #[arg(long = "defect-format", value_enum, default_value = "block", requires = "show_defects")]
    pub defect_format: DefectFormat,

    /// Show device statistics
    #[arg(long = "device-statistics")]
    pub device_statistics: bool,

    /// Show concurrent positioning ranges (multi-actuator drives)
    #[arg(long = "show-concurrent-ranges")]
    pub show_concurrent_ranges: bool,

    /// Show SATA phy event counters
    #[arg(long = "show-phy-events")]
    pub show_phy_events: bool,

    /// Reset the SATA phy event counters
    #[arg(long = "reinit-phy-events")]
    pub reinit_phy_events: bool,

    /// Reset the device statistics log
    #[arg(long = "reinit-device-statistics")]
    pub reinit_device_statistics: bool,
}

impl InfoArgs {
    fn armed_operations(&self) -> ArmedOperations {
        let mut operations = ArmedOperations::default();

        let queries = [
            (self.device_info, QueryOperation::DeviceInfo),
            (self.low_level_info, QueryOperation::LowLevelInfo),
            (self.smart_attributes, QueryOperation::SmartAttributes),
            (self.device_statistics, QueryOperation::DeviceStatistics),
            (self.show_concurrent_ranges, QueryOperation::ConcurrentRanges),
            (self.show_phy_events, QueryOperation::SataPhyEvents),
        ];
        for (_, query) in queries.into_iter().filter(|(set, _)| *set) {
            operations.query(query);
        }

        if let Some(kind) = self.show_defects {
            operations.query(QueryOperation::DefectList(DefectListRequest {
                kind,
                format: self.defect_format,
            }));
        }

        if self.reinit_phy_events {
            operations.maintain(MaintenanceOperation::ReinitPhyEvents);
        }
        if self.reinit_device_statistics {
            operations.maintain(MaintenanceOperation::ReinitDeviceStatistics);
        }

        operations
    }
}

impl ToolCommand for InfoArgs {
    const TOOL: Tool = Tool::Info;

    fn common(&self) -> &CommonArgs {
        &self.common
    }

    fn into_config(self) -> Result<RunConfig, ConfigError> {
        let operations = self.armed_operations();
        let mut config = self.common.into_config(Self::TOOL)?;
        config.operations = operations;
        config.validate()
    }
}
