// Device targeting and operation orchestration
//
// Organized structure:
// - resolver.rs: -d arguments to open device targets
// - filter.rs: identity predicates
// - gate.rs: confirmation tokens and the uninterruptible countdown
// - dispatcher.rs: per-device operation order
// - aggregator.rs: exit code reduction
// - handle.rs: device guard

pub mod aggregator;
pub mod dispatcher;
pub mod filter;
pub mod gate;
pub mod handle;
pub mod resolver;



#[cfg(test)]
mod gate_tests;



pub use aggregator::{ExitCode, ExitCodeAggregator};
pub use filter::SkipReason;
pub use gate::GateRejection;
pub use handle::{DeviceTarget, TargetState};
pub use resolver::{Resolution, ResolveFailure};

use crate::config::{RunConfig, Tool};
use crate::transport::{
    ConcurrentRange, DefectList, DeviceIdentity, DeviceTransport, InfoField, PhyEventCounter,
    PhysicalElement, Progress, SmartData, Statistic, SupportedFormat, UnitReadiness,
};
use crate::ui::{Reporter, Sleeper};
use crate::{OperationOutcome, Protocol};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Data returned by a successful query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum ReportPayload {
    Fields(Vec<InfoField>),
    Readiness(UnitReadiness),
    Sector { lba: u64, bytes: Vec<u8> },
    Formats(Vec<SupportedFormat>),
    Elements(Vec<PhysicalElement>),
    Smart(SmartData),
    Defects(DefectList),
    Statistics(Vec<Statistic>),
    Ranges(Vec<ConcurrentRange>),
    PhyEvents(Vec<PhyEventCounter>),
    Progress(Progress),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    pub operation: String,
    pub outcome: OperationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportPayload>,
}

impl OperationRecord {
    pub fn success(operation: impl Into<String>, report: Option<ReportPayload>) -> Self {
        Self {
            operation: operation.into(),
            outcome: OperationOutcome::Success,
            message: None,
            report,
        }
    }

    pub fn failure(operation: impl Into<String>, error: &crate::DeviceError) -> Self {
        Self {
            operation: operation.into(),
            outcome: error.outcome(),
            message: Some(error.to_string()),
            report: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub handle: String,
    pub identity: DeviceIdentity,
    pub protocol: Protocol,
    pub state: TargetState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    pub operations: Vec<OperationRecord>,
}

/// Everything a run did, printed as one JSON document in JSON mode
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool: Tool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub devices: Vec<DeviceRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub resolved: usize,
    pub skipped: usize,
    pub exit_code: ExitCode,
    pub exit_status: i32,
}

impl RunSummary {
    fn new(tool: Tool) -> Self {
        let now = Utc::now();
        Self {
            tool,
            started_at: now,
            finished_at: now,
            devices: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            resolved: 0,
            skipped: 0,
            exit_code: ExitCode::NoError,
            exit_status: 0,
        }
    }

    fn finish(mut self, exit_code: ExitCode) -> Self {
        self.finished_at = Utc::now();
        self.exit_code = exit_code;
        self.exit_status = exit_code.value();
        self
    }
}

/// Drives one run: gate, resolve, filter, countdown, dispatch, aggregate
pub struct Orchestrator<'a> {
    transport: &'a dyn DeviceTransport,
    config: &'a RunConfig,
    sleeper: &'a dyn Sleeper,
    elevated: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        transport: &'a dyn DeviceTransport,
        config: &'a RunConfig,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            transport,
            config,
            sleeper,
            elevated: crate::is_running_elevated(),
        }
    }

    /// Override privilege detection
    pub fn with_elevation(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn run(&self, reporter: &mut Reporter) -> RunSummary {
        let config = self.config;
        let mut summary = RunSummary::new(config.tool);
        let mut aggregator = ExitCodeAggregator::new();

        for warning in &config.warnings {
            reporter.warning(warning);
            summary.warnings.push(warning.clone());
        }

        // Token check happens before the transport is touched in any way
        if let Some(request) = &config.operations.destructive {
            if let Err(rejection) = gate::authorize(request, config.confirmation.as_deref(), config.tool) {
                tracing::warn!(operation = request.name(), "Confirmation token rejected");
                reporter.error(&rejection.to_string());
                summary.errors.push(rejection.to_string());
                return summary.finish(ExitCode::CommandLineError);
            }
        }

        let resolution = match resolver::resolve(self.transport, config, self.elevated) {
            Ok(resolution) => resolution,
            Err(failure) => {
                tracing::error!(error = %failure, "Device resolution failed");
                reporter.error(&failure.to_string());
                summary.errors.push(failure.to_string());
                return summary.finish(failure.exit_code);
            }
        };

        for warning in resolution.warnings {
            reporter.warning(&warning);
            summary.warnings.push(warning);
        }

        aggregator.record_resolved(resolution.targets.len());

        let mut admitted = Vec::with_capacity(resolution.targets.len());
        for target in resolution.targets {
            match filter::evaluate(&config.filters, target.device()) {
                Some(reason) => {
                    tracing::info!(device = %target.handle(), reason = %reason, "Skipping device");
                    aggregator.record_skip();
                    reporter.skipped(target.handle(), reason);
                    summary.devices.push(Self::release(target, Some(reason), Vec::new()));
                }
                None => admitted.push(target),
            }
        }

        if config.scan {
            reporter.scan_header();
            for target in admitted {
                reporter.scan_entry(target.device());
                summary.devices.push(Self::release(target, None, Vec::new()));
            }
            return Self::finalize(summary, aggregator, reporter);
        }

        if let Some(request) = &config.operations.destructive {
            if !admitted.is_empty() && request.is_uninterruptible() {
                gate::arm(request, reporter, self.sleeper);
            }
        }

        for target in admitted {
            reporter.device_header(target.device());

            let operations = dispatcher::dispatch(self.transport, target.device(), &config.operations);
            for operation in &operations {
                aggregator.absorb_outcome(operation.outcome);
                reporter.operation(operation);
            }

            // The handle stays open until every operation on it has run
            summary.devices.push(Self::release(target, None, operations));
        }

        Self::finalize(summary, aggregator, reporter)
    }

    fn finalize(
        mut summary: RunSummary,
        aggregator: ExitCodeAggregator,
        reporter: &mut Reporter,
    ) -> RunSummary {
        summary.resolved = aggregator.resolved();
        summary.skipped = aggregator.skipped();
        if summary.resolved > 0 && summary.skipped >= summary.resolved {
            let message = "No device matched the requested filters";
            reporter.error(message);
            summary.errors.push(message.to_string());
        }
        let exit_code = aggregator.finalize();
        summary.finish(exit_code)
    }

    /// Close the target and describe it for the summary
    fn release(
        target: DeviceTarget<'_>,
        skipped: Option<SkipReason>,
        operations: Vec<OperationRecord>,
    ) -> DeviceRecord {
        let handle = target.handle().to_string();
        let identity = target.device().identity.clone();
        let protocol = target.device().effective_protocol();
        target.release();

        DeviceRecord {
            handle,
            identity,
            protocol,
            state: TargetState::Closed,
            skipped,
            operations,
        }
    }
}
