// Command-line front-ends
//
// Each binary has its own clap parser (format.rs, info.rs, sample.rs) that flattens
// CommonArgs and turns its operation flags into ArmedOperations. run() is the shared
// process entry point.

pub mod format;
pub mod info;
pub mod sample;


use crate::config::{
    ConfigError, FilterCriteria, OutputFormat, RunConfig, TargetSpec, Tool, Verbosity,
};
use crate::orchestrator::{ExitCode, Orchestrator};
use crate::transport::{
    DeviceTransport, InterfaceFilter, NvmFormatTarget, OpenFlags, ScanFlags, SystemTransport,
};
use crate::ui::{Reporter, Sleeper, ThreadSleeper};
use crate::Protocol;
use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser};
use std::str::FromStr;

/// Flags every front-end accepts
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Device handle such as /dev/sg2, or "all" for every device. Repeatable.
    #[arg(short = 'd', long = "device", value_name = "HANDLE", action = ArgAction::Append)]
    pub devices: Vec<String>,

    /// List the devices instead of running operations
    #[arg(short = 's', long)]
    pub scan: bool,

    /// Restrict "all" and --scan to these interfaces
    #[arg(long = "scan-flags", value_enum, value_delimiter = ',')]
    pub scan_flags: Vec<InterfaceFilter>,

    /// Only operate on Seagate family drives
    #[arg(long = "only-seagate")]
    pub only_seagate: bool,

    /// Only operate on drives whose model contains this text
    #[arg(long = "model-match", value_name = "TEXT")]
    pub model_match: Option<String>,

    /// Only operate on drives with exactly this firmware revision
    #[arg(long = "fw-match", value_name = "REVISION")]
    pub firmware_match: Option<String>,

    /// Only operate on drives behind a bridge whose model contains this text
    #[arg(long = "child-model-match", value_name = "TEXT")]
    pub child_model_match: Option<String>,

    /// Only operate on drives behind a bridge with exactly this firmware revision
    #[arg(long = "child-fw-match", value_name = "REVISION")]
    pub child_firmware_match: Option<String>,

    /// Talk to the device as ATA
    #[arg(long = "force-ata")]
    pub force_ata: bool,

    /// Talk to the device as SCSI
    #[arg(long = "force-scsi")]
    pub force_scsi: bool,

    /// Talk to the device as NVMe
    #[arg(long = "force-nvme")]
    pub force_nvme: bool,

    /// Use 12-byte SAT pass-through
    #[arg(long = "force-12-byte-sat")]
    pub sat_12_byte: bool,

    /// Try vendor-specific USB bridge pass-through
    #[arg(long = "enable-legacy-usb-passthrough")]
    pub legacy_usb_passthrough: bool,

    /// Output verbosity, 0 (errors only) to 4 (trace)
    #[arg(short = 'v', long = "verbose", value_name = "LEVEL", default_value_t = Verbosity::DEFAULT_LEVEL,
          value_parser = clap::value_parser!(u8).range(0..=4))]
    pub verbose: u8,

    /// Print nothing; only the exit code reports the result
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Output format
    #[arg(long = "output-format", value_enum, default_value_t, env = "SEACHEST_OUTPUT_FORMAT")]
    pub output_format: OutputFormat,
}

impl CommonArgs {
    fn forced_protocol(&self) -> Result<Option<Protocol>, ConfigError> {
        let forced: Vec<Protocol> = [
            (self.force_ata, Protocol::Ata),
            (self.force_scsi, Protocol::Scsi),
            (self.force_nvme, Protocol::Nvme),
        ]
        .into_iter()
        .filter_map(|(set, protocol)| set.then_some(protocol))
        .collect();

        match forced.as_slice() {
            [] => Ok(None),
            [protocol] => Ok(Some(*protocol)),
            _ => Err(ConfigError::ConflictingProtocols),
        }
    }

    /// Build the run configuration shared by every front-end; operation flags are added by
    /// the caller before `RunConfig::validate`.
    pub fn into_config(self, tool: Tool) -> Result<RunConfig, ConfigError> {
        let open_flags = OpenFlags {
            forced_protocol: self.forced_protocol()?,
            legacy_usb_passthrough: self.legacy_usb_passthrough,
            sat_12_byte: self.sat_12_byte,
        };

        let (target, warning) = if self.devices.is_empty() && self.scan {
            (TargetSpec::AllDevices, None)
        } else {
            TargetSpec::from_handles(self.devices)?
        };

        let mut config = RunConfig::new(tool, target);
        config.scan = self.scan;
        config.open_flags = open_flags;
        config.scan_flags = ScanFlags {
            interfaces: self.scan_flags,
            open: open_flags,
        };
        config.filters = FilterCriteria {
            seagate_only: self.only_seagate,
            model: self.model_match,
            firmware: self.firmware_match,
            child_model: self.child_model_match,
            child_firmware: self.child_firmware_match,
        };
        config.verbosity = Verbosity::new(self.quiet, self.verbose);
        config.output_format = self.output_format;
        config.warnings.extend(warning);
        Ok(config)
    }
}

/// A front-end parser
pub trait ToolCommand: Parser {
    const TOOL: Tool;

    fn common(&self) -> &CommonArgs;

    /// Validate the parsed flags into a run configuration
    fn into_config(self) -> Result<RunConfig, ConfigError>;
}

/// `current` or a size in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeArg {
    Current,
    Bytes(u32),
}

impl SizeArg {
    pub fn bytes(&self) -> Option<u32> {
        match self {
            SizeArg::Current => None,
            SizeArg::Bytes(size) => Some(*size),
        }
    }
}

impl FromStr for SizeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("current") {
            return Ok(SizeArg::Current);
        }
        parse_sector_size(s).map(SizeArg::Bytes).map_err(|_| {
            format!(
                "expected \"current\" or a sector size of at least {}, got {}",
                MIN_SECTOR_SIZE, s
            )
        })
    }
}

/// Smallest logical sector size a drive can be formatted to
pub const MIN_SECTOR_SIZE: u32 = 512;

/// Value parser for flags that take a sector size in bytes
pub fn parse_sector_size(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(size) if size >= MIN_SECTOR_SIZE => Ok(size),
        _ => Err(format!("expected a sector size of at least {}, got {}", MIN_SECTOR_SIZE, s)),
    }
}

/// NVM format target: `current`, a sector size, or `format:<index>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvmTargetArg(pub NvmFormatTarget);

impl FromStr for NvmTargetArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(index) = s.strip_prefix("format:") {
            return index
                .parse::<u8>()
                .ok()
                .filter(|i| *i < 64)
                .map(|i| NvmTargetArg(NvmFormatTarget::FormatIndex(i)))
                .ok_or_else(|| format!("invalid LBA format index {}", index));
        }
        match s.parse::<SizeArg>()? {
            SizeArg::Current => Ok(NvmTargetArg(NvmFormatTarget::Current)),
            SizeArg::Bytes(size) => Ok(NvmTargetArg(NvmFormatTarget::SectorSize(size))),
        }
    }
}

/// Exit code for a clap parse result; help and version are not errors
pub fn clap_exit_code(error: &clap::Error) -> ExitCode {
    match error.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            ExitCode::NoError
        }
        _ => ExitCode::CommandLineError,
    }
}

/// Run one configuration to completion and write the summary
pub fn execute(
    transport: &dyn DeviceTransport,
    config: &RunConfig,
    sleeper: &dyn Sleeper,
    reporter: &mut Reporter,
) -> Result<ExitCode> {
    let summary = Orchestrator::new(transport, config, sleeper).run(reporter);
    reporter
        .summary(&summary)
        .context("Failed to write the run summary")?;
    Ok(summary.exit_code)
}

/// Process entry point shared by the binaries
pub fn run<C: ToolCommand>() -> std::process::ExitCode {
    let command = match C::try_parse() {
        Ok(command) => command,
        Err(e) => {
            let code = clap_exit_code(&e);
            let _ = e.print();
            return code.into();
        }
    };

    let quiet = command.common().quiet;
    let config = match command.into_config() {
        Ok(config) => config,
        Err(e) => {
            if !quiet {
                eprintln!("{}: {}", C::TOOL, e);
            }
            return e.exit_code().into();
        }
    };

    crate::logging::init(config.verbosity);
    if config.output_format == OutputFormat::Json {
        colored::control::set_override(false);
    }

    if let Err(e) = setup_signal_handlers() {
        tracing::warn!(error = %e, "Interrupt handler not installed");
    }

    let transport = SystemTransport::new();
    let mut reporter = Reporter::stdio(config.output_format, config.verbosity);

    match execute(&transport, &config, &ThreadSleeper, &mut reporter) {
        Ok(code) => code.into(),
        Err(e) => {
            if !quiet {
                eprintln!("{}: {:#}", C::TOOL, e);
            }
            ExitCode::OperationFailure.into()
        }
    }
}

// An interrupt ends the process; there is no in-process cancellation
fn setup_signal_handlers() -> Result<()> {
    use signal_hook::{consts::SIGINT, iterator::Signals};

    let mut signals = Signals::new([SIGINT])?;

    std::thread::spawn(move || {
        if let Some(SIGINT) = signals.forever().next() {
            eprintln!("\n\nInterrupt received, aborting.");
            std::process::exit(ExitCode::OperationAborted.value());
        }
    });

    Ok(())
}
