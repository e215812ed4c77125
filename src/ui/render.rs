use super::countdown::{countdown, Sleeper};
use crate::config::{OutputFormat, Verbosity};
use crate::orchestrator::{OperationRecord, ReportPayload, RunSummary, SkipReason};
use crate::transport::{DeviceHandle, Progress, SmartData};
use colored::Colorize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

const BAR_WIDTH: usize = 40;
const HEX_DUMP_WIDTH: usize = 16;

/// Writes run output to stdout and diagnostics to stderr.
///
/// Human mode streams results as they arrive. JSON mode only prints the final summary on
/// stdout; warnings and errors still go to stderr as text. Quiet mode silences everything
/// except the uninterruptible-operation countdown and the JSON summary.
pub struct Reporter {
    format: OutputFormat,
    verbosity: Verbosity,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl Reporter {
    pub fn new(
        format: OutputFormat,
        verbosity: Verbosity,
        out: Box<dyn Write>,
        err: Box<dyn Write>,
    ) -> Self {
        Self {
            format,
            verbosity,
            out,
            err,
        }
    }

    pub fn stdio(format: OutputFormat, verbosity: Verbosity) -> Self {
        Self::new(
            format,
            verbosity,
            Box::new(io::stdout()),
            Box::new(io::stderr()),
        )
    }

    fn human(&self) -> bool {
        self.format == OutputFormat::Human && !self.verbosity.is_quiet()
    }

    fn emit(result: io::Result<()>) {
        if let Err(e) = result {
            tracing::debug!(error = %e, "Failed to write output");
        }
    }

    pub fn warning(&mut self, message: &str) {
        if self.verbosity.is_quiet() {
            return;
        }
        Self::emit(writeln!(self.err, "{} {}", "WARNING:".yellow().bold(), message));
    }

    pub fn error(&mut self, message: &str) {
        if self.verbosity.is_quiet() {
            return;
        }
        Self::emit(writeln!(self.err, "{} {}", "ERROR:".red().bold(), message));
    }

    pub fn skipped(&mut self, handle: &str, reason: SkipReason) {
        if self.human() {
            Self::emit(writeln!(self.out, "{} - skipped, {}", handle, reason));
        }
    }

    pub fn scan_header(&mut self) {
        if self.human() {
            Self::emit(writeln!(
                self.out,
                "{:<10} {:<16} {:<40} {:<20} {:<10}",
                "Vendor", "Handle", "Model Number", "Serial Number", "FwRev"
            ));
        }
    }

    pub fn scan_entry(&mut self, device: &DeviceHandle) {
        if self.human() {
            let identity = &device.identity;
            let vendor = if identity.vendor.is_empty() {
                device.effective_protocol().to_string()
            } else {
                identity.vendor.clone()
            };
            Self::emit(writeln!(
                self.out,
                "{:<10} {:<16} {:<40} {:<20} {:<10}",
                vendor, device.path, identity.model, identity.serial, identity.firmware
            ));
        }
    }

    pub fn device_header(&mut self, device: &DeviceHandle) {
        if self.human() {
            let identity = &device.identity;
            Self::emit(writeln!(
                self.out,
                "\n{} - {} - {} - {} - {}",
                device.path,
                identity.model,
                identity.serial,
                identity.firmware,
                device.effective_protocol()
            ));
            Self::emit(writeln!(self.out, "{}", "=".repeat(60)));
        }
    }

    pub fn operation(&mut self, record: &OperationRecord) {
        if !self.human() {
            return;
        }
        let status = if record.outcome.is_success() {
            record.outcome.to_string().green()
        } else {
            record.outcome.to_string().red()
        };
        Self::emit(writeln!(self.out, "{}: {}", record.operation, status));
        if let Some(message) = &record.message {
            Self::emit(writeln!(self.out, "  {}", message));
        }
        if let Some(report) = &record.report {
            Self::emit(write_payload(&mut self.out, report));
        }
    }

    /// Fixed warning block shown before an operation that must not be interrupted
    pub fn uninterruptible_warning(&mut self, operation: &str) {
        let banner = "!".repeat(60);
        Self::emit(writeln!(self.err, "{}", banner.red().bold()));
        Self::emit(writeln!(
            self.err,
            "{}",
            format!("WARNING: {} cannot be safely interrupted.", operation)
                .red()
                .bold()
        ));
        Self::emit(writeln!(
            self.err,
            "Removing power, resetting the host or the bus while it runs can leave the"
        ));
        Self::emit(writeln!(
            self.err,
            "drive unusable. Do not run it on drives that share a controller with other"
        ));
        Self::emit(writeln!(self.err, "drives being formatted at the same time."));
        Self::emit(writeln!(self.err, "{}", banner.red().bold()));
    }

    pub fn countdown(&mut self, seconds: u32, sleeper: &dyn Sleeper) {
        Self::emit(countdown(&mut self.err, seconds, sleeper));
    }

    /// Final output: the JSON document, or the exit status in verbose human mode
    pub fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut self.out, summary)?;
                writeln!(self.out)?;
            }
            OutputFormat::Human if self.verbosity.level() >= 2 => {
                writeln!(
                    self.out,
                    "\n{} device(s) resolved, {} skipped, exit status {}",
                    summary.resolved, summary.skipped, summary.exit_code
                )?;
            }
            OutputFormat::Human => {}
        }
        self.out.flush()
    }
}

fn write_payload(w: &mut dyn Write, payload: &ReportPayload) -> io::Result<()> {
    match payload {
        ReportPayload::Fields(fields) => {
            for field in fields {
                writeln!(w, "  {:<28} {}", field.name, field.value)?;
            }
        }
        ReportPayload::Readiness(readiness) => match (&readiness.detail, readiness.ready) {
            (_, true) => writeln!(w, "  Unit is ready")?,
            (Some(detail), false) => writeln!(w, "  Unit is not ready: {}", detail)?,
            (None, false) => writeln!(w, "  Unit is not ready")?,
        },
        ReportPayload::Sector { lba, bytes } => {
            writeln!(w, "  LBA {}", lba)?;
            write_hex_dump(w, bytes)?;
        }
        ReportPayload::Formats(formats) => {
            writeln!(
                w,
                "  {:<6} {:>10} {:>9} {:<10} {:<11} {}",
                "Index", "Block Size", "Metadata", "Protection", "Performance", "Current"
            )?;
            for format in formats {
                writeln!(
                    w,
                    "  {:<6} {:>10} {:>9} {:<10} {:<11} {}",
                    format.index.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string()),
                    format.logical_block_size,
                    format.metadata_size,
                    if format.protection_supported { "yes" } else { "no" },
                    format.relative_performance.as_deref().unwrap_or("-"),
                    if format.current { "*" } else { "" }
                )?;
            }
        }
        ReportPayload::Elements(elements) => {
            writeln!(
                w,
                "  {:>8} {:<10} {:<34} {:>16} {}",
                "Element", "Type", "Health", "Capacity", "Restorable"
            )?;
            for element in elements {
                writeln!(
                    w,
                    "  {:>8} {:<10} {:<34} {:>16} {}",
                    element.identifier,
                    element.type_description(),
                    element.health_description(),
                    element.associated_capacity,
                    if element.restoration_allowed { "yes" } else { "no" }
                )?;
            }
        }
        ReportPayload::Smart(smart) => write_smart(w, smart)?,
        ReportPayload::Defects(list) => {
            writeln!(w, "  {:?} list, {:?} format: {} defects", list.kind, list.format, list.entries.len())?;
            for entry in &list.entries {
                writeln!(w, "    {}", entry)?;
            }
        }
        ReportPayload::Statistics(statistics) => {
            let mut page = None;
            for statistic in statistics {
                if page != Some(statistic.page.as_str()) {
                    writeln!(w, "  {}", statistic.page)?;
                    page = Some(statistic.page.as_str());
                }
                writeln!(w, "    {:<48} {}", statistic.name, statistic.value)?;
            }
        }
        ReportPayload::Ranges(ranges) => {
            writeln!(w, "  {:>5} {:>8} {:>20} {:>20}", "Range", "Elements", "Starting LBA", "LBA Count")?;
            for range in ranges {
                writeln!(
                    w,
                    "  {:>5} {:>8} {:>20} {:>20}",
                    range.number, range.storage_elements, range.starting_lba, range.lba_count
                )?;
            }
        }
        ReportPayload::PhyEvents(counters) => {
            for counter in counters {
                writeln!(
                    w,
                    "  {:>4} {:<60} {}{}",
                    counter.id,
                    counter.name,
                    counter.value,
                    if counter.overflow { "+" } else { "" }
                )?;
            }
        }
        ReportPayload::Progress(progress) => write_progress(w, progress)?,
    }
    Ok(())
}

fn write_smart(w: &mut dyn Write, smart: &SmartData) -> io::Result<()> {
    match smart.overall_passed {
        Some(true) => writeln!(w, "  SMART overall health: {}", "PASSED".green())?,
        Some(false) => writeln!(w, "  SMART overall health: {}", "FAILED".red().bold())?,
        None => {}
    }

    if !smart.attributes.is_empty() {
        writeln!(
            w,
            "  {:>3} {:<28} {:<8} {:>5} {:>5} {:>6} {:>14}",
            "ID", "Attribute", "Flags", "Value", "Worst", "Thresh", "Raw"
        )?;
        for attribute in &smart.attributes {
            let line = format!(
                "  {:>3} {:<28} {:<8} {:>5} {:>5} {:>6} {:>14}",
                attribute.id,
                attribute.name,
                attribute.flags,
                attribute.current,
                attribute.worst,
                attribute.threshold,
                attribute.raw_value
            );
            if attribute.failing_now {
                writeln!(w, "{}", line.red())?;
            } else {
                writeln!(w, "{}", line)?;
            }
        }
    }

    for field in &smart.health_log {
        writeln!(w, "  {:<40} {}", field.name, field.value)?;
    }
    Ok(())
}

fn write_progress(w: &mut dyn Write, progress: &Progress) -> io::Result<()> {
    match (progress.in_progress, progress.percent_complete) {
        (true, Some(percent)) => {
            let pct = percent.clamp(0.0, 100.0);
            let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
            writeln!(
                w,
                "  [{}{}] {:>6.2}%",
                "█".repeat(filled),
                "░".repeat(BAR_WIDTH - filled),
                pct
            )
        }
        (true, None) => writeln!(w, "  {} is in progress", progress.kind),
        (false, _) => writeln!(w, "  No {} in progress", progress.kind),
    }
}

fn write_hex_dump(w: &mut dyn Write, bytes: &[u8]) -> io::Result<()> {
    for (row, chunk) in bytes.chunks(HEX_DUMP_WIDTH).enumerate() {
        write!(w, "  {:08X}  ", row * HEX_DUMP_WIDTH)?;
        for byte in chunk {
            write!(w, "{:02X} ", byte)?;
        }
        for _ in chunk.len()..HEX_DUMP_WIDTH {
            write!(w, "   ")?;
        }
        let ascii: String = chunk
            .iter()
            .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' })
            .collect();
        writeln!(w, " {}", ascii)?;
    }
    Ok(())
}

/// `Write` target that can be read back after a run, for capturing output
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buffer).to_string()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
