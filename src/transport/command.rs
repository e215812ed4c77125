use crate::{DeviceError, DeviceResult};
use std::io;
use std::process::Command;

/// Captured result of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// None when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Seam between the system transport and process execution
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        tracing::debug!("Running: {} {}", program, args.join(" "));

        let output = Command::new(program).args(args).output()?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Run a tool whatever its exit status; a missing binary means the operation is not supported
pub(crate) fn spawn(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> DeviceResult<CommandOutput> {
    runner.run(program, args).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            DeviceError::Unsupported(format!("{} is not installed", program))
        } else {
            DeviceError::IoError(e)
        }
    })
}

/// Run a command and classify a non-zero exit into a DeviceError
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
) -> DeviceResult<CommandOutput> {
    let output = spawn(runner, program, args)?;

    match output.status {
        Some(0) => Ok(output),
        None => Err(DeviceError::Aborted(format!(
            "{} was terminated by a signal",
            program
        ))),
        Some(code) => Err(classify_failure(program, code, &output)),
    }
}

fn classify_failure(program: &str, code: i32, output: &CommandOutput) -> DeviceError {
    let stderr = output.stderr_str();
    let lower = stderr.to_lowercase();
    let detail = stderr.lines().next().unwrap_or("").trim().to_string();
    let message = format!("{} exited with status {}: {}", program, code, detail);

    if lower.contains("permission denied") || lower.contains("operation not permitted") {
        DeviceError::AccessDenied(message)
    } else if lower.contains("illegal request")
        || lower.contains("invalid opcode")
        || lower.contains("invalid command")
        || lower.contains("not supported")
        || lower.contains("unsupported")
    {
        DeviceError::Unsupported(message)
    } else if lower.contains("device or resource busy") {
        DeviceError::Busy(message)
    } else if lower.contains("aborted") {
        DeviceError::Aborted(message)
    } else {
        DeviceError::CommandFailed(message)
    }
}

pub(crate) fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
