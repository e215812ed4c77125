// Confirmation for operations that destroy data
//
// authorize() is pure and runs before any device is resolved. arm() runs after filtering,
// once at least one device will actually receive the operation.

use crate::config::{ConfirmationToken, DestructiveOperationRequest, Tool};
use crate::ui::{Reporter, Sleeper, COUNTDOWN_SECONDS};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRejection {
    pub operation: &'static str,
    pub required: ConfirmationToken,
    pub supplied: Option<String>,
    pub example: String,
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.supplied {
            Some(supplied) => writeln!(
                f,
                "The confirmation \"{}\" does not allow {}.",
                supplied, self.operation
            )?,
            None => writeln!(f, "{} requires a confirmation.", capitalize(self.operation))?,
        }
        writeln!(f, "Add --confirm {} to proceed, for example:", self.required)?;
        write!(f, "    {}", self.example)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Accept the request only when the supplied token is one the operation lists
pub fn authorize(
    request: &DestructiveOperationRequest,
    supplied: Option<&str>,
    tool: Tool,
) -> Result<ConfirmationToken, GateRejection> {
    let accepted = request.accepted_tokens();

    if let Some(token) = supplied.and_then(|s| accepted.iter().find(|t| t.matches(s))) {
        return Ok(*token);
    }

    Err(GateRejection {
        operation: request.name(),
        required: accepted[0],
        supplied: supplied.map(str::to_string),
        example: example_invocation(request, tool),
    })
}

/// Command line that would run the request against one device
pub fn example_invocation(request: &DestructiveOperationRequest, tool: Tool) -> String {
    let operation = match request {
        DestructiveOperationRequest::FormatUnit(params) => match (params.fast_format, params.new_sector_size) {
            (Some(_), Some(size)) => format!("--format-unit {} --fast-format fast", size),
            (Some(_), None) => "--format-unit 4096 --fast-format fast".to_string(),
            (None, Some(size)) => format!("--format-unit {}", size),
            (None, None) => "--format-unit current".to_string(),
        },
        DestructiveOperationRequest::SetSectorSize { sector_size } => {
            format!("--set-sector-size {}", sector_size)
        }
        DestructiveOperationRequest::RemovePhysicalElement { element_id } => {
            format!("--remove-physical-element {}", element_id)
        }
        DestructiveOperationRequest::RepopulateElements => "--repopulate-elements".to_string(),
        DestructiveOperationRequest::NvmFormat(_) => "--nvm-format current".to_string(),
    };

    format!(
        "{} -d /dev/sg2 {} --confirm {}",
        tool.binary_name(),
        operation,
        request.accepted_tokens()[0]
    )
}

/// Warn about an operation that must not be interrupted and count down before it starts.
///
/// Rendered in every verbosity mode.
pub fn arm(request: &DestructiveOperationRequest, reporter: &mut Reporter, sleeper: &dyn Sleeper) {
    tracing::info!(operation = request.name(), "Starting countdown before uninterruptible operation");
    reporter.uninterruptible_warning(request.name());
    reporter.countdown(COUNTDOWN_SECONDS, sleeper);
}
