use std::process::ExitCode;

/// Exit status for CLI commands, following common conventions for gating
/// tools.
///
/// - `Success` (0): every selected audit passed
/// - `Failure` (1): the gate failed (at least one audit reported FAIL)
/// - `Error` (2): a processing error (missing/malformed input, config error)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    /// Every selected audit passed.
    Success,
    /// At least one audit failed the gate.
    Failure,
    /// The run aborted on a processing error.
    Error,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::from(0),
            ExitStatus::Failure => ExitCode::from(1),
            ExitStatus::Error => ExitCode::from(2),
        }
    }
}
