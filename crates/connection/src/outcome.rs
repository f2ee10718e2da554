//! Interpretation of `warp-cli` output.
//!
//! `warp-cli` reports success as free-form text, so this is a best-effort
//! reading. The controller never treats it as the connection state; it only
//! decides whether the user should see an error right away.

use std::time::Duration;

use warptray_command::CommandResult;

use crate::error::ControlError;
use crate::types::Action;

/// Marker `warp-cli` prints when a command was accepted (matched case-insensitively).
pub const SUCCESS_MARKER: &str = "success";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Succeeded,
    TimedOut,
    /// Failure text to show verbatim; empty when the tool printed nothing.
    Failed(String),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// The error to report for this outcome, if any.
    pub fn error(&self, action: Action, timeout: Duration) -> Option<ControlError> {
        match self {
            Self::Succeeded => None,
            Self::TimedOut => Some(ControlError::CommandTimeout { action, timeout }),
            Self::Failed(message) => Some(ControlError::CommandFailure {
                action,
                message: message.clone(),
            }),
        }
    }
}

/// Classifies the result of a dispatched command.
///
/// Registration only prints the new account details, so exit status alone
/// decides it. Every other command must exit 0 and mention the success marker.
pub fn classify(action: Action, result: &CommandResult) -> CommandOutcome {
    if result.timed_out {
        return CommandOutcome::TimedOut;
    }

    let accepted = match action {
        Action::Register => result.exit_code == 0,
        _ => result.exit_code == 0 && contains_marker(&result.stdout),
    };
    if accepted {
        return CommandOutcome::Succeeded;
    }

    let text = if result.stderr.is_empty() {
        &result.stdout
    } else {
        &result.stderr
    };
    CommandOutcome::Failed(text.clone())
}

fn contains_marker(text: &str) -> bool {
    text.to_ascii_lowercase().contains(SUCCESS_MARKER)
}
