//! Controller error types.

use std::time::Duration;

use crate::reporter::Fault;
use crate::types::{Action, Notice};

/// Failures surfaced by the controller. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("warp-cli {action} timed out after {}s", timeout.as_secs())]
    CommandTimeout { action: Action, timeout: Duration },

    #[error("warp-cli {action} failed: {message}")]
    CommandFailure { action: Action, message: String },

    #[error("the '{service}' service is not running")]
    ServicePrerequisiteMissing { service: String },

    #[error("probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("unsupported operating mode: {0}")]
    UnsupportedMode(String),

    #[error("connection controller is not running")]
    ControllerGone,
}

impl ControlError {
    /// The dependency this error points at.
    pub fn fault(&self) -> Fault {
        match self {
            Self::ProbeUnavailable(_) => Fault::Probe,
            Self::ServicePrerequisiteMissing { .. } => Fault::Service,
            Self::CommandTimeout { .. }
            | Self::CommandFailure { .. }
            | Self::UnsupportedMode(_)
            | Self::ControllerGone => Fault::Command,
        }
    }

    /// The notice shown to the user for this error.
    pub fn notice(&self) -> Notice {
        match self {
            Self::CommandTimeout { action, .. } => {
                Notice::error(action.error_title(), action.timeout_message())
            }
            Self::CommandFailure { action, message } => {
                let message = if message.is_empty() {
                    action.failure_message().to_string()
                } else {
                    message.clone()
                };
                Notice::error(action.error_title(), message)
            }
            Self::ServicePrerequisiteMissing { service } => Notice::error(
                "Service Error",
                format!(
                    "The '{service}' service is not running.\n\n\
                     Please enable it by running:\n\
                     pkexec systemctl start {service}"
                ),
            ),
            Self::ProbeUnavailable(detail) => Notice::error("Status Check Error", detail.clone()),
            Self::UnsupportedMode(mode) => {
                Notice::error("Mode Error", format!("Mode '{mode}' cannot be selected."))
            }
            Self::ControllerGone => Notice::error("Internal Error", self.to_string()),
        }
    }
}
