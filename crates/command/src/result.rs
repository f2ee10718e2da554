//! Invocation and result types.

use std::fmt;
use std::time::Duration;

/// Exit code reported for processes that never ran, were killed, or timed out.
pub const NO_EXIT_CODE: i32 = -1;

/// A single request to run an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str], timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            timeout,
        }
    }

    /// Returns `true` if this invocation runs `program` with exactly `args`.
    pub fn matches(&self, program: &str, args: &[&str]) -> bool {
        self.program == program && self.args.iter().map(String::as_str).eq(args.iter().copied())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of one external command. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    /// Trimmed, lossily decoded standard output.
    pub stdout: String,
    /// Trimmed, lossily decoded standard error.
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandResult {
    /// A process that ran to completion.
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    /// A process that was force-terminated after exceeding its timeout.
    pub fn timed_out() -> Self {
        Self {
            exit_code: NO_EXIT_CODE,
            stdout: String::new(),
            stderr: "Command timed out".into(),
            timed_out: true,
        }
    }

    /// A process that could not be started (or was lost before reporting).
    pub fn launch_error(message: impl Into<String>) -> Self {
        Self {
            exit_code: NO_EXIT_CODE,
            stdout: String::new(),
            stderr: message.into(),
            timed_out: false,
        }
    }

    /// Exit code 0 within the timeout.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// No usable exit status: spawn failure or signal termination.
    pub fn launch_failed(&self) -> bool {
        !self.timed_out && self.exit_code == NO_EXIT_CODE
    }
}
