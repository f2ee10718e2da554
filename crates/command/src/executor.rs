//! Process execution backend.

use std::process::Stdio;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::result::{CommandResult, Invocation};

/// How long a killed process gets to be reaped after a timeout.
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Runs an [`Invocation`] to completion.
pub trait Execute: Send + Sync + 'static {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, CommandResult>;
}

/// Executes real processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl Execute for ProcessExecutor {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, CommandResult> {
        Box::pin(run_process(invocation))
    }
}

async fn run_process(invocation: Invocation) -> CommandResult {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(command = %invocation, error = %e, "failed to spawn");
            return CommandResult::launch_error(format!("failed to start {}: {e}", invocation.program));
        }
    };

    let stdout = tokio::spawn(drain(child.stdout.take()));
    let stderr = tokio::spawn(drain(child.stderr.take()));

    match tokio::time::timeout(invocation.timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let result = CommandResult {
                exit_code: status.code().unwrap_or(crate::result::NO_EXIT_CODE),
                stdout: stdout.await.unwrap_or_default(),
                stderr: stderr.await.unwrap_or_default(),
                timed_out: false,
            };
            debug!(command = %invocation, exit_code = result.exit_code, "command finished");
            result
        }
        Ok(Err(e)) => {
            stdout.abort();
            stderr.abort();
            warn!(command = %invocation, error = %e, "failed to wait for command");
            CommandResult::launch_error(format!("failed to wait for {}: {e}", invocation.program))
        }
        Err(_) => {
            warn!(
                command = %invocation,
                timeout_ms = invocation.timeout.as_millis() as u64,
                "command timed out, killing"
            );
            let _ = child.start_kill();
            let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
            stdout.abort();
            stderr.abort();
            CommandResult::timed_out()
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}
