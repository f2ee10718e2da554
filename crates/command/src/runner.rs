//! Inline and dispatched command execution.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::executor::{Execute, ProcessExecutor};
use crate::result::{CommandResult, Invocation};

/// Number of dispatched commands allowed to run at once.
const WORKER_CAPACITY: usize = 1;

/// Runs external programs, either inline or on the single dispatch worker.
///
/// Clones share the same worker, so at most one dispatched command runs at a
/// time across every clone.
#[derive(Clone)]
pub struct CommandRunner {
    executor: Arc<dyn Execute>,
    worker: Arc<Semaphore>,
}

impl CommandRunner {
    /// Creates a runner backed by real processes.
    pub fn new() -> Self {
        Self::with_executor(Arc::new(ProcessExecutor))
    }

    /// Creates a runner backed by a custom executor.
    pub fn with_executor(executor: Arc<dyn Execute>) -> Self {
        Self {
            executor,
            worker: Arc::new(Semaphore::new(WORKER_CAPACITY)),
        }
    }

    /// Runs a command and waits for it. The caller makes no progress until
    /// the process exits or the timeout kills it.
    pub async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> CommandResult {
        let invocation = Invocation::new(program, args, timeout);
        debug!(command = %invocation, "running inline");
        self.executor.execute(invocation).await
    }

    /// Dispatches a command onto the worker and returns immediately.
    ///
    /// Commands dispatched while the worker is busy wait their turn.
    pub fn spawn(&self, program: &str, args: &[&str], timeout: Duration) -> CommandHandle {
        let invocation = Invocation::new(program, args, timeout);
        let executor = Arc::clone(&self.executor);
        let worker = Arc::clone(&self.worker);

        let inner = tokio::spawn(async move {
            // The semaphore is never closed, so the permit is always granted.
            let _permit = worker.acquire_owned().await.ok();
            debug!(command = %invocation, "dispatching");
            executor.execute(invocation).await
        });

        CommandHandle { inner }
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion handle for a dispatched command.
#[must_use = "a dispatched command's result is only observable through its handle"]
pub struct CommandHandle {
    inner: JoinHandle<CommandResult>,
}

impl Future for CommandHandle {
    type Output = CommandResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(|joined| {
            joined.unwrap_or_else(|e| {
                warn!(error = %e, "command worker task failed");
                CommandResult::launch_error(format!("command worker failed: {e}"))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::future::BoxFuture;

    use super::*;

    /// Executor that sleeps for a fixed time and tracks peak concurrency.
    #[derive(Default)]
    struct SlowExecutor {
        running: AtomicUsize,
        peak: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl Execute for Arc<SlowExecutor> {
        fn execute(&self, invocation: Invocation) -> BoxFuture<'static, CommandResult> {
            let this = Arc::clone(self);
            Box::pin(async move {
                let now = this.running.fetch_add(1, Ordering::SeqCst) + 1;
                this.peak.fetch_max(now, Ordering::SeqCst);
                this.seen.lock().unwrap().push(invocation.to_string());
                tokio::time::sleep(Duration::from_millis(100)).await;
                this.running.fetch_sub(1, Ordering::SeqCst);
                CommandResult::exited(0, "Success", "")
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatched_commands_never_overlap() {
        let exec = Arc::new(SlowExecutor::default());
        let runner = CommandRunner::with_executor(Arc::new(Arc::clone(&exec)));

        let handles: Vec<_> = ["connect", "disconnect", "status"]
            .iter()
            .map(|sub| runner.spawn("warp-cli", &[sub], Duration::from_secs(15)))
            .collect();

        for handle in handles {
            assert!(handle.await.succeeded());
        }
        assert_eq!(exec.peak.load(Ordering::SeqCst), 1);
        assert_eq!(exec.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_the_worker() {
        let exec = Arc::new(SlowExecutor::default());
        let runner = CommandRunner::with_executor(Arc::new(Arc::clone(&exec)));
        let other = runner.clone();

        let a = runner.spawn("warp-cli", &["connect"], Duration::from_secs(15));
        let b = other.spawn("warp-cli", &["disconnect"], Duration::from_secs(15));
        a.await;
        b.await;

        assert_eq!(exec.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn inline_run_returns_executor_result() {
        let exec = Arc::new(SlowExecutor::default());
        let runner = CommandRunner::with_executor(Arc::new(Arc::clone(&exec)));

        let res = runner
            .run("systemctl", &["is-active", "--quiet", "warp-svc"], Duration::from_secs(3))
            .await;
        assert!(res.succeeded());
        assert_eq!(
            exec.seen.lock().unwrap().as_slice(),
            ["systemctl is-active --quiet warp-svc"]
        );
    }
}
