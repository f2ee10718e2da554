//! Notice delivery and passive-poll cadence.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::observer::ObserverHub;
use crate::types::Notice;

/// The dependency behind an error. Each one clears only when that same
/// dependency answers normally again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fault {
    /// The interface or resolver could not be read.
    Probe,
    /// The WARP daemon was not running.
    Service,
    /// A `warp-cli` command failed, timed out or was refused.
    Command,
}

/// Forwards notices to surfaces and slows passive polling while any
/// dependency is failing.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    base: Duration,
    degraded: Duration,
    failing: BTreeSet<Fault>,
}

impl ErrorReporter {
    pub fn new(base: Duration, degraded: Duration) -> Self {
        Self {
            base,
            degraded,
            failing: BTreeSet::new(),
        }
    }

    /// Logs the error and hands it to every live surface.
    ///
    /// Returns `true` when this error moved passive polling from the base
    /// to the degraded interval.
    pub fn error(&mut self, fault: Fault, notice: &Notice, hub: &mut ObserverHub) -> bool {
        warn!(title = %notice.title, message = %notice.message, ?fault, "error notice");
        let was_degraded = self.is_degraded();
        self.failing.insert(fault);
        hub.publish_notice(notice);

        if was_degraded {
            return false;
        }
        info!(interval_secs = self.degraded.as_secs(), "passive polling degraded");
        true
    }

    pub fn info(&self, notice: &Notice, hub: &mut ObserverHub) {
        info!(title = %notice.title, message = %notice.message, "info notice");
        hub.publish_notice(notice);
    }

    /// `fault` answered normally again. The base cadence returns once
    /// nothing is failing.
    pub fn cleared(&mut self, fault: Fault) {
        if !self.failing.remove(&fault) {
            return;
        }
        debug!(?fault, "dependency recovered");
        if self.failing.is_empty() {
            info!(interval_secs = self.base.as_secs(), "passive polling restored");
        }
    }

    pub fn passive_interval(&self) -> Duration {
        if self.is_degraded() {
            self.degraded
        } else {
            self.base
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.failing.is_empty()
    }

    pub fn is_failing(&self, fault: Fault) -> bool {
        self.failing.contains(&fault)
    }
}
