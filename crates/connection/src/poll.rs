//! Reconciliation polling as an explicit state machine.
//!
//! The scheduler never sleeps or probes on its own. It hands the controller a
//! deadline, the controller probes when the deadline fires and feeds the
//! result back through [`PollScheduler::observe`], which either asks for
//! another probe after the next backoff delay or settles the cycle.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

/// Delays between probes once the first probe missed, in milliseconds.
pub const DEFAULT_BACKOFF_MS: [u64; 6] = [500, 1000, 2000, 3000, 4000, 5000];

/// What the controller should do after feeding a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Probe again after `delay`.
    Retry { delay: Duration },
    /// The cycle is over. `converged` is false when the table ran out.
    Settled { connected: bool, converged: bool },
}

#[derive(Debug, Clone)]
struct PollCycle {
    expected: bool,
    /// Settled value when nothing could be observed at all.
    prior: bool,
    attempt: usize,
    last_observed: Option<bool>,
    deadline: Instant,
}

/// Drives one reconciliation cycle at a time.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    backoff: Vec<Duration>,
    cycle: Option<PollCycle>,
}

impl PollScheduler {
    pub fn new(backoff: Vec<Duration>) -> Self {
        Self {
            backoff,
            cycle: None,
        }
    }

    /// Starts a new cycle, replacing any cycle in progress. The first probe
    /// is due `initial_delay` after `now`.
    pub fn start(&mut self, expected: bool, prior: bool, initial_delay: Duration, now: Instant) {
        debug!(expected, delay_ms = initial_delay.as_millis() as u64, "poll cycle started");
        self.cycle = Some(PollCycle {
            expected,
            prior,
            attempt: 0,
            last_observed: None,
            deadline: now + initial_delay,
        });
    }

    /// When the next probe is due, if a cycle is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.cycle.as_ref().map(|c| c.deadline)
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.cycle.is_some()
    }

    #[cfg(test)]
    fn expected(&self) -> Option<bool> {
        self.cycle.as_ref().map(|c| c.expected)
    }

    /// Number of backoff delays consumed in the current cycle.
    #[cfg(test)]
    fn attempt(&self) -> usize {
        self.cycle.as_ref().map_or(0, |c| c.attempt)
    }

    /// Feeds one probe result. `None` means the probe could not read its
    /// resource and counts as a miss.
    ///
    /// Returns `None` if no cycle is running.
    pub fn observe(&mut self, observed: Option<bool>, now: Instant) -> Option<PollStep> {
        let mut cycle = self.cycle.take()?;

        if let Some(value) = observed {
            cycle.last_observed = Some(value);
            if value == cycle.expected {
                debug!(connected = value, probes = cycle.attempt + 1, "poll converged");
                return Some(PollStep::Settled {
                    connected: value,
                    converged: true,
                });
            }
        }

        match self.backoff.get(cycle.attempt).copied() {
            Some(delay) => {
                trace!(attempt = cycle.attempt, ?observed, delay_ms = delay.as_millis() as u64, "poll miss");
                cycle.attempt += 1;
                cycle.deadline = now + delay;
                self.cycle = Some(cycle);
                Some(PollStep::Retry { delay })
            }
            None => {
                let connected = cycle.last_observed.unwrap_or(cycle.prior);
                debug!(connected, expected = cycle.expected, "poll table exhausted, accepting observed state");
                Some(PollStep::Settled {
                    connected,
                    converged: false,
                })
            }
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(
            DEFAULT_BACKOFF_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}
