//! Connection-state reconciliation engine for the WARP client.
//!
//! The [`ConnectionController`] owns the canonical connected/disconnected
//! state. It dispatches `warp-cli` commands through a single worker, then
//! verifies what actually happened by probing the system on a fixed backoff
//! schedule before committing anything. UI surfaces subscribe through the
//! [`ControllerHandle`] and only ever see verified state changes, plus error
//! and info notices.

pub mod controller;
pub mod error;
pub mod handle;
pub mod mode;
pub mod observer;
pub mod outcome;
pub mod poll;
pub mod probe;
pub mod reporter;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::ConnectionController;
pub use error::ControlError;
pub use handle::ControllerHandle;
pub use mode::{ModeCache, OperatingMode};
pub use observer::{ObserverHub, Surface};
pub use outcome::{CommandOutcome, classify};
pub use poll::{PollScheduler, PollStep};
pub use probe::{ProbeStrategy, SystemProbe};
pub use reporter::{ErrorReporter, Fault};
pub use types::{
    Action, ConnectionState, ControllerConfig, Dispatch, Notice, NoticeLevel, PollConfig,
    REGISTRATION_TITLE, Snapshot, TransitionState,
};
