//! Public types for the connection controller.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ControlError;
use crate::mode::OperatingMode;

/// Canonical connection state. Only the controller writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// Presentation hint for a transition in flight.
///
/// Never written into [`ConnectionState`]; it only tells surfaces what the
/// user asked for while the controller finds out what actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    None,
    Connecting,
    Disconnecting,
}

impl TransitionState {
    pub fn is_active(self) -> bool {
        self != Self::None
    }

    /// The transition that moves toward `target`.
    pub fn toward(target: ConnectionState) -> Self {
        match target {
            ConnectionState::Connected => Self::Connecting,
            ConnectionState::Disconnected => Self::Disconnecting,
        }
    }
}

/// A `warp-cli` command the controller can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Disconnect,
    Register,
    SetMode(OperatingMode),
}

/// Title of the info notice announcing a new registration.
pub const REGISTRATION_TITLE: &str = "Registration";

impl Action {
    /// Arguments passed to `warp-cli`.
    pub fn cli_args(self) -> Vec<&'static str> {
        match self {
            Self::Connect => vec!["connect"],
            Self::Disconnect => vec!["disconnect"],
            Self::Register => vec!["--accept-tos", "registration", "new"],
            Self::SetMode(mode) => vec!["set-mode", mode.cli_token()],
        }
    }

    /// Notice title used when this action fails.
    pub fn error_title(self) -> &'static str {
        match self {
            Self::Connect => "Warp Connect Error",
            Self::Disconnect => "Warp Disconnect Error",
            Self::Register => "Registration Error",
            Self::SetMode(_) => "Mode Error",
        }
    }

    pub(crate) fn timeout_message(self) -> &'static str {
        match self {
            Self::Connect => "Connection timed out.",
            Self::Disconnect => "Disconnection timed out.",
            Self::Register => "Registration timed out.",
            Self::SetMode(_) => "Changing the operating mode timed out.",
        }
    }

    pub(crate) fn failure_message(self) -> &'static str {
        match self {
            Self::Connect => "Connection failed.",
            Self::Disconnect => "Disconnection failed.",
            Self::Register => "Registration failed.",
            Self::SetMode(_) => "Changing the operating mode failed.",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect"),
            Self::Disconnect => f.write_str("disconnect"),
            Self::Register => f.write_str("registration"),
            Self::SetMode(mode) => write!(f, "set-mode {mode}"),
        }
    }
}

/// Reply to a request that may dispatch a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The command was handed to the worker.
    Started,
    /// A transition is already in flight; the request was dropped.
    Busy,
    /// Rejected before anything was dispatched.
    Aborted(ControlError),
}

/// Point-in-time view of the controller, published on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub transition: TransitionState,
    pub mode: OperatingMode,
}

impl Snapshot {
    pub fn is_busy(&self) -> bool {
        self.transition.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Info,
}

/// A transient `(title, message)` pair for surfaces to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Reconciliation polling schedule.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delays between consecutive probes once the first probe missed.
    pub backoff: Vec<Duration>,
    /// Delay before the first probe when expecting to be connected.
    pub connect_delay: Duration,
    /// Delay before the first probe when expecting to be disconnected.
    pub disconnect_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            backoff: crate::poll::DEFAULT_BACKOFF_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            connect_delay: Duration::from_millis(2000),
            disconnect_delay: Duration::from_millis(800),
        }
    }
}

impl PollConfig {
    pub fn initial_delay(&self, expected: ConnectionState) -> Duration {
        match expected {
            ConnectionState::Connected => self.connect_delay,
            ConnectionState::Disconnected => self.disconnect_delay,
        }
    }
}

/// Everything the controller needs to know about the host system.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// The WARP command-line client.
    pub cli_program: String,
    /// systemd unit that must be active before any transition.
    pub service_name: String,
    /// Virtual interface present while a tunnel mode is connected.
    pub interface_name: String,
    /// Resolver configuration inspected in DNS-only modes.
    pub resolv_conf: PathBuf,
    /// Bound on dispatched `warp-cli` commands.
    pub command_timeout: Duration,
    /// Bound on the service liveness check and settings queries.
    pub prerequisite_timeout: Duration,
    /// Bound on interface probes.
    pub probe_timeout: Duration,
    /// Passive polling cadence while healthy.
    pub passive_interval: Duration,
    /// Passive polling cadence after an error.
    pub degraded_interval: Duration,
    /// Connect on startup when the client is found disconnected.
    pub auto_connect: bool,
    pub poll: PollConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cli_program: "warp-cli".into(),
            service_name: "warp-svc".into(),
            interface_name: "CloudflareWARP".into(),
            resolv_conf: PathBuf::from("/etc/resolv.conf"),
            command_timeout: Duration::from_secs(15),
            prerequisite_timeout: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(2),
            passive_interval: Duration::from_secs(5),
            degraded_interval: Duration::from_secs(10),
            auto_connect: false,
            poll: PollConfig::default(),
        }
    }
}
