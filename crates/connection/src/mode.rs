//! WARP operating mode and the cache that picks a probe strategy from it.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};
use warptray_command::{CommandResult, CommandRunner};

use crate::error::ControlError;
use crate::probe::ProbeStrategy;

/// WARP client operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatingMode {
    /// Full tunnel, the client's factory default.
    #[default]
    Warp,
    DoH,
    DoT,
    WarpDoH,
    WarpDoT,
    Proxy,
    TunnelOnly,
    PostureOnly,
    Unknown,
}

impl OperatingMode {
    /// Modes the user can switch to with `warp-cli set-mode`.
    pub const SELECTABLE: [OperatingMode; 7] = [
        Self::Warp,
        Self::DoH,
        Self::WarpDoH,
        Self::DoT,
        Self::WarpDoT,
        Self::Proxy,
        Self::TunnelOnly,
    ];

    /// Token understood by `warp-cli set-mode`.
    pub fn cli_token(self) -> &'static str {
        match self {
            Self::Warp => "warp",
            Self::DoH => "doh",
            Self::DoT => "dot",
            Self::WarpDoH => "warp+doh",
            Self::WarpDoT => "warp+dot",
            Self::Proxy => "proxy",
            Self::TunnelOnly => "tunnel_only",
            Self::PostureOnly => "posture_only",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_selectable(self) -> bool {
        Self::SELECTABLE.contains(&self)
    }

    /// How connectivity can be observed in this mode.
    pub fn probe_strategy(self) -> ProbeStrategy {
        match self {
            Self::Warp | Self::WarpDoH | Self::WarpDoT | Self::TunnelOnly => {
                ProbeStrategy::Interface
            }
            Self::DoH | Self::DoT => ProbeStrategy::Resolver,
            Self::Proxy | Self::PostureOnly | Self::Unknown => ProbeStrategy::Unavailable,
        }
    }

    /// Normalizes a mode token as printed by `warp-cli` or typed by a user.
    ///
    /// Accepts both the short `set-mode` spellings (`warp+doh`) and the long
    /// settings spellings (`WarpWithDnsOverHttps`). Anything else is `Unknown`.
    pub fn from_token(token: &str) -> Self {
        let normalized: String = token
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "warp" => Self::Warp,
            "doh" | "dnsoverhttps" => Self::DoH,
            "dot" | "dnsovertls" => Self::DoT,
            "warp+doh" | "warpdoh" | "warpwithdnsoverhttps" => Self::WarpDoH,
            "warp+dot" | "warpdot" | "warpwithdnsovertls" => Self::WarpDoT,
            "proxy" | "warpproxy" => Self::Proxy,
            "tunnelonly" => Self::TunnelOnly,
            "postureonly" => Self::PostureOnly,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_token())
    }
}

impl FromStr for OperatingMode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_token(s) {
            Self::Unknown => Err(ControlError::UnsupportedMode(s.to_string())),
            mode => Ok(mode),
        }
    }
}

/// Extracts the mode from `warp-cli settings` output.
///
/// Looks for a `Mode:` line, optionally prefixed by a policy source such as
/// `(local policy)`, and normalizes the first token after it.
pub fn parse_mode(settings: &str) -> Option<OperatingMode> {
    settings.lines().find_map(|line| {
        let mut line = line.trim();
        if line.starts_with('(')
            && let Some(end) = line.find(')')
        {
            line = line[end + 1..].trim_start();
        }
        let rest = line
            .get(..5)
            .filter(|head| head.eq_ignore_ascii_case("mode:"))
            .map(|_| &line[5..])?;
        rest.split_whitespace().next().map(OperatingMode::from_token)
    })
}

/// Last known operating mode. Advisory only: it picks a probe strategy and
/// never decides whether a probe result is trusted.
#[derive(Debug, Clone, Default)]
pub struct ModeCache {
    mode: OperatingMode,
}

impl ModeCache {
    pub fn new(initial: OperatingMode) -> Self {
        Self { mode: initial }
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Re-derives the mode from a fresh settings query.
    pub async fn refresh(
        &mut self,
        runner: &CommandRunner,
        cli_program: &str,
        timeout: Duration,
    ) -> OperatingMode {
        let result = runner.run(cli_program, &["settings"], timeout).await;
        self.update_from(&result)
    }

    /// Applies a settings query result. A failed query keeps the cached mode.
    pub fn update_from(&mut self, result: &CommandResult) -> OperatingMode {
        if !result.succeeded() {
            warn!(
                exit_code = result.exit_code,
                timed_out = result.timed_out,
                mode = %self.mode,
                "settings query failed, keeping cached mode"
            );
            return self.mode;
        }

        let mode = parse_mode(&result.stdout).unwrap_or(OperatingMode::Unknown);
        if mode != self.mode {
            debug!(from = %self.mode, to = %mode, "operating mode changed");
        }
        self.mode = mode;
        mode
    }
}
