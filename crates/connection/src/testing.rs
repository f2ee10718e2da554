//! Scripted stand-ins for `warp-cli`, `systemctl` and `ip`, plus a surface
//! that records what it was told.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::Instant;
use warptray_command::{CommandResult, CommandRunner, Execute, Invocation};

use crate::observer::Surface;
use crate::types::TransitionState;

/// Simulated host state the fake commands read and mutate.
pub struct World {
    pub service_active: bool,
    pub connected: bool,
    /// `Mode:` line printed by `warp-cli settings`.
    pub mode_line: String,
    /// Interface probe answers consumed front to back before falling back
    /// to `connected`.
    pub probe_script: VecDeque<bool>,
    /// `ip` cannot be launched at all.
    pub interface_unavailable: bool,
    /// Whether connect/disconnect actually change `connected`.
    pub commands_take_effect: bool,
    /// Time a dispatched `warp-cli` command takes.
    pub command_latency: Duration,
    /// Dispatched commands run until their timeout.
    pub hang_commands: bool,
    /// Replaces the `Success` reply of connect/disconnect/set-mode.
    pub cli_reply: Option<CommandResult>,
    pub registration_reply: CommandResult,
}

impl Default for World {
    fn default() -> Self {
        Self {
            service_active: true,
            connected: false,
            mode_line: "Mode: Warp".into(),
            probe_script: VecDeque::new(),
            interface_unavailable: false,
            commands_take_effect: true,
            command_latency: Duration::from_millis(100),
            hang_commands: false,
            cli_reply: None,
            registration_reply: CommandResult::exited(0, "Account ID: 0c0ffee", ""),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub invocation: Invocation,
}

impl Call {
    pub fn matches(&self, program: &str, args: &[&str]) -> bool {
        self.invocation.matches(program, args)
    }
}

#[derive(Default)]
pub struct FakeWarp {
    world: Arc<Mutex<World>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakeWarp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn runner(self: &Arc<Self>) -> CommandRunner {
        CommandRunner::with_executor(Arc::clone(self) as Arc<dyn Execute>)
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Start times of every call matching `program` and `args`.
    pub fn times(&self, program: &str, args: &[&str]) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.matches(program, args))
            .map(|c| c.at)
            .collect()
    }

    pub fn count(&self, program: &str, args: &[&str]) -> usize {
        self.times(program, args).len()
    }

    /// Start times of every interface probe.
    pub fn probe_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.invocation.program == "ip")
            .map(|c| c.at)
            .collect()
    }
}

impl Execute for FakeWarp {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, CommandResult> {
        self.calls.lock().unwrap().push(Call {
            at: Instant::now(),
            invocation: invocation.clone(),
        });
        let world = Arc::clone(&self.world);

        Box::pin(async move {
            let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
            match (invocation.program.as_str(), args.as_slice()) {
                ("systemctl", ["is-active", ..]) => {
                    let active = world.lock().unwrap().service_active;
                    CommandResult::exited(if active { 0 } else { 3 }, "", "")
                }
                ("ip", ["addr", "show", iface]) => {
                    let mut w = world.lock().unwrap();
                    if w.interface_unavailable {
                        return CommandResult::launch_error("failed to start ip: not found");
                    }
                    let present = w.probe_script.pop_front().unwrap_or(w.connected);
                    if present {
                        CommandResult::exited(0, format!("4: {iface}: <POINTOPOINT,UP>"), "")
                    } else {
                        CommandResult::exited(1, "", format!("Device \"{iface}\" does not exist."))
                    }
                }
                ("warp-cli", ["settings"]) => {
                    let line = world.lock().unwrap().mode_line.clone();
                    CommandResult::exited(0, format!("Merged configuration:\n{line}"), "")
                }
                ("warp-cli", [cmd @ ("connect" | "disconnect")]) => {
                    let connect = *cmd == "connect";
                    dispatched(&world, invocation.timeout, move |w| {
                        if w.commands_take_effect {
                            w.connected = connect;
                        }
                        w.cli_reply
                            .clone()
                            .unwrap_or_else(|| CommandResult::exited(0, "Success", ""))
                    })
                    .await
                }
                ("warp-cli", ["--accept-tos", "registration", "new"]) => {
                    dispatched(&world, invocation.timeout, |w| w.registration_reply.clone()).await
                }
                ("warp-cli", ["set-mode", mode]) => {
                    let mode = mode.to_string();
                    dispatched(&world, invocation.timeout, move |w| {
                        w.mode_line = format!("Mode: {mode}");
                        w.cli_reply
                            .clone()
                            .unwrap_or_else(|| CommandResult::exited(0, "Success", ""))
                    })
                    .await
                }
                _ => CommandResult::launch_error(format!("unexpected command: {invocation}")),
            }
        })
    }
}

/// Simulates a state-changing command: waits, applies its effect, replies.
/// A hanging command still applies its effect before the caller gives up.
async fn dispatched(
    world: &Arc<Mutex<World>>,
    timeout: Duration,
    apply: impl FnOnce(&mut World) -> CommandResult,
) -> CommandResult {
    let (hang, latency) = {
        let w = world.lock().unwrap();
        (w.hang_commands, w.command_latency)
    };
    if hang {
        tokio::time::sleep(timeout).await;
        apply(&mut world.lock().unwrap());
        return CommandResult::timed_out();
    }
    tokio::time::sleep(latency).await;
    apply(&mut world.lock().unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Connection(bool),
    Error(String, String),
    Info(String, String),
    Transition(TransitionState),
}

/// Surface that records every call.
#[derive(Default)]
pub struct RecordingSurface {
    name: &'static str,
    order: Option<Arc<Mutex<Vec<&'static str>>>>,
    events: Mutex<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A surface that also appends `name` to `order` on every state change.
    pub fn named(name: &'static str, order: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            order: Some(Arc::clone(order)),
            events: Mutex::default(),
        })
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::Connection(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::Error(t, m) => Some((t, m)),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SurfaceEvent::Info(t, m) => Some((t, m)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SurfaceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Surface for RecordingSurface {
    fn connection_changed(&self, connected: bool) {
        if let Some(order) = &self.order {
            order.lock().unwrap().push(self.name);
        }
        self.push(SurfaceEvent::Connection(connected));
    }

    fn error_occurred(&self, title: &str, message: &str) {
        self.push(SurfaceEvent::Error(title.into(), message.into()));
    }

    fn info_occurred(&self, title: &str, message: &str) {
        self.push(SurfaceEvent::Info(title.into(), message.into()));
    }

    fn transition_changed(&self, transition: TransitionState) {
        self.push(SurfaceEvent::Transition(transition));
    }
}
