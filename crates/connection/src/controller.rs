//! The connection state machine.
//!
//! All controller state lives in a single task. Requests from handles,
//! completions of dispatched commands, the reconciliation deadline and the
//! passive-poll deadline are multiplexed in one `select!`, so nothing here
//! needs a lock.
//!
//! Connected/disconnected is only ever written after the system was
//! observed: at startup, when a reconciliation cycle settles, on a passive
//! check, or when a surface reports what it saw. What a command printed is
//! used for error reporting and nothing else.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warptray_command::{CommandResult, CommandRunner};

use crate::error::ControlError;
use crate::handle::{ControllerHandle, Request};
use crate::mode::{ModeCache, OperatingMode};
use crate::observer::ObserverHub;
use crate::outcome::classify;
use crate::poll::{PollScheduler, PollStep};
use crate::probe::SystemProbe;
use crate::reporter::{ErrorReporter, Fault};
use crate::types::{
    Action, ConnectionState, ControllerConfig, Dispatch, Notice, REGISTRATION_TITLE, Snapshot,
    TransitionState,
};

const REQUEST_QUEUE: usize = 32;

/// A dispatched command that finished on the worker.
struct Completion {
    action: Action,
    result: CommandResult,
}

pub struct ConnectionController {
    config: ControllerConfig,
    runner: CommandRunner,
    probe: SystemProbe,
    mode: ModeCache,
    poll: PollScheduler,
    hub: ObserverHub,
    reporter: ErrorReporter,
    state: ConnectionState,
    transition: TransitionState,
    /// A probe failure was already reported in the current cycle.
    poll_error_reported: bool,
    next_passive: Option<Instant>,
    requests: mpsc::Receiver<Request>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    snapshot: watch::Sender<Snapshot>,
}

impl ConnectionController {
    /// Creates a controller and the handle used to drive it. Nothing happens
    /// until [`run`](Self::run) is polled.
    pub fn new(config: ControllerConfig, runner: CommandRunner) -> (Self, ControllerHandle) {
        let (requests_tx, requests) = mpsc::channel(REQUEST_QUEUE);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshot, snapshot_rx) = watch::channel(Snapshot::default());

        let probe = SystemProbe::new(
            runner.clone(),
            config.interface_name.clone(),
            config.resolv_conf.clone(),
            config.probe_timeout,
        );

        let controller = Self {
            poll: PollScheduler::new(config.poll.backoff.clone()),
            reporter: ErrorReporter::new(config.passive_interval, config.degraded_interval),
            mode: ModeCache::default(),
            hub: ObserverHub::new(),
            state: ConnectionState::default(),
            transition: TransitionState::default(),
            poll_error_reported: false,
            next_passive: None,
            requests,
            completions_tx,
            completions_rx,
            snapshot,
            probe,
            runner,
            config,
        };
        (controller, ControllerHandle::new(requests_tx, snapshot_rx))
    }

    /// Runs the control loop until `cancel` fires or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.start_up().await;

        loop {
            let poll_deadline = self.poll.deadline();
            // Passive checks never race a transition.
            let passive_deadline = if self.transition.is_active() {
                None
            } else {
                self.next_passive
            };

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("connection controller shutting down");
                    break;
                }
                Some(done) = self.completions_rx.recv() => {
                    self.on_command_finished(done).await;
                }
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => {
                        debug!("all controller handles dropped");
                        break;
                    }
                },
                _ = sleep_until_opt(poll_deadline) => self.on_poll_tick().await,
                _ = sleep_until_opt(passive_deadline) => self.passive_check().await,
            }
        }
    }

    async fn start_up(&mut self) {
        self.refresh_mode().await;

        let strategy = self.mode.mode().probe_strategy();
        match self.probe.probe(strategy, self.state).await {
            Ok(state) => self.commit(state),
            Err(err) => {
                self.report_error(&err);
                self.commit(self.state);
            }
        }
        info!(state = ?self.state, mode = %self.mode.mode(), "connection controller started");
        self.schedule_passive();

        if self.config.auto_connect && !self.state.is_connected() {
            let dispatch = self.begin_transition(ConnectionState::Connected).await;
            info!(?dispatch, "auto-connect on startup");
        }
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect(reply) => {
                let dispatch = self.begin_transition(ConnectionState::Connected).await;
                reply_with(reply, dispatch);
            }
            Request::Disconnect(reply) => {
                let dispatch = self.begin_transition(ConnectionState::Disconnected).await;
                reply_with(reply, dispatch);
            }
            Request::Toggle(reply) => {
                let target = ConnectionState::from_connected(!self.state.is_connected());
                let dispatch = self.begin_transition(target).await;
                reply_with(reply, dispatch);
            }
            Request::Register(reply) => {
                self.dispatch(Action::Register);
                reply_with(reply, Dispatch::Started);
            }
            Request::SetMode(mode, reply) => {
                let dispatch = self.begin_set_mode(mode);
                reply_with(reply, dispatch);
            }
            Request::Observed(connected) => {
                debug!(connected, "surface reported observed state");
                self.commit(ConnectionState::from_connected(connected));
            }
            Request::Subscribe(surface) => self.hub.subscribe(surface),
            Request::Query(reply) => {
                let _ = reply.send(self.current_snapshot());
            }
        }
    }

    /// Single-flight entry point for connect and disconnect.
    async fn begin_transition(&mut self, target: ConnectionState) -> Dispatch {
        if self.transition.is_active() {
            debug!(?target, transition = ?self.transition, "transition in flight, request dropped");
            return Dispatch::Busy;
        }

        let service = &self.config.service_name;
        if !self
            .probe
            .service_active(service, self.config.prerequisite_timeout)
            .await
        {
            let err = ControlError::ServicePrerequisiteMissing {
                service: service.clone(),
            };
            warn!(%err, "transition aborted");
            self.report_error(&err);
            return Dispatch::Aborted(err);
        }
        self.reporter.cleared(Fault::Service);

        let action = match target {
            ConnectionState::Connected => Action::Connect,
            ConnectionState::Disconnected => Action::Disconnect,
        };
        self.set_transition(TransitionState::toward(target));
        self.dispatch(action);
        Dispatch::Started
    }

    fn begin_set_mode(&mut self, mode: OperatingMode) -> Dispatch {
        if self.transition.is_active() {
            return Dispatch::Busy;
        }
        if !mode.is_selectable() {
            let err = ControlError::UnsupportedMode(mode.to_string());
            self.report_error(&err);
            return Dispatch::Aborted(err);
        }
        self.dispatch(Action::SetMode(mode));
        Dispatch::Started
    }

    /// Hands the command to the worker; the result comes back as a completion.
    fn dispatch(&self, action: Action) {
        let handle = self.runner.spawn(
            &self.config.cli_program,
            &action.cli_args(),
            self.config.command_timeout,
        );
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = handle.await;
            let _ = completions.send(Completion { action, result });
        });
        info!(%action, "command dispatched");
    }

    async fn on_command_finished(&mut self, Completion { action, result }: Completion) {
        let outcome = classify(action, &result);
        debug!(%action, ?outcome, exit_code = result.exit_code, "command finished");

        match outcome.error(action, self.config.command_timeout) {
            Some(err) => self.report_error(&err),
            None => self.reporter.cleared(Fault::Command),
        }

        match action {
            Action::Connect | Action::Disconnect => {
                // Whatever the command claimed, find out what actually happened.
                self.refresh_mode().await;
                let expected = ConnectionState::from_connected(action == Action::Connect);
                self.poll_error_reported = false;
                self.poll.start(
                    expected.is_connected(),
                    self.state.is_connected(),
                    self.config.poll.initial_delay(expected),
                    Instant::now(),
                );
            }
            Action::Register => {
                if outcome.is_success() {
                    let message = if result.stdout.is_empty() {
                        "Registration completed."
                    } else {
                        result.stdout.as_str()
                    };
                    self.reporter
                        .info(&Notice::info(REGISTRATION_TITLE, message), &mut self.hub);
                }
            }
            Action::SetMode(_) => self.refresh_mode().await,
        }
    }

    async fn on_poll_tick(&mut self) {
        let strategy = self.mode.mode().probe_strategy();
        let observed = match self.probe.probe(strategy, self.state).await {
            Ok(state) => {
                self.reporter.cleared(Fault::Probe);
                Some(state.is_connected())
            }
            Err(err) => {
                if !self.poll_error_reported {
                    self.poll_error_reported = true;
                    self.report_error(&err);
                }
                None
            }
        };

        if let Some(PollStep::Settled {
            connected,
            converged,
        }) = self.poll.observe(observed, Instant::now())
        {
            debug!(connected, converged, "reconciliation settled");
            self.commit(ConnectionState::from_connected(connected));
            self.set_transition(TransitionState::None);
            self.schedule_passive();
        }
    }

    async fn passive_check(&mut self) {
        let strategy = self.mode.mode().probe_strategy();
        match self.probe.probe(strategy, self.state).await {
            Ok(state) => {
                self.reporter.cleared(Fault::Probe);
                self.commit(state);
            }
            Err(err) if self.reporter.is_failing(Fault::Probe) => {
                debug!(%err, "passive check still failing");
            }
            Err(err) => self.report_error(&err),
        }
        self.schedule_passive();
    }

    async fn refresh_mode(&mut self) {
        let before = self.mode.mode();
        let mode = self
            .mode
            .refresh(
                &self.runner,
                &self.config.cli_program,
                self.config.prerequisite_timeout,
            )
            .await;
        if mode != before {
            info!(%mode, strategy = ?mode.probe_strategy(), "operating mode");
            self.publish_snapshot();
        }
    }

    fn schedule_passive(&mut self) {
        self.next_passive = Some(Instant::now() + self.reporter.passive_interval());
    }

    /// Publishes the error. When it degrades the cadence, the pending
    /// passive check moves out to the degraded interval.
    fn report_error(&mut self, err: &ControlError) {
        if self
            .reporter
            .error(err.fault(), &err.notice(), &mut self.hub)
        {
            self.schedule_passive();
        }
    }

    /// Writes the canonical state. Surfaces only hear about actual changes.
    fn commit(&mut self, state: ConnectionState) {
        if state != self.state {
            info!(from = ?self.state, to = ?state, "connection state changed");
        }
        self.state = state;
        self.publish_snapshot();
        self.hub.notify(state.is_connected());
    }

    fn set_transition(&mut self, transition: TransitionState) {
        if transition == self.transition {
            return;
        }
        self.transition = transition;
        self.publish_snapshot();
        self.hub.publish_transition(transition);
    }

    fn current_snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            transition: self.transition,
            mode: self.mode.mode(),
        }
    }

    fn publish_snapshot(&self) {
        let next = self.current_snapshot();
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

fn reply_with(reply: oneshot::Sender<Dispatch>, dispatch: Dispatch) {
    if reply.send(dispatch).is_err() {
        debug!("requester went away before the reply");
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
