//! Application orchestrator: wires the controller to the tray or runs a
//! single action from the command line.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warptray_command::CommandRunner;
use warptray_connection::{
    Action, ConnectionController, ControllerHandle, Dispatch, Notice, OperatingMode,
    REGISTRATION_TITLE, Snapshot, Surface,
};
use warptray_tray::{TrayConfig, TrayEvent, TrayHandle};

use crate::cli::Commands;
use crate::config::Config;
use crate::instance::InstanceLock;

/// How often the tray's event channel is drained.
const TRAY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs the tray until the user quits or SIGINT arrives.
pub async fn run(config: Config, show: bool) -> anyhow::Result<()> {
    let _lock = InstanceLock::acquire()?;
    let cancel = CancellationToken::new();

    // -- Controller --
    let (controller, handle) =
        ConnectionController::new(config.controller_config(), CommandRunner::new());
    let controller_task = tokio::spawn(controller.run(cancel.clone()));

    // -- Tray --
    let tray_config = TrayConfig {
        show_on_start: show || config.show_on_start,
        ..TrayConfig::default()
    };
    let (tray, _event_tx, update_rx) = TrayHandle::new(tray_config);
    handle.subscribe(tray.surface()).await?;

    // Headless backend: the icon renderer is platform-specific, log instead.
    std::thread::spawn(move || {
        for update in update_rx {
            debug!(?update, "tray update");
        }
    });

    let snapshot = handle.query().await?;
    info!(state = ?snapshot.state, mode = %snapshot.mode, "warptray ready");

    // -- Main loop: wait for shutdown --
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received, shutting down");
        }
        result = tray_loop(&tray, &handle) => {
            result?;
            info!("quit requested via tray");
        }
    }

    // -- Graceful shutdown --
    cancel.cancel();
    controller_task.await?;
    tray.shutdown();
    Ok(())
}

async fn tray_loop(tray: &TrayHandle, handle: &ControllerHandle) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(TRAY_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        tray.surface().set_mode(handle.mode());

        while let Some(event) = tray.try_recv_event() {
            debug!(?event, "tray event");
            match event {
                TrayEvent::QuitRequested => return Ok(()),
                TrayEvent::ShowRequested => tray.show(),
                TrayEvent::ToggleRequested => log_dispatch("toggle", &handle.toggle().await?),
                TrayEvent::RegisterRequested => {
                    log_dispatch("register", &handle.register().await?)
                }
            }
        }
    }
}

fn log_dispatch(what: &str, dispatch: &Dispatch) {
    match dispatch {
        Dispatch::Started => debug!(what, "dispatched"),
        Dispatch::Busy => info!(what, "ignored, a transition is already in progress"),
        Dispatch::Aborted(e) => warn!(what, "aborted: {e}"),
    }
}

/// Prints notices to stderr as they arrive and forwards them for waiting.
struct ConsoleSurface {
    notices: mpsc::UnboundedSender<Notice>,
}

impl ConsoleSurface {
    fn forward(&self, notice: Notice) {
        eprintln!("{}: {}", notice.title, notice.message);
        let _ = self.notices.send(notice);
    }
}

impl Surface for ConsoleSurface {
    fn connection_changed(&self, connected: bool) {
        debug!(connected, "connection state");
    }

    fn error_occurred(&self, title: &str, message: &str) {
        self.forward(Notice::error(title, message));
    }

    fn info_occurred(&self, title: &str, message: &str) {
        self.forward(Notice::info(title, message));
    }
}

/// Runs one action against a private controller, prints the verified
/// result, and exits.
pub async fn run_once(config: Config, command: Commands) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let (controller, handle) = ConnectionController::new(
        config.one_shot_controller_config(),
        CommandRunner::new(),
    );
    let controller_task = tokio::spawn(controller.run(cancel.clone()));

    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let console = Arc::new(ConsoleSurface { notices: notice_tx });
    handle.subscribe(&console).await?;
    let before = handle.query().await?;

    // Command timeout plus a margin for the settings refresh.
    let limit = Duration::from_secs(config.command_timeout_secs + 5);
    let outcome = match command {
        Commands::Status => Ok(()),
        Commands::Connect => transition(&handle, handle.connect().await?).await,
        Commands::Disconnect => transition(&handle, handle.disconnect().await?).await,
        Commands::Toggle => transition(&handle, handle.toggle().await?).await,
        Commands::Register => match expect_started(handle.register().await?) {
            Ok(()) => wait_for_registration(&mut notices, limit).await,
            Err(e) => Err(e),
        },
        Commands::SetMode { mode } if mode == before.mode => {
            println!("Already in mode {mode}");
            Ok(())
        }
        Commands::SetMode { mode } => match expect_started(handle.set_mode(mode).await?) {
            Ok(()) => wait_for_mode(&handle, mode, &mut notices, limit).await,
            Err(e) => Err(e),
        },
    };

    print_snapshot(&handle.query().await?);

    cancel.cancel();
    controller_task.await?;
    outcome
}

fn expect_started(dispatch: Dispatch) -> anyhow::Result<()> {
    match dispatch {
        Dispatch::Started => Ok(()),
        Dispatch::Busy => bail!("another transition is already in progress"),
        Dispatch::Aborted(e) => Err(e.into()),
    }
}

async fn transition(handle: &ControllerHandle, dispatch: Dispatch) -> anyhow::Result<()> {
    expect_started(dispatch)?;
    handle.settled().await?;
    Ok(())
}

async fn wait_for_registration(
    notices: &mut mpsc::UnboundedReceiver<Notice>,
    limit: Duration,
) -> anyhow::Result<()> {
    match tokio::time::timeout(limit, registration_result(notices)).await {
        Ok(result) => result,
        Err(_) => bail!("no answer within {}s", limit.as_secs()),
    }
}

/// Skips unrelated notices, such as a failed status check, until the
/// registration outcome arrives.
async fn registration_result(
    notices: &mut mpsc::UnboundedReceiver<Notice>,
) -> anyhow::Result<()> {
    while let Some(notice) = notices.recv().await {
        if notice.title == REGISTRATION_TITLE {
            return Ok(());
        }
        if notice.title == Action::Register.error_title() {
            bail!("{}: {}", notice.title, notice.message);
        }
        debug!(title = %notice.title, "ignoring unrelated notice");
    }
    bail!("controller stopped before the command finished")
}

async fn wait_for_mode(
    handle: &ControllerHandle,
    mode: OperatingMode,
    notices: &mut mpsc::UnboundedReceiver<Notice>,
    limit: Duration,
) -> anyhow::Result<()> {
    match tokio::time::timeout(limit, mode_reached(handle.clone(), mode, notices)).await {
        Ok(result) => result,
        Err(_) => bail!("mode did not change within {}s", limit.as_secs()),
    }
}

/// Resolves once the controller reports `mode`, or fails on an error notice.
async fn mode_reached(
    mut handle: ControllerHandle,
    mode: OperatingMode,
    notices: &mut mpsc::UnboundedReceiver<Notice>,
) -> anyhow::Result<()> {
    while handle.mode() != mode {
        tokio::select! {
            changed = handle.changed() => {
                changed?;
            }
            Some(notice) = notices.recv() => {
                if notice.title == Action::SetMode(mode).error_title() {
                    bail!("{}: {}", notice.title, notice.message);
                }
            }
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &Snapshot) {
    let state = if snapshot.state.is_connected() {
        "Connected"
    } else {
        "Disconnected"
    };
    println!("Status: {state}");
    println!("Mode: {}", snapshot.mode);
}
