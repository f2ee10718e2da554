//! Tray handle, surface, events, and update types.
//!
//! The icon itself needs platform libraries (StatusNotifierItem on Linux).
//! This module defines the channel-based interface between the controller
//! and whatever backend draws the icon, independent of the GUI toolkit.

use std::sync::{Arc, Mutex, MutexGuard, mpsc};

use tracing::{debug, trace};
use warptray_connection::{Notice, OperatingMode, Surface, TransitionState};

use crate::menu::MenuState;
use crate::notice::NoticeQueue;

/// Configuration for the system tray.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    /// Name shown in the tooltip and menu header.
    pub app_name: String,
    /// Open the main window right away.
    pub show_on_start: bool,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            app_name: "Cloudflare WARP".into(),
            show_on_start: false,
        }
    }
}

/// Events emitted by the tray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    ToggleRequested,
    ShowRequested,
    RegisterRequested,
    QuitRequested,
}

/// Updates sent to the tray backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrayUpdate {
    ConnectionChanged(bool),
    TransitionChanged(TransitionState),
    ModeChanged(OperatingMode),
    /// A notice to display, keyed by its queue ID.
    NoticePosted(u64, Notice),
    ShowWindow,
    Shutdown,
}

/// The tray's side of the controller's surface contract.
///
/// Keeps its own copy of the menu state so the backend can redraw from
/// scratch, and forwards every change as a [`TrayUpdate`].
pub struct TraySurface {
    update_tx: mpsc::Sender<TrayUpdate>,
    state: Mutex<MenuState>,
    notices: Mutex<NoticeQueue>,
}

impl TraySurface {
    fn send(&self, update: TrayUpdate) {
        trace!(?update, "tray update");
        if self.update_tx.send(update).is_err() {
            debug!("tray backend gone, dropping update");
        }
    }

    /// Returns a copy of the current menu state.
    pub fn state(&self) -> MenuState {
        lock(&self.state).clone()
    }

    pub fn notices(&self) -> NoticeQueue {
        lock(&self.notices).clone()
    }

    pub fn dismiss_notice(&self, id: u64) -> bool {
        lock(&self.notices).dismiss(id)
    }

    /// Records the operating mode shown in the menu.
    pub fn set_mode(&self, mode: OperatingMode) {
        {
            let mut state = lock(&self.state);
            if state.mode == mode {
                return;
            }
            state.mode = mode;
        }
        self.send(TrayUpdate::ModeChanged(mode));
    }

    fn post(&self, notice: Notice) {
        let id = lock(&self.notices).push(notice.clone());
        self.send(TrayUpdate::NoticePosted(id, notice));
    }
}

impl Surface for TraySurface {
    fn connection_changed(&self, connected: bool) {
        lock(&self.state).connected = connected;
        self.send(TrayUpdate::ConnectionChanged(connected));
    }

    fn error_occurred(&self, title: &str, message: &str) {
        self.post(Notice::error(title, message));
    }

    fn info_occurred(&self, title: &str, message: &str) {
        self.post(Notice::info(title, message));
    }

    fn transition_changed(&self, transition: TransitionState) {
        lock(&self.state).transition = transition;
        self.send(TrayUpdate::TransitionChanged(transition));
    }
}

/// A poisoned menu lock only means a renderer panicked mid-update; the
/// state inside is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle for communicating with the system tray from the application.
///
/// The tray event loop runs on the main thread and talks to this handle
/// through channels.
pub struct TrayHandle {
    surface: Arc<TraySurface>,
    event_rx: mpsc::Receiver<TrayEvent>,
}

impl TrayHandle {
    /// Creates a new tray handle with its channel pair.
    ///
    /// Returns `(handle, event_sender, update_receiver)`; the sender and
    /// receiver belong to the tray event loop.
    pub fn new(config: TrayConfig) -> (Self, mpsc::Sender<TrayEvent>, mpsc::Receiver<TrayUpdate>) {
        let (update_tx, update_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let surface = Arc::new(TraySurface {
            update_tx,
            state: Mutex::new(MenuState {
                app_name: config.app_name,
                ..MenuState::default()
            }),
            notices: Mutex::new(NoticeQueue::new()),
        });
        let handle = Self { surface, event_rx };
        if config.show_on_start {
            handle.show();
        }

        (handle, event_tx, update_rx)
    }

    /// The surface to subscribe to the controller.
    pub fn surface(&self) -> &Arc<TraySurface> {
        &self.surface
    }

    pub fn show(&self) {
        self.surface.send(TrayUpdate::ShowWindow);
    }

    /// Requests the tray to shut down.
    pub fn shutdown(&self) {
        self.surface.send(TrayUpdate::Shutdown);
    }

    /// Tries to receive a tray event (non-blocking).
    pub fn try_recv_event(&self) -> Option<TrayEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Returns the current menu state.
    pub fn state(&self) -> MenuState {
        self.surface.state()
    }
}
