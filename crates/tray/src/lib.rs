//! System tray surface for warptray.
//!
//! Provides the context menu model and a [`TraySurface`] that follows the
//! connection controller. The tray communicates with the application via
//! channels:
//! - [`TrayEvent`]: menu clicks going to the application
//! - [`TrayUpdate`]: state changes and notices going to the tray backend
//!
//! # Platform notes
//! - Linux: StatusNotifierItem (Wayland) or the X11 tray protocol
//! - The tray event loop must run on the main thread on some platforms

mod menu;
mod notice;
mod tray;

pub use menu::{MenuAction, MenuItem, MenuState};
pub use notice::{MAX_NOTICES, NoticeQueue, QueuedNotice};
pub use tray::{TrayConfig, TrayEvent, TrayHandle, TraySurface, TrayUpdate};
