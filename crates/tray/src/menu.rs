//! Dynamic context menu for the system tray.

use warptray_connection::{OperatingMode, TransitionState};

/// Actions that can be triggered from the tray context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Connect or disconnect, depending on the current state.
    Toggle,
    /// Bring up the main window.
    Show,
    /// Create a new WARP registration.
    Register,
    Quit,
}

/// A single menu item.
#[derive(Debug, Clone)]
pub struct MenuItem {
    /// Display text.
    pub label: String,
    /// Whether the item is enabled (clickable).
    pub enabled: bool,
    /// Optional action triggered on click.
    pub action: Option<MenuAction>,
}

impl MenuItem {
    fn label(text: impl Into<String>) -> Self {
        Self {
            label: text.into(),
            enabled: false,
            action: None,
        }
    }

    fn separator() -> Self {
        Self::label(String::new())
    }

    fn action(text: impl Into<String>, action: MenuAction, enabled: bool) -> Self {
        Self {
            label: text.into(),
            enabled,
            action: Some(action),
        }
    }
}

/// Current state used to build the context menu.
#[derive(Debug, Clone)]
pub struct MenuState {
    /// Name shown in the header.
    pub app_name: String,
    /// Last verified connection state.
    pub connected: bool,
    pub transition: TransitionState,
    pub mode: OperatingMode,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            app_name: "Cloudflare WARP".into(),
            connected: false,
            transition: TransitionState::None,
            mode: OperatingMode::default(),
        }
    }
}

impl MenuState {
    pub fn status_label(&self) -> &'static str {
        match self.transition {
            TransitionState::Connecting => "Connecting...",
            TransitionState::Disconnecting => "Disconnecting...",
            TransitionState::None if self.connected => "Connected",
            TransitionState::None => "Disconnected",
        }
    }

    /// Builds the menu items from the current state.
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let busy = self.transition.is_active();
        let toggle = if self.connected { "Disconnect" } else { "Connect" };

        vec![
            MenuItem::label(format!("{}: {}", self.app_name, self.status_label())),
            MenuItem::label(format!("Mode: {}", self.mode)),
            MenuItem::separator(),
            // A click while a transition is in flight would be dropped anyway.
            MenuItem::action(toggle, MenuAction::Toggle, !busy),
            MenuItem::action("Show", MenuAction::Show, true),
            MenuItem::action("Register", MenuAction::Register, true),
            MenuItem::separator(),
            MenuItem::action("Quit", MenuAction::Quit, true),
        ]
    }
}
