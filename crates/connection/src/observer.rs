//! Fan-out of verified state changes to UI surfaces.

use std::sync::Weak;

use tracing::trace;

use crate::types::{Notice, NoticeLevel, TransitionState};

/// Contract a UI surface implements to follow the controller.
///
/// Calls are made synchronously from the control loop, so implementations
/// should only record the change and return.
pub trait Surface: Send + Sync {
    fn connection_changed(&self, connected: bool);

    fn error_occurred(&self, title: &str, message: &str);

    fn info_occurred(&self, title: &str, message: &str);

    /// Presentation hint while a transition is in flight.
    fn transition_changed(&self, _transition: TransitionState) {}
}

/// Holds non-owning references to surfaces and deduplicates state broadcasts.
#[derive(Default)]
pub struct ObserverHub {
    surfaces: Vec<Weak<dyn Surface>>,
    last_broadcast: Option<bool>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a surface. A surface joining after the first broadcast is told
    /// the current value right away; nobody else hears it again.
    pub fn subscribe(&mut self, surface: Weak<dyn Surface>) {
        if let (Some(connected), Some(live)) = (self.last_broadcast, surface.upgrade()) {
            live.connection_changed(connected);
        }
        self.surfaces.push(surface);
    }

    /// Broadcasts `connected` unless it equals the last broadcast value.
    /// Returns whether anything was sent.
    pub fn notify(&mut self, connected: bool) -> bool {
        if self.last_broadcast == Some(connected) {
            trace!(connected, "state unchanged, not broadcasting");
            return false;
        }
        self.last_broadcast = Some(connected);
        self.for_each_live(|s| s.connection_changed(connected));
        true
    }

    pub fn publish_notice(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Error => {
                self.for_each_live(|s| s.error_occurred(&notice.title, &notice.message))
            }
            NoticeLevel::Info => {
                self.for_each_live(|s| s.info_occurred(&notice.title, &notice.message))
            }
        }
    }

    pub fn publish_transition(&mut self, transition: TransitionState) {
        self.for_each_live(|s| s.transition_changed(transition));
    }

    pub fn last_broadcast(&self) -> Option<bool> {
        self.last_broadcast
    }

    /// Surfaces still alive, without pruning.
    pub fn live_count(&self) -> usize {
        self.surfaces.iter().filter(|s| s.strong_count() > 0).count()
    }

    /// Calls `f` on every live surface in subscription order and forgets the
    /// dropped ones.
    fn for_each_live(&mut self, mut f: impl FnMut(&dyn Surface)) {
        self.surfaces.retain(|weak| match weak.upgrade() {
            Some(surface) => {
                f(surface.as_ref());
                true
            }
            None => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{RecordingSurface, SurfaceEvent};

    fn weak(surface: &Arc<RecordingSurface>) -> Weak<dyn Surface> {
        let surface: Arc<dyn Surface> = surface.clone();
        Arc::downgrade(&surface)
    }

    #[test]
    fn equal_values_are_not_rebroadcast() {
        let mut hub = ObserverHub::new();
        let surface = RecordingSurface::new();
        hub.subscribe(weak(&surface));

        assert!(hub.notify(true));
        assert!(!hub.notify(true));
        assert!(hub.notify(false));
        assert!(!hub.notify(false));

        assert_eq!(surface.states(), [true, false]);
    }

    #[test]
    fn surfaces_notified_in_subscription_order() {
        let mut hub = ObserverHub::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let first = RecordingSurface::named("first", &log);
        let second = RecordingSurface::named("second", &log);
        hub.subscribe(weak(&first));
        hub.subscribe(weak(&second));

        hub.notify(true);
        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn dropped_surfaces_are_pruned() {
        let mut hub = ObserverHub::new();
        let kept = RecordingSurface::new();
        let dropped = RecordingSurface::new();
        hub.subscribe(weak(&kept));
        hub.subscribe(weak(&dropped));
        assert_eq!(hub.live_count(), 2);

        drop(dropped);
        hub.notify(true);
        assert_eq!(hub.live_count(), 1);
        assert_eq!(hub.surfaces.len(), 1);
        assert_eq!(kept.states(), [true]);
    }

    #[test]
    fn late_subscriber_gets_current_value_only() {
        let mut hub = ObserverHub::new();
        let early = RecordingSurface::new();
        hub.subscribe(weak(&early));
        hub.notify(true);

        let late = RecordingSurface::new();
        hub.subscribe(weak(&late));

        assert_eq!(early.states(), [true]);
        assert_eq!(late.states(), [true]);
    }

    #[test]
    fn notices_are_forwarded_by_level() {
        let mut hub = ObserverHub::new();
        let surface = RecordingSurface::new();
        hub.subscribe(weak(&surface));

        hub.publish_notice(&Notice::error("Service Error", "down"));
        hub.publish_notice(&Notice::info("Registration", "done"));
        hub.publish_transition(TransitionState::Connecting);

        assert_eq!(
            surface.events(),
            [
                SurfaceEvent::Error("Service Error".into(), "down".into()),
                SurfaceEvent::Info("Registration".into(), "done".into()),
                SurfaceEvent::Transition(TransitionState::Connecting),
            ]
        );
    }
}
