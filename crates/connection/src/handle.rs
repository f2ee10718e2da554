//! Cloneable front end to a running [`ConnectionController`].
//!
//! [`ConnectionController`]: crate::controller::ConnectionController

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot, watch};

use crate::error::ControlError;
use crate::mode::OperatingMode;
use crate::observer::Surface;
use crate::types::{ConnectionState, Dispatch, Snapshot, TransitionState};

/// Messages processed by the control loop, in arrival order.
pub(crate) enum Request {
    Connect(oneshot::Sender<Dispatch>),
    Disconnect(oneshot::Sender<Dispatch>),
    Toggle(oneshot::Sender<Dispatch>),
    Register(oneshot::Sender<Dispatch>),
    SetMode(OperatingMode, oneshot::Sender<Dispatch>),
    Observed(bool),
    Subscribe(Weak<dyn Surface>),
    Query(oneshot::Sender<Snapshot>),
}

#[derive(Clone)]
pub struct ControllerHandle {
    requests: mpsc::Sender<Request>,
    snapshot: watch::Receiver<Snapshot>,
}

impl ControllerHandle {
    pub(crate) fn new(requests: mpsc::Sender<Request>, snapshot: watch::Receiver<Snapshot>) -> Self {
        Self { requests, snapshot }
    }

    /// Checks the service and dispatches `warp-cli connect`.
    pub async fn connect(&self) -> Result<Dispatch, ControlError> {
        self.dispatch(Request::Connect).await
    }

    /// Checks the service and dispatches `warp-cli disconnect`.
    pub async fn disconnect(&self) -> Result<Dispatch, ControlError> {
        self.dispatch(Request::Disconnect).await
    }

    /// Connects when disconnected and vice versa. Rejected while busy.
    pub async fn toggle(&self) -> Result<Dispatch, ControlError> {
        self.dispatch(Request::Toggle).await
    }

    pub async fn register(&self) -> Result<Dispatch, ControlError> {
        self.dispatch(Request::Register).await
    }

    pub async fn set_mode(&self, mode: OperatingMode) -> Result<Dispatch, ControlError> {
        self.dispatch(|reply| Request::SetMode(mode, reply)).await
    }

    /// Reports a state a surface observed on its own. It is committed like
    /// any other verified observation.
    pub async fn report_observed(&self, connected: bool) -> Result<(), ControlError> {
        self.send(Request::Observed(connected)).await
    }

    /// Subscribes a surface. The controller only keeps a weak reference, so
    /// dropping the last `Arc` unsubscribes it.
    pub async fn subscribe<S: Surface + 'static>(&self, surface: &Arc<S>) -> Result<(), ControlError> {
        let surface: Arc<dyn Surface> = surface.clone();
        self.send(Request::Subscribe(Arc::downgrade(&surface))).await
    }

    /// Round-trips through the control loop, so every earlier request from
    /// this handle has been applied when it returns.
    pub async fn query(&self) -> Result<Snapshot, ControlError> {
        let (tx, rx) = oneshot::channel();
        self.send(Request::Query(tx)).await?;
        rx.await.map_err(|_| ControlError::ControllerGone)
    }

    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot.borrow()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.snapshot().state
    }

    pub fn is_busy(&self) -> bool {
        self.snapshot().is_busy()
    }

    pub fn transition(&self) -> TransitionState {
        self.snapshot().transition
    }

    pub fn mode(&self) -> OperatingMode {
        self.snapshot().mode
    }

    /// Waits until no transition is in flight.
    pub async fn settled(&self) -> Result<Snapshot, ControlError> {
        let mut rx = self.snapshot.clone();
        let snapshot = rx
            .wait_for(|s| !s.is_busy())
            .await
            .map_err(|_| ControlError::ControllerGone)?;
        Ok(*snapshot)
    }

    /// Waits for the next published snapshot.
    pub async fn changed(&mut self) -> Result<Snapshot, ControlError> {
        self.snapshot
            .changed()
            .await
            .map_err(|_| ControlError::ControllerGone)?;
        Ok(*self.snapshot.borrow_and_update())
    }

    async fn dispatch(
        &self,
        request: impl FnOnce(oneshot::Sender<Dispatch>) -> Request,
    ) -> Result<Dispatch, ControlError> {
        let (tx, rx) = oneshot::channel();
        self.send(request(tx)).await?;
        rx.await.map_err(|_| ControlError::ControllerGone)
    }

    async fn send(&self, request: Request) -> Result<(), ControlError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| ControlError::ControllerGone)
    }
}
