//! Event bus observers
//!
//! Components that react to engine events (progress, read-along sync,
//! preloading) implement [`EventObserver`] and run on their own task.

use async_trait::async_trait;
use lectern_common::events::LecternEvent;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[async_trait]
pub trait EventObserver: Send + Sync + 'static {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: LecternEvent);
}

/// Feed every event from `rx` to `observer` until the bus closes
///
/// A lagging observer logs the number of skipped events and carries on
/// with the newest ones.
pub async fn run_observer<O: EventObserver + ?Sized>(
    observer: Arc<O>,
    mut rx: broadcast::Receiver<LecternEvent>,
) {
    info!("{} observer started", observer.name());
    loop {
        match rx.recv().await {
            Ok(event) => {
                debug!("{} <- {}", observer.name(), event.event_type());
                observer.on_event(event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("{} observer lagged, skipped {} events", observer.name(), skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
    info!("{} observer stopped", observer.name());
}

/// Spawn [`run_observer`] on the runtime
///
/// Subscribe before calling so no event emitted in between is missed.
pub fn spawn_observer<O: EventObserver + ?Sized>(
    observer: Arc<O>,
    rx: broadcast::Receiver<LecternEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run_observer(observer, rx))
}
