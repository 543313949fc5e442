//! Fire-and-forget task helpers. Results come back to the core as events.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::event::Event;

fn runtime(label: &'static str) -> Option<Handle> {
    match Handle::try_current() {
        Ok(handle) => Some(handle),
        Err(_) => {
            warn!(task = label, "no async runtime, skipping background task");
            None
        }
    }
}

/// At-most-once, best-effort. The error is logged and dropped.
pub(crate) fn spawn_detached<F, E>(label: &'static str, fut: F)
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    if let Some(handle) = runtime(label) {
        handle.spawn(async move {
            match fut.await {
                Ok(()) => debug!(task = label, "background task finished"),
                Err(e) => warn!(task = label, error = %e, "background task failed"),
            }
        });
    }
}

/// Runs `fut` and feeds its event, if any, back into the core. Returns
/// false when nothing was spawned.
pub(crate) fn spawn_event<F>(tx: &UnboundedSender<Event>, label: &'static str, fut: F) -> bool
where
    F: Future<Output = Option<Event>> + Send + 'static,
{
    let Some(handle) = runtime(label) else {
        return false;
    };
    let tx = tx.clone();
    handle.spawn(async move {
        if let Some(event) = fut.await {
            if tx.send(event).is_err() {
                debug!(task = label, "core dropped before task completed");
            }
        }
    });
    true
}

pub(crate) fn spawn_timer(
    tx: &UnboundedSender<Event>,
    label: &'static str,
    delay: Duration,
    event: Event,
) -> bool {
    spawn_event(tx, label, async move {
        tokio::time::sleep(delay).await;
        Some(event)
    })
}
