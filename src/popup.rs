use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::ConnectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupSize {
    pub width: u32,
    pub height: u32,
}

impl PopupSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for PopupSize {
    fn default() -> Self {
        Self::new(600, 600)
    }
}

/// A window the flow does not control; the only thing it can observe is
/// whether the window has been closed.
pub trait PopupHandle: Send + Sync {
    fn is_closed(&self) -> bool;
}

/// Somewhere an authorization URL can be shown to the user.
pub trait ApprovalSurface: Send + Sync {
    /// Returns `None` when the surface could not be opened (e.g. blocked).
    fn open(&self, url: &str, title: &str, size: PopupSize) -> Option<Box<dyn PopupHandle>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Closed,
    NeverOpened,
}

/// Polls `handle` every `interval` until it reports closed.
///
/// The first check happens one interval after the call. The ticker lives only
/// inside this function, so it is released as soon as a result is returned.
pub async fn wait_for_close(
    handle: Option<&dyn PopupHandle>,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<PollOutcome, ConnectError> {
    let Some(handle) = handle else {
        return Ok(PollOutcome::NeverOpened);
    };

    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, poll_closed(handle, interval))
            .await
            .map_err(|_| ConnectError::PollTimeout { timeout }),
        None => Ok(poll_closed(handle, interval).await),
    }
}

async fn poll_closed(handle: &dyn PopupHandle, interval: Duration) -> PollOutcome {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut checks: u64 = 0;
    loop {
        ticker.tick().await;
        checks += 1;
        if handle.is_closed() {
            tracing::debug!(checks, "authorization window closed");
            return PollOutcome::Closed;
        }
    }
}
