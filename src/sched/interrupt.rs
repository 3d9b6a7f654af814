// src/sched/interrupt.rs

//! Interrupt detection for the scheduler loop.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Polls an external cancellation token once per tick.
///
/// The transition into the stopping state is reported exactly once, on the
/// tick where cancellation is first observed; the loop uses that single
/// report to revoke outstanding work and emit the interrupted event.
#[derive(Debug)]
pub struct InterruptMonitor {
    token: CancellationToken,
    observed: bool,
}

impl InterruptMonitor {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            observed: false,
        }
    }

    /// Returns `true` exactly once: on the first tick where the token is
    /// found cancelled. Afterwards, use [`stopping`](Self::stopping).
    pub fn check(&mut self) -> bool {
        if !self.observed && self.token.is_cancelled() {
            self.observed = true;
            info!("interrupt observed; draining outstanding steps, no new dispatch");
            return true;
        }
        false
    }

    /// Whether an interrupt has been observed at any point.
    pub fn stopping(&self) -> bool {
        self.observed
    }
}
