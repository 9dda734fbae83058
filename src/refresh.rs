//! Proactive token refresh scheduling.
//!
//! DESIGN
//! ======
//! A single tokio task sleeps until `exp - lead` and then runs the task it
//! was armed with. Arming always aborts the previous pending task first, so
//! at most one refresh is outstanding. A task that has started firing
//! removes itself from the slot before running, which lets it re-arm the
//! scheduler without aborting itself.

#[cfg(test)]
#[path = "refresh_test.rs"]
mod refresh_test;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::token::{decode_expiry, now_millis};

/// Default margin between the scheduled refresh and the token expiry.
pub const DEFAULT_REFRESH_LEAD: Duration = Duration::from_secs(5 * 60);

/// Time from `now_millis` until `exp_secs - lead`, or `None` if that moment
/// has already passed.
#[must_use]
pub fn refresh_delay(exp_secs: i64, now_millis: i64, lead: Duration) -> Option<Duration> {
    let lead_ms = i64::try_from(lead.as_millis()).unwrap_or(i64::MAX);
    let remaining = exp_secs.saturating_mul(1000).saturating_sub(now_millis).saturating_sub(lead_ms);
    u64::try_from(remaining).ok().filter(|ms| *ms > 0).map(Duration::from_millis)
}

struct Pending {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Cancellable one-shot refresh timer. Clones share the same slot.
#[derive(Clone)]
pub struct RefreshScheduler {
    lead: Duration,
    slot: Arc<Mutex<Option<Pending>>>,
    generation: Arc<AtomicU64>,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(lead: Duration) -> Self {
        Self { lead, slot: Arc::new(Mutex::new(None)), generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Cancel any pending refresh, then schedule `on_fire` to run `lead`
    /// before the expiry embedded in `token`.
    ///
    /// Returns `false` when nothing was scheduled: the token does not decode,
    /// it is already inside the lead window, or no tokio runtime is running.
    pub fn arm<F>(&self, token: &str, on_fire: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.handle.abort();
            debug!(generation = previous.generation, "pending refresh cancelled by re-arm");
        }

        let exp = match decode_expiry(token) {
            Ok(exp) => exp,
            Err(e) => {
                warn!(error = %e, "cannot schedule refresh for undecodable token");
                return false;
            }
        };
        let Some(delay) = refresh_delay(exp, now_millis(), self.lead) else {
            debug!(exp, "token inside refresh lead window; not scheduling");
            return false;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; refresh not scheduled");
            return false;
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let deadline = Instant::now() + delay;
        let task_slot = Arc::clone(&self.slot);
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut slot = task_slot.lock().unwrap_or_else(PoisonError::into_inner);
                if !slot.as_ref().is_some_and(|p| p.generation == generation) {
                    return;
                }
                *slot = None;
            }
            debug!(generation, "refresh timer fired");
            on_fire.await;
        });

        *slot = Some(Pending { generation, deadline, handle });
        info!(generation, delay_secs = delay.as_secs(), "token refresh scheduled");
        true
    }

    /// Drop the pending refresh, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
            previous.handle.abort();
            debug!(generation = previous.generation, "pending refresh cancelled");
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// When the pending refresh will fire.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| p.deadline)
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_LEAD)
    }
}
