//! Reconnect loop shared by every protocol adapter.
//!
//! Adapters call [`run_reconnect`] from a background task when their
//! listener observes a broken transport (or a send fails). The loop waits
//! `min(base * 2^(k-1), 300 s)` before attempt `k`, gives up after
//! `max_reconnect_attempts`, and stops early when the adapter's shutdown
//! channel fires.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use synhome_domain::error::SynHomeError;
use synhome_domain::id::AdapterId;
use synhome_domain::reconnect::ReconnectConfig;
use tokio::sync::watch;

/// How a reconnect loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Reconnected,
    Exhausted,
    Cancelled,
}

/// Reconnect bookkeeping of one adapter.
#[derive(Debug, Default)]
pub struct ReconnectState {
    attempts: AtomicU32,
    running: AtomicBool,
}

impl ReconnectState {
    /// Failed attempts since the last successful connection.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.attempts.store(0, Ordering::SeqCst);
    }

    /// Claim the reconnect loop; `false` when one is already running.
    #[must_use]
    pub fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the claim taken by [`try_begin`](Self::try_begin).
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Retry `attempt` with exponential backoff until it succeeds, the attempt
/// budget runs out, or `shutdown` fires.
pub async fn run_reconnect<F, Fut>(
    adapter_id: &AdapterId,
    policy: &ReconnectConfig,
    state: &ReconnectState,
    mut shutdown: watch::Receiver<bool>,
    mut attempt: F,
) -> ReconnectOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), SynHomeError>>,
{
    loop {
        if *shutdown.borrow_and_update() {
            return ReconnectOutcome::Cancelled;
        }
        let failed = state.attempts();
        if !policy.allows(failed) {
            tracing::error!(
                adapter_id = %adapter_id,
                attempts = failed,
                "reconnect attempts exhausted, adapter stays disconnected"
            );
            return ReconnectOutcome::Exhausted;
        }

        let current = failed + 1;
        state.attempts.store(current, Ordering::SeqCst);
        let delay = policy.delay_for(current);
        tracing::info!(
            adapter_id = %adapter_id,
            attempt = current,
            max_attempts = policy.max_reconnect_attempts,
            delay_secs = delay.as_secs(),
            "scheduling reconnect"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                tracing::debug!(adapter_id = %adapter_id, "reconnect cancelled");
                return ReconnectOutcome::Cancelled;
            }
        }

        match attempt().await {
            Ok(()) => {
                state.reset();
                tracing::info!(adapter_id = %adapter_id, attempt = current, "reconnected");
                return ReconnectOutcome::Reconnected;
            }
            Err(err) => {
                tracing::warn!(adapter_id = %adapter_id, attempt = current, error = %err, "reconnect attempt failed");
            }
        }
    }
}
