//! Cooperative cancellation
//!
//! A [`CancellationToken`] is created per scheduler run and moves from
//! not-set to set exactly once. Every wait point in the worker races its
//! sleep against [`CancellationToken::cancelled`], so a stop request is seen
//! immediately rather than at the next poll.

use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::sync::watch;

/// Exit status after a second interrupt, as a shell reports SIGINT.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Set the token. Returns `true` only for the call that changed it.
    pub fn cancel(&self) -> bool {
        self.state.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the token is set (immediately if it already is).
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` when the sleep was cut short by cancellation.
    pub async fn sleep(&self, duration: std::time::Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_cancelled(),
            _ = self.cancelled() => true,
        }
    }
}

/// Cancel `token` on the first Ctrl-C. A second Ctrl-C exits at once with
/// [`EXIT_INTERRUPTED`], skipping cleanup.
pub fn install_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(relay_interrupts(token, tokio::signal::ctrl_c, || {
        std::process::exit(EXIT_INTERRUPTED)
    }))
}

async fn relay_interrupts<F, Fut>(
    token: CancellationToken,
    mut next: F,
    on_second: impl FnOnce(),
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(err) = next().await {
        tracing::warn!(%err, "cannot listen for interrupts");
        return;
    }
    tracing::info!("interrupt received, stopping after cleanup");
    token.cancel();

    if next().await.is_ok() {
        tracing::warn!("second interrupt, exiting without cleanup");
        on_second();
    }
}
