//! Interrupt handling for the server process.

use std::{future::Future, io};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Why [`watch_interrupts`] stopped watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// A second interrupt arrived; the caller should exit immediately.
    Forced,
    /// Interrupts can no longer be received.
    Unavailable,
}

/// Cancel `token` on the first interrupt produced by `next` and report
/// [`InterruptOutcome::Forced`] on the second.
///
/// An error from `next` means the handler could not be installed, so
/// watching stops instead of retrying.
pub async fn watch_interrupts<F, Fut>(token: CancellationToken, mut next: F) -> InterruptOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    loop {
        if let Err(err) = next().await {
            warn!(error = %err, "unable to listen for interrupts");
            return InterruptOutcome::Unavailable;
        }
        if token.is_cancelled() {
            return InterruptOutcome::Forced;
        }
        info!("interrupt received, shutting down; interrupt again to force exit");
        token.cancel();
    }
}
