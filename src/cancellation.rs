//! A single cooperative cancellation flag, checked at tick and subject boundaries.
//!
//! Signal handlers only ever set the flag; they never block and never interrupt an
//! in-flight HTTP call. The engine observes the flag between suspension points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Spawns a task that sets the flag on SIGINT/SIGTERM. Installed once at engine start.
    pub fn install_signal_handlers(&self) {
        let flag = self.clone();

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};

                let mut terminate = match signal(SignalKind::terminate()) {
                    Ok(sig) => sig,
                    Err(error) => {
                        tracing::warn!(%error, "failed to install SIGTERM handler");
                        return;
                    }
                };

                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }

            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }

            tracing::info!("cancellation requested, finishing in-flight work");
            flag.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn cancel_is_observed_through_clones() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();

        clone.cancel();

        assert!(flag.is_cancelled());
    }
}
