//! Cooperative shutdown.
//!
//! The drivers poll a [`ShutdownFlag`] between batches and between records.
//! Binaries raise it from a tokio `ctrl_c` listener while the driver runs on
//! a blocking thread.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop request.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Spawns a task that raises the flag on Ctrl-C.
    ///
    /// # Returns
    /// The task handle; abort it once the run has finished.
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let flag = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current record");
                    flag.request();
                }
                Err(e) => warn!("Unable to listen for interrupt signal: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = ShutdownFlag::new();
        let observer = flag.clone();
        assert!(!observer.is_requested());

        flag.request();
        assert!(observer.is_requested());
    }

    #[tokio::test]
    async fn test_listener_can_be_aborted() {
        let flag = ShutdownFlag::new();
        let handle = flag.listen_for_ctrl_c();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!flag.is_requested());
    }
}
