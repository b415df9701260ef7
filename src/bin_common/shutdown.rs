//! Graceful shutdown management
//!
//! Binaries drive a `Context` from a plain thread, so the Ctrl+C listener
//! runs on its own small runtime and pokes the service loop when it fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Manages graceful shutdown for long-running processes
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
}

impl ShutdownManager {
    /// Create a new shutdown manager with running state
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn a Ctrl+C handler that clears the running flag, then calls
    /// `on_signal` (typically to cancel a blocking service step)
    pub fn spawn_signal_handler<F>(&self, on_signal: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let flag = Arc::clone(&self.flag);
        let spawned = std::thread::Builder::new()
            .name("signal".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        warn!("Signal handler unavailable: {}", e);
                        return;
                    }
                };
                if runtime.block_on(signal::ctrl_c()).is_ok() {
                    info!("");
                    info!("Received shutdown signal (Ctrl+C)");
                    info!("Shutting down gracefully...");
                    flag.store(false, Ordering::Release);
                    on_signal();
                }
            });

        if let Err(e) = spawned {
            warn!("Failed to spawn signal thread: {}", e);
        }
    }

    /// Check if the process should continue running
    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Request shutdown without a signal
    pub fn trigger(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_stops_running() {
        let shutdown = ShutdownManager::new();
        assert!(shutdown.is_running());
        shutdown.trigger();
        assert!(!shutdown.is_running());
    }
}
