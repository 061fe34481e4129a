//! Signal handling for graceful shutdown.
//!
//! Monitoring runs park the main thread while timer threads do the work,
//! so shutdown is driven by a SIGINT (Ctrl+C) flag the main thread polls
//! or blocks on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{PoolwatchError, Result};

/// How often [`SignalHandler::wait_for_shutdown`] rechecks the flag.
const WAIT_POLL_SLICE: Duration = Duration::from_millis(200);

/// Handles SIGINT signals for graceful shutdown.
///
/// Registers a handler for SIGINT that sets an internal flag when
/// triggered. `SignalHandler` is thread-safe and can be cloned; all clones
/// share the same atomic flag.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Creates a new `SignalHandler` and registers the SIGINT handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be registered, which
    /// includes registering one twice in the same process.
    pub fn new() -> Result<Self> {
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&shutdown_flag);

        ctrlc::set_handler(move || {
            flag_clone.store(true, Ordering::SeqCst);
        })
        .map_err(|e| PoolwatchError::Signal(e.to_string()))?;

        Ok(Self { shutdown_flag })
    }

    /// Checks if a shutdown has been requested (non-blocking).
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Block the calling thread until SIGINT arrives.
    ///
    /// Sleeps in short slices so the wait ends promptly after the signal.
    pub fn wait_for_shutdown(&self) {
        while !self.is_shutdown_requested() {
            thread::sleep(WAIT_POLL_SLICE);
        }
    }

    /// Resets the shutdown flag to false.
    #[cfg(test)]
    pub fn reset(&self) {
        self.shutdown_flag.store(false, Ordering::SeqCst);
    }
}
