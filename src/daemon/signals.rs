//! Signal handling: `SIGINT`/`SIGTERM` request a clean shutdown;
//! `SIGHUP`/`SIGPIPE` are blocked and absorbed with no other effect (this
//! daemon has no hot-reload concept to trigger).
//!
//! Uses the `signal-hook` crate for safe signal registration. The main loop
//! polls `SignalHandler`'s flag each iteration rather than blocking on
//! signals directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::errors::{Result, TpdError};

/// Polls a shared shutdown flag set by the registered signal handlers.
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Register handlers for `SIGINT`, `SIGTERM`, `SIGHUP`, `SIGPIPE`.
    pub fn new() -> Result<Self> {
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        Self::register_signals(&shutdown_flag)?;
        Ok(Self { shutdown_flag })
    }

    /// `true` once `SIGINT` or `SIGTERM` has been observed.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Ask the loop to shut down, as if a signal had arrived. Exposed mainly
    /// for tests that want to exercise the loop's shutdown path without
    /// sending a real signal.
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    #[cfg(unix)]
    fn register_signals(shutdown_flag: &Arc<AtomicBool>) -> Result<()> {
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(shutdown_flag))
            .map_err(|source| TpdError::FatalInit {
                details: format!("registering SIGTERM handler: {source}"),
            })?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(shutdown_flag))
            .map_err(|source| TpdError::FatalInit {
                details: format!("registering SIGINT handler: {source}"),
            })?;

        // SIGHUP and SIGPIPE are blocked-and-absorbed: registering a no-op
        // flag target means the default terminating/ignoring action never
        // fires, but no shutdown or reload is requested either.
        let absorbed = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGHUP, Arc::clone(&absorbed))
            .map_err(|source| TpdError::FatalInit {
                details: format!("registering SIGHUP handler: {source}"),
            })?;
        signal_hook::flag::register(signal_hook::consts::SIGPIPE, absorbed)
            .map_err(|source| TpdError::FatalInit {
                details: format!("registering SIGPIPE handler: {source}"),
            })?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn register_signals(_shutdown_flag: &Arc<AtomicBool>) -> Result<()> {
        Ok(())
    }
}
