#![forbid(unsafe_code)]

//! Cooperative stop requests for the input reader.
//!
//! The session cannot interrupt a read that is blocked inside the kernel.
//! Instead it hands the reader a [`StopToken`] and raises it through the
//! paired [`StopController`] at the start of shutdown. A reader that waits
//! for input with a bounded poll (see `rawterm_tty::TtyInput::wait_readable`)
//! checks the token between polls and exits its loop on its own, then
//! signals completion.
//!
//! Dropping the controller does **not** raise the token; stopping is always
//! explicit.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[cfg(feature = "tracing")]
use crate::logging::debug;
#[cfg(not(feature = "tracing"))]
use crate::debug;

/// Reader-side view of a stop request. Cheaply cloneable.
#[derive(Clone, Debug)]
pub struct StopToken {
    requested: Arc<AtomicBool>,
}

impl StopToken {
    /// Create a token and the controller that raises it.
    #[must_use]
    pub fn new() -> (Self, StopController) {
        let requested = Arc::new(AtomicBool::new(false));
        (
            Self {
                requested: Arc::clone(&requested),
            },
            StopController { requested },
        )
    }

    #[inline]
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, waking early if a stop is requested.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let chunk = Duration::from_millis(10);
        let mut remaining = duration;
        while !remaining.is_zero() && !self.is_stop_requested() {
            let step = remaining.min(chunk);
            std::thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
        !self.is_stop_requested() && remaining.is_zero()
    }
}

/// Owner-side handle that raises the stop request.
#[derive(Debug)]
pub struct StopController {
    requested: Arc<AtomicBool>,
}

impl StopController {
    /// Raise the stop request. Idempotent.
    pub fn request_stop(&self) {
        if !self.requested.swap(true, Ordering::Release) {
            debug!("reader stop requested");
        }
    }
}
