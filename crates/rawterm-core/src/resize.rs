#![forbid(unsafe_code)]

//! Resize notification bridge.
//!
//! Turns the OS window-change notification into published [`Dimensions`].
//! Every notification triggers one window-size query on the output handle.
//! A successful answer is stored in the shared dimensions and pushed to every
//! registered observer; a failed one is counted, logged, and otherwise
//! ignored, leaving the last known size in place.
//!
//! Observers receive sizes over bounded channels filled with `try_send`. A
//! slow consumer sees a coalesced stream (the newest size is always readable
//! through [`ResizeBridge::current`]), never a blocked notification thread.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{OutputHandle, ResizeCallback, ResizeNotifier, ResizeSubscription};
use crate::dimensions::{Dimensions, SharedDimensions};
use crate::error::{Result, SessionError};

#[cfg(feature = "tracing")]
use crate::logging::{debug, trace};
#[cfg(not(feature = "tracing"))]
use crate::{debug, trace};

struct BridgeInner<O> {
    output: Arc<O>,
    dims: Arc<SharedDimensions>,
    observers: Mutex<Vec<SyncSender<Dimensions>>>,
    // Held across query and publish so an answer never lands after a newer one.
    refresh_lock: Mutex<()>,
    queue_depth: usize,
    notifications: AtomicU64,
    failures: AtomicU64,
}

impl<O: OutputHandle> BridgeInner<O> {
    fn query(&self) -> Result<Dimensions> {
        let dims = self
            .output
            .window_size()
            .map_err(SessionError::DimensionQueryFailed)?;
        if dims.is_empty() {
            return Err(SessionError::DimensionQueryFailed(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("terminal reported an empty size ({dims})"),
            )));
        }
        Ok(dims)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn refresh(&self) -> Option<Dimensions> {
        let _serial = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.query() {
            Ok(dims) => {
                self.publish(dims);
                Some(dims)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                debug!(error = %err, kept = %self.dims.load(), "window size query failed");
                None
            }
        }
    }

    fn publish(&self, dims: Dimensions) {
        self.dims.store(dims);
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        observers.retain(|tx| match tx.try_send(dims) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        trace!(%dims, observers = observers.len(), "dimensions published");
    }

    fn on_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        let _ = self.refresh();
    }
}

/// Bridges window-change notifications into shared dimensions.
pub struct ResizeBridge<O> {
    inner: Arc<BridgeInner<O>>,
}

impl<O: OutputHandle> ResizeBridge<O> {
    /// Create a bridge that queries `output` and publishes into `dims`.
    /// Observer channels hold at most `queue_depth` undelivered sizes
    /// (minimum 1).
    #[must_use]
    pub fn new(output: Arc<O>, dims: Arc<SharedDimensions>, queue_depth: usize) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                output,
                dims,
                observers: Mutex::new(Vec::new()),
                refresh_lock: Mutex::new(()),
                queue_depth: queue_depth.max(1),
                notifications: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// Register with `notifier`; each delivery refreshes the dimensions on
    /// the notifier's thread.
    pub fn subscribe<N: ResizeNotifier>(&self, notifier: &N) -> io::Result<N::Subscription> {
        let inner = Arc::clone(&self.inner);
        let callback: ResizeCallback = Arc::new(move || inner.on_notification());
        notifier.subscribe(callback)
    }

    /// Stop delivery through `subscription`.
    pub fn unsubscribe<S: ResizeSubscription>(&self, subscription: S) {
        subscription.unsubscribe();
        debug!("resize notifications unsubscribed");
    }

    /// Query the device now and publish the answer.
    ///
    /// Returns the new size, or `None` if the query failed (the previous size
    /// is kept).
    pub fn refresh(&self) -> Option<Dimensions> {
        self.inner.refresh()
    }

    /// Query the device without publishing.
    pub fn query_dimensions(&self) -> Result<Dimensions> {
        self.inner.query()
    }

    /// Last successfully published size.
    #[must_use]
    pub fn current(&self) -> Dimensions {
        self.inner.dims.load()
    }

    /// Number of successful publishes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.dims.generation()
    }

    /// Register a new observer.
    #[must_use]
    pub fn events(&self) -> Receiver<Dimensions> {
        let (tx, rx) = mpsc::sync_channel(self.inner.queue_depth);
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Notifications received from the OS so far.
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.inner.notifications.load(Ordering::Relaxed)
    }

    /// Failed window-size queries so far.
    #[must_use]
    pub fn query_failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }
}
