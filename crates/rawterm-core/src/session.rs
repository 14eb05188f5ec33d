#![forbid(unsafe_code)]

//! Terminal session lifecycle.
//!
//! [`TerminalSession`] takes exclusive control of a terminal device: it opens
//! the device, switches it to raw mode, keeps the window size current, and on
//! shutdown hands the device back exactly as it found it.
//!
//! # Lifecycle Guarantees
//!
//! 1. **Capture before mutate** - The original attribute set is read and
//!    stored before any raw-mode change is written. It is never overwritten.
//!
//! 2. **Exact restoration** - Teardown writes the stored attribute set back
//!    as captured. It never computes an inverse of the raw transformation.
//!
//! 3. **No leaked handles** - If initialization fails at any step, every
//!    handle opened so far is closed before the error is returned, and the
//!    terminal mode is left untouched.
//!
//! 4. **No close under a live reader** - Handles are closed only after the
//!    input reader has signalled that it stopped.
//!
//! 5. **Panic safety** - Teardown runs from [`Drop`] if [`TerminalSession::shutdown`]
//!    was never called, including during unwinding (unless `panic = "abort"`).
//!
//! # Initialization Order
//!
//! 1. Open the input handle, then the output handle
//! 2. Capture the attribute set and baud rate from the output handle
//! 3. Derive raw mode and apply it (`TCSAFLUSH`)
//! 4. Subscribe to window-change notifications
//! 5. Query the initial window size
//!
//! # Teardown Order
//!
//! 1. Unsubscribe from window-change notifications
//! 2. Ask the reader to stop (cooperative; see [`crate::stop`])
//! 3. Block until the reader signals completion
//! 4. Restore the captured attribute set (best-effort)
//! 5. Close the output handle, then the input handle
//!
//! # Usage
//!
//! ```ignore
//! use rawterm_core::{SessionOptions, TerminalSession};
//!
//! let mut session = TerminalSession::initialize(&opener, &notifier, SessionOptions::default())?;
//! let resizes = session.resize_events();
//! let reader = session.take_reader().expect("reader available once");
//! reader.spawn(|r| {
//!     let mut buf = [0u8; 1024];
//!     while !r.should_stop() {
//!         match r.read(&mut buf) {
//!             Ok(0) | Err(_) => break,
//!             Ok(n) => { /* hand bytes to the parser */ }
//!         }
//!     }
//! })?;
//!
//! // ... application loop ...
//!
//! session.shutdown();
//! ```

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use crate::backend::{DeviceOpener, OutputHandle, ResizeNotifier};
use crate::dimensions::{Dimensions, SharedDimensions};
use crate::error::Result;
use crate::handles::{DeviceHandles, SharedHandles};
use crate::mode::{ModeSnapshot, apply_raw_mode, capture_mode, restore_mode};
use crate::reader::{ReaderDone, ReaderDoneWait, ReaderExit, ReaderHandle};
use crate::resize::ResizeBridge;
use crate::stop::{StopController, StopToken};

#[cfg(feature = "tracing")]
use crate::logging::{debug, info, info_span, warn};
#[cfg(not(feature = "tracing"))]
use crate::{debug, info, info_span, warn};

/// Attribute type of a device opener's output handle.
pub type AttrsOf<D> = <<D as DeviceOpener>::Output as OutputHandle>::Attrs;

/// Terminal session configuration options.
///
/// # Example
///
/// ```
/// use rawterm_core::SessionOptions;
///
/// // Raw mode only, no resize tracking.
/// let opts = SessionOptions {
///     watch_resize: false,
///     ..Default::default()
/// };
/// assert_eq!(opts.resize_queue_depth, 1);
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Subscribe to window-change notifications.
    ///
    /// When `false`, the size is queried once at initialization and then
    /// only on [`TerminalSession::refresh_dimensions`].
    pub watch_resize: bool,

    /// Capacity of each observer channel returned by
    /// [`TerminalSession::resize_events`].
    ///
    /// Sizes that arrive while a channel is full are dropped for that
    /// observer; the latest size is always available from
    /// [`TerminalSession::current_dimensions`].
    pub resize_queue_depth: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            watch_resize: true,
            resize_queue_depth: 1,
        }
    }
}

/// Exclusive, raw-mode control of a terminal device.
///
/// # Contract
///
/// - **Exclusive ownership**: Only one session should drive a given device
///   at a time. Separate sessions share no state, so tests may create many.
///
/// - **Single reader**: [`TerminalSession::take_reader`] yields the reader
///   handle once. Whoever holds it must eventually call
///   [`ReaderHandle::finish`] (or drop it); shutdown blocks until then.
///
/// - **Terminal teardown**: [`TerminalSession::shutdown`] consumes the
///   session. A new session must be initialized to regain control.
pub struct TerminalSession<D: DeviceOpener, N: ResizeNotifier> {
    options: SessionOptions,
    /// Captured once in `initialize`; written back verbatim in teardown.
    saved_mode: ModeSnapshot<AttrsOf<D>>,
    raw_mode: AttrsOf<D>,
    dims: Arc<SharedDimensions>,
    resize: Option<ResizeBridge<D::Output>>,
    subscription: Option<N::Subscription>,
    stop: StopController,
    reader: Option<ReaderHandle<D::Input>>,
    reader_wait: Option<ReaderDoneWait>,
    handles: DeviceHandles<D>,
    torn_down: bool,
}

impl<D: DeviceOpener, N: ResizeNotifier> TerminalSession<D, N> {
    /// Open the device, enter raw mode, and start tracking the window size.
    ///
    /// # Errors
    ///
    /// - [`SessionError::DeviceOpenFailed`](crate::SessionError::DeviceOpenFailed)
    ///   if either handle cannot be opened.
    /// - [`SessionError::AttributeQueryFailed`](crate::SessionError::AttributeQueryFailed)
    ///   if the current mode cannot be read.
    /// - [`SessionError::AttributeApplyFailed`](crate::SessionError::AttributeApplyFailed)
    ///   if raw mode cannot be written.
    ///
    /// On any error all handles opened by this call are closed and the
    /// terminal mode has not been changed.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn initialize(opener: &D, notifier: &N, options: SessionOptions) -> Result<Self> {
        let span = info_span!("terminal_session_init", device = %opener.describe());
        let _guard = span.enter();

        // Dropping `handles` on any early return closes whatever is open.
        let (handles, SharedHandles { input, output }) = DeviceHandles::acquire(opener)?;

        let saved_mode = capture_mode(&*output)?;
        debug!(baud = saved_mode.baud(), "original terminal mode captured");

        let raw_mode = apply_raw_mode(&*output, &saved_mode)?;
        info!("terminal raw mode enabled");

        let (token, stop) = StopToken::new();
        let (done, reader_wait) = ReaderDone::pair();
        let reader = ReaderHandle::new(input, token, done);

        let dims = Arc::new(SharedDimensions::default());
        let resize = ResizeBridge::new(output, Arc::clone(&dims), options.resize_queue_depth);

        // From here on, dropping the session restores the captured mode.
        let mut session = Self {
            options,
            saved_mode,
            raw_mode,
            dims,
            resize: None,
            subscription: None,
            stop,
            reader: Some(reader),
            reader_wait: Some(reader_wait),
            handles,
            torn_down: false,
        };

        if session.options.watch_resize {
            match resize.subscribe(notifier) {
                Ok(subscription) => {
                    session.subscription = Some(subscription);
                    debug!("resize notifications subscribed");
                }
                Err(err) => {
                    warn!(error = %err, "resize notifications unavailable; size will not track the window");
                }
            }
        }

        match resize.refresh() {
            Some(dims) => info!(%dims, "initial window size"),
            None => debug!("initial window size unavailable"),
        }
        session.resize = Some(resize);

        Ok(session)
    }

    /// Hand out the reader handle. Returns `None` after the first call.
    ///
    /// If the reader is never taken, shutdown does not wait for one.
    pub fn take_reader(&mut self) -> Option<ReaderHandle<D::Input>> {
        self.reader.take()
    }

    /// Current window size. `0x0` until the first successful query.
    #[must_use]
    pub fn current_dimensions(&self) -> Dimensions {
        self.dims.load()
    }

    /// The published dimensions, for consumers that outlive a borrow of the
    /// session (e.g. a render thread).
    #[must_use]
    pub fn shared_dimensions(&self) -> Arc<SharedDimensions> {
        Arc::clone(&self.dims)
    }

    /// Register an observer that receives each newly published size.
    #[must_use]
    pub fn resize_events(&self) -> Receiver<Dimensions> {
        match &self.resize {
            Some(resize) => resize.events(),
            None => mpsc::sync_channel(1).1,
        }
    }

    /// Query the window size on this thread and publish it.
    ///
    /// Returns `None` if the query failed; the previous size is kept.
    pub fn refresh_dimensions(&self) -> Option<Dimensions> {
        self.resize.as_ref().and_then(ResizeBridge::refresh)
    }

    /// Window-size queries that failed since initialization.
    #[must_use]
    pub fn dimension_query_failures(&self) -> u64 {
        self.resize.as_ref().map_or(0, ResizeBridge::query_failures)
    }

    /// Window-change notifications received since initialization.
    #[must_use]
    pub fn resize_notifications(&self) -> u64 {
        self.resize.as_ref().map_or(0, ResizeBridge::notifications)
    }

    /// Whether a window-change subscription is active.
    #[must_use]
    pub fn is_watching_resize(&self) -> bool {
        self.subscription.is_some()
    }

    /// Output baud rate read at initialization.
    #[must_use]
    pub fn baud_rate(&self) -> u32 {
        self.saved_mode.baud()
    }

    /// The mode captured at initialization.
    #[must_use]
    pub fn saved_mode(&self) -> &ModeSnapshot<AttrsOf<D>> {
        &self.saved_mode
    }

    /// The raw attribute set that was applied.
    #[must_use]
    pub fn raw_mode(&self) -> &AttrsOf<D> {
        &self.raw_mode
    }

    /// Device description (e.g. `/dev/tty`).
    #[must_use]
    pub fn device(&self) -> &str {
        self.handles.device()
    }

    /// Get the session options.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Tear the session down in order and return once the device is closed.
    ///
    /// Blocks until the input reader (if one was taken) has signalled that it
    /// stopped.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    /// Teardown shared between [`Self::shutdown`] and [`Drop`]. Runs once.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let span = info_span!("terminal_session_shutdown", device = %self.handles.device());
        let _guard = span.enter();

        // 1. No new notifications. One already in flight may still land; it
        //    holds its own reference to the output handle.
        if let (Some(resize), Some(subscription)) = (&self.resize, self.subscription.take()) {
            resize.unsubscribe(subscription);
        }

        // 2. Ask the reader to leave its loop.
        self.stop.request_stop();

        // 3. Wait for it. An untaken reader handle is dropped here, which
        //    releases the waiter immediately.
        if self.reader.take().is_some() {
            debug!("no reader was attached");
        }
        if let Some(wait) = self.reader_wait.take() {
            match wait.wait() {
                ReaderExit::Signalled => debug!("input reader stopped"),
                ReaderExit::Abandoned => debug!("input reader released without signalling"),
            }
        }

        // 4. Restore the captured mode. Failure cannot be recovered from here.
        if let Some(output) = self.handles.output() {
            match restore_mode(&**output, &self.saved_mode) {
                Ok(()) => info!("terminal mode restored"),
                Err(err) => warn!(error = %err, "restoring terminal mode failed; terminal may remain raw"),
            }
        }

        // 5. Drop the bridge's reference so the output handle can be closed
        //    now rather than when the session is dropped.
        self.resize = None;
        self.handles.release();
        info!("terminal session closed");
    }
}

impl<D: DeviceOpener, N: ResizeNotifier> Drop for TerminalSession<D, N> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<D: DeviceOpener, N: ResizeNotifier> std::fmt::Debug for TerminalSession<D, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("device", &self.handles.device())
            .field("options", &self.options)
            .field("baud", &self.saved_mode.baud())
            .field("dimensions", &self.dims.load())
            .field("watching_resize", &self.subscription.is_some())
            .field("reader_taken", &self.reader.is_none())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
