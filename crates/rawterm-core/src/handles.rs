#![forbid(unsafe_code)]

//! Device handle manager.
//!
//! Owns the input and output handles on the terminal device. Both are open
//! or both are closed; a failed [`DeviceHandles::acquire`] leaves nothing
//! open behind it.

use std::io;
use std::sync::Arc;

use crate::backend::{DeviceOpener, InputHandle, OutputHandle};
use crate::error::{HandleRole, Result, SessionError};

#[cfg(feature = "tracing")]
use crate::logging::{debug, warn};
#[cfg(not(feature = "tracing"))]
use crate::{debug, warn};

/// Clones of a freshly acquired pair, handed to the input reader and the
/// resize bridge.
pub struct SharedHandles<D: DeviceOpener> {
    pub input: Arc<D::Input>,
    pub output: Arc<D::Output>,
}

/// The pair of handles a session holds on its device.
///
/// Handles are kept behind `Arc` because the input reader and the resize
/// notification thread hold clones while the session is live.
pub struct DeviceHandles<D: DeviceOpener> {
    device: String,
    input: Option<Arc<D::Input>>,
    output: Option<Arc<D::Output>>,
}

impl<D: DeviceOpener> DeviceHandles<D> {
    /// Open the input handle, then the output handle.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DeviceOpenFailed`] naming the side that failed.
    /// If the output open fails, the already-open input handle is closed
    /// before the error is returned.
    ///
    /// On success, also returns clones of both handles for the input reader
    /// and the resize bridge.
    pub fn acquire(opener: &D) -> Result<(Self, SharedHandles<D>)> {
        let device = opener.describe();
        let input = Arc::new(
            opener
                .open_input()
                .map_err(|e| SessionError::open_failed(HandleRole::Input, device.as_str(), e))?,
        );

        let mut handles = Self {
            device,
            input: Some(Arc::clone(&input)),
            output: None,
        };

        match opener.open_output() {
            Ok(output) => {
                let output = Arc::new(output);
                handles.output = Some(Arc::clone(&output));
                debug!(device = %handles.device, "device handles acquired");
                Ok((handles, SharedHandles { input, output }))
            }
            Err(e) => {
                drop(input);
                handles.release();
                Err(SessionError::open_failed(
                    HandleRole::Output,
                    handles.device.as_str(),
                    e,
                ))
            }
        }
    }

    /// Device description this pair was opened from.
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    #[must_use]
    pub fn input(&self) -> Option<&Arc<D::Input>> {
        self.input.as_ref()
    }

    #[must_use]
    pub fn output(&self) -> Option<&Arc<D::Output>> {
        self.output.as_ref()
    }

    /// Whether both handles are still held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }

    /// Close both handles. Calling this again, or on a half-open pair, is a
    /// no-op for the missing side. Close errors are logged, never returned.
    pub fn release(&mut self) {
        if let Some(output) = self.output.take() {
            close_shared(output, HandleRole::Output, OutputHandle::close);
        }
        if let Some(input) = self.input.take() {
            close_shared(input, HandleRole::Input, InputHandle::close);
        }
    }
}

impl<D: DeviceOpener> Drop for DeviceHandles<D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Close `handle` if this is the last owner; otherwise let the remaining
/// owner's drop close it.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn close_shared<H>(handle: Arc<H>, role: HandleRole, close: impl FnOnce(H) -> io::Result<()>) {
    match Arc::try_unwrap(handle) {
        Ok(handle) => {
            if let Err(err) = close(handle) {
                warn!(%role, error = %err, "closing device handle failed");
            } else {
                debug!(%role, "device handle closed");
            }
        }
        Err(shared) => {
            debug!(
                %role,
                owners = Arc::strong_count(&shared) - 1,
                "device handle still shared; closing when last owner drops it"
            );
            drop(shared);
        }
    }
}
