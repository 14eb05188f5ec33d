#![forbid(unsafe_code)]

//! Backend seams: the device and the OS resize notification channel.
//!
//! The session controller never touches a file descriptor directly. It opens
//! handles through a [`DeviceOpener`], reads and writes terminal attributes
//! through the [`OutputHandle`], and learns about window changes from a
//! [`ResizeNotifier`]. `rawterm-tty` provides the POSIX implementations; the
//! harness crate provides fakes with fault injection.

use std::io;
use std::sync::Arc;

use crate::dimensions::Dimensions;
use crate::mode::TermAttributes;

/// When a new attribute set takes effect (`tcsetattr` optional actions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetWhen {
    /// Apply immediately (`TCSANOW`).
    Now,
    /// Apply after all queued output has been transmitted (`TCSADRAIN`).
    Drain,
    /// Drain output, discard unread input, then apply (`TCSAFLUSH`).
    #[default]
    Flush,
}

/// Opens the two handles a session needs on the controlling terminal.
pub trait DeviceOpener {
    type Input: InputHandle;
    type Output: OutputHandle;

    /// Open the device for reading only.
    fn open_input(&self) -> io::Result<Self::Input>;

    /// Open the device for writing only.
    fn open_output(&self) -> io::Result<Self::Output>;

    /// Human-readable device name for errors and logs (e.g. `/dev/tty`).
    fn describe(&self) -> String;
}

/// Read side of the device. Shared with the input reader through an `Arc`,
/// so reads go through `&self`.
pub trait InputHandle: Send + Sync + 'static {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Close the handle. Only called once no reader can still be using it.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Write side of the device; the session's attribute and size queries go here.
pub trait OutputHandle: Send + Sync + 'static {
    type Attrs: TermAttributes;

    /// Read the current attribute set.
    fn get_attrs(&self) -> io::Result<Self::Attrs>;

    /// Write an attribute set.
    fn set_attrs(&self, attrs: &Self::Attrs, when: SetWhen) -> io::Result<()>;

    /// Current output baud rate in bits per second (0 if unknown).
    fn baud_rate(&self) -> io::Result<u32>;

    /// Issue the window-size control request.
    fn window_size(&self) -> io::Result<Dimensions>;

    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Invoked once per window-change notification, on the notifier's thread.
pub type ResizeCallback = Arc<dyn Fn() + Send + Sync>;

/// Source of asynchronous window-change notifications.
pub trait ResizeNotifier {
    type Subscription: ResizeSubscription;

    /// Start delivering notifications to `callback`.
    ///
    /// Delivery may begin before this returns and runs concurrently with the
    /// rest of the program.
    fn subscribe(&self, callback: ResizeCallback) -> io::Result<Self::Subscription>;
}

/// A live registration returned by [`ResizeNotifier::subscribe`].
pub trait ResizeSubscription: Send {
    /// Stop further delivery.
    ///
    /// A notification already being handled may still complete after this
    /// returns; callers must tolerate one late update.
    fn unsubscribe(self);
}
