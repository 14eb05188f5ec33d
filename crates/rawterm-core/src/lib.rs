#![forbid(unsafe_code)]

//! Core: terminal session lifecycle, raw-mode transitions, resize bridging,
//! and reader-synchronized teardown.
//!
//! This crate is platform-neutral. The device and the OS notification channel
//! are reached through the traits in [`backend`]; `rawterm-tty` implements them
//! for POSIX terminals.

pub mod backend;
pub mod dimensions;
pub mod error;
pub mod handles;
pub mod logging;
pub mod mode;
pub mod reader;
pub mod resize;
pub mod session;
pub mod stop;

#[cfg(test)]
mod test_support;

pub use backend::{
    DeviceOpener, InputHandle, OutputHandle, ResizeCallback, ResizeNotifier, ResizeSubscription,
    SetWhen,
};
pub use dimensions::{Dimensions, SharedDimensions};
pub use error::{HandleRole, Result, SessionError};
pub use mode::{ModeSnapshot, TermAttributes, derive_raw};
pub use reader::{ReaderDone, ReaderDoneWait, ReaderExit, ReaderHandle};
pub use session::{AttrsOf, SessionOptions, TerminalSession};
pub use stop::{StopController, StopToken};
