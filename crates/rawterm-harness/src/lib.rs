#![forbid(unsafe_code)]

//! Test harness for `rawterm`.
//!
//! - [`fake`]: an in-memory terminal device with open/close accounting, an
//!   ordered event log, scripted input and fault injection, plus a manually
//!   triggered resize notifier.
//! - [`logging`]: subscriber setup for test runs and an in-memory capture
//!   layer for asserting on emitted events.
//!
//! Integration and property tests for the session controller live in this
//! crate's `tests/` directory.

pub mod fake;
pub mod logging;

pub use fake::{
    DeviceEvent, FakeAttrs, FakeInput, FakeOutput, FakeTerminal, Fault, ManualResize,
    ManualSubscription,
};
pub use logging::{CapturedEvent, LogCapture, capture_logs, init_json_logging, init_test_logging};

/// A session driven by the fake device and the manual notifier.
pub type FakeSession = rawterm_core::TerminalSession<FakeTerminal, ManualResize>;
