#![forbid(unsafe_code)]

//! Best-effort failures surface as log events, never as errors.
//!
//! Run with output:
//!   RAWTERM_LOG=rawterm_core=trace cargo test -p rawterm-harness --test logging_events -- --nocapture

use rawterm_core::{Dimensions, SessionOptions, TerminalSession};
use rawterm_harness::{FakeSession, FakeTerminal, Fault, capture_logs};
use tracing::Level;
use tracing_test::traced_test;

fn open(term: &FakeTerminal) -> FakeSession {
    TerminalSession::initialize(term, &term.notifier(), SessionOptions::default()).unwrap()
}

#[test]
fn restore_failure_is_logged_at_warn() {
    let term = FakeTerminal::new(80, 24);
    term.inject(Fault::RestoreAttrs);
    let ((), logs) = capture_logs(|| open(&term).shutdown());

    let warns = logs.matching(Level::WARN, "restoring terminal mode failed");
    assert_eq!(warns.len(), 1);
    assert!(warns[0].field("error").is_some_and(|e| e.contains("injected")));
    assert!(logs.contains(Level::INFO, "terminal session closed"));
}

#[test]
fn subscription_failure_is_logged_at_warn() {
    let term = FakeTerminal::new(80, 24);
    term.inject(Fault::Subscribe);
    let ((), logs) = capture_logs(|| open(&term).shutdown());
    assert!(logs.contains(Level::WARN, "resize notifications unavailable"));
}

#[test]
fn dimension_failure_is_debug_only() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let ((), logs) = capture_logs(|| {
        let session =
            TerminalSession::initialize(&term, &notifier, SessionOptions::default()).unwrap();
        term.inject(Fault::WindowSize);
        // Triggered on this thread, so the bridge's events are captured.
        notifier.trigger();
        assert_eq!(session.current_dimensions(), Dimensions::new(80, 24));
        session.shutdown();
    });
    assert!(logs.contains(Level::DEBUG, "window size query failed"));
    assert!(logs.matching(Level::WARN, "").is_empty());
    assert!(logs.matching(Level::ERROR, "").is_empty());
}

#[test]
fn lifecycle_is_logged_at_info() {
    let term = FakeTerminal::new(80, 24);
    let ((), logs) = capture_logs(|| open(&term).shutdown());
    for message in [
        "terminal raw mode enabled",
        "initial window size",
        "terminal mode restored",
        "terminal session closed",
    ] {
        assert!(logs.contains(Level::INFO, message), "missing {message:?}");
    }
}

#[test]
#[traced_test]
fn clean_session_logs_no_warnings() {
    let term = FakeTerminal::new(80, 24);
    open(&term).shutdown();
    assert!(logs_contain("terminal raw mode enabled"));
    assert!(!logs_contain("WARN"));
}
