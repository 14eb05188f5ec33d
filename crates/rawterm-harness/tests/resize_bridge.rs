#![forbid(unsafe_code)]

//! Window-size tracking through the resize notification bridge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rawterm_core::{Dimensions, SessionOptions, TerminalSession};
use rawterm_harness::{DeviceEvent, FakeSession, FakeTerminal, Fault, ManualResize};

fn open_with(term: &FakeTerminal, notifier: &ManualResize, options: SessionOptions) -> FakeSession {
    TerminalSession::initialize(term, notifier, options).unwrap()
}

// ============================================================================
// Publishing
// ============================================================================

#[test]
fn resize_then_failed_query_keeps_last_size() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let session = open_with(&term, &notifier, SessionOptions::default());
    assert_eq!(session.current_dimensions(), Dimensions::new(80, 24));

    term.set_size(Some(Dimensions::new(100, 40)));
    assert_eq!(notifier.trigger(), 1);
    assert_eq!(session.current_dimensions(), Dimensions::new(100, 40));

    term.inject(Fault::WindowSize);
    notifier.trigger();
    assert_eq!(session.current_dimensions(), Dimensions::new(100, 40));
    assert_eq!(session.dimension_query_failures(), 1);
    assert_eq!(session.resize_notifications(), 2);
    session.shutdown();
}

#[test]
fn zero_size_is_not_published() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let session = open_with(&term, &notifier, SessionOptions::default());

    term.set_size(Some(Dimensions::new(0, 0)));
    notifier.trigger();
    term.set_size(Some(Dimensions::new(120, 0)));
    notifier.trigger();
    assert_eq!(session.current_dimensions(), Dimensions::new(80, 24));
    assert_eq!(session.dimension_query_failures(), 2);
    session.shutdown();
}

#[test]
fn unavailable_initial_size_reads_zero_until_first_success() {
    let term = FakeTerminal::new(80, 24);
    term.set_size(None);
    let notifier = term.notifier();
    let session = open_with(&term, &notifier, SessionOptions::default());

    assert!(session.current_dimensions().is_empty());
    assert_eq!(session.dimension_query_failures(), 1);

    term.set_size(Some(Dimensions::new(90, 30)));
    notifier.trigger();
    assert_eq!(session.current_dimensions(), Dimensions::new(90, 30));
    session.shutdown();
}

#[test]
fn observers_receive_each_size() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let session = open_with(
        &term,
        &notifier,
        SessionOptions {
            resize_queue_depth: 8,
            ..Default::default()
        },
    );
    let a = session.resize_events();
    let b = session.resize_events();

    for (cols, rows) in [(100, 40), (120, 50), (60, 20)] {
        term.set_size(Some(Dimensions::new(cols, rows)));
        notifier.trigger();
    }
    let got: Vec<_> = a.try_iter().collect();
    assert_eq!(
        got,
        vec![
            Dimensions::new(100, 40),
            Dimensions::new(120, 50),
            Dimensions::new(60, 20)
        ]
    );
    assert_eq!(b.try_iter().count(), 3);
    session.shutdown();
}

#[test]
fn slow_observer_sees_coalesced_stream() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let session = open_with(&term, &notifier, SessionOptions::default());
    let events = session.resize_events();

    for cols in 81..=90 {
        term.set_size(Some(Dimensions::new(cols, 24)));
        notifier.trigger();
    }
    // Depth 1: only the first undelivered size is queued.
    assert_eq!(events.try_iter().count(), 1);
    assert_eq!(session.current_dimensions(), Dimensions::new(90, 24));
    session.shutdown();
}

#[test]
fn shared_dimensions_follow_session() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let session = open_with(&term, &notifier, SessionOptions::default());
    let shared = session.shared_dimensions();
    let before = shared.generation();

    term.set_size(Some(Dimensions::new(200, 60)));
    notifier.trigger();
    assert_eq!(shared.load(), Dimensions::new(200, 60));
    assert_eq!(shared.generation(), before + 1);
    session.shutdown();
}

// ============================================================================
// Subscription
// ============================================================================

#[test]
fn watch_disabled_skips_subscription() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let session = open_with(
        &term,
        &notifier,
        SessionOptions {
            watch_resize: false,
            ..Default::default()
        },
    );
    assert!(!session.is_watching_resize());
    assert_eq!(notifier.subscriber_count(), 0);
    assert_eq!(session.current_dimensions(), Dimensions::new(80, 24));

    term.set_size(Some(Dimensions::new(100, 40)));
    assert_eq!(notifier.trigger(), 0);
    assert_eq!(session.current_dimensions(), Dimensions::new(80, 24));
    assert_eq!(session.refresh_dimensions(), Some(Dimensions::new(100, 40)));
    assert_eq!(session.current_dimensions(), Dimensions::new(100, 40));

    session.shutdown();
    assert!(!term.events().contains(&DeviceEvent::Unsubscribed));
}

#[test]
fn subscription_failure_degrades_to_no_notifications() {
    let term = FakeTerminal::new(80, 24);
    term.inject(Fault::Subscribe);
    let notifier = term.notifier();
    let session = open_with(&term, &notifier, SessionOptions::default());

    assert!(!session.is_watching_resize());
    assert_eq!(session.current_dimensions(), Dimensions::new(80, 24));
    session.shutdown();
    assert_eq!(term.open_handles(), 0);
}

#[test]
fn no_delivery_after_shutdown() {
    let term = FakeTerminal::new(80, 24);
    let notifier = term.notifier();
    let session = open_with(&term, &notifier, SessionOptions::default());
    let events = session.resize_events();
    session.shutdown();

    assert_eq!(notifier.subscriber_count(), 0);
    term.set_size(Some(Dimensions::new(100, 40)));
    assert_eq!(notifier.trigger(), 0);
    assert!(events.try_recv().is_err());
}

// ============================================================================
// Stress
// ============================================================================

#[test]
fn notification_storm_racing_shutdown() {
    for round in 0..20u16 {
        let term = FakeTerminal::new(80, 24);
        let notifier = term.notifier();
        let session = open_with(&term, &notifier, SessionOptions::default());
        let stop = Arc::new(AtomicBool::new(false));

        let stormers: Vec<_> = (0..4u16)
            .map(|i| {
                let term = term.clone();
                let notifier = notifier.clone();
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut n = 0u16;
                    while !stop.load(Ordering::Relaxed) {
                        term.set_size(Some(Dimensions::new(80 + i + n % 50, 24 + round)));
                        notifier.trigger();
                        n = n.wrapping_add(1);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(2));
        let started = Instant::now();
        session.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));

        stop.store(true, Ordering::Relaxed);
        for stormer in stormers {
            stormer.join().unwrap();
        }
        // In-flight callbacks may have held the output briefly; once they
        // are gone every handle is closed.
        assert_eq!(term.open_handles(), 0);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
