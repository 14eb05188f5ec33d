//! `SIGWINCH` delivery.
//!
//! A dedicated thread drains a `signal-hook` iterator and runs the
//! subscriber's callback once per delivery, so no `sigaction` handler is
//! installed in-tree and the callback may block, lock, or allocate freely.

use std::ffi::c_int;
use std::io;
use std::thread::JoinHandle;

use rawterm_core::{ResizeCallback, ResizeNotifier, ResizeSubscription};
use signal_hook::consts::signal::SIGWINCH;
use signal_hook::iterator::{Handle, Signals};

/// Window-change notifications from `SIGWINCH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigwinchNotifier;

impl SigwinchNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ResizeNotifier for SigwinchNotifier {
    type Subscription = SigwinchSubscription;

    fn subscribe(&self, callback: ResizeCallback) -> io::Result<SigwinchSubscription> {
        watch(&[SIGWINCH], callback)
    }
}

/// Run `callback` on a watcher thread for every delivery of `set`.
/// Registration errors come back as the OS reported them.
fn watch(set: &[c_int], callback: ResizeCallback) -> io::Result<SigwinchSubscription> {
    let mut signals = Signals::new(set)?;
    let handle = signals.handle();
    let thread = std::thread::Builder::new()
        .name("rawterm-sigwinch".into())
        .spawn(move || {
            for _ in signals.forever() {
                callback();
            }
        });
    let thread = match thread {
        Ok(thread) => thread,
        Err(err) => {
            handle.close();
            return Err(err);
        }
    };
    #[cfg(feature = "tracing")]
    tracing::debug!("SIGWINCH watcher started");
    Ok(SigwinchSubscription {
        handle,
        thread: Some(thread),
    })
}

/// Live `SIGWINCH` registration. Unsubscribing (or dropping) closes the
/// registration and joins the watcher thread, so once it returns no
/// callback is running or will run.
#[derive(Debug)]
pub struct SigwinchSubscription {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SigwinchSubscription {
    fn stop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            #[cfg(feature = "tracing")]
            tracing::debug!("SIGWINCH watcher stopped");
        }
    }
}

impl ResizeSubscription for SigwinchSubscription {
    fn unsubscribe(mut self) {
        self.stop();
    }
}

impl Drop for SigwinchSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
