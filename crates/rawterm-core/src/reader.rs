#![forbid(unsafe_code)]

//! The contract between the session and the concurrent input reader.
//!
//! The reader is owned by the embedding application. The session only needs
//! two things from it: that it stops touching the input handle eventually,
//! and that it says so exactly once. [`ReaderHandle`] packages what the
//! reader receives (a shared input handle, a stop token, and the one-shot
//! completion signal); [`ReaderDone`] is that signal.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::JoinHandle;

use crate::backend::InputHandle;
use crate::stop::StopToken;

/// One-shot "the reader has stopped" signal.
///
/// Consumed by [`ReaderDone::signal`]. Dropping it without signalling also
/// releases the waiting session (the reader returned early or panicked), and
/// the wait reports [`ReaderExit::Abandoned`].
#[derive(Debug)]
pub struct ReaderDone {
    tx: SyncSender<()>,
}

impl ReaderDone {
    /// Create the signal and the waiter the session blocks on.
    #[must_use]
    pub fn pair() -> (Self, ReaderDoneWait) {
        let (tx, rx) = mpsc::sync_channel(1);
        (Self { tx }, ReaderDoneWait { rx })
    }

    pub fn signal(self) {
        // The waiter may already be gone if the session was torn down by a
        // panic; nothing is left to notify in that case.
        let _ = self.tx.send(());
    }
}

/// How the reader ended, as observed by the waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// [`ReaderDone::signal`] was called.
    Signalled,
    /// The signal was dropped without being sent.
    Abandoned,
}

/// Waiting side of [`ReaderDone`]. Waited on exactly once.
#[derive(Debug)]
pub struct ReaderDoneWait {
    rx: Receiver<()>,
}

impl ReaderDoneWait {
    /// Block until the reader signals or drops its [`ReaderDone`].
    pub fn wait(self) -> ReaderExit {
        match self.rx.recv() {
            Ok(()) => ReaderExit::Signalled,
            Err(_) => ReaderExit::Abandoned,
        }
    }
}

/// Everything the input reader needs from the session.
///
/// Field order matters: on drop the input handle is released before the
/// completion signal fires, so the session never closes a handle the reader
/// still holds.
#[derive(Debug)]
pub struct ReaderHandle<I> {
    input: Arc<I>,
    stop: StopToken,
    done: ReaderDone,
}

impl<I: InputHandle> ReaderHandle<I> {
    #[must_use]
    pub fn new(input: Arc<I>, stop: StopToken, done: ReaderDone) -> Self {
        Self { input, stop, done }
    }

    /// The input handle.
    #[must_use]
    pub fn input(&self) -> &I {
        &self.input
    }

    /// Blocking read from the input handle.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }

    /// Whether the session has asked the reader to exit.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop.is_stop_requested()
    }

    #[must_use]
    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }

    /// Release the input handle and signal completion.
    pub fn finish(self) {
        let Self { input, stop, done } = self;
        drop(input);
        drop(stop);
        done.signal();
    }

    /// Run `body` on a dedicated thread and signal completion when it
    /// returns. If `body` panics the handle is dropped during unwinding and
    /// the session observes [`ReaderExit::Abandoned`].
    pub fn spawn<F>(self, body: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce(&ReaderHandle<I>) + Send + 'static,
    {
        std::thread::Builder::new()
            .name("rawterm-reader".into())
            .spawn(move || {
                body(&self);
                self.finish();
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct NullInput;

    impl InputHandle for NullInput {
        fn read(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn close(self) -> io::Result<()> {
            Ok(())
        }
    }

    fn handle() -> (ReaderHandle<NullInput>, ReaderDoneWait, crate::stop::StopController) {
        let (done, wait) = ReaderDone::pair();
        let (token, ctrl) = StopToken::new();
        (ReaderHandle::new(Arc::new(NullInput), token, done), wait, ctrl)
    }

    #[test]
    fn signal_is_observed() {
        let (done, wait) = ReaderDone::pair();
        done.signal();
        assert_eq!(wait.wait(), ReaderExit::Signalled);
    }

    #[test]
    fn dropped_signal_releases_waiter() {
        let (done, wait) = ReaderDone::pair();
        drop(done);
        assert_eq!(wait.wait(), ReaderExit::Abandoned);
    }

    #[test]
    fn signal_after_waiter_gone_is_harmless() {
        let (done, wait) = ReaderDone::pair();
        drop(wait);
        done.signal();
    }

    #[test]
    fn wait_blocks_until_signal() {
        let (done, wait) = ReaderDone::pair();
        let delay = Duration::from_millis(60);
        let start = Instant::now();
        let t = std::thread::spawn(move || {
            std::thread::sleep(delay);
            done.signal();
        });
        assert_eq!(wait.wait(), ReaderExit::Signalled);
        assert!(start.elapsed() >= delay);
        t.join().unwrap();
    }

    #[test]
    fn finish_releases_input_before_signalling() {
        let (reader, wait, _ctrl) = handle();
        let input = Arc::clone(&reader.input);
        reader.finish();
        assert_eq!(wait.wait(), ReaderExit::Signalled);
        assert_eq!(Arc::strong_count(&input), 1);
    }

    #[test]
    fn spawned_reader_exits_on_stop() {
        let (reader, wait, ctrl) = handle();
        let join = reader
            .spawn(|r| {
                while !r.should_stop() {
                    r.stop_token().sleep(Duration::from_millis(5));
                }
            })
            .unwrap();
        ctrl.request_stop();
        assert_eq!(wait.wait(), ReaderExit::Signalled);
        join.join().unwrap();
    }

    #[test]
    fn panicking_reader_is_abandoned() {
        let (reader, wait, _ctrl) = handle();
        let join = reader.spawn(|_| panic!("reader blew up")).unwrap();
        assert_eq!(wait.wait(), ReaderExit::Abandoned);
        assert!(join.join().is_err());
    }
}
