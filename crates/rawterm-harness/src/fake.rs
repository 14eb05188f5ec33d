#![forbid(unsafe_code)]

//! In-memory terminal device.
//!
//! [`FakeTerminal`] implements [`DeviceOpener`]; its handles share one state
//! block, so a test can inspect what the session did to the "device" (which
//! attribute sets were written, in what order handles were opened and
//! closed) and steer it (window size, pending input, injected failures).
//!
//! # Example
//!
//! ```rust
//! use rawterm_core::{SessionOptions, TerminalSession};
//! use rawterm_harness::{DeviceEvent, FakeTerminal};
//!
//! let term = FakeTerminal::new(80, 24);
//! let before = term.attrs();
//! let session = TerminalSession::initialize(&term, &term.notifier(), SessionOptions::default())
//!     .unwrap();
//! assert_ne!(term.attrs(), before);
//! session.shutdown();
//! assert_eq!(term.attrs(), before);
//! assert_eq!(term.open_handles(), 0);
//! assert_eq!(term.events().last(), Some(&DeviceEvent::InputClosed));
//! ```

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rawterm_core::mode::{
    CharSize, ControlFlags, InputFlags, LocalFlags, OutputFlags, ReadPolicy, TermAttributes,
};
use rawterm_core::{
    DeviceOpener, Dimensions, InputHandle, OutputHandle, ResizeCallback, ResizeNotifier,
    ResizeSubscription, SetWhen,
};

// ============================================================================
// Attributes
// ============================================================================

/// Attribute set of the fake device.
///
/// `other` stands in for every bit the raw recipe does not name (baud bits,
/// `CREAD`, control characters other than `VMIN`/`VTIME`, ...). It must
/// survive raw derivation and restoration untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeAttrs {
    pub input: InputFlags,
    pub output: OutputFlags,
    pub local: LocalFlags,
    pub control: ControlFlags,
    pub char_size: CharSize,
    pub read_policy: ReadPolicy,
    pub other: u32,
}

impl FakeAttrs {
    /// A typical line-disciplined terminal.
    #[must_use]
    pub fn cooked() -> Self {
        Self {
            input: InputFlags::BRKINT | InputFlags::ICRNL | InputFlags::IXON,
            output: OutputFlags::OPOST,
            local: LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::IEXTEN,
            control: ControlFlags::empty(),
            char_size: CharSize::Seven,
            read_policy: ReadPolicy {
                min_bytes: 4,
                timeout_ds: 2,
            },
            other: 0x00bf_0007,
        }
    }
}

impl Default for FakeAttrs {
    fn default() -> Self {
        Self::cooked()
    }
}

impl TermAttributes for FakeAttrs {
    fn clear_input(&mut self, flags: InputFlags) {
        self.input.remove(flags);
    }
    fn clear_output(&mut self, flags: OutputFlags) {
        self.output.remove(flags);
    }
    fn clear_local(&mut self, flags: LocalFlags) {
        self.local.remove(flags);
    }
    fn clear_control(&mut self, flags: ControlFlags) {
        self.control.remove(flags);
    }
    fn set_char_size(&mut self, size: CharSize) {
        self.char_size = size;
    }
    fn set_read_policy(&mut self, policy: ReadPolicy) {
        self.read_policy = policy;
    }
    fn input_flags(&self) -> InputFlags {
        self.input
    }
    fn output_flags(&self) -> OutputFlags {
        self.output
    }
    fn local_flags(&self) -> LocalFlags {
        self.local
    }
    fn control_flags(&self) -> ControlFlags {
        self.control
    }
    fn char_size(&self) -> CharSize {
        self.char_size
    }
    fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }
}

// ============================================================================
// Device state
// ============================================================================

/// Something the session did to the fake device, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    InputOpened,
    OutputOpened,
    AttrsRead,
    AttrsWritten(SetWhen),
    Subscribed,
    Unsubscribed,
    OutputClosed,
    InputClosed,
    /// Recorded by a test through [`FakeTerminal::mark`].
    Mark(&'static str),
}

/// Failure to inject into the fake device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    OpenInput,
    OpenOutput,
    GetAttrs,
    /// Every attribute write fails.
    SetAttrs,
    /// The first attribute write (raw mode) succeeds; later writes
    /// (restoration) fail.
    RestoreAttrs,
    WindowSize,
    Subscribe,
}

#[derive(Debug)]
struct State {
    attrs: FakeAttrs,
    baud: u32,
    size: Option<Dimensions>,
    faults: HashSet<Fault>,
    events: Vec<DeviceEvent>,
    attr_writes: usize,
    size_queries: u64,
    open_inputs: usize,
    open_outputs: usize,
    pending: VecDeque<u8>,
    hung_up: bool,
}

impl State {
    fn fail_if(&self, fault: Fault, what: &str) -> io::Result<()> {
        if self.faults.contains(&fault) {
            Err(io::Error::other(format!("{what}: injected failure")))
        } else {
            Ok(())
        }
    }
}

struct Shared {
    state: Mutex<State>,
    readable: Condvar,
    subscribers: Mutex<Vec<(u64, ResizeCallback)>>,
    next_subscriber: AtomicU64,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<(u64, ResizeCallback)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: DeviceEvent) {
        self.state().events.push(event);
    }
}

// ============================================================================
// Opener
// ============================================================================

/// Fake terminal device. Clones share the same device.
#[derive(Clone)]
pub struct FakeTerminal {
    shared: Arc<Shared>,
}

impl FakeTerminal {
    /// A cooked terminal of the given size at 38400 baud.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_attrs(FakeAttrs::cooked(), Some(Dimensions::new(cols, rows)))
    }

    /// A terminal starting from `attrs`; `size = None` makes size queries fail.
    #[must_use]
    pub fn with_attrs(attrs: FakeAttrs, size: Option<Dimensions>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    attrs,
                    baud: 38_400,
                    size,
                    faults: HashSet::new(),
                    events: Vec::new(),
                    attr_writes: 0,
                    size_queries: 0,
                    open_inputs: 0,
                    open_outputs: 0,
                    pending: VecDeque::new(),
                    hung_up: false,
                }),
                readable: Condvar::new(),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// A notifier wired to this device's event log and fault set.
    #[must_use]
    pub fn notifier(&self) -> ManualResize {
        ManualResize {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn inject(&self, fault: Fault) {
        self.shared.state().faults.insert(fault);
    }

    pub fn heal(&self, fault: Fault) {
        self.shared.state().faults.remove(&fault);
    }

    /// Change what the next window-size query reports.
    pub fn set_size(&self, size: Option<Dimensions>) {
        self.shared.state().size = size;
    }

    /// Attribute set currently applied to the device.
    #[must_use]
    pub fn attrs(&self) -> FakeAttrs {
        self.shared.state().attrs.clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.shared.state().events.clone()
    }

    /// Successful attribute writes.
    #[must_use]
    pub fn attr_writes(&self) -> usize {
        self.shared.state().attr_writes
    }

    /// Window-size queries answered (successfully or not).
    #[must_use]
    pub fn size_queries(&self) -> u64 {
        self.shared.state().size_queries
    }

    /// Handles opened and not yet closed.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        let state = self.shared.state();
        state.open_inputs + state.open_outputs
    }

    /// Record a test-defined marker in the event log.
    pub fn mark(&self, label: &'static str) {
        self.shared.record(DeviceEvent::Mark(label));
    }

    /// Make `bytes` available to the input handle.
    pub fn type_bytes(&self, bytes: &[u8]) {
        self.shared.state().pending.extend(bytes);
        self.shared.readable.notify_all();
    }

    /// End of input: blocked and future reads return `Ok(0)`.
    pub fn hang_up(&self) {
        self.shared.state().hung_up = true;
        self.shared.readable.notify_all();
    }
}

impl std::fmt::Debug for FakeTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("FakeTerminal")
            .field("size", &state.size)
            .field("open_inputs", &state.open_inputs)
            .field("open_outputs", &state.open_outputs)
            .field("faults", &state.faults)
            .finish()
    }
}

impl DeviceOpener for FakeTerminal {
    type Input = FakeInput;
    type Output = FakeOutput;

    fn open_input(&self) -> io::Result<FakeInput> {
        let mut state = self.shared.state();
        state.fail_if(Fault::OpenInput, "open input")?;
        state.open_inputs += 1;
        state.events.push(DeviceEvent::InputOpened);
        Ok(FakeInput {
            shared: Arc::clone(&self.shared),
        })
    }

    fn open_output(&self) -> io::Result<FakeOutput> {
        let mut state = self.shared.state();
        state.fail_if(Fault::OpenOutput, "open output")?;
        state.open_outputs += 1;
        state.events.push(DeviceEvent::OutputOpened);
        Ok(FakeOutput {
            shared: Arc::clone(&self.shared),
        })
    }

    fn describe(&self) -> String {
        "fake-tty".to_owned()
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Input side of the fake device. Closing happens on drop, wherever the
/// last owner is.
pub struct FakeInput {
    shared: Arc<Shared>,
}

impl FakeInput {
    /// Wait up to `timeout` for pending input or hang-up.
    pub fn wait_readable(&self, timeout: Duration) -> bool {
        let state = self.shared.state();
        let (state, _) = self
            .shared
            .readable
            .wait_timeout_while(state, timeout, |s| s.pending.is_empty() && !s.hung_up)
            .unwrap_or_else(PoisonError::into_inner);
        !state.pending.is_empty() || state.hung_up
    }
}

impl InputHandle for FakeInput {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.shared.state();
        loop {
            if !state.pending.is_empty() {
                let n = buf.len().min(state.pending.len());
                for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.hung_up {
                return Ok(0);
            }
            state = self
                .shared
                .readable
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn close(self) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl Drop for FakeInput {
    fn drop(&mut self) {
        let mut state = self.shared.state();
        state.open_inputs = state.open_inputs.saturating_sub(1);
        state.events.push(DeviceEvent::InputClosed);
    }
}

/// Output side of the fake device.
pub struct FakeOutput {
    shared: Arc<Shared>,
}

impl OutputHandle for FakeOutput {
    type Attrs = FakeAttrs;

    fn get_attrs(&self) -> io::Result<FakeAttrs> {
        let mut state = self.shared.state();
        state.fail_if(Fault::GetAttrs, "tcgetattr")?;
        state.events.push(DeviceEvent::AttrsRead);
        Ok(state.attrs.clone())
    }

    fn set_attrs(&self, attrs: &FakeAttrs, when: SetWhen) -> io::Result<()> {
        let mut state = self.shared.state();
        state.fail_if(Fault::SetAttrs, "tcsetattr")?;
        if state.attr_writes > 0 {
            state.fail_if(Fault::RestoreAttrs, "tcsetattr")?;
        }
        if when == SetWhen::Flush {
            state.pending.clear();
        }
        state.attrs = attrs.clone();
        state.attr_writes += 1;
        state.events.push(DeviceEvent::AttrsWritten(when));
        Ok(())
    }

    fn baud_rate(&self) -> io::Result<u32> {
        let state = self.shared.state();
        state.fail_if(Fault::GetAttrs, "cfgetospeed")?;
        Ok(state.baud)
    }

    fn window_size(&self) -> io::Result<Dimensions> {
        let mut state = self.shared.state();
        state.size_queries += 1;
        state.fail_if(Fault::WindowSize, "TIOCGWINSZ")?;
        state
            .size
            .ok_or_else(|| io::Error::other("TIOCGWINSZ: no size available"))
    }

    fn close(self) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl Drop for FakeOutput {
    fn drop(&mut self) {
        let mut state = self.shared.state();
        state.open_outputs = state.open_outputs.saturating_sub(1);
        state.events.push(DeviceEvent::OutputClosed);
    }
}

// ============================================================================
// Resize notifier
// ============================================================================

/// Resize notifier fired by hand with [`ManualResize::trigger`].
#[derive(Clone)]
pub struct ManualResize {
    shared: Arc<Shared>,
}

impl ManualResize {
    /// Deliver one notification to every current subscriber, on the calling
    /// thread. Returns the number of callbacks run.
    pub fn trigger(&self) -> usize {
        let callbacks: Vec<ResizeCallback> = self
            .shared
            .subscribers()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers().len()
    }
}

impl ResizeNotifier for ManualResize {
    type Subscription = ManualSubscription;

    fn subscribe(&self, callback: ResizeCallback) -> io::Result<ManualSubscription> {
        self.shared
            .state()
            .fail_if(Fault::Subscribe, "signal registration")?;
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.shared.subscribers().push((id, callback));
        self.shared.record(DeviceEvent::Subscribed);
        Ok(ManualSubscription {
            id,
            shared: Some(Arc::clone(&self.shared)),
        })
    }
}

/// Registration with a [`ManualResize`]; removed on unsubscribe or drop.
pub struct ManualSubscription {
    id: u64,
    shared: Option<Arc<Shared>>,
}

impl ManualSubscription {
    fn remove(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.subscribers().retain(|(id, _)| *id != self.id);
            shared.record(DeviceEvent::Unsubscribed);
        }
    }
}

impl ResizeSubscription for ManualSubscription {
    fn unsubscribe(mut self) {
        self.remove();
    }
}

impl Drop for ManualSubscription {
    fn drop(&mut self) {
        self.remove();
    }
}
