#![forbid(unsafe_code)]

//! Mode transition engine.
//!
//! Captures the terminal's attribute set, derives the raw configuration from
//! it, and writes the captured set back verbatim on teardown.
//!
//! # Raw recipe
//!
//! | Field   | Cleared                                                  | Set        |
//! |---------|----------------------------------------------------------|------------|
//! | input   | IGNBRK BRKINT PARMRK ISTRIP INLCR IGNCR ICRNL IXON       |            |
//! | output  | OPOST                                                    |            |
//! | local   | ECHO ECHONL ICANON ISIG IEXTEN                           |            |
//! | control | CSIZE PARENB                                             | CS8        |
//! | cc      |                                                          | VMIN=1 VTIME=0 |
//!
//! VMIN=1/VTIME=0 makes every read block until at least one byte arrives,
//! with no inter-byte timer. The input reader therefore never busy-polls, and
//! shutdown has to wait for it explicitly instead of relying on a timeout.
//!
//! Restoration never reverses the recipe bit by bit: it writes the captured
//! snapshot, so bits the recipe did not touch (and bits it did) come back
//! exactly as they were.

use std::fmt;
use std::io;

use bitflags::bitflags;

use crate::backend::{OutputHandle, SetWhen};
use crate::error::{Result, SessionError};

bitflags! {
    /// Input-mode bits the raw recipe touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputFlags: u16 {
        const IGNBRK = 1 << 0;
        const BRKINT = 1 << 1;
        const PARMRK = 1 << 2;
        const ISTRIP = 1 << 3;
        const INLCR  = 1 << 4;
        const IGNCR  = 1 << 5;
        const ICRNL  = 1 << 6;
        const IXON   = 1 << 7;
    }
}

bitflags! {
    /// Output-mode bits the raw recipe touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OutputFlags: u8 {
        const OPOST = 1 << 0;
    }
}

bitflags! {
    /// Local-mode bits the raw recipe touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LocalFlags: u8 {
        const ECHO   = 1 << 0;
        const ECHONL = 1 << 1;
        const ICANON = 1 << 2;
        const ISIG   = 1 << 3;
        const IEXTEN = 1 << 4;
    }
}

bitflags! {
    /// Control-mode bits the raw recipe touches (character size is [`CharSize`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u8 {
        const PARENB = 1 << 0;
    }
}

/// Character size field (`CSIZE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharSize {
    Five,
    Six,
    Seven,
    Eight,
}

/// Non-canonical read policy: `VMIN` and `VTIME` (tenths of a second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadPolicy {
    pub min_bytes: u8,
    pub timeout_ds: u8,
}

impl ReadPolicy {
    /// Block until one byte is available, no inter-byte timeout.
    pub const BLOCKING_SINGLE_BYTE: Self = Self {
        min_bytes: 1,
        timeout_ds: 0,
    };
}

pub const RAW_INPUT_CLEAR: InputFlags = InputFlags::IGNBRK
    .union(InputFlags::BRKINT)
    .union(InputFlags::PARMRK)
    .union(InputFlags::ISTRIP)
    .union(InputFlags::INLCR)
    .union(InputFlags::IGNCR)
    .union(InputFlags::ICRNL)
    .union(InputFlags::IXON);

pub const RAW_OUTPUT_CLEAR: OutputFlags = OutputFlags::OPOST;

pub const RAW_LOCAL_CLEAR: LocalFlags = LocalFlags::ECHO
    .union(LocalFlags::ECHONL)
    .union(LocalFlags::ICANON)
    .union(LocalFlags::ISIG)
    .union(LocalFlags::IEXTEN);

pub const RAW_CONTROL_CLEAR: ControlFlags = ControlFlags::PARENB;

/// A backend's terminal attribute set, seen through the bits the raw recipe
/// needs.
///
/// Implementations wrap the platform structure (e.g. `termios`) and must
/// leave every bit not named by an argument untouched. `Sync` is not
/// required; the session only ever touches its snapshot from one thread.
pub trait TermAttributes: Clone + fmt::Debug + Send + 'static {
    fn clear_input(&mut self, flags: InputFlags);
    fn clear_output(&mut self, flags: OutputFlags);
    fn clear_local(&mut self, flags: LocalFlags);
    fn clear_control(&mut self, flags: ControlFlags);
    fn set_char_size(&mut self, size: CharSize);
    fn set_read_policy(&mut self, policy: ReadPolicy);

    fn input_flags(&self) -> InputFlags;
    fn output_flags(&self) -> OutputFlags;
    fn local_flags(&self) -> LocalFlags;
    fn control_flags(&self) -> ControlFlags;
    fn char_size(&self) -> CharSize;
    fn read_policy(&self) -> ReadPolicy;
}

/// Derive the raw attribute set from `snapshot`.
///
/// Pure: the same input always yields the same output.
#[must_use]
pub fn derive_raw<A: TermAttributes>(snapshot: &A) -> A {
    let mut raw = snapshot.clone();
    raw.clear_input(RAW_INPUT_CLEAR);
    raw.clear_output(RAW_OUTPUT_CLEAR);
    raw.clear_local(RAW_LOCAL_CLEAR);
    raw.clear_control(RAW_CONTROL_CLEAR);
    raw.set_char_size(CharSize::Eight);
    raw.set_read_policy(ReadPolicy::BLOCKING_SINGLE_BYTE);
    raw
}

/// Whether `attrs` satisfies the raw recipe.
#[must_use]
pub fn is_raw<A: TermAttributes>(attrs: &A) -> bool {
    !attrs.input_flags().intersects(RAW_INPUT_CLEAR)
        && !attrs.output_flags().intersects(RAW_OUTPUT_CLEAR)
        && !attrs.local_flags().intersects(RAW_LOCAL_CLEAR)
        && !attrs.control_flags().intersects(RAW_CONTROL_CLEAR)
        && attrs.char_size() == CharSize::Eight
        && attrs.read_policy() == ReadPolicy::BLOCKING_SINGLE_BYTE
}

/// The terminal mode as it was when the session started.
#[derive(Debug, Clone)]
pub struct ModeSnapshot<A> {
    attrs: A,
    baud: u32,
}

impl<A: TermAttributes> ModeSnapshot<A> {
    #[must_use]
    pub fn new(attrs: A, baud: u32) -> Self {
        Self { attrs, baud }
    }

    /// The captured attribute set.
    #[must_use]
    pub fn attrs(&self) -> &A {
        &self.attrs
    }

    /// Output baud rate read at capture time.
    #[must_use]
    pub fn baud(&self) -> u32 {
        self.baud
    }

    /// The raw attribute set derived from this snapshot.
    #[must_use]
    pub fn raw(&self) -> A {
        derive_raw(&self.attrs)
    }
}

/// Read the current attribute set and baud rate from the output handle.
pub fn capture_mode<O: OutputHandle>(out: &O) -> Result<ModeSnapshot<O::Attrs>> {
    let attrs = out.get_attrs().map_err(SessionError::AttributeQueryFailed)?;
    let baud = out.baud_rate().map_err(SessionError::AttributeQueryFailed)?;
    Ok(ModeSnapshot::new(attrs, baud))
}

/// Derive raw mode from `snapshot` and write it, flushing pending I/O first.
///
/// Returns the attribute set that was applied.
pub fn apply_raw_mode<O: OutputHandle>(
    out: &O,
    snapshot: &ModeSnapshot<O::Attrs>,
) -> Result<O::Attrs> {
    let raw = snapshot.raw();
    out.set_attrs(&raw, SetWhen::Flush)
        .map_err(SessionError::AttributeApplyFailed)?;
    Ok(raw)
}

/// Write `snapshot` back unmodified.
///
/// Teardown treats failure as best-effort; the caller decides how to log it.
pub fn restore_mode<O: OutputHandle>(
    out: &O,
    snapshot: &ModeSnapshot<O::Attrs>,
) -> io::Result<()> {
    out.set_attrs(&snapshot.attrs, SetWhen::Flush)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Minimal attribute model: the recipe bits plus bits it must not touch.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Attrs {
        input: InputFlags,
        output: OutputFlags,
        local: LocalFlags,
        control: ControlFlags,
        size: CharSize,
        policy: ReadPolicy,
        untouched: u32,
    }

    impl TermAttributes for Attrs {
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
            self.size = size;
        }
        fn set_read_policy(&mut self, policy: ReadPolicy) {
            self.policy = policy;
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
            self.size
        }
        fn read_policy(&self) -> ReadPolicy {
            self.policy
        }
    }

    fn cooked() -> Attrs {
        Attrs {
            input: InputFlags::BRKINT | InputFlags::ICRNL | InputFlags::IXON,
            output: OutputFlags::OPOST,
            local: LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::IEXTEN,
            control: ControlFlags::empty(),
            size: CharSize::Seven,
            policy: ReadPolicy {
                min_bytes: 4,
                timeout_ds: 2,
            },
            untouched: 0xdead_beef,
        }
    }

    #[test]
    fn raw_clears_canonical_echo_and_signals() {
        let raw = derive_raw(&cooked());
        assert!(!raw.local.contains(LocalFlags::ICANON));
        assert!(!raw.local.contains(LocalFlags::ECHO));
        assert!(!raw.local.contains(LocalFlags::ISIG));
        assert_eq!(raw.policy, ReadPolicy::BLOCKING_SINGLE_BYTE);
        assert_eq!(raw.size, CharSize::Eight);
        assert!(is_raw(&raw));
    }

    #[test]
    fn raw_preserves_unrelated_bits() {
        let raw = derive_raw(&cooked());
        assert_eq!(raw.untouched, 0xdead_beef);
    }

    #[test]
    fn cooked_is_not_raw() {
        assert!(!is_raw(&cooked()));
    }

    #[test]
    fn snapshot_keeps_original_and_baud() {
        let snap = ModeSnapshot::new(cooked(), 38_400);
        assert_eq!(snap.baud(), 38_400);
        assert_eq!(snap.attrs(), &cooked());
        assert!(is_raw(&snap.raw()));
        // Deriving raw never mutates the snapshot.
        assert_eq!(snap.attrs(), &cooked());
    }

    fn arb_attrs() -> impl Strategy<Value = Attrs> {
        (
            any::<u16>(),
            any::<u8>(),
            any::<u8>(),
            any::<u8>(),
            0u8..4,
            any::<u8>(),
            any::<u8>(),
            any::<u32>(),
        )
            .prop_map(|(i, o, l, c, s, min, time, untouched)| Attrs {
                input: InputFlags::from_bits_truncate(i),
                output: OutputFlags::from_bits_truncate(o),
                local: LocalFlags::from_bits_truncate(l),
                control: ControlFlags::from_bits_truncate(c),
                size: match s {
                    0 => CharSize::Five,
                    1 => CharSize::Six,
                    2 => CharSize::Seven,
                    _ => CharSize::Eight,
                },
                policy: ReadPolicy {
                    min_bytes: min,
                    timeout_ds: time,
                },
                untouched,
            })
    }

    proptest! {
        #[test]
        fn derive_raw_is_deterministic(attrs in arb_attrs()) {
            prop_assert_eq!(derive_raw(&attrs), derive_raw(&attrs));
        }

        #[test]
        fn derive_raw_always_yields_raw(attrs in arb_attrs()) {
            prop_assert!(is_raw(&derive_raw(&attrs)));
        }

        #[test]
        fn derive_raw_is_idempotent(attrs in arb_attrs()) {
            let once = derive_raw(&attrs);
            prop_assert_eq!(derive_raw(&once), once);
        }
    }
}
