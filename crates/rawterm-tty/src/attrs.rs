//! `termios` seen through [`TermAttributes`].

use nix::sys::termios::{self, SpecialCharacterIndices, Termios};
use rawterm_core::mode::{
    CharSize, ControlFlags, InputFlags, LocalFlags, OutputFlags, ReadPolicy, TermAttributes,
};

const INPUT_BITS: [(InputFlags, termios::InputFlags); 8] = [
    (InputFlags::IGNBRK, termios::InputFlags::IGNBRK),
    (InputFlags::BRKINT, termios::InputFlags::BRKINT),
    (InputFlags::PARMRK, termios::InputFlags::PARMRK),
    (InputFlags::ISTRIP, termios::InputFlags::ISTRIP),
    (InputFlags::INLCR, termios::InputFlags::INLCR),
    (InputFlags::IGNCR, termios::InputFlags::IGNCR),
    (InputFlags::ICRNL, termios::InputFlags::ICRNL),
    (InputFlags::IXON, termios::InputFlags::IXON),
];

const LOCAL_BITS: [(LocalFlags, termios::LocalFlags); 5] = [
    (LocalFlags::ECHO, termios::LocalFlags::ECHO),
    (LocalFlags::ECHONL, termios::LocalFlags::ECHONL),
    (LocalFlags::ICANON, termios::LocalFlags::ICANON),
    (LocalFlags::ISIG, termios::LocalFlags::ISIG),
    (LocalFlags::IEXTEN, termios::LocalFlags::IEXTEN),
];

const CHAR_SIZES: [(CharSize, termios::ControlFlags); 4] = [
    (CharSize::Five, termios::ControlFlags::CS5),
    (CharSize::Six, termios::ControlFlags::CS6),
    (CharSize::Seven, termios::ControlFlags::CS7),
    (CharSize::Eight, termios::ControlFlags::CS8),
];

fn input_to_os(wanted: InputFlags) -> termios::InputFlags {
    INPUT_BITS
        .iter()
        .filter(|(ours, _)| wanted.contains(*ours))
        .fold(termios::InputFlags::empty(), |acc, (_, os)| acc | *os)
}

fn local_to_os(wanted: LocalFlags) -> termios::LocalFlags {
    LOCAL_BITS
        .iter()
        .filter(|(ours, _)| wanted.contains(*ours))
        .fold(termios::LocalFlags::empty(), |acc, (_, os)| acc | *os)
}

/// A `termios` attribute set from `tcgetattr`.
///
/// Bits outside the raw recipe pass through untouched, so writing a captured
/// `TtyAttrs` back reproduces the terminal's state exactly.
#[derive(Clone, Debug)]
pub struct TtyAttrs(Termios);

impl TtyAttrs {
    /// The underlying `termios`.
    #[must_use]
    pub fn as_termios(&self) -> &Termios {
        &self.0
    }

    #[must_use]
    pub fn into_termios(self) -> Termios {
        self.0
    }
}

impl From<Termios> for TtyAttrs {
    fn from(termios: Termios) -> Self {
        Self(termios)
    }
}

impl PartialEq for TtyAttrs {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.0, &other.0);
        a.input_flags == b.input_flags
            && a.output_flags == b.output_flags
            && a.control_flags == b.control_flags
            && a.local_flags == b.local_flags
            && a.control_chars == b.control_chars
            && termios::cfgetispeed(a) == termios::cfgetispeed(b)
            && termios::cfgetospeed(a) == termios::cfgetospeed(b)
            && same_line_discipline(a, b)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn same_line_discipline(a: &Termios, b: &Termios) -> bool {
    a.line_discipline == b.line_discipline
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn same_line_discipline(_: &Termios, _: &Termios) -> bool {
    true
}

impl Eq for TtyAttrs {}

impl TermAttributes for TtyAttrs {
    fn clear_input(&mut self, flags: InputFlags) {
        self.0.input_flags.remove(input_to_os(flags));
    }

    fn clear_output(&mut self, flags: OutputFlags) {
        if flags.contains(OutputFlags::OPOST) {
            self.0.output_flags.remove(termios::OutputFlags::OPOST);
        }
    }

    fn clear_local(&mut self, flags: LocalFlags) {
        self.0.local_flags.remove(local_to_os(flags));
    }

    fn clear_control(&mut self, flags: ControlFlags) {
        if flags.contains(ControlFlags::PARENB) {
            self.0.control_flags.remove(termios::ControlFlags::PARENB);
        }
    }

    fn set_char_size(&mut self, size: CharSize) {
        let bits = CHAR_SIZES
            .iter()
            .find(|(ours, _)| *ours == size)
            .map_or(termios::ControlFlags::CS8, |(_, os)| *os);
        self.0.control_flags.remove(termios::ControlFlags::CSIZE);
        self.0.control_flags.insert(bits);
    }

    fn set_read_policy(&mut self, policy: ReadPolicy) {
        self.0.control_chars[SpecialCharacterIndices::VMIN as usize] = policy.min_bytes;
        self.0.control_chars[SpecialCharacterIndices::VTIME as usize] = policy.timeout_ds;
    }

    fn input_flags(&self) -> InputFlags {
        INPUT_BITS
            .iter()
            .filter(|(_, os)| self.0.input_flags.contains(*os))
            .fold(InputFlags::empty(), |acc, (ours, _)| acc | *ours)
    }

    fn output_flags(&self) -> OutputFlags {
        if self.0.output_flags.contains(termios::OutputFlags::OPOST) {
            OutputFlags::OPOST
        } else {
            OutputFlags::empty()
        }
    }

    fn local_flags(&self) -> LocalFlags {
        LOCAL_BITS
            .iter()
            .filter(|(_, os)| self.0.local_flags.contains(*os))
            .fold(LocalFlags::empty(), |acc, (ours, _)| acc | *ours)
    }

    fn control_flags(&self) -> ControlFlags {
        if self.0.control_flags.contains(termios::ControlFlags::PARENB) {
            ControlFlags::PARENB
        } else {
            ControlFlags::empty()
        }
    }

    fn char_size(&self) -> CharSize {
        // CS5 is zero on most platforms, so compare the masked field.
        let masked = self.0.control_flags & termios::ControlFlags::CSIZE;
        CHAR_SIZES
            .iter()
            .find(|(_, os)| *os == masked)
            .map_or(CharSize::Eight, |(ours, _)| *ours)
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy {
            min_bytes: self.0.control_chars[SpecialCharacterIndices::VMIN as usize],
            timeout_ds: self.0.control_chars[SpecialCharacterIndices::VTIME as usize],
        }
    }
}
