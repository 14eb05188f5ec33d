//! Shared fixtures for unit tests.

use crate::mode::{
    CharSize, ControlFlags, InputFlags, LocalFlags, OutputFlags, ReadPolicy, TermAttributes,
};

/// Attribute set for outputs whose mode is irrelevant to the test.
#[derive(Debug, Clone)]
pub(crate) struct NoAttrs;

impl TermAttributes for NoAttrs {
    fn clear_input(&mut self, _: InputFlags) {}
    fn clear_output(&mut self, _: OutputFlags) {}
    fn clear_local(&mut self, _: LocalFlags) {}
    fn clear_control(&mut self, _: ControlFlags) {}
    fn set_char_size(&mut self, _: CharSize) {}
    fn set_read_policy(&mut self, _: ReadPolicy) {}
    fn input_flags(&self) -> InputFlags {
        InputFlags::empty()
    }
    fn output_flags(&self) -> OutputFlags {
        OutputFlags::empty()
    }
    fn local_flags(&self) -> LocalFlags {
        LocalFlags::empty()
    }
    fn control_flags(&self) -> ControlFlags {
        ControlFlags::empty()
    }
    fn char_size(&self) -> CharSize {
        CharSize::Eight
    }
    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::BLOCKING_SINGLE_BYTE
    }
}
