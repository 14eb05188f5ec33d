//! `/dev/tty` handles.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::Duration;

use nix::fcntl::OFlag;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, SetArg};
use rawterm_core::{DeviceOpener, Dimensions, InputHandle, OutputHandle, SetWhen};

use crate::attrs::TtyAttrs;

/// Controlling terminal of the calling process.
pub const DEFAULT_TTY_PATH: &str = "/dev/tty";

/// Environment variable that overrides [`TtyOptions::device_path`].
pub const TTY_PATH_ENV: &str = "RAWTERM_TTY";

/// Where the POSIX backend opens its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtyOptions {
    /// Terminal device path. Defaults to [`DEFAULT_TTY_PATH`].
    pub device_path: PathBuf,
}

impl Default for TtyOptions {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_TTY_PATH),
        }
    }
}

impl TtyOptions {
    /// Defaults, with [`TTY_PATH_ENV`] applied when it is set and non-empty.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        match lookup(TTY_PATH_ENV) {
            Some(path) if !path.is_empty() => Self {
                device_path: PathBuf::from(path),
            },
            _ => Self::default(),
        }
    }
}

/// Opens the configured terminal device, read-only for input and
/// write-only for output.
#[derive(Debug, Clone, Default)]
pub struct TtyDevice {
    options: TtyOptions,
}

impl TtyDevice {
    #[must_use]
    pub fn new(options: TtyOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &TtyOptions {
        &self.options
    }

    fn open(&self, options: &mut OpenOptions) -> io::Result<File> {
        // Never let opening a terminal make it our controlling terminal.
        options
            .custom_flags(OFlag::O_NOCTTY.bits())
            .open(&self.options.device_path)
    }
}

impl DeviceOpener for TtyDevice {
    type Input = TtyInput;
    type Output = TtyOutput;

    fn open_input(&self) -> io::Result<TtyInput> {
        let file = self.open(OpenOptions::new().read(true))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %self.options.device_path.display(), "tty input opened");
        Ok(TtyInput { file })
    }

    fn open_output(&self) -> io::Result<TtyOutput> {
        let file = self.open(OpenOptions::new().write(true))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %self.options.device_path.display(), "tty output opened");
        Ok(TtyOutput { file })
    }

    fn describe(&self) -> String {
        self.options.device_path.display().to_string()
    }
}

/// Read-only handle on the terminal device.
#[derive(Debug)]
pub struct TtyInput {
    file: File,
}

impl TtyInput {
    /// Wait up to `timeout` for input using `poll(2)`.
    ///
    /// Returns `Ok(false)` on timeout or when interrupted by a signal
    /// (`SIGWINCH` lands here routinely), so callers can re-check their
    /// stop token and poll again.
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        let timeout_ms: u16 = timeout.as_millis().try_into().unwrap_or(u16::MAX);
        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Ok(n) => Ok(n > 0),
            Err(nix::errno::Errno::EINTR) => Ok(false),
            Err(e) => Err(io::Error::from(e)),
        }
    }
}

impl InputHandle for TtyInput {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }

    fn close(self) -> io::Result<()> {
        drop(self.file);
        Ok(())
    }
}

/// Write-only handle on the terminal device; attribute and size queries go
/// through this side.
#[derive(Debug)]
pub struct TtyOutput {
    file: File,
}

impl OutputHandle for TtyOutput {
    type Attrs = TtyAttrs;

    fn get_attrs(&self) -> io::Result<TtyAttrs> {
        termios::tcgetattr(self.file.as_fd())
            .map(TtyAttrs::from)
            .map_err(io::Error::from)
    }

    fn set_attrs(&self, attrs: &TtyAttrs, when: SetWhen) -> io::Result<()> {
        let action = match when {
            SetWhen::Now => SetArg::TCSANOW,
            SetWhen::Drain => SetArg::TCSADRAIN,
            SetWhen::Flush => SetArg::TCSAFLUSH,
        };
        termios::tcsetattr(self.file.as_fd(), action, attrs.as_termios()).map_err(io::Error::from)
    }

    fn baud_rate(&self) -> io::Result<u32> {
        let attrs = rustix::termios::tcgetattr(&self.file)?;
        Ok(attrs.output_speed())
    }

    fn window_size(&self) -> io::Result<Dimensions> {
        let ws = rustix::termios::tcgetwinsize(&self.file)?;
        Ok(Dimensions::new(ws.ws_col, ws.ws_row))
    }

    fn close(self) -> io::Result<()> {
        drop(self.file);
        Ok(())
    }
}
