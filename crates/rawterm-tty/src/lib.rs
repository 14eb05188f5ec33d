#![forbid(unsafe_code)]

//! Native POSIX backend for `rawterm`.
//!
//! Implements the `rawterm-core` device and notification seams directly on
//! top of the OS:
//!
//! | Concern           | Mechanism                                           |
//! |-------------------|-----------------------------------------------------|
//! | Device handles    | `/dev/tty` opened twice: read-only and write-only   |
//! | Attribute sets    | `tcgetattr` / `tcsetattr` (`nix::sys::termios`)     |
//! | Baud rate         | `cfgetospeed` (`rustix::termios`)                   |
//! | Window size       | `TIOCGWINSZ` (`rustix::termios::tcgetwinsize`)      |
//! | Resize channel    | `SIGWINCH` drained by a `signal-hook` thread        |
//! | Reader wake-up    | `poll(2)` with timeout (`nix::poll`)                |
//!
//! No `unsafe` is needed: signal delivery goes through `signal-hook`'s
//! iterator thread instead of a hand-installed `sigaction`.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use rawterm_core::SessionOptions;
//! use rawterm_tty::{TtyOptions, open_session};
//!
//! let mut session = open_session(TtyOptions::from_env(), SessionOptions::default())?;
//! println!("{} at {} baud", session.current_dimensions(), session.baud_rate());
//!
//! if let Some(reader) = session.take_reader() {
//!     reader.spawn(|r| {
//!         let mut buf = [0u8; 256];
//!         while !r.should_stop() {
//!             match r.input().wait_readable(Duration::from_millis(50)) {
//!                 Ok(true) => match r.read(&mut buf) {
//!                     Ok(0) | Err(_) => break,
//!                     Ok(_n) => {}
//!                 },
//!                 Ok(false) => {}
//!                 Err(_) => break,
//!             }
//!         }
//!     })?;
//! }
//!
//! session.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(unix)]
mod attrs;
#[cfg(unix)]
mod device;
#[cfg(unix)]
mod signal;

#[cfg(unix)]
pub use attrs::TtyAttrs;
#[cfg(unix)]
pub use device::{DEFAULT_TTY_PATH, TTY_PATH_ENV, TtyDevice, TtyInput, TtyOptions, TtyOutput};
#[cfg(unix)]
pub use signal::{SigwinchNotifier, SigwinchSubscription};

/// A session on a POSIX terminal.
#[cfg(unix)]
pub type TtySession = rawterm_core::TerminalSession<TtyDevice, SigwinchNotifier>;

/// Open `options.device_path`, enter raw mode, and track `SIGWINCH`.
///
/// # Errors
///
/// See [`rawterm_core::TerminalSession::initialize`].
#[cfg(unix)]
pub fn open_session(
    options: TtyOptions,
    session: rawterm_core::SessionOptions,
) -> rawterm_core::Result<TtySession> {
    let device = TtyDevice::new(options);
    rawterm_core::TerminalSession::initialize(&device, &SigwinchNotifier::new(), session)
}

#[cfg(all(test, unix))]
pub(crate) mod test_pty {
    //! Pseudo-terminal fixture. Tests never touch the runner's own terminal.

    use std::os::fd::{AsFd, OwnedFd};
    use std::path::PathBuf;

    use nix::pty::{OpenptyResult, Winsize, openpty};

    pub struct Pty {
        pub master: OwnedFd,
        pub slave: OwnedFd,
        pub path: PathBuf,
    }

    impl Pty {
        pub fn open(cols: u16, rows: u16) -> Self {
            let size = Winsize {
                ws_row: rows,
                ws_col: cols,
                ws_xpixel: 0,
                ws_ypixel: 0,
            };
            let OpenptyResult { master, slave } = openpty(&size, None).expect("openpty");
            let path = nix::unistd::ttyname(slave.as_fd()).expect("ttyname");
            Self {
                master,
                slave,
                path,
            }
        }

        pub fn resize(&self, cols: u16, rows: u16) {
            let size = rustix::termios::Winsize {
                ws_row: rows,
                ws_col: cols,
                ws_xpixel: 0,
                ws_ypixel: 0,
            };
            rustix::termios::tcsetwinsize(&self.master, size).expect("tcsetwinsize");
        }

        pub fn options(&self) -> crate::TtyOptions {
            crate::TtyOptions {
                device_path: self.path.clone(),
            }
        }
    }
}
