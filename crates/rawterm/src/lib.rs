#![forbid(unsafe_code)]

//! rawterm public facade crate.
//!
//! Exclusive, raw-mode control of a terminal device with exact restoration
//! of the original mode, window-size tracking, and teardown that waits for
//! the input reader.
//!
//! ```no_run
//! use rawterm::prelude::*;
//!
//! let session = open_session(TtyOptions::from_env(), SessionOptions::default())?;
//! let size: Dimensions = session.current_dimensions();
//! session.shutdown();
//! # let _ = size;
//! # Ok::<(), SessionError>(())
//! ```

pub use rawterm_core as core;
#[cfg(all(feature = "tty", unix))]
pub use rawterm_tty as tty;

pub mod prelude {
    pub use rawterm_core as core;
    pub use rawterm_core::{
        Dimensions, ReaderHandle, SessionError, SessionOptions, SharedDimensions, TerminalSession,
    };
    #[cfg(all(feature = "tty", unix))]
    pub use rawterm_tty::{TtyOptions, TtySession, open_session};
}
