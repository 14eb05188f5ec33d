#![forbid(unsafe_code)]

use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Which of the two device handles an operation concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleRole {
    Input,
    Output,
}

impl fmt::Display for HandleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot open {role} handle on {device}: {source}")]
    DeviceOpenFailed {
        role: HandleRole,
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot get attributes: {0}")]
    AttributeQueryFailed(#[source] io::Error),

    #[error("cannot set attributes: {0}")]
    AttributeApplyFailed(#[source] io::Error),

    #[error("cannot query window size: {0}")]
    DimensionQueryFailed(#[source] io::Error),
}

impl SessionError {
    /// Whether this error aborts session initialization.
    ///
    /// Dimension queries are best-effort: a failure leaves the last known
    /// size in place and never reaches the caller of `initialize`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::DimensionQueryFailed(_))
    }

    #[must_use]
    pub fn open_failed(role: HandleRole, device: impl Into<String>, source: io::Error) -> Self {
        Self::DeviceOpenFailed {
            role,
            device: device.into(),
            source,
        }
    }

    /// The underlying I/O error.
    #[must_use]
    pub fn io(&self) -> &io::Error {
        match self {
            Self::DeviceOpenFailed { source, .. } => source,
            Self::AttributeQueryFailed(e)
            | Self::AttributeApplyFailed(e)
            | Self::DimensionQueryFailed(e) => e,
        }
    }
}
