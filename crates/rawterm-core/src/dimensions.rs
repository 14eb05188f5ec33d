#![forbid(unsafe_code)]

//! Window dimensions and their lock-free publication.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub cols: u16,
    pub rows: u16,
}

impl Dimensions {
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// A size with zero columns or rows is what the kernel reports for a
    /// terminal that was never sized; it is not a usable answer.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl From<(u16, u16)> for Dimensions {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self { cols, rows }
    }
}

impl From<Dimensions> for (u16, u16) {
    fn from(d: Dimensions) -> Self {
        (d.cols, d.rows)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Shared, atomically published dimensions.
///
/// Written by the session on the controlling thread and by the resize
/// notification thread; read from anywhere. Each `store` swaps in a complete
/// pair, so readers never observe columns from one update and rows from
/// another.
#[derive(Debug)]
pub struct SharedDimensions {
    current: ArcSwap<Dimensions>,
    generation: AtomicU64,
}

impl SharedDimensions {
    #[must_use]
    pub fn new(initial: Dimensions) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            generation: AtomicU64::new(0),
        }
    }

    /// Current dimensions.
    #[must_use]
    pub fn load(&self) -> Dimensions {
        **self.current.load()
    }

    /// Publish a new size.
    pub fn store(&self, dims: Dimensions) {
        self.current.store(Arc::new(dims));
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Number of successful publishes since construction.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SharedDimensions {
    fn default() -> Self {
        Self::new(Dimensions::default())
    }
}
