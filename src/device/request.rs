//! # Register Requests
//!
//! Configuration registers are addressed by a byte offset and an access width. This module
//! contains the [`Request`] type that bundles both.

use std::fmt::{self, Display, Formatter};

/// The width of a configuration register access.
///
/// We don't use plain integers here to prevent use with illegal
/// sizes. [`RequestSize`] can be converted to [`u64`] and [`usize`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RequestSize {
    Size1 = 1,
    Size2 = 2,
    Size4 = 4,
}

impl From<RequestSize> for u64 {
    fn from(r: RequestSize) -> Self {
        r as Self
    }
}

impl From<RequestSize> for usize {
    fn from(r: RequestSize) -> Self {
        r as Self
    }
}

impl Display for RequestSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let val = u64::from(*self);
        write!(f, "{val}")
    }
}

/// The offset-size pair of a configuration register access.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Request {
    /// The byte offset of the register in the Configuration Space.
    pub addr: u64,

    /// The width of the register.
    pub size: RequestSize,
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}+{}", self.addr, self.size)
    }
}

impl Request {
    /// Create a new request from address and size.
    #[must_use]
    pub const fn new(addr: u64, size: RequestSize) -> Self {
        Self { addr, size }
    }

    /// The byte range this request covers, if it doesn't overflow.
    #[must_use]
    pub fn byte_range(&self) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(self.addr).ok()?;
        let end = start.checked_add(self.size.into())?;
        Some(start..end)
    }

    /// The mask of valid bits for a value of this request's width.
    #[must_use]
    pub const fn value_mask(&self) -> u64 {
        match self.size {
            RequestSize::Size1 => 0xFF,
            RequestSize::Size2 => 0xFFFF,
            RequestSize::Size4 => 0xFFFF_FFFF,
        }
    }
}
