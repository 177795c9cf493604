//! # PCI Core Traits
//!
//! This module contains the interface to the Configuration Space of a live device. See
//! [`ConfigAccess`].

use std::fmt::Debug;

use crate::device::request::Request;

/// A live register read or write failed.
///
/// Typical causes are a device that was removed, missing privileges to write the Configuration
/// Space, or a register outside the accessible range.
#[derive(Debug, thiserror::Error)]
#[error("Config space access at {request} failed: {source}")]
pub struct RegisterIoError {
    /// The failed access.
    pub request: Request,

    /// The underlying error.
    #[source]
    pub source: std::io::Error,
}

impl RegisterIoError {
    /// Wrap an I/O error for `request`.
    #[must_use]
    pub const fn new(request: Request, source: std::io::Error) -> Self {
        Self { request, source }
    }
}

/// Read and write access to the Configuration Space of a live device.
///
/// Unlike the cached bytes in a [`Device`](super::device::Device), accesses through this trait
/// reach the hardware.
pub trait ConfigAccess: Debug {
    /// Read from the PCI Configuration Space of the device.
    ///
    /// # Parameters
    ///
    /// `req`: The offset and size of the request.
    fn read_cfg(&self, req: Request) -> Result<u64, RegisterIoError>;

    /// Write to the PCI Configuration Space of the device.
    ///
    /// # Parameters
    ///
    /// `req`: The offset and size of the request.
    /// `value`: The value to be written. Bits beyond the request size are ignored.
    fn write_cfg(&self, req: Request, value: u64) -> Result<(), RegisterIoError>;
}
