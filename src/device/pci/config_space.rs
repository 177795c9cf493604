//! # PCI Configuration Space Access
//!
//! This module contains a read-only view onto the raw bytes of a device's Configuration Space. Use
//! [`ConfigSpace`] to read registers with bounds checks.

/// A read went beyond the end of the available Configuration Space bytes.
///
/// Configuration Space dumps can be short. Unprivileged reads from sysfs only return the first 64
/// bytes, and snapshots may only contain the standard 256-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Config space read at {offset:#x}+{size} exceeds {len} available bytes")]
pub struct OutOfBounds {
    /// The offset of the failed read.
    pub offset: usize,
    /// The number of bytes requested.
    pub size: usize,
    /// The number of bytes available.
    pub len: usize,
}

/// A bounds-checked window onto a device's Configuration Space.
///
/// All multi-byte values are stored in little-endian order.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSpace<'a> {
    bytes: &'a [u8],
}

impl<'a> ConfigSpace<'a> {
    /// Wrap a raw Configuration Space dump.
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// The number of available bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no bytes are available at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Return `size` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, size: usize) -> Result<&'a [u8], OutOfBounds> {
        offset
            .checked_add(size)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(OutOfBounds {
                offset,
                size,
                len: self.bytes.len(),
            })
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], OutOfBounds> {
        let mut out = [0; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    /// Read a byte.
    pub fn u8_at(&self, offset: usize) -> Result<u8, OutOfBounds> {
        self.array::<1>(offset).map(|[b]| b)
    }

    /// Read a little-endian 16-bit value.
    pub fn u16_le_at(&self, offset: usize) -> Result<u16, OutOfBounds> {
        self.array(offset).map(u16::from_le_bytes)
    }

    /// Read a little-endian 32-bit value.
    pub fn u32_le_at(&self, offset: usize) -> Result<u32, OutOfBounds> {
        self.array(offset).map(u32::from_le_bytes)
    }
}
