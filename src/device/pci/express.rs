//! # PCI Express Capability
//!
//! The PCI Express capability holds the device, link, slot and root port control and status
//! registers. This module decodes its fixed register layout into
//! [`ExpressCapabilityRegisters`].

use super::{
    capability::CapabilityOffsetTable,
    config_space::ConfigSpace,
    constants::config_space::express::{
        self, capabilities, device_status, link_status, HEADER_SIZE, REGISTERS_SIZE,
    },
};

/// Decoding the PCI Express capability failed.
///
/// Neither case is fatal. Callers display nothing for Express-derived fields instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The device has no PCI Express capability.
    #[error("No PCI Express capability")]
    CapabilityAbsent,

    /// The Configuration Space dump ends before the capability does.
    #[error("PCI Express capability needs {needed} bytes, only {available} available")]
    Truncated {
        /// The number of bytes required to decode the capability.
        needed: usize,
        /// The number of bytes in the dump.
        available: usize,
    },
}

/// The registers of the PCI Express capability, as version 2 defines them.
///
/// The registers follow the two byte capability header in exactly this order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExpressCapabilityRegisters {
    pub caps: u16,
    pub dev_cap: u32,
    pub dev_ctl: u16,
    pub dev_sta: u16,
    pub lnk_cap: u32,
    pub lnk_ctl: u16,
    pub lnk_sta: u16,
    pub slt_cap: u32,
    pub slt_ctl: u16,
    pub slt_sta: u16,
    pub root_ctl: u16,
    pub root_cap: u16,
    pub root_sta: u32,
    pub dev_cap2: u32,
    pub dev_ctl2: u16,
    pub dev_sta2: u16,
    pub lnk_cap2: u32,
    pub lnk_ctl2: u16,
    pub lnk_sta2: u16,
}

/// Reads consecutive little-endian values from a byte slice.
struct LeReader<'a> {
    bytes: &'a [u8],
}

impl LeReader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let (head, tail) = self.bytes.split_at(N);
        self.bytes = tail;

        let mut out = [0; N];
        out.copy_from_slice(head);
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }
}

/// The counterpart of [`LeReader`].
struct LeWriter<'a> {
    bytes: &'a mut [u8],
}

impl LeWriter<'_> {
    fn put(&mut self, value: &[u8]) {
        let (head, tail) = std::mem::take(&mut self.bytes).split_at_mut(value.len());
        head.copy_from_slice(value);
        self.bytes = tail;
    }

    fn u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }
}

impl ExpressCapabilityRegisters {
    /// Decode the PCI Express capability of a device.
    ///
    /// `capabilities` has to come from walking the capability list of the same `config_space`.
    pub fn decode(
        capabilities: &CapabilityOffsetTable,
        config_space: ConfigSpace<'_>,
    ) -> Result<Self, DecodeError> {
        let cap_offset = capabilities.express().ok_or(DecodeError::CapabilityAbsent)?;
        let start = usize::from(cap_offset) + HEADER_SIZE;

        let bytes = config_space
            .slice(start, REGISTERS_SIZE)
            .map_err(|_| DecodeError::Truncated {
                needed: start + REGISTERS_SIZE,
                available: config_space.len(),
            })?;

        Ok(Self::from_le_bytes(bytes))
    }

    /// Unpack the register block that follows the capability header.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`REGISTERS_SIZE`].
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        assert!(bytes.len() >= REGISTERS_SIZE);

        let mut r = LeReader { bytes };

        Self {
            caps: r.u16(),
            dev_cap: r.u32(),
            dev_ctl: r.u16(),
            dev_sta: r.u16(),
            lnk_cap: r.u32(),
            lnk_ctl: r.u16(),
            lnk_sta: r.u16(),
            slt_cap: r.u32(),
            slt_ctl: r.u16(),
            slt_sta: r.u16(),
            root_ctl: r.u16(),
            root_cap: r.u16(),
            root_sta: r.u32(),
            dev_cap2: r.u32(),
            dev_ctl2: r.u16(),
            dev_sta2: r.u16(),
            lnk_cap2: r.u32(),
            lnk_ctl2: r.u16(),
            lnk_sta2: r.u16(),
        }
    }

    /// Pack the registers into their little-endian layout.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; REGISTERS_SIZE] {
        let mut bytes = [0; REGISTERS_SIZE];
        let mut w = LeWriter { bytes: &mut bytes };

        w.u16(self.caps);
        w.u32(self.dev_cap);
        w.u16(self.dev_ctl);
        w.u16(self.dev_sta);
        w.u32(self.lnk_cap);
        w.u16(self.lnk_ctl);
        w.u16(self.lnk_sta);
        w.u32(self.slt_cap);
        w.u16(self.slt_ctl);
        w.u16(self.slt_sta);
        w.u16(self.root_ctl);
        w.u16(self.root_cap);
        w.u32(self.root_sta);
        w.u32(self.dev_cap2);
        w.u16(self.dev_ctl2);
        w.u16(self.dev_sta2);
        w.u32(self.lnk_cap2);
        w.u16(self.lnk_ctl2);
        w.u16(self.lnk_sta2);

        debug_assert!(w.bytes.is_empty());
        bytes
    }

    /// The capability structure version.
    #[must_use]
    pub const fn version(&self) -> u16 {
        self.caps & capabilities::VERSION
    }

    /// The error and informational flags of the device status register.
    #[must_use]
    pub const fn device_status(&self) -> DeviceStatusFlags {
        DeviceStatusFlags(self.dev_sta)
    }

    /// The negotiated link speed. This is an encoded value that indexes the supported link speeds
    /// vector, not a transfer rate.
    #[must_use]
    pub const fn link_speed(&self) -> u16 {
        self.lnk_sta & link_status::SPEED
    }

    /// The negotiated link width.
    #[must_use]
    pub const fn link_width(&self) -> u16 {
        (self.lnk_sta & link_status::WIDTH) >> link_status::WIDTH_SHIFT
    }

    /// Whether the data link layer reports the link as active.
    #[must_use]
    pub const fn data_link_active(&self) -> bool {
        self.lnk_sta & link_status::DATA_LINK_LAYER_ACTIVE != 0
    }

    /// Whether the link is administratively disabled.
    #[must_use]
    pub const fn link_disabled(&self) -> bool {
        self.lnk_ctl & express::link_control::LINK_DISABLE != 0
    }
}

/// The low bits of the PCI Express device status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatusFlags(pub u16);

impl DeviceStatusFlags {
    /// A correctable error was detected.
    #[must_use]
    pub const fn correctable(&self) -> bool {
        self.0 & device_status::CORRECTABLE_ERROR != 0
    }

    /// A non-fatal uncorrectable error was detected.
    #[must_use]
    pub const fn non_fatal(&self) -> bool {
        self.0 & device_status::NON_FATAL_ERROR != 0
    }

    /// A fatal uncorrectable error was detected.
    #[must_use]
    pub const fn fatal(&self) -> bool {
        self.0 & device_status::FATAL_ERROR != 0
    }

    /// An unsupported request was received.
    #[must_use]
    pub const fn unsupported_request(&self) -> bool {
        self.0 & device_status::UNSUPPORTED_REQUEST != 0
    }

    /// Auxiliary power is present. Not an error.
    #[must_use]
    pub const fn aux_power(&self) -> bool {
        self.0 & device_status::AUX_POWER != 0
    }

    /// Non-posted requests are outstanding. Not an error.
    #[must_use]
    pub const fn transactions_pending(&self) -> bool {
        self.0 & device_status::TRANSACTIONS_PENDING != 0
    }
}
