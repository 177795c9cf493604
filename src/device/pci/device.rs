//! # PCI Device Records
//!
//! A [`Device`] is a snapshot of a single PCI function: its identity, a few decoded header fields
//! and the raw bytes of its Configuration Space.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{
    config_space::ConfigSpace,
    constants::config_space::{header_type, mask, offset, status},
};

/// A PCI function as seen by the monitor.
///
/// The serialized form uses PascalCase keys. Raw Configuration Space bytes are written as an
/// array of numbers. Reading also accepts a base64 string, which is how Go's `encoding/json`
/// stores byte slices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Device {
    /// The `segment:bus:device.function` address, e.g. `0000:00:1c.0`.
    pub addr: String,

    /// The vendor ID.
    pub vendor: u16,
    /// The device ID.
    pub device: u16,

    /// The 24-bit class code: base class, sub-class and programming interface.
    pub class: u32,

    /// The status register.
    pub status: u16,
    /// The command register.
    pub control: u16,

    /// Whether this function has a type 1 (PCI-to-PCI bridge) header.
    #[serde(default)]
    pub bridge: bool,
    /// The bus number directly behind a bridge.
    #[serde(default)]
    pub secondary: u8,
    /// The highest bus number behind a bridge.
    #[serde(default)]
    pub subordinate: u8,

    /// A human readable vendor name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    /// A human readable device name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// The raw Configuration Space. At least the first 64 bytes for live devices read without
    /// privileges, up to 4096 bytes with extended Configuration Space.
    #[serde(default, deserialize_with = "config_bytes::deserialize")]
    pub config: Vec<u8>,

    /// The sysfs directory of a live device. Snapshots don't have one.
    #[serde(skip)]
    pub sysfs_path: Option<PathBuf>,
}

mod config_bytes {
    use std::fmt;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::de::{self, Deserializer, SeqAccess, Visitor};

    struct ConfigBytes;

    impl<'de> Visitor<'de> for ConfigBytes {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an array of bytes or a base64 string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            STANDARD
                .decode(v)
                .map_err(|err| E::custom(format!("invalid base64 config space: {err}")))
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element()? {
                bytes.push(byte);
            }
            Ok(bytes)
        }

        // A nil slice.
        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        d.deserialize_any(ConfigBytes)
    }
}

impl Device {
    /// Build a device record from a raw Configuration Space dump.
    ///
    /// Header fields that are not covered by `config` are left at zero.
    #[must_use]
    pub fn from_config(addr: impl Into<String>, config: Vec<u8>) -> Self {
        let mut device = Self {
            addr: addr.into(),
            vendor: 0,
            device: 0,
            class: 0,
            status: 0,
            control: 0,
            bridge: false,
            secondary: 0,
            subordinate: 0,
            vendor_name: None,
            device_name: None,
            config,
            sysfs_path: None,
        };

        device.update_header();
        device
    }

    /// A view onto the raw Configuration Space bytes.
    #[must_use]
    pub fn config_space(&self) -> ConfigSpace<'_> {
        ConfigSpace::new(&self.config)
    }

    /// Whether the status register announces a capability list.
    #[must_use]
    pub const fn has_capabilities(&self) -> bool {
        self.status & status::CAPABILITIES != 0
    }

    /// The string device filters are matched against.
    ///
    /// It looks like `0000:00:1c.0 v8086 d9d10 c00060400`.
    #[must_use]
    pub fn slug(&self) -> String {
        format!(
            "{} v{:04x} d{:04x} c{:08x}",
            self.addr, self.vendor, self.device, self.class
        )
    }

    /// Re-derive the decoded header fields from the raw Configuration Space.
    ///
    /// This is called after the raw bytes were re-read. Fields whose bytes are not available keep
    /// their previous value.
    pub fn update_header(&mut self) {
        let cfg = ConfigSpace::new(&self.config);

        if let Ok(vendor) = cfg.u16_le_at(offset::VENDOR) {
            self.vendor = vendor;
        }
        if let Ok(device) = cfg.u16_le_at(offset::DEVICE) {
            self.device = device;
        }
        if let Ok(control) = cfg.u16_le_at(offset::COMMAND) {
            self.control = control;
        }
        if let Ok(status) = cfg.u16_le_at(offset::STATUS) {
            self.status = status;
        }
        if let Ok(class) = cfg.u32_le_at(offset::REVISION) {
            // The revision is the lowest byte, the class code the upper three.
            self.class = class >> 8;
        }
        if let Ok(header) = cfg.u8_at(offset::HEADER_TYPE) {
            self.bridge = header & mask::HEADER_LAYOUT == header_type::TYPE_01_BRIDGE;
        }
        if self.bridge {
            if let (Ok(secondary), Ok(subordinate)) = (
                cfg.u8_at(offset::SECONDARY_BUS),
                cfg.u8_at(offset::SUBORDINATE_BUS),
            ) {
                self.secondary = secondary;
                self.subordinate = subordinate;
            }
        }

        trace!(
            "{}: status {:#06x} control {:#06x} bridge {}",
            self.addr,
            self.status,
            self.control,
            self.bridge
        );
    }
}
