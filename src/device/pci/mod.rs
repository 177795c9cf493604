//! # PCI Configuration Space Inspection
//!
//! This module reads and decodes the Configuration Space of PCI functions. A [`Device`] holds the
//! raw bytes, [`capability::walk`] finds the capability list entries in them, and
//! [`ExpressCapabilityRegisters`] decodes the PCI Express capability. [`RegisterMutator`] writes
//! back to live devices through [`ConfigAccess`].
//!
//! ## Example
//!
//! ```rust
//! use pciwatch::device::pci::{
//!     capability::CapabilityOffsetTable, device::Device, express::ExpressCapabilityRegisters,
//! };
//!
//! // A function that announces no capabilities.
//! let dev = Device::from_config("0000:00:00.0", vec![0; 256]);
//!
//! let caps = CapabilityOffsetTable::from_device(&dev);
//! assert!(caps.is_empty());
//! assert!(ExpressCapabilityRegisters::decode(&caps, dev.config_space()).is_err());
//! ```
//!
//! [`Device`]: device::Device
//! [`ExpressCapabilityRegisters`]: express::ExpressCapabilityRegisters
//! [`RegisterMutator`]: mutator::RegisterMutator
//! [`ConfigAccess`]: traits::ConfigAccess

pub mod capability;
pub mod config_space;
pub mod constants;
pub mod device;
pub mod express;
pub mod mutator;
pub mod snapshot;
pub mod sysfs;
pub mod traits;
