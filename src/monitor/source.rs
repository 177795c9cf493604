//! # Device Sources
//!
//! A [`DeviceSource`] re-reads the raw Configuration Space of known devices between refresh
//! cycles.

use crate::device::pci::{
    device::Device,
    sysfs::{self, EnumerationError},
};

/// Where device state comes from.
pub trait DeviceSource: Send {
    /// Whether the devices are live hardware. Frozen sources are decoded once and never
    /// mutated.
    fn is_live(&self) -> bool;

    /// Re-read the raw Configuration Space of `devices` in place.
    fn refresh_all(&mut self, devices: &mut [Device]) -> Result<(), EnumerationError>;
}

impl<S: DeviceSource + ?Sized> DeviceSource for Box<S> {
    fn is_live(&self) -> bool {
        (**self).is_live()
    }

    fn refresh_all(&mut self, devices: &mut [Device]) -> Result<(), EnumerationError> {
        (**self).refresh_all(devices)
    }
}

/// Live devices read through sysfs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sysfs;

impl DeviceSource for Sysfs {
    fn is_live(&self) -> bool {
        true
    }

    fn refresh_all(&mut self, devices: &mut [Device]) -> Result<(), EnumerationError> {
        sysfs::refresh_all(devices)
    }
}

/// Devices loaded from a snapshot. Their state never changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frozen;

impl DeviceSource for Frozen {
    fn is_live(&self) -> bool {
        false
    }

    fn refresh_all(&mut self, _devices: &mut [Device]) -> Result<(), EnumerationError> {
        Ok(())
    }
}
