//! # Render Contexts
//!
//! A [`RenderContext`] is everything that was decoded from one device in one refresh cycle.

use crate::device::pci::{
    capability::{self, CapabilityOffsetTable, WalkEnd},
    device::Device,
    express::{DecodeError, ExpressCapabilityRegisters},
};

/// One device, decoded.
///
/// Contexts are built from scratch every cycle and never change afterwards, so they can be shared
/// freely between threads.
#[derive(Debug, Clone)]
pub struct RenderContext {
    device: Device,
    capabilities: CapabilityOffsetTable,
    walk_end: WalkEnd,
    express: Result<ExpressCapabilityRegisters, DecodeError>,
}

impl RenderContext {
    /// Walk the capability list of `device` and decode its PCI Express capability.
    #[must_use]
    pub fn new(device: Device) -> Self {
        let walk = capability::walk(&device);
        let express = ExpressCapabilityRegisters::decode(&walk.table, device.config_space());

        Self {
            device,
            capabilities: walk.table,
            walk_end: walk.end,
            express,
        }
    }

    /// The device snapshot this context was decoded from.
    #[must_use]
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// The device address.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.device.addr
    }

    /// The capabilities found in the capability list.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilityOffsetTable {
        &self.capabilities
    }

    /// Why the capability list walk ended.
    #[must_use]
    pub const fn walk_end(&self) -> WalkEnd {
        self.walk_end
    }

    /// The decoded PCI Express registers, if there are any.
    #[must_use]
    pub fn express(&self) -> Option<&ExpressCapabilityRegisters> {
        self.express.as_ref().ok()
    }

    /// Why the PCI Express registers could not be decoded.
    #[must_use]
    pub fn express_error(&self) -> Option<DecodeError> {
        self.express.as_ref().err().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::pci::{
        constants::config_space::capability_id::PCI_EXPRESS, device::tests::ConfigBuilder,
    };

    #[test]
    fn context_bundles_decode_results() {
        let regs = ExpressCapabilityRegisters {
            lnk_sta: 0x2011,
            ..Default::default()
        };
        let ctx = RenderContext::new(
            ConfigBuilder::new(0x8086, 0x9d10)
                .capability(PCI_EXPRESS, 0x40, &regs.to_le_bytes())
                .device("0000:00:1c.0"),
        );

        assert_eq!(ctx.addr(), "0000:00:1c.0");
        assert_eq!(ctx.capabilities().express(), Some(0x40));
        assert_eq!(ctx.walk_end(), WalkEnd::EndOfList);
        assert_eq!(ctx.express(), Some(&regs));
        assert_eq!(ctx.express_error(), None);
    }

    #[test]
    fn device_without_capabilities_has_no_express_registers() {
        let ctx = RenderContext::new(ConfigBuilder::new(0x8086, 0x1237).device("0000:00:00.0"));

        assert!(ctx.capabilities().is_empty());
        assert_eq!(ctx.walk_end(), WalkEnd::NoCapabilities);
        assert_eq!(ctx.express_error(), Some(DecodeError::CapabilityAbsent));
    }
}
