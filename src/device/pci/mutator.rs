//! # Control Register Mutations
//!
//! The monitor allows a handful of read-modify-write operations on control registers to poke at
//! links: secondary bus reset, link disable, link retraining and compliance mode. See
//! [`RegisterMutator`].
//!
//! Mutations never touch the cached Configuration Space bytes. The effect becomes visible with the
//! next refresh cycle, which re-reads the registers from the device.

use tracing::{debug, warn};

use crate::device::request::{Request, RequestSize};

use super::{
    capability::CapabilityOffsetTable,
    constants::config_space::{
        bridge_control,
        express::{self, link_control, link_control_2},
        offset,
    },
    express::ExpressCapabilityRegisters,
    traits::{ConfigAccess, RegisterIoError},
};

/// Why a mutation was not performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// We are looking at a frozen snapshot, not at live hardware.
    Offline,

    /// The register lives in the PCI Express capability, which the device doesn't have.
    NoExpressCapability,
}

/// The result of a mutation that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The register was written.
    Written {
        /// The register that was modified.
        request: Request,
        /// The value read before the write.
        old: u16,
        /// The value written.
        new: u16,
    },

    /// Nothing was done.
    Skipped(SkipReason),
}

/// Read-modify-write operations on the control registers of one device.
///
/// The mutator is built per command from the device's current capability offsets and, for live
/// devices, a writable handle to its Configuration Space.
#[derive(Debug)]
pub struct RegisterMutator<'a, A: ConfigAccess + ?Sized> {
    access: Option<&'a A>,
    capabilities: &'a CapabilityOffsetTable,
}

impl<'a, A: ConfigAccess + ?Sized> RegisterMutator<'a, A> {
    /// Create a mutator. Pass `None` as `access` for devices from a frozen snapshot. All operations
    /// are no-ops then.
    #[must_use]
    pub const fn new(access: Option<&'a A>, capabilities: &'a CapabilityOffsetTable) -> Self {
        Self {
            access,
            capabilities,
        }
    }

    fn modify(
        &self,
        addr: usize,
        f: impl FnOnce(u16) -> u16,
    ) -> Result<Mutation, RegisterIoError> {
        let Some(access) = self.access else {
            return Ok(Mutation::Skipped(SkipReason::Offline));
        };

        let request = Request::new(addr as u64, RequestSize::Size2);
        // The value is masked to 16 bits by the request size.
        let old = access.read_cfg(request)? as u16;
        let new = f(old);

        access.write_cfg(request, new.into())?;
        debug!("{request}: {old:#06x} -> {new:#06x}");

        Ok(Mutation::Written { request, old, new })
    }

    fn modify_express(
        &self,
        register: usize,
        f: impl FnOnce(u16) -> u16,
    ) -> Result<Mutation, RegisterIoError> {
        if self.access.is_none() {
            return Ok(Mutation::Skipped(SkipReason::Offline));
        }

        match self.capabilities.express() {
            Some(cap_offset) => self.modify(usize::from(cap_offset) + register, f),
            None => Ok(Mutation::Skipped(SkipReason::NoExpressCapability)),
        }
    }

    /// Flip the Secondary Bus Reset bit in the bridge control register.
    ///
    /// The bridge control register is part of the type 1 header. Writing it on a non-bridge
    /// function hits whatever register lives at that offset in the type 0 header.
    pub fn toggle_secondary_bus_reset(&self) -> Result<Mutation, RegisterIoError> {
        self.modify(offset::BRIDGE_CONTROL, |brctl| {
            brctl ^ bridge_control::SECONDARY_BUS_RESET
        })
    }

    /// Flip the Link Disable bit in the PCI Express link control register.
    pub fn toggle_link_disable(&self) -> Result<Mutation, RegisterIoError> {
        self.modify_express(express::LINK_CONTROL, |lnkctl| {
            lnkctl ^ link_control::LINK_DISABLE
        })
    }

    /// Ask the port to retrain its link.
    ///
    /// Retrain Link is a command bit that hardware clears by itself, so this sets it instead of
    /// toggling.
    pub fn request_link_retrain(&self) -> Result<Mutation, RegisterIoError> {
        self.modify_express(express::LINK_CONTROL, |lnkctl| {
            lnkctl | link_control::RETRAIN_LINK
        })
    }

    /// Set or clear Enter Compliance in the link control 2 register.
    ///
    /// Link control 2 only exists in version 2 of the PCI Express capability. The version is not
    /// checked before writing, older devices get a warning in the log.
    pub fn set_compliance_mode(&self, on: bool) -> Result<Mutation, RegisterIoError> {
        if let Some(version) = self.capability_version() {
            if version < 2 {
                warn!("Capability version {version} has no link control 2 register");
            }
        }

        self.modify_express(express::LINK_CONTROL_2, |lnkctl2| {
            let mut value = lnkctl2 | link_control_2::ENTER_COMPLIANCE;
            if !on {
                value ^= link_control_2::ENTER_COMPLIANCE;
            }
            value
        })
    }

    /// Read the capability version from the live device, if possible.
    fn capability_version(&self) -> Option<u16> {
        let access = self.access?;
        let cap_offset = self.capabilities.express()?;
        let request = Request::new(
            (usize::from(cap_offset) + express::CAPABILITIES) as u64,
            RequestSize::Size2,
        );

        access.read_cfg(request).ok().map(|caps| {
            ExpressCapabilityRegisters {
                caps: caps as u16,
                ..Default::default()
            }
            .version()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::pci::{
        capability::CapabilityOffsetTable,
        config_space::ConfigSpace,
        constants::config_space::capability_id::PCI_EXPRESS,
        device::tests::ConfigBuilder,
        express::ExpressCapabilityRegisters,
        traits::tests::MemoryConfig,
    };

    const CAP: u8 = 0x40;

    fn express_device(lnk_ctl: u16, lnk_ctl2: u16) -> Vec<u8> {
        let regs = ExpressCapabilityRegisters {
            caps: 0x0002,
            lnk_ctl,
            lnk_ctl2,
            ..Default::default()
        };

        ConfigBuilder::new(0x8086, 0x1234)
            .capability(PCI_EXPRESS, CAP, &regs.to_le_bytes())
            .bridge(1, 1)
            .u16_le_at(offset::BRIDGE_CONTROL, 0x0012)
            .bytes()
    }

    fn table_of(bytes: &[u8]) -> CapabilityOffsetTable {
        let dev = crate::device::pci::device::Device::from_config("0000:00:1c.0", bytes.to_vec());
        CapabilityOffsetTable::from_device(&dev)
    }

    fn u16_at(cfg: &MemoryConfig, pos: usize) -> u16 {
        let bytes = cfg.bytes.lock().unwrap();
        ConfigSpace::new(&bytes).u16_le_at(pos).unwrap()
    }

    #[test]
    fn secondary_bus_reset_flips_bit_6() {
        let bytes = express_device(0, 0);
        let table = table_of(&bytes);
        let cfg = MemoryConfig::new(bytes);
        let mutator = RegisterMutator::new(Some(&cfg), &table);

        assert_eq!(
            mutator.toggle_secondary_bus_reset().unwrap(),
            Mutation::Written {
                request: Request::new(0x3E, RequestSize::Size2),
                old: 0x0012,
                new: 0x0052
            }
        );
        assert_eq!(u16_at(&cfg, offset::BRIDGE_CONTROL), 0x0052);

        mutator.toggle_secondary_bus_reset().unwrap();
        assert_eq!(u16_at(&cfg, offset::BRIDGE_CONTROL), 0x0012);
    }

    #[test]
    fn link_disable_is_its_own_inverse() {
        let bytes = express_device(0x0043, 0);
        let table = table_of(&bytes);
        let cfg = MemoryConfig::new(bytes);
        let mutator = RegisterMutator::new(Some(&cfg), &table);
        let lnkctl = usize::from(CAP) + express::LINK_CONTROL;

        mutator.toggle_link_disable().unwrap();
        assert_eq!(u16_at(&cfg, lnkctl), 0x0053);

        mutator.toggle_link_disable().unwrap();
        assert_eq!(u16_at(&cfg, lnkctl), 0x0043);
    }

    #[test]
    fn retrain_sets_without_toggling() {
        let bytes = express_device(0x0020, 0);
        let table = table_of(&bytes);
        let cfg = MemoryConfig::new(bytes);
        let mutator = RegisterMutator::new(Some(&cfg), &table);

        assert!(matches!(
            mutator.request_link_retrain().unwrap(),
            Mutation::Written { old: 0x0020, new: 0x0020, .. }
        ));
        assert_eq!(u16_at(&cfg, usize::from(CAP) + express::LINK_CONTROL), 0x0020);
    }

    #[test]
    fn compliance_mode_follows_argument() {
        let bytes = express_device(0, 0x0003);
        let table = table_of(&bytes);
        let cfg = MemoryConfig::new(bytes);
        let mutator = RegisterMutator::new(Some(&cfg), &table);
        let lnkctl2 = usize::from(CAP) + express::LINK_CONTROL_2;

        mutator.set_compliance_mode(true).unwrap();
        assert_eq!(u16_at(&cfg, lnkctl2), 0x0013);

        // Entering twice is idempotent.
        mutator.set_compliance_mode(true).unwrap();
        assert_eq!(u16_at(&cfg, lnkctl2), 0x0013);

        mutator.set_compliance_mode(false).unwrap();
        assert_eq!(u16_at(&cfg, lnkctl2), 0x0003);

        mutator.set_compliance_mode(false).unwrap();
        assert_eq!(u16_at(&cfg, lnkctl2), 0x0003);
    }

    #[test]
    fn capability_version_is_read_from_the_device() {
        let bytes = express_device(0, 0);
        let table = table_of(&bytes);
        let cfg = MemoryConfig::new(bytes);
        assert_eq!(RegisterMutator::new(Some(&cfg), &table).capability_version(), Some(2));

        // Only the low nibble of the capabilities register is the version.
        let regs = ExpressCapabilityRegisters {
            caps: 0x0041,
            ..Default::default()
        };
        let bytes = ConfigBuilder::new(0x8086, 0x1234)
            .capability(PCI_EXPRESS, CAP, &regs.to_le_bytes())
            .bytes();
        let table = table_of(&bytes);
        let cfg = MemoryConfig::new(bytes);
        assert_eq!(RegisterMutator::new(Some(&cfg), &table).capability_version(), Some(1));

        assert_eq!(RegisterMutator::<MemoryConfig>::new(None, &table).capability_version(), None);
    }

    #[test]
    fn express_operations_need_the_capability() {
        let bytes = ConfigBuilder::new(0, 0).bridge(1, 2).bytes();
        let table = table_of(&bytes);
        let cfg = MemoryConfig::new(bytes.clone());
        let mutator = RegisterMutator::new(Some(&cfg), &table);

        let skipped = Some(Mutation::Skipped(SkipReason::NoExpressCapability));
        assert_eq!(mutator.toggle_link_disable().ok(), skipped);
        assert_eq!(mutator.request_link_retrain().ok(), skipped);
        assert_eq!(mutator.set_compliance_mode(true).ok(), skipped);
        assert_eq!(*cfg.bytes.lock().unwrap(), bytes);

        // The bridge control register is part of the standard header.
        assert!(matches!(
            mutator.toggle_secondary_bus_reset(),
            Ok(Mutation::Written { .. })
        ));
    }

    #[test]
    fn offline_mutations_are_no_ops() {
        let bytes = express_device(0, 0);
        let table = table_of(&bytes);
        let mutator: RegisterMutator<'_, MemoryConfig> = RegisterMutator::new(None, &table);

        for result in [
            mutator.toggle_secondary_bus_reset(),
            mutator.toggle_link_disable(),
            mutator.request_link_retrain(),
            mutator.set_compliance_mode(true),
        ] {
            assert!(matches!(
                result,
                Ok(Mutation::Skipped(SkipReason::Offline))
            ));
        }
    }

    #[test]
    fn write_failures_are_reported() {
        let bytes = express_device(0, 0);
        let table = table_of(&bytes);
        let cfg = MemoryConfig::failing_writes(bytes.clone());
        let mutator = RegisterMutator::new(Some(&cfg), &table);

        let err = mutator.toggle_link_disable().unwrap_err();
        assert_eq!(
            err.request,
            Request::new(u64::from(CAP) + 0x10, RequestSize::Size2)
        );
        assert_eq!(err.source.kind(), std::io::ErrorKind::PermissionDenied);
        assert_eq!(*cfg.bytes.lock().unwrap(), bytes);
    }
}
