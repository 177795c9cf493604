//! # Interactive Commands
//!
//! Key presses that poke at the selected device. Commands run on the presentation thread and block
//! until the register write is done. Their effect shows up with the next refresh cycle.

use tracing::{info, warn};

use crate::{
    device::pci::{
        mutator::{Mutation, RegisterMutator, SkipReason},
        sysfs::SysfsConfig,
        traits::{ConfigAccess, RegisterIoError},
    },
    monitor::context::RenderContext,
};

/// A register mutation bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle Secondary Bus Reset.
    ToggleSecondaryBusReset,
    /// Toggle Link Disable.
    ToggleLinkDisable,
    /// Retrain the link.
    RetrainLink,
    /// Enter compliance mode.
    ComplianceOn,
    /// Leave compliance mode.
    ComplianceOff,
}

impl Command {
    /// All commands.
    pub const ALL: [Self; 5] = [
        Self::ToggleSecondaryBusReset,
        Self::ToggleLinkDisable,
        Self::RetrainLink,
        Self::ComplianceOn,
        Self::ComplianceOff,
    ];

    /// The key that triggers the command.
    #[must_use]
    pub const fn key(self) -> char {
        match self {
            Self::ToggleSecondaryBusReset => 'R',
            Self::ToggleLinkDisable => 'L',
            Self::RetrainLink => 'r',
            Self::ComplianceOn => 'C',
            Self::ComplianceOff => 'c',
        }
    }

    /// A short description for help and status texts.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ToggleSecondaryBusReset => "secondary bus reset",
            Self::ToggleLinkDisable => "link disable",
            Self::RetrainLink => "link retrain",
            Self::ComplianceOn => "enter compliance",
            Self::ComplianceOff => "leave compliance",
        }
    }

    /// Run the command through `mutator`.
    pub fn execute<A: ConfigAccess + ?Sized>(
        self,
        mutator: &RegisterMutator<'_, A>,
    ) -> Result<Mutation, RegisterIoError> {
        match self {
            Self::ToggleSecondaryBusReset => mutator.toggle_secondary_bus_reset(),
            Self::ToggleLinkDisable => mutator.toggle_link_disable(),
            Self::RetrainLink => mutator.request_link_retrain(),
            Self::ComplianceOn => mutator.set_compliance_mode(true),
            Self::ComplianceOff => mutator.set_compliance_mode(false),
        }
    }

    /// Run the command against `ctx` and describe the outcome. `access` is `None` for frozen
    /// devices.
    pub fn run<A: ConfigAccess + ?Sized>(self, ctx: &RenderContext, access: Option<&A>) -> String {
        let mutator = RegisterMutator::new(access, ctx.capabilities());
        let addr = ctx.addr();

        match self.execute(&mutator) {
            Ok(Mutation::Written { request, old, new }) => {
                info!("{addr}: {} {request}: {old:#06x} -> {new:#06x}", self.name());
                format!("{addr}: {} {request}: {old:04x} -> {new:04x}", self.name())
            }
            Ok(Mutation::Skipped(SkipReason::Offline)) => {
                format!("{addr}: {} skipped, not a live device", self.name())
            }
            Ok(Mutation::Skipped(SkipReason::NoExpressCapability)) => {
                format!("{addr}: {} skipped, no PCI Express capability", self.name())
            }
            Err(err) => {
                warn!("{addr}: {} failed: {err}", self.name());
                format!("{addr}: {} failed: {err}", self.name())
            }
        }
    }

    /// Run the command against `ctx`, opening its sysfs Configuration Space if `live`.
    pub fn run_live(self, ctx: &RenderContext, live: bool) -> String {
        let handle = match ctx.device().sysfs_path.as_deref() {
            Some(device_dir) if live => match SysfsConfig::open(device_dir) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!("{}: Failed to open config space: {err}", ctx.addr());
                    return format!(
                        "{}: {} failed: cannot open config space: {err}",
                        ctx.addr(),
                        self.name()
                    );
                }
            },
            _ => None,
        };

        self.run(ctx, handle.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::pci::{
        constants::config_space::{capability_id::PCI_EXPRESS, express, offset},
        device::tests::ConfigBuilder,
        express::ExpressCapabilityRegisters,
        traits::tests::MemoryConfig,
    };

    fn bridge() -> (RenderContext, MemoryConfig) {
        let regs = ExpressCapabilityRegisters {
            caps: 0x0042,
            ..Default::default()
        };
        let dev = ConfigBuilder::new(0x8086, 0x9d10)
            .bridge(1, 1)
            .capability(PCI_EXPRESS, 0x40, &regs.to_le_bytes())
            .device("0000:00:1c.0");
        let mem = MemoryConfig::new(dev.config.clone());

        (RenderContext::new(dev), mem)
    }

    fn read_u16(mem: &MemoryConfig, pos: usize) -> u16 {
        let bytes = mem.bytes.lock().unwrap();
        u16::from_le_bytes([bytes[pos], bytes[pos + 1]])
    }

    #[test]
    fn keys_are_distinct() {
        let keys: Vec<char> = Command::ALL.iter().map(|c| c.key()).collect();
        assert_eq!(keys, ['R', 'L', 'r', 'C', 'c']);

        // Quitting keeps its keys.
        assert!(!keys.contains(&'q') && !keys.contains(&'Q'));
    }

    #[test]
    fn written_registers_are_reported() {
        let (ctx, mem) = bridge();

        let status = Command::ToggleSecondaryBusReset.run(&ctx, Some(&mem));
        assert_eq!(
            status,
            "0000:00:1c.0: secondary bus reset 0x03e+2: 0000 -> 0040"
        );
        assert_eq!(read_u16(&mem, offset::BRIDGE_CONTROL), 0x0040);

        Command::ToggleLinkDisable.run(&ctx, Some(&mem));
        assert_eq!(read_u16(&mem, 0x40 + express::LINK_CONTROL), 0x0010);

        Command::ComplianceOn.run(&ctx, Some(&mem));
        assert_eq!(read_u16(&mem, 0x40 + express::LINK_CONTROL_2), 0x0010);
        Command::ComplianceOff.run(&ctx, Some(&mem));
        assert_eq!(read_u16(&mem, 0x40 + express::LINK_CONTROL_2), 0x0000);
    }

    #[test]
    fn frozen_devices_are_left_alone() {
        let (ctx, _) = bridge();

        let status = Command::RetrainLink.run::<MemoryConfig>(&ctx, None);
        assert_eq!(status, "0000:00:1c.0: link retrain skipped, not a live device");

        // Snapshot devices have no sysfs directory to open.
        let status = Command::RetrainLink.run_live(&ctx, true);
        assert!(status.ends_with("not a live device"));
    }

    #[test]
    fn missing_capability_is_reported() {
        let dev = ConfigBuilder::new(0x8086, 0x1237).device("0000:00:00.0");
        let mem = MemoryConfig::new(dev.config.clone());
        let ctx = RenderContext::new(dev);

        let status = Command::ToggleLinkDisable.run(&ctx, Some(&mem));
        assert!(status.ends_with("no PCI Express capability"));
    }

    #[test]
    fn write_failures_are_reported() {
        let (ctx, _) = bridge();
        let mem = MemoryConfig::failing_writes(ctx.device().config.clone());

        let status = Command::ToggleSecondaryBusReset.run(&ctx, Some(&mem));
        assert!(status.starts_with("0000:00:1c.0: secondary bus reset failed: "));
        assert!(status.contains("permission denied"));
    }
}
