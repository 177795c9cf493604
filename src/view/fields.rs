//! # Field Catalogue
//!
//! Every table column (or row, in horizontal layout) is one [`FieldKind`]. A field turns a
//! [`RenderContext`] into cell text, optionally picks a [`CellStyle`], and may explain itself on
//! the status line when selected.
//!
//! All functions here are pure. They only look at the context they are given.

use std::fmt::Write;

use crate::{
    device::pci::constants::config_space::{bridge_control, command, offset, status},
    monitor::context::RenderContext,
};

/// How a cell is highlighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellStyle {
    /// No highlighting.
    #[default]
    Normal,
    /// Marks bridges.
    Bridge,
    /// Something is off, e.g. a link is down.
    Alert,
    /// Something is fine, e.g. a link is up.
    Good,
}

/// A column of the device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// The device address.
    Address,
    /// Vendor and device ID.
    Ids,
    /// Secondary and subordinate bus numbers of bridges.
    SecondaryBus,
    /// The command register.
    Control,
    /// The status register.
    Status,
    /// The bridge control register.
    BridgeControl,
    /// PCI Express device status.
    DevSta,
    /// The error flags of the device status register.
    Errors,
    /// PCI Express link status.
    LnkSta,
    /// Whether the data link layer is active.
    DlActive,
    /// The negotiated link speed.
    Speed,
    /// The negotiated link width.
    Width,
    /// PCI Express link control.
    LnkCtl,
    /// PCI Express link status 2.
    LnkSta2,
    /// PCI Express link control 2.
    LnkCtl2,
    /// PCI Express slot status.
    SltSta,
    /// PCI Express root status.
    RootSta,
    /// PCI Express device status 2.
    DevSta2,
}

fn flag(name: &str, set: bool) -> String {
    format!("{name}{}", if set { '+' } else { '-' })
}

fn decode_bits(value: u16, bits: &[(&str, u16)]) -> String {
    bits.iter()
        .map(|&(name, mask)| flag(name, value & mask != 0))
        .collect::<Vec<_>>()
        .join(" ")
}

impl FieldKind {
    /// All fields in display order.
    pub const ALL: [Self; 18] = [
        Self::Address,
        Self::Ids,
        Self::SecondaryBus,
        Self::Control,
        Self::Status,
        Self::BridgeControl,
        Self::DevSta,
        Self::Errors,
        Self::LnkSta,
        Self::DlActive,
        Self::Speed,
        Self::Width,
        Self::LnkCtl,
        Self::LnkSta2,
        Self::LnkCtl2,
        Self::SltSta,
        Self::RootSta,
        Self::DevSta2,
    ];

    /// The column title. Fields that break down the field before them are indented.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Address => "B:D.F",
            Self::Ids => "IDs",
            Self::SecondaryBus => "Sec",
            Self::Control => "Control",
            Self::Status => "Status",
            Self::BridgeControl => "BrCtl",
            Self::DevSta => "DevSta",
            Self::Errors => "  Errors",
            Self::LnkSta => "LnkSta",
            Self::DlActive => "  DLActive",
            Self::Speed => "  Speed",
            Self::Width => "  Width",
            Self::LnkCtl => "LnkCtl",
            Self::LnkSta2 => "LnkSta2",
            Self::LnkCtl2 => "LnkCtl2",
            Self::SltSta => "SltSta",
            Self::RootSta => "RootSta",
            Self::DevSta2 => "DevSta2",
        }
    }

    /// Whether the field is derived from the PCI Express capability.
    #[must_use]
    pub const fn is_express(self) -> bool {
        !matches!(
            self,
            Self::Address
                | Self::Ids
                | Self::SecondaryBus
                | Self::Control
                | Self::Status
                | Self::BridgeControl
        )
    }

    /// The cell text. Express fields are empty if the registers couldn't be decoded.
    #[must_use]
    pub fn text(self, ctx: &RenderContext) -> String {
        let dev = ctx.device();

        if self.is_express() {
            return ctx
                .express()
                .map(|regs| match self {
                    Self::DevSta => format!("{:04x}", regs.dev_sta),
                    Self::Errors => {
                        let flags = regs.device_status();
                        [
                            (flags.correctable(), 'c'),
                            (flags.non_fatal(), 'n'),
                            (flags.fatal(), 'f'),
                            (flags.unsupported_request(), 'u'),
                            (flags.aux_power(), 'x'),
                            (flags.transactions_pending(), 't'),
                        ]
                        .into_iter()
                        .map(|(set, c)| if set { c } else { ' ' })
                        .collect()
                    }
                    Self::LnkSta => format!("{:04x}", regs.lnk_sta),
                    Self::DlActive => flag("", regs.data_link_active()),
                    Self::Speed => regs.link_speed().to_string(),
                    Self::Width => regs.link_width().to_string(),
                    Self::LnkCtl => format!("{:04x}", regs.lnk_ctl),
                    Self::LnkSta2 => format!("{:04x}", regs.lnk_sta2),
                    Self::LnkCtl2 => format!("{:04x}", regs.lnk_ctl2),
                    Self::SltSta => format!("{:04x}", regs.slt_sta),
                    Self::RootSta => format!("{:08x}", regs.root_sta),
                    Self::DevSta2 => format!("{:04x}", regs.dev_sta2),
                    _ => String::new(),
                })
                .unwrap_or_default();
        }

        match self {
            Self::Address => dev.addr.clone(),
            Self::Ids => format!("{:04x}:{:04x}", dev.vendor, dev.device),
            Self::SecondaryBus if dev.bridge => {
                if dev.subordinate == dev.secondary {
                    format!("{:02x}", dev.secondary)
                } else {
                    format!("{:02x}-{:02x}", dev.secondary, dev.subordinate)
                }
            }
            Self::Control => format!("{:04x}", dev.control),
            Self::Status => format!("{:04x}", dev.status),
            Self::BridgeControl if dev.bridge => dev
                .config_space()
                .u16_le_at(offset::BRIDGE_CONTROL)
                .map(|brctl| format!("{brctl:04x}"))
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// The cell style.
    #[must_use]
    pub fn style(self, ctx: &RenderContext) -> CellStyle {
        let dev = ctx.device();

        match self {
            Self::Address if dev.bridge => CellStyle::Bridge,
            Self::BridgeControl if dev.bridge => {
                match dev.config_space().u16_le_at(offset::BRIDGE_CONTROL) {
                    Ok(brctl) if brctl & bridge_control::SECONDARY_BUS_RESET != 0 => {
                        CellStyle::Alert
                    }
                    _ => CellStyle::Normal,
                }
            }
            Self::DlActive => match ctx.express() {
                Some(regs) if regs.data_link_active() => CellStyle::Good,
                Some(_) => CellStyle::Alert,
                None => CellStyle::Normal,
            },
            Self::LnkCtl => match ctx.express() {
                Some(regs) if regs.link_disabled() => CellStyle::Alert,
                _ => CellStyle::Normal,
            },
            _ => CellStyle::Normal,
        }
    }

    /// A longer explanation of the field for the status line, if there is one.
    #[must_use]
    pub fn detail(self, ctx: &RenderContext) -> Option<String> {
        let dev = ctx.device();

        match self {
            Self::Control => Some(decode_bits(
                dev.control,
                &[
                    ("I/O", command::IO),
                    ("Mem", command::MEMORY),
                    ("BusMaster", command::BUS_MASTER),
                    ("SpecCycle", command::SPECIAL_CYCLES),
                    ("MemWINV", command::MEMORY_WRITE_INVALIDATE),
                    ("VGASnoop", command::VGA_PALETTE_SNOOP),
                    ("ParErr", command::PARITY_ERROR_RESPONSE),
                    ("SERR", command::SERR),
                    ("FastB2B", command::FAST_BACK_TO_BACK),
                    ("DisINTx", command::INTX_DISABLE),
                ],
            )),
            Self::Status => Some(decode_bits(
                dev.status,
                &[
                    ("Cap", status::CAPABILITIES),
                    ("66MHz", status::MHZ_66),
                    ("FastB2B", status::FAST_BACK_TO_BACK),
                    ("ParErr", status::MASTER_DATA_PARITY_ERROR),
                    (">TAbort", status::SIGNALED_TARGET_ABORT),
                    ("<TAbort", status::RECEIVED_TARGET_ABORT),
                    ("<MAbort", status::RECEIVED_MASTER_ABORT),
                    (">SERR", status::SIGNALED_SYSTEM_ERROR),
                    ("<PERR", status::DETECTED_PARITY_ERROR),
                    ("INTx", status::INTERRUPT),
                ],
            )),
            Self::DevSta => {
                let mut out = String::new();

                match (ctx.express(), ctx.express_error()) {
                    (Some(regs), _) => {
                        let _ = write!(out, "{regs:x?}");
                    }
                    (None, Some(err)) => {
                        let _ = write!(out, "{err}");
                    }
                    (None, None) => {}
                }

                if ctx.walk_end().is_malformed() {
                    let _ = write!(out, " (capability list: {:?})", ctx.walk_end());
                }

                Some(out)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::pci::{
        constants::config_space::capability_id::PCI_EXPRESS, device::tests::ConfigBuilder,
        express::ExpressCapabilityRegisters,
    };

    fn express_ctx(regs: &ExpressCapabilityRegisters) -> RenderContext {
        RenderContext::new(
            ConfigBuilder::new(0x8086, 0x9d10)
                .capability(PCI_EXPRESS, 0x40, &regs.to_le_bytes())
                .device("0000:00:1c.0"),
        )
    }

    fn texts(ctx: &RenderContext) -> Vec<String> {
        FieldKind::ALL.iter().map(|f| f.text(ctx)).collect()
    }

    #[test]
    fn express_fields_are_rendered() {
        let ctx = express_ctx(&ExpressCapabilityRegisters {
            dev_sta: 0x0029,
            lnk_sta: 0x2043,
            lnk_ctl: 0x0010,
            root_sta: 0x0001_0000,
            ..Default::default()
        });

        assert_eq!(FieldKind::DevSta.text(&ctx), "0029");
        assert_eq!(FieldKind::Errors.text(&ctx), "c  u t");
        assert_eq!(FieldKind::LnkSta.text(&ctx), "2043");
        assert_eq!(FieldKind::DlActive.text(&ctx), "+");
        assert_eq!(FieldKind::Speed.text(&ctx), "3");
        assert_eq!(FieldKind::Width.text(&ctx), "4");
        assert_eq!(FieldKind::RootSta.text(&ctx), "00010000");

        assert_eq!(FieldKind::DlActive.style(&ctx), CellStyle::Good);
        assert_eq!(FieldKind::LnkCtl.style(&ctx), CellStyle::Alert);
    }

    #[test]
    fn inactive_link_is_flagged() {
        let ctx = express_ctx(&ExpressCapabilityRegisters::default());

        assert_eq!(FieldKind::DlActive.text(&ctx), "-");
        assert_eq!(FieldKind::DlActive.style(&ctx), CellStyle::Alert);
        assert_eq!(FieldKind::Errors.text(&ctx), "      ");
    }

    #[test]
    fn every_error_flag_has_its_letter() {
        let ctx = express_ctx(&ExpressCapabilityRegisters {
            dev_sta: 0x003F,
            ..Default::default()
        });
        assert_eq!(FieldKind::Errors.text(&ctx), "cnfuxt");

        // Bits above the six flags are not shown.
        let ctx = express_ctx(&ExpressCapabilityRegisters {
            dev_sta: 0xFFC4,
            ..Default::default()
        });
        assert_eq!(FieldKind::Errors.text(&ctx), "  f   ");
    }

    #[test]
    fn express_fields_are_blank_without_capability() {
        let ctx = RenderContext::new(ConfigBuilder::new(0x8086, 0x1237).device("0000:00:00.0"));

        let texts = texts(&ctx);
        for (field, text) in FieldKind::ALL.iter().zip(&texts) {
            if field.is_express() {
                assert_eq!(text, "", "{field:?}");
            }
        }
        assert_eq!(texts[0], "0000:00:00.0");
        assert_eq!(texts[1], "8086:1237");
        assert_eq!(FieldKind::DlActive.style(&ctx), CellStyle::Normal);
    }

    #[test]
    fn express_fields_are_blank_for_short_dumps() {
        let ctx = RenderContext::new(
            ConfigBuilder::new(0x8086, 0x9d10)
                .capability(PCI_EXPRESS, 0x40, &[0; 50])
                .truncate(0x70)
                .device("0000:00:1c.0"),
        );

        assert_eq!(FieldKind::LnkSta.text(&ctx), "");
        assert!(FieldKind::DevSta
            .detail(&ctx)
            .is_some_and(|d| d.contains("only 112 available")));
    }

    #[test]
    fn bridge_fields() {
        let ctx = RenderContext::new(
            ConfigBuilder::new(0x8086, 0x9d10)
                .bridge(2, 5)
                .u16_le_at(offset::BRIDGE_CONTROL, 0x0052)
                .device("0000:00:1c.0"),
        );

        assert_eq!(FieldKind::SecondaryBus.text(&ctx), "02-05");
        assert_eq!(FieldKind::BridgeControl.text(&ctx), "0052");
        assert_eq!(FieldKind::BridgeControl.style(&ctx), CellStyle::Alert);
        assert_eq!(FieldKind::Address.style(&ctx), CellStyle::Bridge);

        let single = RenderContext::new(
            ConfigBuilder::new(0x8086, 0x9d10)
                .bridge(3, 3)
                .device("0000:00:1d.0"),
        );
        assert_eq!(FieldKind::SecondaryBus.text(&single), "03");
        assert_eq!(FieldKind::BridgeControl.style(&single), CellStyle::Normal);
    }

    #[test]
    fn endpoints_have_no_bridge_fields() {
        let ctx = RenderContext::new(
            ConfigBuilder::new(0x10de, 0x1c82)
                .u16_le_at(offset::BRIDGE_CONTROL, 0x0040)
                .device("0000:01:00.0"),
        );

        assert_eq!(FieldKind::SecondaryBus.text(&ctx), "");
        assert_eq!(FieldKind::BridgeControl.text(&ctx), "");
        assert_eq!(FieldKind::BridgeControl.style(&ctx), CellStyle::Normal);
    }

    #[test]
    fn header_registers_are_explained() {
        let ctx = RenderContext::new(
            ConfigBuilder::new(0x8086, 0x1237)
                .u16_le_at(offset::COMMAND, command::MEMORY | command::BUS_MASTER)
                .device("0000:00:00.0"),
        );

        let control = FieldKind::Control.detail(&ctx).unwrap();
        assert!(control.starts_with("I/O- Mem+ BusMaster+ SpecCycle-"));

        let status = FieldKind::Status.detail(&ctx).unwrap();
        assert!(status.starts_with("Cap-"));

        assert_eq!(FieldKind::Speed.detail(&ctx), None);
    }
}
