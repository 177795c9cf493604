//! # PCI Constants
//!
//! This module collects PCI related constants. All definitions are derived from the PCI
//! Spec, either the "PCI Local Bus Specification" or newer "PCI Express Base Specification"
//! documents.

// Allow missing docs to avoid duplicating the PCI spec for all constants.
#![allow(missing_docs)]

/// Constants related to the configuration space.
pub mod config_space {

    /// The size of the standard config space of a single PCI device in bytes.
    pub const SIZE: usize = 256;

    /// The size of the config space including the PCI Express extended config space.
    pub const EXTENDED_SIZE: usize = 4096;

    /// Masks for various configuration space fields.
    pub mod mask {
        pub const CAPABILITIES_POINTER: u8 = 0xfc;
        pub const HEADER_LAYOUT: u8 = 0x7f;
    }

    /// The offsets of various fields in the configuration space.
    pub mod offset {
        pub const VENDOR: usize = 0x0;
        pub const DEVICE: usize = 0x2;
        pub const COMMAND: usize = 0x4;
        pub const STATUS: usize = 0x6;
        pub const REVISION: usize = 0x8;
        pub const PROG_IF: usize = 0x9;
        pub const HEADER_TYPE: usize = 0xE;

        pub const CAPABILITIES_POINTER: usize = 0x34;

        /// Type 1 (bridge) header fields.
        pub const PRIMARY_BUS: usize = 0x18;
        pub const SECONDARY_BUS: usize = 0x19;
        pub const SUBORDINATE_BUS: usize = 0x1A;
        pub const BRIDGE_CONTROL: usize = 0x3E;
    }

    /// Command Register Constants.
    pub mod command {
        pub const IO: u16 = 1 << 0;
        pub const MEMORY: u16 = 1 << 1;
        pub const BUS_MASTER: u16 = 1 << 2;
        pub const SPECIAL_CYCLES: u16 = 1 << 3;
        pub const MEMORY_WRITE_INVALIDATE: u16 = 1 << 4;
        pub const VGA_PALETTE_SNOOP: u16 = 1 << 5;
        pub const PARITY_ERROR_RESPONSE: u16 = 1 << 6;
        pub const SERR: u16 = 1 << 8;
        pub const FAST_BACK_TO_BACK: u16 = 1 << 9;
        pub const INTX_DISABLE: u16 = 1 << 10;
    }

    /// Status Register Constants.
    pub mod status {
        pub const INTERRUPT: u16 = 1 << 3;

        /// The device has a list of capabilities starting at
        /// [`CAPABILITIES_POINTER`](super::offset::CAPABILITIES_POINTER).
        pub const CAPABILITIES: u16 = 1 << 4;
        pub const MHZ_66: u16 = 1 << 5;
        pub const FAST_BACK_TO_BACK: u16 = 1 << 7;
        pub const MASTER_DATA_PARITY_ERROR: u16 = 1 << 8;
        pub const SIGNALED_TARGET_ABORT: u16 = 1 << 11;
        pub const RECEIVED_TARGET_ABORT: u16 = 1 << 12;
        pub const RECEIVED_MASTER_ABORT: u16 = 1 << 13;
        pub const SIGNALED_SYSTEM_ERROR: u16 = 1 << 14;
        pub const DETECTED_PARITY_ERROR: u16 = 1 << 15;
    }

    /// PCI header type.
    ///
    /// This is usually type 0, except for PCI-to-PCI bridges and other exotic devices such as
    /// Cardbus bridges.
    pub mod header_type {
        pub const TYPE_00: u8 = 0;
        pub const TYPE_01_BRIDGE: u8 = 1;
        pub const MULTIFUNCTION: u8 = 1 << 7;
    }

    /// Bridge Control Register Constants.
    pub mod bridge_control {
        pub const SECONDARY_BUS_RESET: u16 = 1 << 6;
    }

    /// IDs for PCI Capabilities.
    pub mod capability_id {
        pub const NULL: u8 = 0x00;
        pub const POWER_MANAGEMENT: u8 = 0x01;
        pub const AGP: u8 = 0x02;
        pub const VPD: u8 = 0x03;
        pub const SLOT_ID: u8 = 0x04;
        pub const MSI: u8 = 0x05;
        pub const COMPACT_PCI_HOT_SWAP: u8 = 0x06;
        pub const PCI_X: u8 = 0x07;
        pub const HYPERTRANSPORT: u8 = 0x08;
        pub const VENDOR_SPECIFIC: u8 = 0x09;
        pub const DEBUG_PORT: u8 = 0x0A;
        pub const COMPACT_PCI_CRC: u8 = 0x0B;
        pub const HOT_PLUG: u8 = 0x0C;
        pub const SUBSYSTEM_VENDOR_ID: u8 = 0x0D;
        pub const AGP_3: u8 = 0x0E;
        pub const SECURE_DEVICE: u8 = 0x0F;
        pub const PCI_EXPRESS: u8 = 0x10;
        pub const MSI_X: u8 = 0x11;
        pub const SATA: u8 = 0x12;
        pub const ADVANCED_FEATURES: u8 = 0x13;
        pub const ENHANCED_ALLOCATION: u8 = 0x14;
    }

    /// Markers for iterating the list of capabilities.
    pub mod capability_list {
        pub const END_OF_LIST: u8 = 0;

        /// An ID read back as all ones. Reads from a function that went away return this.
        pub const ABSENT_ID: u8 = 0xFF;
    }

    /// Constants for the PCI Express capability.
    ///
    /// Register offsets are relative to the start of the capability, i.e. the capability ID.
    pub mod express {
        /// Size of the register block after the two byte capability header.
        pub const REGISTERS_SIZE: usize = 50;

        /// The size of the capability header (ID and next pointer).
        pub const HEADER_SIZE: usize = 2;

        pub const CAPABILITIES: usize = 0x02;
        pub const DEVICE_CONTROL: usize = 0x08;
        pub const DEVICE_STATUS: usize = 0x0A;
        pub const LINK_CONTROL: usize = 0x10;
        pub const LINK_STATUS: usize = 0x12;
        pub const LINK_CONTROL_2: usize = 0x30;

        /// Capabilities Register Constants.
        pub mod capabilities {
            pub const VERSION: u16 = 0xF;
        }

        /// Device Status Register Constants.
        pub mod device_status {
            pub const CORRECTABLE_ERROR: u16 = 1 << 0;
            pub const NON_FATAL_ERROR: u16 = 1 << 1;
            pub const FATAL_ERROR: u16 = 1 << 2;
            pub const UNSUPPORTED_REQUEST: u16 = 1 << 3;
            pub const AUX_POWER: u16 = 1 << 4;
            pub const TRANSACTIONS_PENDING: u16 = 1 << 5;
        }

        /// Link Control Register Constants.
        pub mod link_control {
            pub const LINK_DISABLE: u16 = 1 << 4;
            pub const RETRAIN_LINK: u16 = 1 << 5;
        }

        /// Link Status Register Constants.
        pub mod link_status {
            pub const SPEED: u16 = 0xF;
            pub const WIDTH: u16 = 0x3F0;
            pub const WIDTH_SHIFT: u32 = 4;
            pub const DATA_LINK_LAYER_ACTIVE: u16 = 1 << 13;
        }

        /// Link Control 2 Register Constants.
        pub mod link_control_2 {
            pub const ENTER_COMPLIANCE: u16 = 1 << 4;
        }
    }
}
