//! # Device Access Code
//!
//! This module contains everything that touches PCI devices: decoding their Configuration Space
//! and writing to their control registers. It does not know about the user interface.

#![deny(missing_docs)]
#![deny(rustdoc::all)]
#![deny(clippy::must_use_candidate)]
#![deny(missing_debug_implementations)]

pub mod pci;
pub mod request;
