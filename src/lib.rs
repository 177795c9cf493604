//! # pciwatch
//!
//! A live monitor for the link and error state of PCI Express devices.
//!
//! The [`device`] module decodes Configuration Spaces, [`monitor`] keeps re-reading them on a
//! background thread, and [`view`] turns the results into a table.

pub mod device;
pub mod monitor;
pub mod view;
