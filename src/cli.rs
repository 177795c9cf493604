//! This module implements the CLI interface.
use std::path::PathBuf;

use clap::Parser;
use pciwatch::{device::pci::sysfs::DEVICES_ROOT, view::model::Orientation};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
pub struct Cli {
    /// Enable verbose logging. Can be specified multiple times to
    /// increase verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only show devices whose identity matches this regular
    /// expression. The identity looks like
    /// `0000:00:1c.0 v8086 d9d10 c00060400`.
    #[arg(short = 'r', long, value_name = "REGEX", default_value = ".*")]
    pub filter: String,

    /// Show a device snapshot from this JSON file instead of live
    /// devices. Snapshot devices cannot be modified.
    #[arg(short = 'J', long = "json", value_name = "PATH")]
    pub snapshot: Option<PathBuf>,

    /// Show devices as columns instead of rows.
    #[arg(short = 'H', long)]
    pub horizontal: bool,

    /// Write log messages into this file. The terminal belongs to
    /// the device table, so logs are discarded without this option.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// The directory to enumerate PCI devices from.
    #[arg(long, value_name = "DIR", default_value = DEVICES_ROOT, hide = true)]
    pub sysfs_root: PathBuf,
}

impl Cli {
    pub const fn orientation(&self) -> Orientation {
        if self.horizontal {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }
}
