mod cli;

use std::{fs::File, io, sync::Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use pciwatch::{
    device::pci::{snapshot, sysfs},
    monitor::source::{DeviceSource, Frozen, Sysfs},
    view::tui,
};
use regex::Regex;
use tracing::{info, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

fn main() -> Result<()> {
    let args = Cli::parse();

    let writer = match &args.log_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(File::create(path).with_context(|| {
            format!("Failed to create log file {}", path.display())
        })?)),
        None => BoxMakeWriter::new(io::sink),
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(match args.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        })
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;
    tracing_log::LogTracer::init().context("Failed to forward log records to tracing")?;

    let filter = Regex::new(&args.filter)
        .with_context(|| format!("Invalid device filter {:?}", args.filter))?;

    let (devices, source) = match &args.snapshot {
        Some(path) => (
            snapshot::load(path, &filter)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?,
            Box::new(Frozen) as Box<dyn DeviceSource>,
        ),
        None => (
            sysfs::enumerate(&args.sysfs_root, &filter).context("Failed to enumerate devices")?,
            Box::new(Sysfs) as Box<dyn DeviceSource>,
        ),
    };

    info!("Showing {} devices", devices.len());

    tui::run(devices, source, args.orientation())
}
