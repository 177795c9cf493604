//! # Linux sysfs Backend
//!
//! Linux exposes the Configuration Space of every PCI function as
//! `/sys/bus/pci/devices/<address>/config`. Reading it without privileges only returns the first
//! 64 bytes. Writing requires `CAP_SYS_ADMIN`.

use std::{
    fs::{self, File, OpenOptions},
    io,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
};

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::device::request::Request;

use super::{
    device::Device,
    traits::{ConfigAccess, RegisterIoError},
};

/// Where Linux lists all PCI functions.
pub const DEVICES_ROOT: &str = "/sys/bus/pci/devices";

/// The name of the Configuration Space file in each device directory.
const CONFIG_FILE: &str = "config";

/// Enumerating or re-reading devices from sysfs failed.
#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    /// The device directory could not be listed.
    #[error("Failed to list PCI devices in {path}")]
    ListDevices {
        /// The directory that was listed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A Configuration Space file could not be read.
    #[error("Failed to read config space of {path}")]
    ReadConfig {
        /// The file that was read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

fn read_config(device_dir: &Path) -> Result<Vec<u8>, EnumerationError> {
    let path = device_dir.join(CONFIG_FILE);

    fs::read(&path).map_err(|source| EnumerationError::ReadConfig { path, source })
}

/// List all PCI functions below `root` whose [slug](Device::slug) matches `filter`.
///
/// The result is sorted by address.
pub fn enumerate(root: &Path, filter: &Regex) -> Result<Vec<Device>, EnumerationError> {
    let list_err = |source| EnumerationError::ListDevices {
        path: root.to_owned(),
        source,
    };

    let mut devices = Vec::new();

    for entry in fs::read_dir(root).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let device_dir = entry.path();
        let addr = entry.file_name().to_string_lossy().into_owned();

        let mut device = Device::from_config(addr, read_config(&device_dir)?);
        device.sysfs_path = Some(device_dir);

        if filter.is_match(&device.slug()) {
            trace!("Found {}", device.slug());
            devices.push(device);
        }
    }

    devices.sort_by(|a, b| a.addr.cmp(&b.addr));
    debug!("Enumerated {} devices below {}", devices.len(), root.display());

    Ok(devices)
}

/// Re-read the raw Configuration Space of all live devices in place.
///
/// Devices without a sysfs path are left alone. A device that fails to read keeps its previous
/// bytes. All devices are tried and the first error is returned.
pub fn refresh_all(devices: &mut [Device]) -> Result<(), EnumerationError> {
    let mut first_err = None;

    for device in devices.iter_mut() {
        let Some(device_dir) = device.sysfs_path.as_deref() else {
            continue;
        };

        match read_config(device_dir) {
            Ok(config) => {
                device.config = config;
                device.update_header();
            }
            Err(err) => {
                warn!("{}: {err}", device.addr);
                first_err.get_or_insert(err);
            }
        }
    }

    first_err.map_or(Ok(()), Err)
}

/// A writable handle to the Configuration Space of a live device.
///
/// The file is closed when the handle is dropped.
#[derive(Debug)]
pub struct SysfsConfig {
    file: File,
}

impl SysfsConfig {
    /// Open the Configuration Space of the device in `device_dir` for reading and writing.
    pub fn open(device_dir: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device_dir.join(CONFIG_FILE))?;

        Ok(Self { file })
    }
}

impl ConfigAccess for SysfsConfig {
    fn read_cfg(&self, req: Request) -> Result<u64, RegisterIoError> {
        let mut buf = [0u8; 8];
        let size = usize::from(req.size);

        self.file
            .read_exact_at(&mut buf[..size], req.addr)
            .map_err(|err| RegisterIoError::new(req, err))?;

        trace!("read  {req} = {:#x}", u64::from_le_bytes(buf));
        Ok(u64::from_le_bytes(buf))
    }

    fn write_cfg(&self, req: Request, value: u64) -> Result<(), RegisterIoError> {
        let size = usize::from(req.size);

        trace!("write {req} = {:#x}", value & req.value_mask());
        self.file
            .write_all_at(&value.to_le_bytes()[..size], req.addr)
            .map_err(|err| RegisterIoError::new(req, err))
    }
}
