//! # Device Snapshots
//!
//! A snapshot is a JSON array of [`Device`] records. It allows looking at the state of a machine
//! offline, without access to its hardware.

use std::{fs, io::Read, path::Path};

use regex::Regex;
use tracing::debug;

use super::device::Device;

/// Loading a snapshot failed.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot file could not be read.
    #[error("Failed to read snapshot")]
    Io(#[from] std::io::Error),

    /// The snapshot is not a valid JSON device list.
    #[error("Malformed snapshot")]
    Parse(#[from] serde_json::Error),
}

/// Parse a snapshot and keep the devices whose [slug](Device::slug) matches `filter`.
///
/// The result is sorted by address.
pub fn from_reader(reader: impl Read, filter: &Regex) -> Result<Vec<Device>, SnapshotError> {
    let mut devices: Vec<Device> = serde_json::from_reader(reader)?;

    devices.retain(|d| filter.is_match(&d.slug()));
    devices.sort_by(|a, b| a.addr.cmp(&b.addr));

    Ok(devices)
}

/// Load a snapshot from a file.
pub fn load(path: &Path, filter: &Regex) -> Result<Vec<Device>, SnapshotError> {
    let devices = from_reader(fs::File::open(path)?, filter)?;

    debug!("Loaded {} devices from {}", devices.len(), path.display());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"[
        {
            "Addr": "0000:02:00.0",
            "Vendor": 32902, "Device": 5427, "Class": 131072,
            "Status": 16, "Control": 1030,
            "Bridge": false, "Secondary": 0, "Subordinate": 0,
            "VendorName": "Intel Corporation",
            "IRQLine": 16,
            "Config": [134, 128, 51, 21]
        },
        {
            "Addr": "0000:00:1c.0",
            "Vendor": 32902, "Device": 40208, "Class": 394240,
            "Status": 16, "Control": 1031,
            "Bridge": true, "Secondary": 2, "Subordinate": 2,
            "Config": []
        }
    ]"#;

    #[test]
    fn config_may_be_base64() {
        let json = r#"[
            {
                "Addr": "0000:00:00.0",
                "Vendor": 32902, "Device": 40208, "Class": 393216,
                "Status": 0, "Control": 0,
                "Config": "hoAQnQ=="
            },
            {
                "Addr": "0000:00:02.0",
                "Vendor": 32902, "Device": 22807, "Class": 196608,
                "Status": 0, "Control": 0,
                "Config": null
            }
        ]"#;

        let devices = from_reader(json.as_bytes(), &Regex::new(".*").unwrap()).unwrap();

        assert_eq!(devices[0].config, [0x86, 0x80, 0x10, 0x9d]);
        assert!(devices[1].config.is_empty());
    }

    #[test]
    fn broken_base64_is_rejected() {
        let json = r#"[{"Addr": "0000:00:00.0", "Vendor": 0, "Device": 0, "Class": 0,
                        "Status": 0, "Control": 0, "Config": "hoAQ*Q=="}]"#;

        let err = from_reader(json.as_bytes(), &Regex::new(".*").unwrap()).unwrap_err();
        assert!(matches!(err, SnapshotError::Parse(_)));
    }

    #[test]
    fn snapshot_is_sorted_and_unknown_keys_ignored() {
        let devices = from_reader(SNAPSHOT.as_bytes(), &Regex::new(".*").unwrap()).unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].addr, "0000:00:1c.0");
        assert!(devices[0].bridge);
        assert_eq!(devices[1].vendor, 0x8086);
        assert_eq!(devices[1].vendor_name.as_deref(), Some("Intel Corporation"));
        assert_eq!(devices[1].config, [0x86, 0x80, 0x33, 0x15]);
        assert!(devices.iter().all(|d| d.sysfs_path.is_none()));
    }

    #[test]
    fn snapshot_is_filtered() {
        let devices =
            from_reader(SNAPSHOT.as_bytes(), &Regex::new(r"c0002").unwrap()).unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].addr, "0000:02:00.0");
    }

    #[test]
    fn malformed_snapshot_is_rejected() {
        assert!(matches!(
            from_reader("{\"Addr\": 1}".as_bytes(), &Regex::new(".*").unwrap()),
            Err(SnapshotError::Parse(_))
        ));
    }

    #[test]
    fn devices_survive_serialization() {
        let devices = from_reader(SNAPSHOT.as_bytes(), &Regex::new(".*").unwrap()).unwrap();
        let json = serde_json::to_string(&devices).unwrap();

        let reloaded = from_reader(json.as_bytes(), &Regex::new(".*").unwrap()).unwrap();
        assert_eq!(reloaded, devices);
    }
}
