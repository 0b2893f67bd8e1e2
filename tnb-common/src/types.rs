//! Host inventory types shared between the collaborators and the benchmark core.

use serde::{Deserialize, Serialize};

/// Bytes in one KiB.
pub const KIB: u64 = 1024;
/// Bytes in one MiB. Throughput figures are reported in MiB/s.
pub const MIB: u64 = 1024 * 1024;
/// Bytes in one GiB.
pub const GIB: u64 = 1024 * 1024 * 1024;
/// Bytes in one TiB.
pub const TIB: u64 = 1024 * GIB;

/// System identity and the two figures the benchmark is sized from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Logical core count. Drives the thread-count sweep.
    pub cores: u32,
    /// Physical memory in bytes. Caps the per-disk read volume.
    pub physical_memory_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_cores: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Operating system / appliance version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// CPU model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_product: Option<String>,
    /// 1, 5 and 15 minute load averages at inventory time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_average: Option<[f64; 3]>,
}

impl SystemInfo {
    /// Minimal record with just the sizing figures.
    pub fn new(cores: u32, physical_memory_bytes: u64) -> Self {
        Self {
            cores,
            physical_memory_bytes,
            ..Self::default()
        }
    }

    /// Physical memory in GiB.
    pub fn memory_gib(&self) -> f64 {
        self.physical_memory_bytes as f64 / GIB as f64
    }
}

/// A storage pool that can host a scratch dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    /// Pool identity (the pool name on TrueNAS).
    pub name: String,
    /// Mount path of the pool root.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub vdev_count: usize,
    #[serde(default)]
    pub disk_count: usize,
}

impl PoolInfo {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Self::default()
        }
    }
}

/// A block device that can be read raw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskInfo {
    /// Device name under the device directory, e.g. `sda` or `nvme0n1`.
    pub name: String,
    /// Capacity in bytes. `None` when the host could not report it.
    #[serde(default)]
    pub capacity_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zfs_guid: Option<String>,
    /// Pool this disk belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

impl DiskInfo {
    pub fn new(name: impl Into<String>, capacity_bytes: Option<u64>) -> Self {
        Self {
            name: name.into(),
            capacity_bytes,
            ..Self::default()
        }
    }

    /// Capacity in GiB, zero when unknown.
    pub fn capacity_gib(&self) -> f64 {
        self.capacity_bytes.unwrap_or(0) as f64 / GIB as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_info_memory_gib() {
        let info = SystemInfo::new(8, 32 * GIB);
        assert_eq!(info.memory_gib(), 32.0);
        assert_eq!(info.cores, 8);
        assert!(info.version.is_none());
    }

    #[test]
    fn test_disk_capacity_gib_unknown_is_zero() {
        let disk = DiskInfo::new("sda", None);
        assert_eq!(disk.capacity_gib(), 0.0);

        let disk = DiskInfo::new("sdb", Some(500 * GIB));
        assert_eq!(disk.capacity_gib(), 500.0);
    }

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let json = serde_json::to_value(SystemInfo::new(4, GIB)).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["cores"], 4);
        assert_eq!(json["physical_memory_bytes"], GIB);
    }

    #[test]
    fn test_disk_info_deserializes_with_missing_fields() {
        let disk: DiskInfo = serde_json::from_str(r#"{"name":"nvme0n1"}"#).unwrap();
        assert_eq!(disk.name, "nvme0n1");
        assert!(disk.capacity_bytes.is_none());
        assert!(disk.pool.is_none());
    }
}
