//! Generic Linux host: directories stand in for pools.
//!
//! System figures come from `/proc`, disks from `/sys/block`, and free space
//! from `df`. The scratch dataset is a sub-directory of the pool directory.

use super::{HostApi, HostError};
use crate::types::{DiskInfo, PoolInfo, SystemInfo};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Sector size used by `/sys/block/<dev>/size`.
const SECTOR_BYTES: u64 = 512;

/// Virtual block devices that are never benchmarked.
const VIRTUAL_DEVICE_PREFIXES: &[&str] = &["loop", "ram", "zram"];

/// Host that benchmarks plain directories on the local machine.
#[derive(Debug, Clone)]
pub struct LocalHost {
    pools: Vec<PoolInfo>,
    dataset_name: String,
    proc_root: PathBuf,
    sys_block: PathBuf,
}

impl LocalHost {
    pub fn new(pools: Vec<PoolInfo>, dataset_name: impl Into<String>) -> Self {
        Self {
            pools,
            dataset_name: dataset_name.into(),
            proc_root: PathBuf::from("/proc"),
            sys_block: PathBuf::from("/sys/block"),
        }
    }

    /// Read system figures and block devices from alternate roots.
    #[must_use]
    pub fn with_roots(mut self, proc_root: impl Into<PathBuf>, sys_block: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self.sys_block = sys_block.into();
        self
    }

    fn pool(&self, name: &str) -> Result<&PoolInfo, HostError> {
        self.pools
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| HostError::NotFound {
                kind: "pool",
                name: name.to_string(),
            })
    }

    fn scratch_dir(&self, pool: &str) -> Result<PathBuf, HostError> {
        Ok(Path::new(&self.pool(pool)?.path).join(&self.dataset_name))
    }

    async fn read_proc(&self, name: &str) -> Result<String, HostError> {
        let path = self.proc_root.join(name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| HostError::io(&path, e))
    }
}

impl HostApi for LocalHost {
    async fn system_info(&self) -> Result<SystemInfo, HostError> {
        let meminfo = self.read_proc("meminfo").await?;
        let physical_memory_bytes =
            parse_meminfo_total(&meminfo).ok_or_else(|| HostError::Parse {
                command: "meminfo".to_string(),
                reason: "missing MemTotal".to_string(),
            })?;

        let cores = match self.read_proc("stat").await {
            Ok(stat) => count_cpus(&stat),
            Err(e) => {
                debug!(error = %e, "Falling back to available_parallelism for core count");
                0
            }
        };
        let cores = if cores > 0 {
            cores
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1)
        };

        let mut info = SystemInfo::new(cores, physical_memory_bytes);
        if let Ok(cpuinfo) = self.read_proc("cpuinfo").await {
            info.model = parse_cpu_model(&cpuinfo);
        }
        if let Ok(loadavg) = self.read_proc("loadavg").await {
            info.load_average = parse_loadavg(&loadavg);
        }
        if let Ok(hostname) = self.read_proc("sys/kernel/hostname").await {
            info.hostname = Some(hostname.trim().to_string()).filter(|h| !h.is_empty());
        }
        if let Ok(release) = self.read_proc("sys/kernel/osrelease").await {
            info.version = Some(format!("Linux {}", release.trim()));
        }
        Ok(info)
    }

    async fn pools(&self) -> Result<Vec<PoolInfo>, HostError> {
        Ok(self.pools.clone())
    }

    async fn disks(&self) -> Result<Vec<DiskInfo>, HostError> {
        let mut entries = tokio::fs::read_dir(&self.sys_block)
            .await
            .map_err(|e| HostError::io(&self.sys_block, e))?;

        let mut disks = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HostError::io(&self.sys_block, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if VIRTUAL_DEVICE_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }
            let dev = entry.path();
            let capacity_bytes = read_trimmed(&dev.join("size"))
                .await
                .and_then(|s| s.parse::<u64>().ok())
                .map(|sectors| sectors * SECTOR_BYTES);
            let mut disk = DiskInfo::new(name, capacity_bytes);
            disk.model = read_trimmed(&dev.join("device/model")).await;
            disk.serial = read_trimmed(&dev.join("device/serial")).await;
            disks.push(disk);
        }
        disks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(disks)
    }

    async fn ensure_scratch_dataset(&self, pool: &str) -> Result<PathBuf, HostError> {
        let dir = self.scratch_dir(pool)?;
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| HostError::io(&dir, e))?;
            info!(pool, path = %dir.display(), "Created scratch directory");
        }
        Ok(dir)
    }

    async fn available_bytes(&self, pool: &str) -> Result<u64, HostError> {
        let dir = self.scratch_dir(pool)?;
        let command = format!("df -B1 --output=avail {}", dir.display());
        let output = Command::new("df")
            .args(["-B1", "--output=avail"])
            .arg(&dir)
            .output()
            .await
            .map_err(|source| HostError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(HostError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_df_available(&stdout).ok_or_else(|| HostError::Parse {
            command,
            reason: format!("no byte count in {:?}", stdout.trim()),
        })
    }

    async fn delete_scratch_dataset(&self, pool: &str) -> Result<(), HostError> {
        let dir = self.scratch_dir(pool)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(pool, path = %dir.display(), "Deleted scratch directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(pool, path = %dir.display(), "Scratch directory already gone");
                Ok(())
            }
            Err(e) => Err(HostError::io(&dir, e)),
        }
    }
}

async fn read_trimmed(path: &Path) -> Option<String> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse a `name=directory` pool argument. A bare directory is named after its last component.
pub fn parse_pool_spec(spec: &str) -> Option<PoolInfo> {
    let (name, dir) = match spec.split_once('=') {
        Some((name, dir)) => (name.trim().to_string(), dir.trim()),
        None => {
            let dir = spec.trim();
            let name = Path::new(dir).file_name()?.to_string_lossy().into_owned();
            (name, dir)
        }
    };
    if name.is_empty() || dir.is_empty() {
        return None;
    }
    Some(PoolInfo::new(name, dir))
}

/// Bytes from the second line of `df -B1 --output=avail`.
pub fn parse_df_available(output: &str) -> Option<u64> {
    output.lines().nth(1)?.trim().parse().ok()
}

fn parse_meminfo_total(content: &str) -> Option<u64> {
    let fields: HashMap<&str, u64> = content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let kb = value.trim().trim_end_matches(" kB").trim().parse().ok()?;
            Some((key, kb))
        })
        .collect();
    fields.get("MemTotal").map(|kb| kb * 1024)
}

fn count_cpus(stat: &str) -> u32 {
    stat.lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .count() as u32
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

fn parse_loadavg(content: &str) -> Option<[f64; 3]> {
    let mut parts = content.split_whitespace().map(|p| p.parse::<f64>().ok());
    Some([parts.next()??, parts.next()??, parts.next()??])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GIB;

    const MEMINFO: &str = "MemTotal:       32768000 kB\nMemFree:         1000000 kB\n";
    const STAT: &str = "cpu  1 2 3 4\ncpu0 1 2 3 4\ncpu1 1 2 3 4\ncpu2 1 2 3 4\ncpu3 1 2 3 4\nintr 0\n";

    fn fake_roots() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let proc_root = root.path().join("proc");
        std::fs::create_dir_all(&proc_root).unwrap();
        std::fs::write(proc_root.join("meminfo"), MEMINFO).unwrap();
        std::fs::write(proc_root.join("stat"), STAT).unwrap();
        std::fs::write(proc_root.join("loadavg"), "0.50 0.40 0.30 1/100 42\n").unwrap();
        std::fs::write(proc_root.join("cpuinfo"), "processor\t: 0\nmodel name\t: Test CPU\n")
            .unwrap();

        let sys_block = root.path().join("block");
        for (dev, sectors) in [("sda", "1048576"), ("nvme0n1", "2097152"), ("loop0", "8")] {
            std::fs::create_dir_all(sys_block.join(dev).join("device")).unwrap();
            std::fs::write(sys_block.join(dev).join("size"), format!("{sectors}\n")).unwrap();
        }
        std::fs::write(sys_block.join("sda/device/model"), "Test Disk  \n").unwrap();
        root
    }

    fn host_for(root: &Path, pools: Vec<PoolInfo>) -> LocalHost {
        LocalHost::new(pools, "tn-bench").with_roots(root.join("proc"), root.join("block"))
    }

    #[test]
    fn test_parse_pool_spec() {
        let pool = parse_pool_spec("tank=/mnt/tank").unwrap();
        assert_eq!(pool.name, "tank");
        assert_eq!(pool.path, "/mnt/tank");

        let pool = parse_pool_spec("/srv/scratch").unwrap();
        assert_eq!(pool.name, "scratch");

        assert!(parse_pool_spec("=/mnt/x").is_none());
        assert!(parse_pool_spec("name=").is_none());
    }

    #[test]
    fn test_parse_df_available() {
        assert_eq!(parse_df_available("   Avail\n123456789\n"), Some(123_456_789));
        assert_eq!(parse_df_available("Avail\n"), None);
    }

    #[test]
    fn test_proc_parsers() {
        assert_eq!(parse_meminfo_total(MEMINFO), Some(32_768_000 * 1024));
        assert_eq!(count_cpus(STAT), 4);
        assert_eq!(parse_loadavg("1.0 2.0 3.0 1/1 1"), Some([1.0, 2.0, 3.0]));
        assert_eq!(parse_loadavg("1.0"), None);
    }

    #[tokio::test]
    async fn test_system_info_from_fake_proc() {
        let root = fake_roots();
        let info = host_for(root.path(), vec![]).system_info().await.unwrap();
        assert_eq!(info.cores, 4);
        assert_eq!(info.physical_memory_bytes, 32_768_000 * 1024);
        assert_eq!(info.model.as_deref(), Some("Test CPU"));
        assert_eq!(info.load_average, Some([0.5, 0.4, 0.3]));
    }

    #[tokio::test]
    async fn test_disks_skip_virtual_devices() {
        let root = fake_roots();
        let disks = host_for(root.path(), vec![]).disks().await.unwrap();
        let names: Vec<_> = disks.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["nvme0n1", "sda"]);
        assert_eq!(disks[0].capacity_bytes, Some(GIB));
        assert_eq!(disks[1].capacity_bytes, Some(GIB / 2));
        assert_eq!(disks[1].model.as_deref(), Some("Test Disk"));
        assert!(disks[1].serial.is_none());
    }

    #[tokio::test]
    async fn test_scratch_dataset_is_idempotent() {
        let root = fake_roots();
        let pool_dir = root.path().join("tank");
        std::fs::create_dir_all(&pool_dir).unwrap();
        let host = host_for(
            root.path(),
            vec![PoolInfo::new("tank", pool_dir.to_string_lossy())],
        );

        let first = host.ensure_scratch_dataset("tank").await.unwrap();
        std::fs::write(first.join("keep.txt"), b"x").unwrap();
        let second = host.ensure_scratch_dataset("tank").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, pool_dir.join("tn-bench"));
        assert!(second.join("keep.txt").exists());

        host.delete_scratch_dataset("tank").await.unwrap();
        assert!(!first.exists());
        host.delete_scratch_dataset("tank").await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_pool_not_found() {
        let host = LocalHost::new(vec![], "tn-bench");
        let err = host.ensure_scratch_dataset("ghost").await.unwrap_err();
        assert!(matches!(err, HostError::NotFound { kind: "pool", .. }));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_available_bytes_via_df() {
        let pool_dir = tempfile::tempdir().unwrap();
        let host = LocalHost::new(
            vec![PoolInfo::new("tmp", pool_dir.path().to_string_lossy())],
            "tn-bench",
        );
        host.ensure_scratch_dataset("tmp").await.unwrap();
        let available = host.available_bytes("tmp").await.unwrap();
        assert!(available > 0);
    }
}
