//! TrueNAS middleware client built on `midclt call`.

use super::{HostApi, HostError};
use crate::types::{DiskInfo, GIB, KIB, MIB, PoolInfo, SystemInfo, TIB};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// Host backed by the TrueNAS middleware CLI.
#[derive(Debug, Clone)]
pub struct MidcltHost {
    program: PathBuf,
    dataset_name: String,
    record_size: String,
}

impl MidcltHost {
    pub fn new(dataset_name: impl Into<String>, record_size: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("midclt"),
            dataset_name: dataset_name.into(),
            record_size: record_size.into(),
        }
    }

    /// Use a different middleware client binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn dataset_id(&self, pool: &str) -> String {
        format!("{pool}/{}", self.dataset_name)
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, HostError> {
        let command = format!("{} call {method}", self.program.display());
        let mut cmd = Command::new(&self.program);
        cmd.arg("call").arg(method);
        for arg in args {
            cmd.arg(arg.to_string());
        }

        debug!(method, "Calling middleware");
        let output = cmd.output().await.map_err(|source| HostError::Spawn {
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

        serde_json::from_slice(&output.stdout).map_err(|e| HostError::Parse {
            command,
            reason: e.to_string(),
        })
    }

    async fn find_dataset(&self, id: &str) -> Result<Option<Value>, HostError> {
        let datasets = self.call("pool.dataset.query", &[]).await?;
        Ok(datasets
            .as_array()
            .and_then(|all| all.iter().find(|ds| ds["name"].as_str() == Some(id)))
            .cloned())
    }
}

impl HostApi for MidcltHost {
    async fn system_info(&self) -> Result<SystemInfo, HostError> {
        let raw = self.call("system.info", &[]).await?;
        parse_system_info(&raw)
    }

    async fn pools(&self) -> Result<Vec<PoolInfo>, HostError> {
        let raw = self.call("pool.query", &[]).await?;
        parse_pools(&raw)
    }

    async fn disks(&self) -> Result<Vec<DiskInfo>, HostError> {
        let pools = self.call("pool.query", &[]).await?;
        let membership = pool_membership(&pools);
        let raw = self.call("disk.query", &[]).await?;
        parse_disks(&raw, &membership)
    }

    async fn ensure_scratch_dataset(&self, pool: &str) -> Result<PathBuf, HostError> {
        let id = self.dataset_id(pool);
        let dataset = match self.find_dataset(&id).await? {
            Some(existing) => {
                debug!(dataset = %id, "Scratch dataset already exists");
                existing
            }
            None => {
                let config = json!({
                    "name": &id,
                    "recordsize": self.record_size,
                    "compression": "OFF",
                    "sync": "DISABLED",
                });
                self.call("pool.dataset.create", &[config]).await?;
                info!(dataset = %id, record_size = %self.record_size, "Created scratch dataset");
                self.find_dataset(&id)
                    .await?
                    .ok_or_else(|| HostError::NotFound {
                        kind: "dataset",
                        name: id.clone(),
                    })?
            }
        };

        dataset["mountpoint"]
            .as_str()
            .map(PathBuf::from)
            .ok_or_else(|| HostError::Parse {
                command: "pool.dataset.query".to_string(),
                reason: format!("dataset {id} has no mountpoint"),
            })
    }

    async fn available_bytes(&self, pool: &str) -> Result<u64, HostError> {
        let id = self.dataset_id(pool);
        let dataset = self
            .find_dataset(&id)
            .await?
            .ok_or_else(|| HostError::NotFound {
                kind: "dataset",
                name: id.clone(),
            })?;
        parse_available_bytes(&dataset).ok_or_else(|| HostError::Parse {
            command: "pool.dataset.query".to_string(),
            reason: format!("dataset {id} has no usable 'available' property"),
        })
    }

    async fn delete_scratch_dataset(&self, pool: &str) -> Result<(), HostError> {
        let id = self.dataset_id(pool);
        let args = json!({ "id": &id, "recursive": false, "force": false });
        self.call("pool.dataset.delete", &[args]).await?;
        info!(dataset = %id, "Deleted scratch dataset");
        Ok(())
    }
}

/// Parse a `system.info` payload.
pub fn parse_system_info(raw: &Value) -> Result<SystemInfo, HostError> {
    let parse_err = |reason: &str| HostError::Parse {
        command: "system.info".to_string(),
        reason: reason.to_string(),
    };
    let cores = raw["cores"]
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| parse_err("missing 'cores'"))?;
    let physmem = raw["physmem"]
        .as_u64()
        .ok_or_else(|| parse_err("missing 'physmem'"))?;

    let text = |key: &str| raw[key].as_str().map(str::to_string);
    let load_average = raw["loadavg"].as_array().and_then(|values| {
        let parsed: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        <[f64; 3]>::try_from(parsed).ok()
    });

    Ok(SystemInfo {
        cores,
        physical_memory_bytes: physmem,
        physical_cores: raw["physical_cores"]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok()),
        hostname: text("hostname"),
        version: text("version"),
        model: text("model"),
        system_product: text("system_product"),
        load_average,
    })
}

/// Parse a `pool.query` payload.
pub fn parse_pools(raw: &Value) -> Result<Vec<PoolInfo>, HostError> {
    let pools = raw.as_array().ok_or_else(|| HostError::Parse {
        command: "pool.query".to_string(),
        reason: "expected an array".to_string(),
    })?;

    Ok(pools
        .iter()
        .filter_map(|pool| {
            let name = pool["name"].as_str()?;
            let path = pool["path"].as_str().unwrap_or_default();
            let vdevs = pool["topology"]["data"].as_array();
            let mut info = PoolInfo::new(name, path);
            info.status = pool["status"].as_str().map(str::to_string);
            info.vdev_count = vdevs.map_or(0, Vec::len);
            info.disk_count = vdevs.map_or(0, |vdevs| {
                vdevs
                    .iter()
                    .map(|vdev| vdev["children"].as_array().map_or(0, Vec::len))
                    .sum()
            });
            Some(info)
        })
        .collect())
}

/// Map member disk GUIDs to pool names from a `pool.query` payload.
pub fn pool_membership(raw: &Value) -> HashMap<String, String> {
    let mut membership = HashMap::new();
    for pool in raw.as_array().into_iter().flatten() {
        let Some(name) = pool["name"].as_str() else {
            continue;
        };
        for vdev in pool["topology"]["data"].as_array().into_iter().flatten() {
            for disk in vdev["children"].as_array().into_iter().flatten() {
                if let Some(guid) = disk["guid"].as_str() {
                    membership.insert(guid.to_string(), name.to_string());
                }
            }
        }
    }
    membership
}

/// Parse a `disk.query` payload, tagging each disk with its pool.
pub fn parse_disks(
    raw: &Value,
    membership: &HashMap<String, String>,
) -> Result<Vec<DiskInfo>, HostError> {
    let disks = raw.as_array().ok_or_else(|| HostError::Parse {
        command: "disk.query".to_string(),
        reason: "expected an array".to_string(),
    })?;

    Ok(disks
        .iter()
        .filter_map(|disk| {
            let name = disk["name"].as_str()?;
            let zfs_guid = disk["zfs_guid"].as_str().map(str::to_string);
            Some(DiskInfo {
                name: name.to_string(),
                capacity_bytes: disk["size"].as_u64(),
                model: disk["model"].as_str().map(str::to_string),
                serial: disk["serial"].as_str().map(str::to_string),
                pool: zfs_guid.as_ref().and_then(|g| membership.get(g)).cloned(),
                zfs_guid,
            })
        })
        .collect())
}

/// Free bytes of a dataset record: `available.parsed`, else `available.value`.
pub fn parse_available_bytes(dataset: &Value) -> Option<u64> {
    let available = &dataset["available"];
    if let Some(parsed) = available["parsed"].as_u64() {
        return Some(parsed);
    }
    available["value"].as_str().and_then(parse_size_string)
}

/// Parse middleware size strings such as `3.07T` using binary units.
pub fn parse_size_string(value: &str) -> Option<u64> {
    let value = value.trim();
    let (number, multiplier) = match value.chars().last()? {
        'T' => (&value[..value.len() - 1], TIB),
        'G' => (&value[..value.len() - 1], GIB),
        'M' => (&value[..value.len() - 1], MIB),
        'K' => (&value[..value.len() - 1], KIB),
        'B' => (&value[..value.len() - 1], 1),
        _ => (value, 1),
    };
    let number: f64 = number.trim().parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some((number * multiplier as f64) as u64)
}
