mod common;

use common::{fixture, init_test_logging};
use proptest::prelude::*;
use serde_json::Value;
use tnb_common::host::{
    parse_available_bytes, parse_disks, parse_pools, parse_size_string, parse_system_info,
    pool_membership,
};
use tnb_common::{GIB, TIB};
use tracing::info;

fn json(name: &str) -> Value {
    serde_json::from_str(fixture(name)).expect("fixture is valid JSON")
}

#[test]
fn test_system_info_fixture() {
    init_test_logging();
    info!(test = "test_system_info_fixture", phase = "setup");

    let info = parse_system_info(&json("system_info.json")).expect("system.info parse");

    info!(
        test = "test_system_info_fixture",
        phase = "assert",
        cores = info.cores,
        memory_gib = info.memory_gib()
    );
    assert_eq!(info.cores, 28);
    assert_eq!(info.physical_cores, Some(14));
    assert_eq!(info.physical_memory_bytes, 32 * GIB);
    assert_eq!(info.system_product.as_deref(), Some("X10SRL-F"));

    info!(
        test = "test_system_info_fixture",
        phase = "complete",
        status = "passed"
    );
}

#[test]
fn test_inventory_fixture_membership() {
    init_test_logging();
    info!(test = "test_inventory_fixture_membership", phase = "setup");

    let pools_raw = json("pool_query.json");
    let pools = parse_pools(&pools_raw).expect("pool.query parse");
    let membership = pool_membership(&pools_raw);
    let disks = parse_disks(&json("disk_query.json"), &membership).expect("disk.query parse");

    info!(
        test = "test_inventory_fixture_membership",
        phase = "assert",
        pools = pools.len(),
        disks = disks.len()
    );
    assert_eq!(pools.len(), 2);
    assert_eq!(pools[0].disk_count, 2);
    assert_eq!(pools[1].path, "/mnt/fast");

    let pool_of = |name: &str| {
        disks
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.pool.clone())
    };
    assert_eq!(pool_of("sda").as_deref(), Some("tank"));
    assert_eq!(pool_of("nvme0n1").as_deref(), Some("fast"));
    assert_eq!(pool_of("sdc"), None);

    let unknown = disks.iter().find(|d| d.name == "sdd").expect("sdd listed");
    assert!(unknown.capacity_bytes.is_none());

    info!(
        test = "test_inventory_fixture_membership",
        phase = "complete",
        status = "passed"
    );
}

#[test]
fn test_dataset_available_fixture() {
    init_test_logging();
    info!(test = "test_dataset_available_fixture", phase = "setup");

    let datasets = json("dataset_query.json");
    let find = |name: &str| {
        datasets
            .as_array()
            .and_then(|all| all.iter().find(|ds| ds["name"] == name))
            .cloned()
            .expect("dataset present")
    };

    let tank = parse_available_bytes(&find("tank/tn-bench"));
    let fast = parse_available_bytes(&find("fast/tn-bench"));

    info!(
        test = "test_dataset_available_fixture",
        phase = "assert",
        tank = ?tank,
        fast = ?fast
    );
    assert_eq!(tank, Some(7_696_581_394_432));
    assert_eq!(fast, Some((3.07 * TIB as f64) as u64));

    info!(
        test = "test_dataset_available_fixture",
        phase = "complete",
        status = "passed"
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn test_parse_size_string_no_panic(s in ".*") {
        let _ = parse_size_string(&s);
    }

    #[test]
    fn test_parse_size_string_whole_gib(n in 0u64..4096) {
        prop_assert_eq!(parse_size_string(&format!("{n}G")), Some(n * GIB));
    }
}
