use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .with(filter)
            .init();
    });
}

/// Captured `midclt call` payloads from a small two-pool system.
#[allow(dead_code)]
pub fn fixture(name: &str) -> &'static str {
    match name {
        "system_info.json" => include_str!("../fixtures/system_info.json"),
        "pool_query.json" => include_str!("../fixtures/pool_query.json"),
        "disk_query.json" => include_str!("../fixtures/disk_query.json"),
        "dataset_query.json" => include_str!("../fixtures/dataset_query.json"),
        other => panic!("unknown fixture: {other}"),
    }
}
