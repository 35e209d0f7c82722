use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    // RUST_LOG overrides the default level
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the process-wide subscriber. Panics if one is already set.
pub fn init_logger() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_names(true)
                .with_line_number(false)
                .with_file(false)
                .pretty(),
        )
        .with(env_filter())
        .init();
}

/// Subscriber for tests: output goes through the test harness capture and a
/// second call (from another test in the same binary) is a no-op.
pub fn init_test_logger() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer().with_target(true).compact())
        .with(env_filter())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_logger_installs_once() {
        init_logger();
        tracing::info!("logger installed");
        // a test subscriber cannot replace the global one
        init_test_logger();
    }
}
