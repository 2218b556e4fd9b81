use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the JSON-lines subscriber on stderr. `RUST_LOG` overrides the
/// default `info` filter. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .json()
        .with_current_span(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
