use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber from `RUST_LOG` (default
/// `info`), writing to stderr so stdout stays reserved for the run
/// summary. Safe to call more than once per process (tests call it per
/// case); later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
