use tracing_subscriber::EnvFilter;

/// Filter for `-v` repetitions. An explicit `-v` wins over `RUST_LOG`.
fn filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => {
            return EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::new(level)
}

/// Installs the fmt subscriber on stderr (stdout is reserved for `--json`)
/// and routes `log` records from the library into it.
pub fn init(verbose: u8) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge not installed: {}", e);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_target(verbose > 0)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("logging not initialised: {}", e);
    }
}
