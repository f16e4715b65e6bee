//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,manifest_fetch=debug"
    } else {
        "info"
    }
}

/// Builds the filter: `RUST_LOG` wins, otherwise `info`, with this crate at
/// `debug` when `verbose` is set.
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Installs a global fmt subscriber writing to stderr.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_target(verbose)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(verbose))
        .try_init();
}
