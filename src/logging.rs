//! Tracing setup for binaries built on the library
//!
//! The library itself only emits `tracing` events; nothing is printed
//! unless the application installs a subscriber.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "warn";

/// Filter selected by `--verbose`
pub const VERBOSE_FILTER: &str = "oisp_client=debug,oisp=debug,warn";

fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_FILTER);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` is honored unless `verbose` is set. Calling this twice is harmless.
pub fn init_tracing(verbose: bool) {
    let _ = fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
