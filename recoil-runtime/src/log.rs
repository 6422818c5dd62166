//! Logging Setup
//!
//! The runtime reports through `tracing` at its decision points: frame binds,
//! signals and escapes at `trace`, unhandled conditions and restart
//! invocations at `debug`, unhandled warnings at `warn`. Nothing is printed
//! until a subscriber is installed; [`init_logging`] installs the default one.
//!
//! `RUST_LOG`, when set, takes precedence over the configured directives.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Build the filter for `config`, preferring `RUST_LOG` when it is set.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(config.directives())
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
    })
}

/// Install a `fmt` subscriber configured by `config`.
///
/// Returns `false` if a global subscriber was already installed, in which case
/// the existing one is left in place.
pub fn init_logging(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_thread_names(true);

    let installed = if config.timestamps {
        builder.try_init().is_ok()
    } else {
        builder.without_time().try_init().is_ok()
    };

    if installed {
        tracing::debug!(filter = %config.directives(), "logging initialized");
    }
    installed
}
