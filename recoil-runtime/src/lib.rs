//! # Recoil Runtime
//!
//! A resumable condition system: signalling code announces a *condition*,
//! dynamically enclosing *handlers* decide what to do about it while the
//! signaller is still on the stack, and the decision is carried out by
//! invoking a *restart* that some intermediate frame offered.
//!
//! The runtime provides:
//!
//! - **Escapes**: tagged, multi-level early returns ([`establish`], [`escape`])
//! - **Handlers**: scoped condition handlers and in-place dispatch
//!   ([`handler_bind`], [`signal`], [`raise`], [`warn`])
//! - **Restarts**: named recovery points ([`restart_bind`], [`find_restart`],
//!   [`invoke_restart`])
//! - **Case Combinators**: catch-style sugar ([`handler_case`], [`restart_case`])
//! - **Execution Contexts**: per-thread dynamic state with explicit inheritance
//!   ([`ContextSnapshot`], [`spawn_with`])
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        RECOIL RUNTIME                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//! │   │    Case      │   │   Handlers   │   │   Restarts   │     │
//! │   │  (case.rs)   │──▶│ (handler.rs) │   │ (restart.rs) │     │
//! │   └──────────────┘   └──────────────┘   └──────────────┘     │
//! │          │                  │                  │             │
//! │          ▼                  ▼                  ▼             │
//! │   ┌──────────────┐   ┌─────────────────────────────────┐     │
//! │   │   Escapes    │   │     Context-local bindings      │     │
//! │   │ (escape.rs)  │──▶│  (dynamic.rs over stack.rs)     │     │
//! │   └──────────────┘   └─────────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use recoil_runtime::{find_restart, handler_bind, invoke_restart, restart_case,
//!                      signal, values, Handler, RestartClause};
//!
//! #[derive(Debug)]
//! struct Malformed(String);
//!
//! fn parse(line: &str) -> i64 {
//!     line.parse().unwrap_or_else(|_| {
//!         restart_case(
//!             || { signal(Malformed(line.into())).ok(); 0 },
//!             vec![RestartClause::new("use-value", |args| {
//!                 *args[0].downcast_ref::<i64>().unwrap()
//!             })],
//!         )
//!     })
//! }
//!
//! let total: i64 = handler_bind(
//!     vec![Handler::of(|_: &Malformed| {
//!         let restart = find_restart("use-value").unwrap();
//!         invoke_restart(&restart, &values![0_i64])?;
//!         Ok(())
//!     })],
//!     || ["1", "x", "2"].iter().map(|l| parse(l)).sum(),
//! );
//! assert_eq!(total, 3);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod case;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod escape;
pub mod handler;
pub mod log;
pub mod restart;
pub mod stack;
pub mod value;

// Re-exports
pub use case::{handler_case, restart_case, HandlerClause, RestartClause};
pub use config::{ConditionConfig, ContextConfig, LogConfig, LogLevel, RuntimeConfig, RuntimeConfigBuilder};
pub use dynamic::{handler_depth, restart_depth, spawn, spawn_with, ContextSnapshot, PropagationMode};
pub use error::{BoxError, ConditionError, ConfigError, Result, UnmatchedEscape};
pub use escape::{block, catch, escape, establish, install_panic_hook, is_active, Tag, TagId};
pub use handler::{
    clear_interactive_hook, handler_bind, raise, set_interactive_hook, set_unhandled_fallback, signal,
    unhandled_fallback, warn, Handler, Matcher, UnhandledFallback,
};
pub use restart::{
    available_restarts, find_restart, invoke_restart, invoke_restart_by_name, restart_bind, Restart,
};
pub use stack::Stack;
pub use value::Value;

/// Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the runtime with default configuration.
pub fn init() {
    init_with_runtime_config(RuntimeConfig::default())
}

/// Initialize the runtime with full runtime configuration.
///
/// The first configuration installed wins; later calls keep it and only make
/// sure the panic hook and logging are in place.
///
/// # Example
///
/// ```rust,ignore
/// use recoil_runtime::{init_with_runtime_config, RuntimeConfig, UnhandledFallback};
///
/// let config = RuntimeConfig::builder()
///     .unhandled(UnhandledFallback::Interactive)
///     .build()
///     .unwrap();
///
/// init_with_runtime_config(config);
/// ```
pub fn init_with_runtime_config(config: RuntimeConfig) {
    // Store the runtime config globally for new contexts to pick up
    let fresh = RUNTIME_CONFIG.set(config).is_ok();

    escape::install_panic_hook();

    if let Some(config) = runtime_config() {
        log::init_logging(&config.log);
        if fresh {
            // The calling context was seeded before the config existed.
            handler::set_unhandled_fallback(config.conditions.unhandled);
        } else {
            tracing::debug!("runtime already configured; keeping existing configuration");
        }
    }
}

/// Initialize the runtime from environment variables.
///
/// Reads configuration from `RECOIL_*` environment variables.
/// See `RuntimeConfig::from_env()` for the full list of supported variables.
pub fn init_from_env() {
    init_with_runtime_config(RuntimeConfig::from_env())
}

/// Global runtime configuration.
static RUNTIME_CONFIG: std::sync::OnceLock<RuntimeConfig> = std::sync::OnceLock::new();

/// Get the current runtime configuration.
///
/// Returns `None` if the runtime was not initialized.
pub fn runtime_config() -> Option<&'static RuntimeConfig> {
    RUNTIME_CONFIG.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_with_defaults() {
        init();
        let config = runtime_config().unwrap();
        assert_eq!(config.conditions.unhandled, UnhandledFallback::Raise);
        assert_eq!(unhandled_fallback(), UnhandledFallback::Raise);
        // Second call is harmless.
        init();
    }
}
