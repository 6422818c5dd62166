//! Restarts
//!
//! A restart is a named recovery action offered by code that is still on the
//! stack between a signal site and a handler. Handlers look restarts up with
//! [`find_restart`] and run them with [`invoke_restart`].
//!
//! Restarts live on their own stack, separate from handlers, and follow the
//! same scoping: [`restart_bind`] pushes a frame for the dynamic extent of a
//! closure. Invoking a restart is a plain function call; any unwinding comes
//! from the restart's action escaping to an enclosing catch point, which is
//! what [`crate::case::restart_case`] arranges.
//!
//! # Standard restarts
//!
//! A handful of conventional names are predefined ([`ABORT`], [`CONTINUE`],
//! [`USE_VALUE`], [`STORE_VALUE`], [`MUFFLE_WARNING`]) together with helpers
//! that invoke them when visible.

use std::fmt;
use std::sync::Arc;

use crate::dynamic::{self, Restarts};
use crate::error::{ConditionError, Result};
use crate::value::Value;

/// Abandon the current operation.
pub const ABORT: &str = "abort";
/// Proceed as if the condition had not been signalled.
pub const CONTINUE: &str = "continue";
/// Use the supplied value in place of the one that caused the condition.
pub const USE_VALUE: &str = "use-value";
/// Store the supplied value, then proceed.
pub const STORE_VALUE: &str = "store-value";
/// Silence a warning signalled with [`crate::handler::warn`].
pub const MUFFLE_WARNING: &str = "muffle-warning";

type Action = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// A named recovery action.
#[derive(Clone)]
pub struct Restart {
    name: Arc<str>,
    description: Option<Arc<str>>,
    action: Action,
}

impl Restart {
    /// Create a restart with the given name and action.
    pub fn new<F>(name: impl Into<Arc<str>>, action: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            action: Arc::new(action),
        }
    }

    /// Attach a human-readable description.
    pub fn describe(mut self, description: impl Into<Arc<str>>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The restart name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The restart description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Run the restart's action.
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        (self.action)(args)
    }
}

impl fmt::Debug for Restart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restart")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl fmt::Display for Restart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.name, description),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Restarts bound together by one [`restart_bind`] call, in declaration order.
pub(crate) type RestartFrame = Arc<[Restart]>;

/// Run `body` with `restarts` pushed as a new innermost frame.
pub fn restart_bind<I, F, R>(restarts: I, body: F) -> R
where
    I: IntoIterator<Item = Restart>,
    F: FnOnce() -> R,
{
    let frame: RestartFrame = restarts.into_iter().collect();
    let stack = dynamic::current::<Restarts>().push(frame);
    tracing::trace!(depth = stack.len(), "restart frame bound");
    dynamic::with_bound::<Restarts, _, _>(stack, body)
}

/// Find the innermost visible restart called `name`.
pub fn find_restart(name: &str) -> Option<Restart> {
    dynamic::current::<Restarts>()
        .iter()
        .flat_map(|frame| frame.iter())
        .find(|restart| restart.name() == name)
        .cloned()
}

/// Every visible restart, innermost frame first.
pub fn available_restarts() -> Vec<Restart> {
    dynamic::current::<Restarts>()
        .iter()
        .flat_map(|frame| frame.iter().cloned())
        .collect()
}

/// Invoke `restart` with `args`.
///
/// This is a direct call of the restart's action. It returns only if the
/// action does not escape.
pub fn invoke_restart(restart: &Restart, args: &[Value]) -> Result<Value> {
    tracing::debug!(restart = restart.name(), args = args.len(), "invoking restart");
    restart.invoke(args)
}

/// Find and invoke the restart called `name`.
pub fn invoke_restart_by_name(name: &str, args: &[Value]) -> Result<Value> {
    match find_restart(name) {
        Some(restart) => invoke_restart(&restart, args),
        None => Err(ConditionError::RestartNotFound(name.to_string())),
    }
}

/// Invoke the restart called `name` if one is visible.
fn invoke_if_visible(name: &str, args: &[Value]) -> Result<Option<Value>> {
    match find_restart(name) {
        Some(restart) => invoke_restart(&restart, args).map(Some),
        None => Ok(None),
    }
}

/// Invoke the innermost [`ABORT`] restart, if visible.
pub fn abort() -> Result<Option<Value>> {
    invoke_if_visible(ABORT, &[])
}

/// Invoke the innermost [`CONTINUE`] restart, if visible.
pub fn continue_restart() -> Result<Option<Value>> {
    invoke_if_visible(CONTINUE, &[])
}

/// Invoke the innermost [`USE_VALUE`] restart with `value`, if visible.
pub fn use_value(value: Value) -> Result<Option<Value>> {
    invoke_if_visible(USE_VALUE, &[value])
}

/// Invoke the innermost [`STORE_VALUE`] restart with `value`, if visible.
pub fn store_value(value: Value) -> Result<Option<Value>> {
    invoke_if_visible(STORE_VALUE, &[value])
}

/// Invoke the innermost [`MUFFLE_WARNING`] restart, if visible.
pub fn muffle_warning() -> Result<Option<Value>> {
    invoke_if_visible(MUFFLE_WARNING, &[])
}
