//! Handlers and Signal Dispatch
//!
//! [`handler_bind`] pushes a frame of handlers for the dynamic extent of a
//! closure. [`signal`] walks the frames innermost first and runs every
//! matching handler *in place*: the signalling code is still on the stack
//! while handlers run, and unless one of them escapes, `signal` returns to its
//! caller afterwards.
//!
//! # Dispatch rules
//!
//! - Frames are visited innermost first; inside a frame, handlers run in
//!   declaration order, and every matching handler runs.
//! - While a frame's handlers run, the visible handler stack is rebound to the
//!   frames *below* it. A handler that signals again is therefore seen by the
//!   outer frames only, never by its own frame.
//! - An escape from a handler (directly, or through a restart) abandons the
//!   rest of the dispatch.
//! - An `Err` from a handler aborts the dispatch and is returned by `signal`.
//! - If no handler matched at all, the context's [`UnhandledFallback`] decides:
//!   an installed interactive hook may absorb the condition, otherwise
//!   `signal` fails with [`ConditionError::NoMatchingHandler`].
//!
//! # Example
//!
//! ```rust,ignore
//! use recoil_runtime::{handler_bind, signal, Handler};
//!
//! let result = handler_bind(vec![Handler::of(|c: &i32| {
//!     println!("saw {}", c);
//!     Ok(())
//! })], || {
//!     signal(3)?;
//!     Ok::<_, recoil_runtime::ConditionError>("after")
//! });
//! assert_eq!(result.unwrap(), "after");
//! ```

use std::any::{self, Any};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::case::{restart_case, RestartClause};
use crate::dynamic::{self, Fallback, Handlers};
use crate::error::{ConditionError, Result};
use crate::restart;
use crate::stack::Stack;
use crate::value::Value;

/// Tests whether a condition is of interest to a handler.
///
/// Matchers stand in for a type hierarchy: [`Matcher::of`] selects one
/// concrete type, [`Matcher::or`] unions matchers into a class, and
/// [`Matcher::when`] accepts an arbitrary predicate.
#[derive(Clone)]
pub struct Matcher {
    name: Arc<str>,
    test: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Matcher {
    /// Match conditions whose concrete type is `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            name: any::type_name::<T>().into(),
            test: Arc::new(Value::is::<T>),
        }
    }

    /// Match every condition.
    pub fn any() -> Self {
        Self {
            name: "any".into(),
            test: Arc::new(|_: &Value| true),
        }
    }

    /// Match conditions accepted by `predicate`.
    pub fn when<F>(name: impl Into<Arc<str>>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            test: Arc::new(predicate),
        }
    }

    /// Match conditions accepted by either matcher.
    pub fn or(self, other: Matcher) -> Self {
        let name = format!("{} | {}", self.name, other.name);
        let (left, right) = (self.test, other.test);
        Self {
            name: name.into(),
            test: Arc::new(move |value: &Value| left(value) || right(value)),
        }
    }

    /// Returns `true` if `condition` is accepted.
    pub fn matches(&self, condition: &Value) -> bool {
        (self.test)(condition)
    }

    /// Diagnostic name of the matcher.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.name).finish()
    }
}

type Action = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

/// A matcher paired with the action run for matching conditions.
#[derive(Clone)]
pub struct Handler {
    matcher: Matcher,
    action: Action,
}

impl Handler {
    /// Create a handler from a matcher and an action over the raw condition.
    pub fn new<F>(matcher: Matcher, action: F) -> Self
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            matcher,
            action: Arc::new(action),
        }
    }

    /// Create a handler for conditions of type `T`.
    pub fn of<T, F>(action: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(Matcher::of::<T>(), move |condition| {
            match condition.downcast_ref::<T>() {
                Some(condition) => action(condition),
                None => Ok(()),
            }
        })
    }

    /// The handler's matcher.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Returns `true` if this handler applies to `condition`.
    pub fn matches(&self, condition: &Value) -> bool {
        self.matcher.matches(condition)
    }

    /// Run the handler's action.
    pub fn call(&self, condition: &Value) -> Result<()> {
        (self.action)(condition)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("matcher", &self.matcher.name)
            .finish()
    }
}

/// Handlers bound together by one [`handler_bind`] call, in declaration order.
pub(crate) type HandlerFrame = Arc<[Handler]>;

/// What happens to a condition no handler matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledFallback {
    /// Fail with [`ConditionError::NoMatchingHandler`].
    #[default]
    Raise,
    /// Hand the condition to the installed interactive hook, if any.
    Interactive,
}

impl UnhandledFallback {
    /// Parse a fallback mode from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "raise" | "error" => Some(UnhandledFallback::Raise),
            "interactive" | "debug" | "debugger" => Some(UnhandledFallback::Interactive),
            _ => None,
        }
    }

    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnhandledFallback::Raise => "raise",
            UnhandledFallback::Interactive => "interactive",
        }
    }
}

/// Set the current context's fallback mode, returning the previous one.
pub fn set_unhandled_fallback(mode: UnhandledFallback) -> UnhandledFallback {
    tracing::trace!(mode = mode.as_str(), "unhandled fallback set");
    dynamic::set::<Fallback>(mode)
}

/// The current context's fallback mode.
pub fn unhandled_fallback() -> UnhandledFallback {
    dynamic::current::<Fallback>()
}

/// Hook invoked for unhandled conditions in [`UnhandledFallback::Interactive`] mode.
pub type InteractiveHook = dyn Fn(&Value) -> Result<()> + Send + Sync;

/// Process-wide interactive hook.
static INTERACTIVE_HOOK: OnceLock<RwLock<Option<Arc<InteractiveHook>>>> = OnceLock::new();

fn interactive_hook_slot() -> &'static RwLock<Option<Arc<InteractiveHook>>> {
    INTERACTIVE_HOOK.get_or_init(|| RwLock::new(None))
}

/// Install the process-wide interactive hook, replacing any previous one.
///
/// The hook runs at the signal site with every restart still visible, so it
/// can recover by invoking one. Returning `Ok` absorbs the condition.
pub fn set_interactive_hook<F>(hook: F)
where
    F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
{
    *interactive_hook_slot().write() = Some(Arc::new(hook));
}

/// Remove the interactive hook.
pub fn clear_interactive_hook() {
    *interactive_hook_slot().write() = None;
}

/// Returns `true` if an interactive hook is installed.
pub fn has_interactive_hook() -> bool {
    interactive_hook_slot().read().is_some()
}

/// Run `body` with `handlers` pushed as a new innermost frame.
pub fn handler_bind<I, F, R>(handlers: I, body: F) -> R
where
    I: IntoIterator<Item = Handler>,
    F: FnOnce() -> R,
{
    let frame: HandlerFrame = handlers.into_iter().collect();
    let stack = dynamic::current::<Handlers>().push(frame);
    tracing::trace!(depth = stack.len(), "handler frame bound");
    dynamic::with_bound::<Handlers, _, _>(stack, body)
}

/// Run every handler in `frame` that matches `condition`.
///
/// Returns whether any handler matched.
fn dispatch_frame(frame: &[Handler], condition: &Value) -> Result<bool> {
    let mut matched = false;
    for handler in frame.iter().filter(|handler| handler.matches(condition)) {
        matched = true;
        handler.call(condition)?;
    }
    Ok(matched)
}

/// Walk the handler stack for `condition`, returning whether anything matched.
fn dispatch(condition: &Value) -> Result<bool> {
    let mut stack: Stack<HandlerFrame> = dynamic::current::<Handlers>();
    tracing::trace!(condition = ?condition, frames = stack.len(), "signal");

    let mut matched = false;
    while let Some((frame, tail)) = stack.uncons() {
        let (frame, tail) = (frame.clone(), tail.clone());
        matched |= dynamic::with_bound::<Handlers, _, _>(tail.clone(), || {
            dispatch_frame(&frame, condition)
        })?;
        stack = tail;
    }
    Ok(matched)
}

/// Apply the context's fallback to a condition nothing dealt with.
fn unhandled(condition: Value) -> Result<()> {
    tracing::debug!(condition = ?condition, "condition unhandled");

    if unhandled_fallback() == UnhandledFallback::Interactive {
        let hook = interactive_hook_slot().read().clone();
        if let Some(hook) = hook {
            tracing::debug!(condition = ?condition, "entering interactive fallback");
            return dynamic::with_bound::<Handlers, _, _>(Stack::new(), || hook(&condition));
        }
    }

    Err(ConditionError::NoMatchingHandler(condition))
}

/// Signal a condition to every dynamically enclosing handler.
///
/// Returns `Ok(())` once the dispatch ran to completion and at least one
/// handler matched. Does not return at all if a handler escaped.
pub fn signal<C>(condition: C) -> Result<()>
where
    C: Any + fmt::Debug + Send + Sync,
{
    let condition = Value::new(condition);
    if dispatch(&condition)? {
        Ok(())
    } else {
        unhandled(condition)
    }
}

/// Signal a condition that must not be ignored.
///
/// Like [`signal`], but a dispatch that completes without any handler
/// transferring control is unhandled even if handlers ran. Only an
/// interactive fallback can make this return `Ok`.
pub fn raise<C>(condition: C) -> Result<()>
where
    C: Any + fmt::Debug + Send + Sync,
{
    let condition = Value::new(condition);
    dispatch(&condition)?;
    unhandled(condition)
}

/// Signal a warning.
///
/// A [`restart::MUFFLE_WARNING`] restart is visible to handlers; invoking it
/// silences the warning. If no handler transfers control, the warning is
/// logged and `warn` returns normally.
pub fn warn<C>(condition: C) -> Result<()>
where
    C: Any + fmt::Debug + Send + Sync,
{
    let condition = Value::new(condition);
    let muffled = restart_case(
        || dispatch(&condition).map(|_| false),
        vec![RestartClause::new(restart::MUFFLE_WARNING, |_| Ok(true))],
    )?;

    if !muffled {
        tracing::warn!(condition = ?condition, "warning");
    }
    Ok(())
}
