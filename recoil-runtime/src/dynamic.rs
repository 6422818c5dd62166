//! Context-Local Dynamic State
//!
//! Every execution context (an OS thread) owns its own handler stack, restart
//! stack, stack of active escape points and unhandled-condition fallback mode.
//! Nothing here is shared between contexts, so no locking is involved.
//!
//! # Scoped binding
//!
//! A binding is changed only through [`with_bound`], which installs a new value
//! for the dynamic extent of a closure and restores the previous value from a
//! guard's `Drop`. The guard runs on every exit path: normal return, an `Err`
//! propagated with `?`, and an escape unwinding through the frame. Nested
//! bindings therefore unwind innermost first.
//!
//! # New contexts
//!
//! A freshly spawned thread starts with empty stacks ([`PropagationMode::Isolated`]).
//! To let a child see the spawner's handlers and restarts, capture a
//! [`ContextSnapshot`] and enter it in the child, or use
//! [`spawn_with`]`(PropagationMode::Inherit, ..)`. After the snapshot is taken the
//! two contexts evolve independently.
//!
//! ```rust,ignore
//! use recoil_runtime::dynamic::{spawn_with, PropagationMode};
//!
//! let child = spawn_with(PropagationMode::Inherit, || {
//!     recoil_runtime::find_restart("retry").is_some()
//! });
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;
use std::thread;

use crate::escape::TagId;
use crate::handler::{HandlerFrame, UnhandledFallback};
use crate::restart::RestartFrame;
use crate::stack::Stack;

/// Per-context dynamic state.
#[derive(Debug, Clone)]
pub(crate) struct DynamicState {
    handlers: Stack<HandlerFrame>,
    restarts: Stack<RestartFrame>,
    escapes: Stack<TagId>,
    fallback: UnhandledFallback,
}

impl DynamicState {
    fn initial() -> Self {
        let fallback = crate::runtime_config()
            .map(|config| config.conditions.unhandled)
            .unwrap_or_default();

        Self {
            handlers: Stack::new(),
            restarts: Stack::new(),
            escapes: Stack::new(),
            fallback,
        }
    }
}

thread_local! {
    static DYNAMIC: RefCell<DynamicState> = RefCell::new(DynamicState::initial());
}

/// A dynamically bound slot of [`DynamicState`].
pub(crate) trait Slot {
    type Value: Clone;

    fn get(state: &DynamicState) -> Self::Value;

    fn replace(state: &mut DynamicState, value: Self::Value) -> Self::Value;
}

/// The handler stack.
pub(crate) struct Handlers;

/// The restart stack.
pub(crate) struct Restarts;

/// The stack of active escape points.
pub(crate) struct Escapes;

/// The unhandled-condition fallback mode.
pub(crate) struct Fallback;

impl Slot for Handlers {
    type Value = Stack<HandlerFrame>;

    fn get(state: &DynamicState) -> Self::Value {
        state.handlers.clone()
    }

    fn replace(state: &mut DynamicState, value: Self::Value) -> Self::Value {
        std::mem::replace(&mut state.handlers, value)
    }
}

impl Slot for Restarts {
    type Value = Stack<RestartFrame>;

    fn get(state: &DynamicState) -> Self::Value {
        state.restarts.clone()
    }

    fn replace(state: &mut DynamicState, value: Self::Value) -> Self::Value {
        std::mem::replace(&mut state.restarts, value)
    }
}

impl Slot for Escapes {
    type Value = Stack<TagId>;

    fn get(state: &DynamicState) -> Self::Value {
        state.escapes.clone()
    }

    fn replace(state: &mut DynamicState, value: Self::Value) -> Self::Value {
        std::mem::replace(&mut state.escapes, value)
    }
}

impl Slot for Fallback {
    type Value = UnhandledFallback;

    fn get(state: &DynamicState) -> Self::Value {
        state.fallback
    }

    fn replace(state: &mut DynamicState, value: Self::Value) -> Self::Value {
        std::mem::replace(&mut state.fallback, value)
    }
}

/// Read the current value of a slot.
pub(crate) fn current<S: Slot>() -> S::Value {
    DYNAMIC.with(|cell| S::get(&cell.borrow()))
}

/// Overwrite a slot without scoping, returning the old value.
pub(crate) fn set<S: Slot>(value: S::Value) -> S::Value {
    DYNAMIC.with(|cell| S::replace(&mut cell.borrow_mut(), value))
}

/// Restores a slot's previous value when dropped.
struct Restore<S: Slot> {
    previous: Option<S::Value>,
    _slot: PhantomData<S>,
}

impl<S: Slot> Drop for Restore<S> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            // The thread-local may already be gone during thread teardown.
            let _ = DYNAMIC.try_with(|cell| {
                S::replace(&mut cell.borrow_mut(), previous);
            });
        }
    }
}

/// Run `body` with slot `S` bound to `value`, restoring the old value on exit.
pub(crate) fn with_bound<S, F, R>(value: S::Value, body: F) -> R
where
    S: Slot,
    F: FnOnce() -> R,
{
    let _restore = Restore::<S> {
        previous: Some(set::<S>(value)),
        _slot: PhantomData,
    };
    body()
}

/// Number of handler frames visible in the current context.
pub fn handler_depth() -> usize {
    DYNAMIC.with(|cell| cell.borrow().handlers.len())
}

/// Number of restart frames visible in the current context.
pub fn restart_depth() -> usize {
    DYNAMIC.with(|cell| cell.borrow().restarts.len())
}

/// Number of escape points active in the current context.
pub fn escape_depth() -> usize {
    DYNAMIC.with(|cell| cell.borrow().escapes.len())
}

/// How a spawned context relates to its spawner's dynamic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropagationMode {
    /// Start with empty handler and restart stacks.
    #[default]
    Isolated,
    /// Start from a snapshot of the spawner's handlers, restarts and fallback mode.
    Inherit,
}

impl PropagationMode {
    /// Parse a propagation mode from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "isolated" | "none" | "empty" => Some(PropagationMode::Isolated),
            "inherit" | "inherited" | "snapshot" => Some(PropagationMode::Inherit),
            _ => None,
        }
    }

    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationMode::Isolated => "isolated",
            PropagationMode::Inherit => "inherit",
        }
    }
}

/// A frozen copy of a context's handlers, restarts and fallback mode.
///
/// Escape points are deliberately left out: a catch point lives on one call
/// stack and can never be reached from another context.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    handlers: Stack<HandlerFrame>,
    restarts: Stack<RestartFrame>,
    fallback: UnhandledFallback,
}

impl ContextSnapshot {
    /// Capture the current context's dynamic state.
    pub fn capture() -> Self {
        DYNAMIC.with(|cell| {
            let state = cell.borrow();
            Self {
                handlers: state.handlers.clone(),
                restarts: state.restarts.clone(),
                fallback: state.fallback,
            }
        })
    }

    /// Number of handler frames in the snapshot.
    pub fn handler_depth(&self) -> usize {
        self.handlers.len()
    }

    /// Number of restart frames in the snapshot.
    pub fn restart_depth(&self) -> usize {
        self.restarts.len()
    }

    /// Run `body` with this snapshot installed as the visible dynamic state.
    pub fn enter<F, R>(self, body: F) -> R
    where
        F: FnOnce() -> R,
    {
        let ContextSnapshot {
            handlers,
            restarts,
            fallback,
        } = self;

        with_bound::<Handlers, _, _>(handlers, || {
            with_bound::<Restarts, _, _>(restarts, || with_bound::<Fallback, _, _>(fallback, body))
        })
    }
}

/// Spawn a thread using the configured default [`PropagationMode`].
pub fn spawn<F, T>(f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mode = crate::runtime_config()
        .map(|config| config.context.propagation)
        .unwrap_or_default();
    spawn_with(mode, f)
}

/// Spawn a thread whose dynamic state follows `mode`.
pub fn spawn_with<F, T>(mode: PropagationMode, f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tracing::trace!(mode = mode.as_str(), "spawning context");
    match mode {
        PropagationMode::Isolated => thread::spawn(f),
        PropagationMode::Inherit => {
            let snapshot = ContextSnapshot::capture();
            thread::spawn(move || snapshot.enter(f))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_bound_restores_on_return() {
        let before = current::<Escapes>();
        let inner = with_bound::<Escapes, _, _>(before.push(TagId::fresh()), || escape_depth());
        assert_eq!(inner, before.len() + 1);
        assert!(current::<Escapes>().ptr_eq(&before));
    }

    #[test]
    fn test_with_bound_restores_on_panic() {
        let before = current::<Escapes>();
        let result = std::panic::catch_unwind(|| {
            with_bound::<Escapes, _, _>(before.push(TagId::fresh()), || {
                panic!("boom");
            })
        });
        assert!(result.is_err());
        assert!(current::<Escapes>().ptr_eq(&before));
    }

    #[test]
    fn test_nested_bindings_restore_in_order() {
        let base = current::<Escapes>();
        with_bound::<Escapes, _, _>(base.push(TagId::fresh()), || {
            let outer = current::<Escapes>();
            with_bound::<Escapes, _, _>(outer.push(TagId::fresh()), || {
                assert_eq!(escape_depth(), base.len() + 2);
            });
            assert!(current::<Escapes>().ptr_eq(&outer));
        });
        assert!(current::<Escapes>().ptr_eq(&base));
    }

    #[test]
    fn test_fallback_slot_is_scoped() {
        let before = current::<Fallback>();
        with_bound::<Fallback, _, _>(UnhandledFallback::Interactive, || {
            assert_eq!(current::<Fallback>(), UnhandledFallback::Interactive);
        });
        assert_eq!(current::<Fallback>(), before);
    }

    #[test]
    fn test_fresh_thread_starts_empty() {
        let depths = thread::spawn(|| (handler_depth(), restart_depth(), escape_depth()))
            .join()
            .unwrap();
        assert_eq!(depths, (0, 0, 0));
    }

    #[test]
    fn test_propagation_mode_from_str() {
        assert_eq!(PropagationMode::from_str("isolated"), Some(PropagationMode::Isolated));
        assert_eq!(PropagationMode::from_str("INHERIT"), Some(PropagationMode::Inherit));
        assert_eq!(PropagationMode::from_str("sideways"), None);
        assert_eq!(PropagationMode::default(), PropagationMode::Isolated);
    }
}
