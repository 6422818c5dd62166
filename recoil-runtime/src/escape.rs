//! Non-Local Escapes
//!
//! A tagged, multi-level early return. [`establish`] sets up a catch point for
//! a [`Tag`]; an [`escape`] to that tag from anywhere inside the dynamic extent
//! of the body (any call depth, through any number of handler and restart
//! frames) unwinds straight back to it and becomes its result.
//!
//! # Mechanism
//!
//! An escape unwinds the call stack with [`std::panic::resume_unwind`], which
//! skips the panic hook, carrying a private payload that names the target tag.
//! Each catch point inspects payloads passing through it, keeps its own and
//! re-raises everything else untouched, so ordinary panics are never swallowed.
//! Scoped bindings restore themselves from `Drop` while the unwind passes.
//!
//! Escaping requires unwinding; it does not work under `panic = "abort"`.
//!
//! An escape to a tag that has no active catch point in the current context is
//! a structural bug. It panics with an [`UnmatchedEscape`] payload instead of
//! unwinding silently to nowhere.
//!
//! # Example
//!
//! ```rust,ignore
//! use recoil_runtime::escape::{establish, escape, Tag};
//!
//! let out = Tag::<i32>::named("out");
//! let result = establish(&out, || {
//!     deep_computation(|| escape(&out, 7));
//!     0
//! });
//! assert_eq!(result, 7);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::dynamic::{self, Escapes};
use crate::error::UnmatchedEscape;

/// Identity of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(u64);

/// Global tag ID counter.
static NEXT_TAG_ID: AtomicU64 = AtomicU64::new(1);

impl TagId {
    /// Allocate a new unique tag identity.
    pub(crate) fn fresh() -> Self {
        TagId(NEXT_TAG_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Identifies a catch point and the type of value escaping to it.
///
/// Every call to [`Tag::new`] or [`Tag::named`] yields a distinct tag; clones
/// share the identity. The name only serves diagnostics.
pub struct Tag<T> {
    id: TagId,
    name: Option<Arc<str>>,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> Tag<T> {
    /// Create an anonymous tag.
    pub fn new() -> Self {
        Self {
            id: TagId::fresh(),
            name: None,
            _marker: PhantomData,
        }
    }

    /// Create a tag with a diagnostic name.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: TagId::fresh(),
            name: Some(name.into()),
            _marker: PhantomData,
        }
    }

    /// The tag's identity.
    pub fn id(&self) -> TagId {
        self.id
    }

    /// The tag's diagnostic name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<T> Clone for Tag<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Tag<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PartialEq for Tag<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Tag<T> {}

impl<T> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tag")
            .field("id", &self.id.0)
            .field("name", &self.name)
            .finish()
    }
}

impl<T> fmt::Display for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "tag #{} ({})", self.id.0, name),
            None => write!(f, "tag #{}", self.id.0),
        }
    }
}

/// Unwind payload of an escape in flight.
struct Escaped {
    tag: TagId,
    value: Box<dyn Any + Send>,
}

/// Returns `true` if an escape to `tag` would be caught in the current context.
pub fn is_active<T>(tag: &Tag<T>) -> bool {
    dynamic::current::<Escapes>().iter().any(|id| *id == tag.id)
}

/// Run `body` as a catch point for `tag`.
///
/// Returns `Ok` with the body's own result, or `Err` with the value carried by
/// an escape to `tag`. Escapes to other tags and ordinary panics pass through.
pub fn catch<T, R, F>(tag: &Tag<T>, body: F) -> Result<R, T>
where
    T: Send + 'static,
    F: FnOnce() -> R,
{
    let points = dynamic::current::<Escapes>().push(tag.id);
    let outcome = dynamic::with_bound::<Escapes, _, _>(points, || {
        panic::catch_unwind(AssertUnwindSafe(body))
    });

    match outcome {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<Escaped>() {
            Ok(escaped) if escaped.tag == tag.id => match escaped.value.downcast::<T>() {
                Ok(value) => {
                    tracing::trace!(tag = %tag, "escape caught");
                    Err(*value)
                }
                Err(_) => unreachable!("escape payload type is fixed by its tag"),
            },
            Ok(escaped) => panic::resume_unwind(escaped),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

/// Run `body` as a catch point for `tag`, yielding either its result or the
/// value of an escape to `tag`.
pub fn establish<T, F>(tag: &Tag<T>, body: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T,
{
    match catch(tag, body) {
        Ok(value) | Err(value) => value,
    }
}

/// Establish a fresh anonymous tag and hand it to `body`.
pub fn block<T, F>(body: F) -> T
where
    T: Send + 'static,
    F: FnOnce(&Tag<T>) -> T,
{
    let tag = Tag::new();
    establish(&tag, || body(&tag))
}

/// Transfer control and `value` to the innermost active catch point for `tag`.
///
/// # Panics
///
/// Panics with an [`UnmatchedEscape`] payload if `tag` has no active catch
/// point in the current context.
pub fn escape<T>(tag: &Tag<T>, value: T) -> !
where
    T: Send + 'static,
{
    if !is_active(tag) {
        tracing::debug!(tag = %tag, "unmatched escape");
        panic::panic_any(UnmatchedEscape {
            tag: tag.to_string(),
        });
    }

    tracing::trace!(tag = %tag, "escaping");
    panic::resume_unwind(Box::new(Escaped {
        tag: tag.id,
        value: Box::new(value),
    }))
}

/// Whether the runtime panic hook is installed.
static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install a panic hook that reports [`UnmatchedEscape`] panics legibly.
///
/// Other panics are forwarded to the hook that was active before. Calling
/// this more than once has no further effect.
pub fn install_panic_hook() {
    if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        match info.payload().downcast_ref::<UnmatchedEscape>() {
            Some(unmatched) => {
                let location = info
                    .location()
                    .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
                    .unwrap_or_default();
                let thread = std::thread::current();
                eprintln!(
                    "thread '{}' hit a fatal escape{}: {}",
                    thread.name().unwrap_or("<unnamed>"),
                    location,
                    unmatched
                );
            }
            None => previous(info),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_round_trip() {
        let tag = Tag::named("out");
        let result = establish(&tag, || escape(&tag, 42));
        assert_eq!(result, 42);
    }

    #[test]
    fn test_body_value_without_escape() {
        let tag = Tag::<&str>::new();
        assert_eq!(establish(&tag, || "done"), "done");
    }

    #[test]
    fn test_catch_separates_return_and_escape() {
        let tag = Tag::<u8>::new();
        let returned: Result<&str, u8> = catch(&tag, || "normal");
        assert_eq!(returned, Ok("normal"));

        let escaped: Result<&str, u8> = catch(&tag, || escape(&tag, 9));
        assert_eq!(escaped, Err(9));
    }

    #[test]
    fn test_inner_establish_with_same_tag_wins() {
        let tag = Tag::<i32>::new();
        let outer = establish(&tag, || {
            let inner = establish(&tag, || escape(&tag, 1));
            inner + 10
        });
        assert_eq!(outer, 11);
    }

    #[test]
    fn test_non_matching_tag_passes_through() {
        let outer = Tag::<&str>::named("outer");
        let inner = Tag::<&str>::named("inner");

        let result = establish(&outer, || {
            let _ = establish(&inner, || escape(&outer, "from inside"));
            "inner returned"
        });
        assert_eq!(result, "from inside");
    }

    #[test]
    fn test_escape_points_restored_after_escape() {
        let depth = dynamic::escape_depth();
        let tag = Tag::<()>::new();
        establish(&tag, || {
            let nested = Tag::<()>::new();
            establish(&nested, || escape(&tag, ()));
        });
        assert_eq!(dynamic::escape_depth(), depth);
        assert!(!is_active(&tag));
    }

    #[test]
    fn test_unmatched_escape_panics_with_payload() {
        let tag = Tag::<i32>::named("stale");
        let payload = panic::catch_unwind(|| escape(&tag, 1)).unwrap_err();
        let unmatched = payload.downcast_ref::<UnmatchedEscape>().unwrap();
        assert!(unmatched.tag.contains("stale"));
    }

    #[test]
    fn test_escape_after_extent_is_unmatched() {
        let tag = Tag::<i32>::new();
        establish(&tag, || 0);
        assert!(!is_active(&tag));
        let payload = panic::catch_unwind(|| escape(&tag, 5)).unwrap_err();
        assert!(payload.is::<UnmatchedEscape>());
    }

    #[test]
    fn test_ordinary_panic_passes_through() {
        let tag = Tag::<i32>::new();
        let payload = panic::catch_unwind(|| {
            establish(&tag, || -> i32 { panic!("real failure") })
        })
        .unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"real failure"));
    }

    #[test]
    fn test_block() {
        let result = block(|tag: &Tag<i32>| {
            for i in 0.. {
                if i == 3 {
                    escape(tag, i * 2);
                }
            }
            -1
        });
        assert_eq!(result, 6);
    }

    #[test]
    fn test_tag_identity() {
        let a = Tag::<i32>::named("same");
        let b = Tag::<i32>::named("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.name(), Some("same"));
        assert!(a.to_string().contains("same"));
    }
}
