//! Dynamic Values
//!
//! Conditions and restart arguments are arbitrary Rust values. They travel
//! through the runtime as [`Value`], a reference-counted, type-erased handle
//! that can be cloned cheaply and sent across threads.
//!
//! No base trait is required of a condition: any `'static` type that is
//! `Debug + Send + Sync` can be signalled, and handlers select conditions by
//! testing the concrete type (see [`crate::handler::Matcher`]).

use std::any::{self, Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Object-safe view of a value stored in a [`Value`].
trait Datum: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + fmt::Debug + Send + Sync> Datum for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A type-erased, shareable value.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Datum>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a value.
    ///
    /// Wrapping something that is already a `Value` returns it unchanged, so
    /// generic entry points like [`crate::signal`] never double-box.
    pub fn new<T: Any + fmt::Debug + Send + Sync>(value: T) -> Self {
        let mut slot = Some(value);
        if let Some(existing) = (&mut slot as &mut dyn Any).downcast_mut::<Option<Value>>() {
            if let Some(value) = existing.take() {
                return value;
            }
        }
        match slot {
            Some(value) => Self {
                inner: Arc::new(value),
                type_name: any::type_name::<T>(),
            },
            None => unreachable!("slot is only emptied for `Value` inputs"),
        }
    }

    /// Borrow the contents as `T` if that is the stored type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        Datum::as_any(&*self.inner).downcast_ref::<T>()
    }

    /// Returns `true` if the stored value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        Datum::as_any(&*self.inner).is::<T>()
    }

    /// [`TypeId`] of the stored value.
    pub fn type_id(&self) -> TypeId {
        Any::type_id(Datum::as_any(&*self.inner))
    }

    /// Name of the stored type, as reported by [`std::any::type_name`].
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

/// Build a `Vec<Value>` from a list of expressions.
///
/// ```rust,ignore
/// let args = values![6_i64, "fallback"];
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::new($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Overflow {
        limit: u32,
    }

    #[test]
    fn test_downcast() {
        let value = Value::new(Overflow { limit: 8 });
        assert!(value.is::<Overflow>());
        assert!(!value.is::<u32>());
        assert_eq!(value.downcast_ref::<Overflow>(), Some(&Overflow { limit: 8 }));
        assert_eq!(value.type_id(), TypeId::of::<Overflow>());
    }

    #[test]
    fn test_wrapping_a_value_is_identity() {
        let original = Value::new(42_i32);
        let rewrapped = Value::new(original.clone());
        assert!(rewrapped.ptr_eq(&original));
        assert_eq!(rewrapped.downcast_ref::<i32>(), Some(&42));
    }

    #[test]
    fn test_debug_shows_inner_value() {
        let value = Value::new("disk full");
        assert_eq!(format!("{:?}", value), "\"disk full\"");
    }

    #[test]
    fn test_type_name() {
        let value = Value::new(3.5_f64);
        assert_eq!(value.type_name(), "f64");
    }

    #[test]
    fn test_values_macro() {
        let args = values![1_i64, "two"];
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].downcast_ref::<i64>(), Some(&1));
        assert_eq!(args[1].downcast_ref::<&str>(), Some(&"two"));
        assert!(values![].is_empty());
    }
}
