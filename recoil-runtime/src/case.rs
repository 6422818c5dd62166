//! Case Combinators
//!
//! [`handler_case`] and [`restart_case`] give the familiar "catch" shape on
//! top of the raw primitives: the first matching clause wins, and by the time
//! it runs the stack has already been unwound back to the combinator.
//!
//! Both are built only from [`crate::escape`], [`crate::handler`] and
//! [`crate::restart`]. Each call creates a fresh tag, binds one internal
//! handler (or restart) per clause that escapes to the tag with its clause
//! index and payload, and runs the selected clause after the escape lands.
//!
//! ```rust,ignore
//! use recoil_runtime::case::{handler_case, HandlerClause};
//! use recoil_runtime::{signal, Matcher};
//!
//! let outcome = handler_case(
//!     || { signal(3.0_f64).ok(); "finished" },
//!     vec![
//!         HandlerClause::of(|n: &i64| if *n > 0 { "int" } else { "non-positive int" }),
//!         HandlerClause::new(Matcher::of::<f64>(), |_| "float"),
//!     ],
//! );
//! assert_eq!(outcome, "float");
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::escape::{catch, escape, Tag};
use crate::handler::{handler_bind, Handler, Matcher};
use crate::restart::{restart_bind, Restart};
use crate::value::Value;

/// One clause of a [`handler_case`].
pub struct HandlerClause<'a, R> {
    matcher: Matcher,
    action: Box<dyn FnOnce(Value) -> R + 'a>,
}

impl<'a, R> HandlerClause<'a, R> {
    /// A clause for conditions accepted by `matcher`.
    pub fn new<F>(matcher: Matcher, action: F) -> Self
    where
        F: FnOnce(Value) -> R + 'a,
    {
        Self {
            matcher,
            action: Box::new(action),
        }
    }

    /// A clause for conditions of type `T`, receiving the typed condition.
    pub fn of<T, F>(action: F) -> Self
    where
        T: Any,
        F: FnOnce(&T) -> R + 'a,
    {
        Self::new(Matcher::of::<T>(), move |condition: Value| {
            match condition.downcast_ref::<T>() {
                Some(typed) => action(typed),
                None => unreachable!("clause matcher admits only {}", std::any::type_name::<T>()),
            }
        })
    }
}

impl<R> fmt::Debug for HandlerClause<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerClause")
            .field("matcher", &self.matcher)
            .finish()
    }
}

/// One clause of a [`restart_case`].
pub struct RestartClause<'a, R> {
    name: Arc<str>,
    action: Box<dyn FnOnce(Vec<Value>) -> R + 'a>,
}

impl<'a, R> RestartClause<'a, R> {
    /// A clause offering a restart called `name`.
    pub fn new<F>(name: impl Into<Arc<str>>, action: F) -> Self
    where
        F: FnOnce(Vec<Value>) -> R + 'a,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    /// The restart name this clause offers.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<R> fmt::Debug for RestartClause<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartClause")
            .field("name", &self.name)
            .finish()
    }
}

/// Evaluate `body`; if a condition matching one of `clauses` is signalled,
/// unwind to here and return the first matching clause applied to it.
pub fn handler_case<'a, R, F>(body: F, mut clauses: Vec<HandlerClause<'a, R>>) -> R
where
    F: FnOnce() -> R,
{
    let tag: Tag<(usize, Value)> = Tag::named("handler-case");
    let handlers: Vec<Handler> = clauses
        .iter()
        .enumerate()
        .map(|(index, clause)| {
            let tag = tag.clone();
            Handler::new(clause.matcher.clone(), move |condition| {
                escape(&tag, (index, condition.clone()))
            })
        })
        .collect();

    match catch(&tag, || handler_bind(handlers, body)) {
        Ok(value) => value,
        Err((index, condition)) => {
            tracing::trace!(clause = index, condition = ?condition, "handler-case clause selected");
            let clause = clauses.swap_remove(index);
            (clause.action)(condition)
        }
    }
}

/// Evaluate `body` with one restart per clause visible; if one is invoked,
/// unwind to here and return its clause applied to the invocation arguments.
pub fn restart_case<'a, R, F>(body: F, mut clauses: Vec<RestartClause<'a, R>>) -> R
where
    F: FnOnce() -> R,
{
    let tag: Tag<(usize, Vec<Value>)> = Tag::named("restart-case");
    let restarts: Vec<Restart> = clauses
        .iter()
        .enumerate()
        .map(|(index, clause)| {
            let tag = tag.clone();
            Restart::new(clause.name.clone(), move |args| escape(&tag, (index, args.to_vec())))
        })
        .collect();

    match catch(&tag, || restart_bind(restarts, body)) {
        Ok(value) => value,
        Err((index, args)) => {
            tracing::trace!(clause = index, args = args.len(), "restart-case clause selected");
            let clause = clauses.swap_remove(index);
            (clause.action)(args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic;
    use crate::handler::signal;
    use crate::restart::{find_restart, invoke_restart};
    use parking_lot::Mutex;

    fn number() -> Matcher {
        Matcher::of::<i64>().or(Matcher::of::<f64>())
    }

    #[test]
    fn test_handler_case_returns_body_value() {
        let result = handler_case(|| 10, vec![HandlerClause::of(|_: &i64| 0)]);
        assert_eq!(result, 10);
    }

    #[test]
    fn test_handler_case_first_matching_clause_wins() {
        let any_ran = Arc::new(Mutex::new(false));
        let flag = any_ran.clone();

        let result = handler_case(
            || {
                let _ = signal(3.0_f64);
                "body finished".to_string()
            },
            vec![
                HandlerClause::of(|n: &i64| format!("integer {}", n)),
                HandlerClause::new(number(), |c| format!("number {:?}", c)),
                HandlerClause::new(Matcher::any(), move |_| {
                    *flag.lock() = true;
                    "any".to_string()
                }),
            ],
        );

        assert_eq!(result, "number 3.0");
        assert!(!*any_ran.lock());
    }

    #[test]
    fn test_handler_case_unwinds_body() {
        let depth = dynamic::handler_depth();
        let after_signal = Arc::new(Mutex::new(false));
        let marker = after_signal.clone();

        let result = handler_case(
            move || {
                let _ = signal(7_i64);
                *marker.lock() = true;
                0
            },
            vec![HandlerClause::of(|n: &i64| *n * 2)],
        );

        assert_eq!(result, 14);
        assert!(!*after_signal.lock());
        assert_eq!(dynamic::handler_depth(), depth);
    }

    #[test]
    fn test_handler_case_ignores_unmatched_conditions() {
        let result = handler_case(
            || signal("not a number").is_err(),
            vec![HandlerClause::new(number(), |_| false)],
        );
        assert!(result);
    }

    #[test]
    fn test_nested_handler_cases() {
        let result = handler_case(
            || {
                handler_case(
                    || {
                        let _ = signal(1_i64);
                        "inner body"
                    },
                    vec![HandlerClause::of(|_: &String| "inner clause")],
                )
            },
            vec![HandlerClause::of(|_: &i64| "outer clause")],
        );
        assert_eq!(result, "outer clause");
    }

    #[test]
    fn test_clause_may_borrow_locals() {
        let prefix = String::from("caught");
        let result = handler_case(
            || {
                let _ = signal(5_i64);
                String::new()
            },
            vec![HandlerClause::of(|n: &i64| format!("{} {}", prefix, n))],
        );
        assert_eq!(result, "caught 5");
    }

    #[test]
    fn test_restart_case_returns_body_value() {
        let result = restart_case(|| "untouched", vec![RestartClause::new("skip", |_| "skipped")]);
        assert_eq!(result, "untouched");
    }

    #[test]
    fn test_restart_case_receives_arguments() {
        let result = restart_case(
            || {
                let restart = find_restart("use-value").unwrap();
                let _ = invoke_restart(&restart, &[Value::new(41_i64)]);
                0
            },
            vec![
                RestartClause::new("skip", |_| -1),
                RestartClause::new("use-value", |args: Vec<Value>| {
                    args[0].downcast_ref::<i64>().copied().unwrap_or_default() + 1
                }),
            ],
        );
        assert_eq!(result, 42);
        assert!(find_restart("use-value").is_none());
    }

    #[test]
    fn test_restart_case_from_handler() {
        let result = restart_case(
            || {
                handler_bind(
                    vec![Handler::of(|_: &i64| {
                        let retry = find_restart("retry").unwrap();
                        invoke_restart(&retry, &[])?;
                        Ok(())
                    })],
                    || {
                        let _ = signal(0_i64);
                        "not retried"
                    },
                )
            },
            vec![RestartClause::new("retry", |_| "retried")],
        );
        assert_eq!(result, "retried");
    }
}
