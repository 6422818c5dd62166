//! Property-based tests for the condition runtime.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use recoil_runtime::{
    catch, establish, escape, find_restart, handler_bind, handler_depth, restart_bind,
    restart_depth, signal, Handler, Restart, Stack, Tag, Value,
};

/// Strategy for generating a nesting plan: each entry is the number of
/// handlers bound by one frame.
fn frame_sizes() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..4, 0..8)
}

/// Bind one handler frame per entry of `sizes`, outermost first, then run `body`.
fn nest<R>(sizes: &[usize], log: &Arc<Mutex<Vec<(usize, usize)>>>, body: impl FnOnce() -> R) -> R {
    match sizes.split_first() {
        None => body(),
        Some((&size, rest)) => {
            let depth = sizes.len();
            let handlers = (0..size).map(|index| {
                let log = log.clone();
                Handler::of(move |_: &u64| {
                    log.lock().push((depth, index));
                    Ok(())
                })
            });
            handler_bind(handlers, || nest(rest, log, body))
        }
    }
}

proptest! {
    /// Escape round trip: establish returns the escaped value
    #[test]
    fn escape_roundtrip(v in any::<i64>()) {
        let tag = Tag::new();
        prop_assert_eq!(establish(&tag, || escape(&tag, v)), v);
    }

    /// Non-escaping body: establish returns the body's value
    #[test]
    fn establish_passes_body_value(v in any::<u32>()) {
        let tag = Tag::<u32>::new();
        prop_assert_eq!(establish(&tag, || v), v);
    }

    /// Escapes unwind any nesting depth of binds and restore every stack
    #[test]
    fn escape_restores_bindings(depth in 0usize..16, v in any::<u8>()) {
        let (handlers, restarts) = (handler_depth(), restart_depth());
        let tag = Tag::<u8>::new();

        fn descend(depth: usize, tag: &Tag<u8>, v: u8) -> u8 {
            if depth == 0 {
                escape(tag, v)
            } else if depth % 2 == 0 {
                handler_bind(Vec::new(), || descend(depth - 1, tag, v))
            } else {
                restart_bind(Vec::new(), || descend(depth - 1, tag, v))
            }
        }

        prop_assert_eq!(catch(&tag, || descend(depth, &tag, v)), Err(v));
        prop_assert_eq!(handler_depth(), handlers);
        prop_assert_eq!(restart_depth(), restarts);
    }

    /// Dispatch order: inner frames first, declaration order within a frame
    #[test]
    fn dispatch_order(sizes in frame_sizes()) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outcome = nest(&sizes, &log, || signal(7_u64));

        let expected: Vec<(usize, usize)> = sizes
            .iter()
            .enumerate()
            .rev()
            .flat_map(|(position, &size)| {
                let depth = sizes.len() - position;
                (0..size).map(move |index| (depth, index))
            })
            .collect();

        let recorded = log.lock().clone();
        prop_assert_eq!(outcome.is_ok(), !expected.is_empty());
        prop_assert_eq!(recorded, expected);
    }

    /// Restart lookup: the innermost restart with a name wins
    #[test]
    fn innermost_restart_wins(values in prop::collection::vec(any::<i32>(), 1..8)) {
        fn bind_all(values: &[i32]) -> Option<i32> {
            match values.split_first() {
                None => find_restart("pick")
                    .and_then(|r| r.invoke(&[]).ok())
                    .and_then(|v| v.downcast_ref::<i32>().copied()),
                Some((&value, rest)) => restart_bind(
                    vec![Restart::new("pick", move |_| Ok(Value::new(value)))],
                    || bind_all(rest),
                ),
            }
        }

        prop_assert_eq!(bind_all(&values), values.last().copied());
    }

    /// Persistent stack: pushing never disturbs the original
    #[test]
    fn stack_push_shares_tail(items in prop::collection::vec(any::<u16>(), 0..64), extra in any::<u16>()) {
        let base = items.iter().fold(Stack::new(), |stack, item| stack.push(*item));
        let pushed = base.push(extra);

        prop_assert_eq!(base.len(), items.len());
        prop_assert_eq!(pushed.len(), items.len() + 1);
        prop_assert_eq!(pushed.peek(), Some(&extra));
        prop_assert!(pushed.tail().map_or(false, |tail| tail.ptr_eq(&base)));

        let listed: Vec<u16> = base.iter().copied().collect();
        let reversed: Vec<u16> = items.iter().rev().copied().collect();
        prop_assert_eq!(listed, reversed);
    }
}
