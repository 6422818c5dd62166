//! Persistent Stacks
//!
//! An immutable singly linked stack with `O(1)` push and structural sharing.
//! Handler frames, restart frames and active escape points are all kept on
//! stacks of this shape.
//!
//! # Design
//!
//! There is no pop. A caller that wants the stack "before" a push simply keeps
//! the value it pushed onto; the runtime uses exactly this to restore dynamic
//! bindings when a scope exits.
//!
//! ```rust,ignore
//! use recoil_runtime::stack::Stack;
//!
//! let base: Stack<i32> = Stack::new();
//! let one = base.push(1);
//! let two = one.push(2);
//!
//! assert_eq!(two.peek(), Some(&2));
//! assert_eq!(one.len(), 1);
//! assert!(base.is_empty());
//! ```

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

/// An immutable stack sharing its tail with every stack it was pushed from.
pub struct Stack<T> {
    head: Option<Arc<Node<T>>>,
    len: usize,
}

struct Node<T> {
    elem: T,
    next: Stack<T>,
}

impl<T> Stack<T> {
    /// Create an empty stack.
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Return a new stack with `elem` on top of `self`.
    ///
    /// `self` is left untouched and becomes the tail of the result.
    pub fn push(&self, elem: T) -> Self {
        Self {
            head: Some(Arc::new(Node {
                elem,
                next: self.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Returns `true` if the stack holds no elements.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Number of elements on the stack.
    pub fn len(&self) -> usize {
        self.len
    }

    /// The top element, if any.
    pub fn peek(&self) -> Option<&T> {
        self.head.as_ref().map(|node| &node.elem)
    }

    /// Everything below the top element.
    pub fn tail(&self) -> Option<&Stack<T>> {
        self.head.as_ref().map(|node| &node.next)
    }

    /// Split into the top element and the stack below it.
    pub fn uncons(&self) -> Option<(&T, &Stack<T>)> {
        self.head.as_ref().map(|node| (&node.elem, &node.next))
    }

    /// Iterate from the top of the stack downwards.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
            remaining: self.len,
        }
    }

    /// Returns `true` if both stacks share the same top node.
    pub fn ptr_eq(&self, other: &Stack<T>) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Stack<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// Long stacks would otherwise drop recursively, one frame per node.
impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        let mut head = self.head.take();
        while let Some(node) = head {
            match Arc::try_unwrap(node) {
                Ok(mut node) => head = node.next.head.take(),
                Err(_) => break,
            }
        }
    }
}

/// Iterator over a [`Stack`], top first.
pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.next.head.as_deref();
            self.remaining -= 1;
            &node.elem
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a Stack<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
