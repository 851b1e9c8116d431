//! Execution contexts.
//!
//! Every object is owned by exactly one [`ContextId`]. Slots of an object only
//! run on a thread currently bound to the object's context. A thread gets its
//! own context lazily, the first time [`ContextId::current`] is called on it.
//!
//! A thread may temporarily adopt another context with [`enter`], which is how
//! an event loop thread services a context created elsewhere.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_CONTEXT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// Identifies a single-threaded execution context.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a fresh context not yet bound to any thread.
    pub fn new() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The context of the calling thread, allocated on first use.
    pub fn current() -> Self {
        CURRENT_CONTEXT.with(|current| match current.get() {
            Some(id) => id,
            None => {
                let id = Self::new();
                current.set(Some(id));
                id
            }
        })
    }

    /// Whether the calling thread is bound to this context.
    pub fn is_current(self) -> bool {
        Self::current() == self
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// Restores the previous context binding when dropped.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<ContextId>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|current| current.set(self.previous));
    }
}

/// Bind the calling thread to `context` until the guard is dropped.
pub fn enter(context: ContextId) -> ContextGuard {
    let previous = CURRENT_CONTEXT.with(|current| current.replace(Some(context)));
    ContextGuard {
        previous,
        _not_send: PhantomData,
    }
}
