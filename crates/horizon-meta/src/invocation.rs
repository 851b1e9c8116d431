//! Deferred invocations for queued and blocking delivery.
//!
//! When a signal is delivered to a receiver in another context, the call is
//! captured as an [`Invocation`] holding owned copies of the arguments and is
//! pushed onto the receiver context's FIFO queue. The event loop of that
//! context later executes it.
//!
//! Blocking deliveries attach a [`CompletionHandle`]. The emitter waits on the
//! matching [`CompletionWaiter`]. If the invocation is discarded without
//! running (its receiver was destroyed, or the queue was dropped), the handle
//! still wakes the waiter and reports [`Completion::Dropped`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::object::ObjectId;
use crate::variant::Variant;

/// Global invocation counter, used for tracing.
static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// A slot closure connected directly to a signal.
pub type SlotCallback = Arc<dyn Fn(&[Variant]) + Send + Sync>;

/// What a queued invocation calls.
#[derive(Clone)]
pub enum InvocationTarget {
    /// A reflective method on a registered object, by absolute index.
    Method { receiver: ObjectId, index: usize },
    /// A closure.
    Callback(SlotCallback),
}

impl fmt::Debug for InvocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method { receiver, index } => f
                .debug_struct("Method")
                .field("receiver", receiver)
                .field("index", index)
                .finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// A deferred call with owned arguments.
pub struct Invocation {
    id: u64,
    target: InvocationTarget,
    args: Vec<Variant>,
    completion: Option<CompletionHandle>,
}

impl Invocation {
    pub fn new(target: InvocationTarget, args: Vec<Variant>) -> Self {
        Self {
            id: NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed),
            target,
            args,
            completion: None,
        }
    }

    /// An invocation that wakes `completion` once it has run or been dropped.
    pub fn with_completion(
        target: InvocationTarget,
        args: Vec<Variant>,
        completion: CompletionHandle,
    ) -> Self {
        let mut invocation = Self::new(target, args);
        invocation.completion = Some(completion);
        invocation
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &InvocationTarget {
        &self.target
    }

    pub fn args(&self) -> &[Variant] {
        &self.args
    }

    pub fn is_blocking(&self) -> bool {
        self.completion.is_some()
    }

    /// Mark the invocation as delivered, waking any blocked emitter.
    pub fn complete(mut self) {
        if let Some(completion) = self.completion.take() {
            completion.signal(Completion::Delivered);
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("args", &self.args.len())
            .field("blocking", &self.is_blocking())
            .finish()
    }
}

/// How a blocking invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The slot ran.
    Delivered,
    /// The invocation was discarded without running.
    Dropped,
}

/// Signals completion of a blocking invocation.
pub struct CompletionHandle {
    inner: Arc<CompletionState>,
    signalled: bool,
}

impl CompletionHandle {
    fn signal(mut self, completion: Completion) {
        self.notify(completion);
    }

    fn notify(&mut self, completion: Completion) {
        if self.signalled {
            return;
        }
        self.signalled = true;
        let mut done = self.inner.done.lock();
        *done = Some(completion);
        self.inner.condvar.notify_all();
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        self.notify(Completion::Dropped);
    }
}

/// A waiter for blocking on invocation completion.
pub struct CompletionWaiter {
    inner: Arc<CompletionState>,
}

impl CompletionWaiter {
    /// Block until the invocation has run or been dropped.
    ///
    /// Waiting from the receiver's own context deadlocks; the dispatcher
    /// rejects that case before queueing.
    pub fn wait(self) -> Completion {
        let mut done = self.inner.done.lock();
        loop {
            if let Some(completion) = *done {
                return completion;
            }
            self.inner.condvar.wait(&mut done);
        }
    }

    /// Wait with a timeout. Returns `None` if the timeout elapsed first.
    pub fn wait_timeout(self, timeout: Duration) -> Option<Completion> {
        let deadline = std::time::Instant::now() + timeout;
        let mut done = self.inner.done.lock();
        loop {
            if let Some(completion) = *done {
                return Some(completion);
            }
            if self.inner.condvar.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
    }
}

struct CompletionState {
    done: Mutex<Option<Completion>>,
    condvar: Condvar,
}

/// Create a completion handle/waiter pair for blocking invocations.
pub fn completion_pair() -> (CompletionHandle, CompletionWaiter) {
    let state = Arc::new(CompletionState {
        done: Mutex::new(None),
        condvar: Condvar::new(),
    });

    (
        CompletionHandle {
            inner: state.clone(),
            signalled: false,
        },
        CompletionWaiter { inner: state },
    )
}
