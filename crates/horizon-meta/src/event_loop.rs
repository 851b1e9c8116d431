//! Per-context invocation queues and the loop that drains them.
//!
//! Each [`ContextId`] owns one unbounded FIFO queue. Queued and blocking
//! deliveries targeting an object in that context are pushed onto it, and an
//! [`EventLoop`] running on a thread bound to the context pops and executes
//! them in order.
//!
//! A queue is created on first use and released when the last loop or
//! [`QuitHandle`] for its context is dropped with nothing left in it.
//! Invocations posted to a context that never runs a loop are kept until the
//! runtime itself is dropped.
//!
//! # Example
//!
//! ```
//! use horizon_meta::{EventLoop, Runtime};
//!
//! let runtime = Runtime::new();
//! let event_loop = EventLoop::new(&runtime);
//! assert_eq!(event_loop.process_pending(), 0);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};

use crate::context::{self, ContextGuard, ContextId};
use crate::invocation::Invocation;
use crate::logging::targets;
use crate::runtime::Runtime;

pub(crate) enum QueueItem {
    Invoke(Invocation),
    Quit,
}

/// FIFO of pending work for one context.
pub(crate) struct ContextQueue {
    sender: Sender<QueueItem>,
    receiver: Receiver<QueueItem>,
}

impl ContextQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub(crate) fn post(&self, invocation: Invocation) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(QueueItem::Invoke(invocation));
    }

    pub(crate) fn quit(&self) {
        let _ = self.sender.send(QueueItem::Quit);
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }
}

/// Why a blocking loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// [`QuitHandle::quit`] was called.
    Quit,
    /// The time limit of [`EventLoop::run_for`] elapsed.
    TimedOut,
}

/// Drains the invocation queue of one context.
///
/// Create it on the thread that should run slots for the context. Creating a
/// loop for a foreign context with [`EventLoop::for_context`] binds the
/// calling thread to that context for the loop's lifetime.
pub struct EventLoop {
    runtime: Runtime,
    context: ContextId,
    queue: Arc<ContextQueue>,
    _guard: Option<ContextGuard>,
}

impl EventLoop {
    /// A loop for the calling thread's context.
    pub fn new(runtime: &Runtime) -> Self {
        let context = ContextId::current();
        Self {
            runtime: runtime.clone(),
            context,
            queue: runtime.queue(context),
            _guard: None,
        }
    }

    /// A loop for `context`, entered on the calling thread.
    pub fn for_context(runtime: &Runtime, context: ContextId) -> Self {
        let guard = (!context.is_current()).then(|| context::enter(context));
        Self {
            runtime: runtime.clone(),
            context,
            queue: runtime.queue(context),
            _guard: guard,
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Number of queued items not yet processed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// A handle that stops [`run`](Self::run) from any thread.
    pub fn quit_handle(&self) -> QuitHandle {
        QuitHandle {
            queue: self.queue.clone(),
        }
    }

    /// Execute everything queued, including work queued by the slots that
    /// run, without blocking. Returns the number of invocations executed.
    ///
    /// A pending quit request is consumed and ignored.
    pub fn process_pending(&self) -> usize {
        let mut executed = 0;
        loop {
            match self.queue.receiver.try_recv() {
                Ok(QueueItem::Invoke(invocation)) => {
                    self.runtime.execute(invocation);
                    executed += 1;
                }
                Ok(QueueItem::Quit) => continue,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        if executed > 0 {
            tracing::trace!(target: targets::DISPATCH, context = %self.context, executed, "processed pending invocations");
        }
        executed
    }

    /// Block and execute invocations until a quit request arrives.
    #[tracing::instrument(skip(self), fields(context = %self.context), target = "horizon_meta::event_loop", level = "debug")]
    pub fn run(&self) -> usize {
        let mut executed = 0;
        while let Ok(item) = self.queue.receiver.recv() {
            match item {
                QueueItem::Invoke(invocation) => {
                    self.runtime.execute(invocation);
                    executed += 1;
                }
                QueueItem::Quit => break,
            }
        }
        executed
    }

    /// Like [`run`](Self::run) but returns once `limit` has elapsed.
    pub fn run_for(&self, limit: Duration) -> (LoopExit, usize) {
        let deadline = Instant::now() + limit;
        let mut executed = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.queue.receiver.recv_timeout(remaining) {
                Ok(QueueItem::Invoke(invocation)) => {
                    self.runtime.execute(invocation);
                    executed += 1;
                }
                Ok(QueueItem::Quit) => return (LoopExit::Quit, executed),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return (LoopExit::TimedOut, executed);
                }
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.runtime.release_queue(self.context, &self.queue);
    }
}

/// Requests an [`EventLoop`] to stop.
#[derive(Clone)]
pub struct QuitHandle {
    queue: Arc<ContextQueue>,
}

impl QuitHandle {
    /// The loop stops after the work queued before this call.
    pub fn quit(&self) {
        self.queue.quit();
    }
}
