/*!
 * Bounded-concurrency work queue for translation backend calls.
 *
 * Submitted tasks are queued in submission order and admitted while fewer
 * than `max_concurrent` are running. Every admitted task is driven on its own
 * tokio task, so a submission always runs to completion even if the caller
 * stops waiting for it.
 */

use anyhow::{anyhow, Result};
use futures::FutureExt;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot;

/// A pending submission: the unit of work plus its completion channel,
/// erased into a single boxed future
type QueuedCall = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct ThrottleState {
    /// Number of admitted tasks that have not finished yet
    active: usize,

    /// Submissions waiting for a slot, oldest first
    queue: VecDeque<QueuedCall>,
}

struct ThrottleInner {
    max_concurrent: usize,
    state: Mutex<ThrottleState>,
}

/// FIFO throttle limiting in-flight backend calls
#[derive(Clone)]
pub struct TranslationThrottle {
    inner: Arc<ThrottleInner>,
}

impl TranslationThrottle {
    /// Create a throttle admitting at most `max_concurrent` tasks at once
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);

        Self {
            inner: Arc::new(ThrottleInner {
                max_concurrent,
                state: Mutex::new(ThrottleState {
                    active: 0,
                    queue: VecDeque::new(),
                }),
            }),
        }
    }

    /// Enqueue a unit of work.
    ///
    /// The task is queued immediately (admission order is submission order,
    /// not poll order). The returned future settles with the task's result;
    /// it fails only if the task panicked.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F, Fut, T>(&self, task: F) -> impl Future<Output = Result<T>> + Send + use<F, Fut, T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let call: QueuedCall = Box::pin(async move {
            let result = task().await;
            // Receiver may be gone; the work still counts as done
            let _ = tx.send(result);
        });

        self.inner.state.lock().queue.push_back(call);
        Self::admit(&self.inner);

        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(anyhow!("Throttled task aborted before producing a result")),
            }
        }
    }

    /// Number of tasks currently running
    pub fn active(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Number of tasks waiting for a slot
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Configured concurrency limit
    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Admit queued calls while slots are free
    fn admit(inner: &Arc<ThrottleInner>) {
        loop {
            let call = {
                let mut state = inner.state.lock();
                if state.active >= inner.max_concurrent {
                    return;
                }
                match state.queue.pop_front() {
                    Some(call) => {
                        state.active += 1;
                        call
                    }
                    None => return,
                }
            };

            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                if AssertUnwindSafe(call).catch_unwind().await.is_err() {
                    warn!("Throttled task panicked");
                }

                let remaining = {
                    let mut state = inner.state.lock();
                    state.active -= 1;
                    state.queue.len()
                };
                debug!("Throttle slot released ({} queued)", remaining);

                Self::admit(&inner);
            });
        }
    }
}

impl std::fmt::Debug for TranslationThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationThrottle")
            .field("max_concurrent", &self.inner.max_concurrent)
            .field("active", &self.active())
            .field("queued", &self.queued())
            .finish()
    }
}
