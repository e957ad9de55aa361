// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion contexts and outcome delivery.
//!
//! The coordinator runs on a connection thread. A [`CompletionContext`]
//! decides where the caller's callback runs once the outcome exists. When a
//! context can no longer accept work the outcome is dropped and logged; it is
//! never rerouted to another context.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};

use tandem_core::{Outcome, StoreError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::single::Lifecycle;

/// A unit of work posted to a completion context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The completion context refused a job because it has shut down.
#[derive(Debug, Error)]
#[error("completion context `{0}` is closed")]
pub struct ContextClosed(pub String);

/// Where a write-then-read outcome is delivered.
pub trait CompletionContext: Send + Sync + 'static {
    /// Schedule `job` to run on this context.
    fn post(&self, job: Job) -> Result<(), ContextClosed>;

    /// Human-readable name used in logs.
    fn label(&self) -> &str;
}

/// Runs the callback on whichever thread produced the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl CompletionContext for Immediate {
    fn post(&self, job: Job) -> Result<(), ContextClosed> {
        job();
        Ok(())
    }

    fn label(&self) -> &str {
        "immediate"
    }
}

/// Spawns the callback onto a tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    handle: Handle,
}

impl RuntimeContext {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// The runtime the calling thread is running on, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl CompletionContext for RuntimeContext {
    /// Always accepts. tokio cannot report a shut-down runtime at spawn
    /// time; a job dropped unrun by one is logged instead.
    fn post(&self, job: Job) -> Result<(), ContextClosed> {
        let job = RuntimeJob(Some(job));
        drop(self.handle.spawn(async move { job.run() }));
        Ok(())
    }

    fn label(&self) -> &str {
        "tokio-runtime"
    }
}

/// A job spawned on a runtime. Warns if dropped before running.
struct RuntimeJob(Option<Job>);

impl RuntimeJob {
    fn run(mut self) {
        if let Some(job) = self.0.take() {
            job();
        }
    }
}

impl Drop for RuntimeJob {
    fn drop(&mut self) {
        if self.0.is_some() {
            warn!(
                context = "tokio-runtime",
                "outcome dropped, completion context unavailable: runtime shut down"
            );
        }
    }
}

enum Message {
    Run(Job),
    Shutdown,
}

/// A dedicated thread that runs posted jobs one at a time, in order.
///
/// Cloning yields another handle to the same thread. The thread exits after
/// [`SerialQueue::close`] or once every handle is dropped; jobs still queued
/// at that point are dropped without running.
#[derive(Clone)]
pub struct SerialQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    name: String,
    sender: mpsc::UnboundedSender<Message>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SerialQueue {
    /// Spawn the queue thread.
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();
        let thread_name = name.clone();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(message) = receiver.blocking_recv() {
                    match message {
                        Message::Run(job) => {
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                error!(queue = %thread_name, "completion callback panicked");
                            }
                        }
                        Message::Shutdown => break,
                    }
                }
                debug!(queue = %thread_name, "serial queue stopped");
            })
            .map_err(StoreError::from_source)?;

        Ok(Self {
            inner: Arc::new(QueueInner {
                name,
                sender,
                thread_id: handle.thread().id(),
                handle: Mutex::new(Some(handle)),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Id of the thread jobs run on.
    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop the queue thread after the jobs already queued ahead of this call.
    ///
    /// Waits for the thread to exit unless called from the queue itself.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.inner.sender.send(Message::Shutdown);

        if std::thread::current().id() == self.inner.thread_id {
            return;
        }
        let handle = self
            .inner
            .handle
            .lock()
            .ok()
            .and_then(|mut handle| handle.take());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!(queue = %self.inner.name, "serial queue thread panicked");
        }
    }
}

impl CompletionContext for SerialQueue {
    fn post(&self, job: Job) -> Result<(), ContextClosed> {
        if self.is_closed() {
            return Err(ContextClosed(self.inner.name.clone()));
        }
        self.inner
            .sender
            .send(Message::Run(job))
            .map_err(|_| ContextClosed(self.inner.name.clone()))
    }

    fn label(&self) -> &str {
        &self.inner.name
    }
}

/// Post `outcome` to `context`, guarded by the subscription lifecycle.
///
/// The lifecycle is checked on the target context, immediately before the
/// callback would run, so a cancellation that races with delivery still
/// suppresses the callback.
pub(crate) fn deliver<U, C>(
    context: &dyn CompletionContext,
    lifecycle: Arc<Lifecycle>,
    outcome: Outcome<U>,
    callback: C,
) where
    U: Send + 'static,
    C: FnOnce(Outcome<U>) + Send + 'static,
{
    let job: Job = Box::new(move || {
        if lifecycle.complete() {
            callback(outcome);
        } else {
            debug!("subscription cancelled, outcome discarded");
        }
    });

    if let Err(err) = context.post(job) {
        warn!(context = %context.label(), error = %err, "outcome dropped, completion context unavailable");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn immediate_runs_inline() {
        let caller = std::thread::current().id();
        let (tx, rx) = std_mpsc::channel();
        Immediate
            .post(Box::new(move || tx.send(std::thread::current().id()).unwrap()))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), caller);
    }

    #[test]
    fn serial_queue_runs_jobs_in_order_on_its_thread() {
        let queue = SerialQueue::new("test-queue").unwrap();
        let (tx, rx) = std_mpsc::channel();

        for i in 0..5 {
            let tx = tx.clone();
            queue
                .post(Box::new(move || {
                    tx.send((i, std::thread::current().id())).unwrap();
                }))
                .unwrap();
        }

        for expected in 0..5 {
            let (i, thread) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(i, expected);
            assert_eq!(thread, queue.thread_id());
        }
        queue.close();
    }

    #[test]
    fn closed_serial_queue_rejects_jobs() {
        let queue = SerialQueue::new("closing-queue").unwrap();
        queue.close();
        assert!(queue.is_closed());

        let err = queue.post(Box::new(|| {})).unwrap_err();
        assert_eq!(err.0, "closing-queue");
    }

    #[test]
    fn serial_queue_survives_panicking_job() {
        let queue = SerialQueue::new("panicky-queue").unwrap();
        let (tx, rx) = std_mpsc::channel();

        queue.post(Box::new(|| panic!("callback bug"))).unwrap();
        queue.post(Box::new(move || tx.send(()).unwrap())).unwrap();

        rx.recv_timeout(Duration::from_secs(5))
            .expect("queue should keep running after a panic");
        queue.close();
    }

    #[tokio::test]
    async fn runtime_context_spawns_on_runtime() {
        let context = RuntimeContext::current().expect("inside a runtime");
        let (tx, rx) = tokio::sync::oneshot::channel();
        context
            .post(Box::new(move || {
                let _ = tx.send(Handle::try_current().is_ok());
            }))
            .unwrap();
        assert!(rx.await.unwrap(), "job should run on a runtime thread");
    }

    #[test]
    fn runtime_context_unavailable_outside_runtime() {
        assert!(RuntimeContext::current().is_none());
    }

    #[test]
    fn deliver_skips_cancelled_subscription() {
        let lifecycle = Arc::new(Lifecycle::new());
        assert!(lifecycle.cancel());

        let (tx, rx) = std_mpsc::channel::<Outcome<i64>>();
        deliver(&Immediate, lifecycle, Ok(1), move |outcome| {
            tx.send(outcome).unwrap();
        });
        assert!(rx.try_recv().is_err(), "cancelled subscription must not be called");
    }

    #[test]
    fn deliver_runs_callback_once() {
        let lifecycle = Arc::new(Lifecycle::new());
        let (tx, rx) = std_mpsc::channel::<Outcome<i64>>();

        deliver(&Immediate, Arc::clone(&lifecycle), Ok(7), move |outcome| {
            tx.send(outcome).unwrap();
        });

        assert_eq!(rx.try_recv().unwrap().unwrap(), 7);
        assert!(!lifecycle.complete(), "a second completion must be refused");
    }

    #[test]
    #[traced_test]
    fn deliver_to_closed_context_drops_and_logs() {
        let queue = SerialQueue::new("gone-queue").unwrap();
        queue.close();

        let (tx, rx) = std_mpsc::channel::<Outcome<i64>>();
        deliver(&queue, Arc::new(Lifecycle::new()), Ok(1), move |outcome| {
            tx.send(outcome).unwrap();
        });

        // The job (and with it the sender) was dropped without running.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(logs_contain("completion context unavailable"));
    }

    #[test]
    #[traced_test]
    fn deliver_to_shut_down_runtime_drops_and_logs() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let context = RuntimeContext::new(runtime.handle().clone());
        drop(runtime);

        let (tx, rx) = std_mpsc::channel::<Outcome<i64>>();
        deliver(&context, Arc::new(Lifecycle::new()), Ok(1), move |outcome| {
            tx.send(outcome).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(logs_contain("runtime shut down"));
    }
}
