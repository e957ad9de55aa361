// SPDX-FileCopyrightText: 2026 Tandem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-value asynchronous delivery of write-then-read outcomes.
//!
//! A [`WriteThenRead`] is lazy: nothing touches the database until it is
//! subscribed or awaited. Each subscription produces exactly one callback,
//! either with the read body's value or with the error that rolled the
//! transaction back, unless it is cancelled first.
//!
//! Cancelling before the coordinator starts prevents the transaction from
//! running at all. Cancelling after it started only suppresses delivery; the
//! transaction still commits or rolls back on its own merits.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use rusqlite::Connection;
use tandem_core::{Outcome, StoreError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::debug;

use crate::coordinator;
use crate::dispatch::{self, CompletionContext, RuntimeContext};
use crate::writer::DatabaseWriter;

type WriteBody<T> = Box<dyn FnOnce(&Connection) -> Result<T, StoreError> + Send>;
type ReadBody<T, U> = Box<dyn FnOnce(&Connection, T) -> Result<U, StoreError> + Send>;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DELIVERED: u8 = 2;
const CANCELLED: u8 = 3;

/// Observable state of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Waiting for the writer to pick the request up.
    Pending,
    /// The transaction has started; the outcome is not delivered yet.
    Running,
    /// The callback has been invoked.
    Delivered,
    /// Cancelled before delivery. No callback will run.
    Cancelled,
}

impl SubscriptionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Atomic state machine shared by a subscription, its request task and the
/// delivery job.
#[derive(Debug)]
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(PENDING))
    }

    /// Pending -> Running. Fails if the subscription was cancelled.
    pub(crate) fn start(&self) -> bool {
        self.0
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Pending | Running -> Delivered. Succeeds at most once.
    pub(crate) fn complete(&self) -> bool {
        self.transition_from_live(DELIVERED)
    }

    /// Pending | Running -> Cancelled.
    pub(crate) fn cancel(&self) -> bool {
        self.transition_from_live(CANCELLED)
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        match self.0.load(Ordering::Acquire) {
            PENDING => SubscriptionState::Pending,
            RUNNING => SubscriptionState::Running,
            DELIVERED => SubscriptionState::Delivered,
            _ => SubscriptionState::Cancelled,
        }
    }

    fn transition_from_live(&self, terminal: u8) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                matches!(state, PENDING | RUNNING).then_some(terminal)
            })
            .is_ok()
    }
}

/// Handle to an in-flight write-then-read request.
///
/// Dropping a `Subscription` detaches it: the request still runs and the
/// callback still fires. Call [`Subscription::cancel`] to stop it.
#[derive(Debug, Clone)]
pub struct Subscription {
    lifecycle: Arc<Lifecycle>,
}

impl Subscription {
    /// Cancel the subscription.
    ///
    /// Returns `false` if the outcome was already delivered or the
    /// subscription was already cancelled.
    pub fn cancel(&self) -> bool {
        let cancelled = self.lifecycle.cancel();
        if cancelled {
            debug!("write-then-read subscription cancelled");
        }
        cancelled
    }

    pub fn state(&self) -> SubscriptionState {
        self.lifecycle.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

/// A lazy write-then-read request against a [`DatabaseWriter`].
///
/// Built by [`DatabaseWriter::write_then_read`] or
/// [`DatabaseWriter::schedule_write`]. Consumed by [`subscribe`](Self::subscribe),
/// [`subscribe_outcome`](Self::subscribe_outcome) or `.await`.
#[must_use = "a write-then-read request does nothing until it is subscribed or awaited"]
pub struct WriteThenRead<W, T, U> {
    writer: W,
    write_body: WriteBody<T>,
    read_body: ReadBody<T, U>,
    context: Option<Arc<dyn CompletionContext>>,
}

impl<W, T, U> WriteThenRead<W, T, U>
where
    W: DatabaseWriter,
    T: 'static,
    U: Send + 'static,
{
    pub fn new<FW, FR>(writer: W, write_body: FW, read_body: FR) -> Self
    where
        FW: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        FR: FnOnce(&Connection, T) -> Result<U, StoreError> + Send + 'static,
    {
        Self {
            writer,
            write_body: Box::new(write_body),
            read_body: Box::new(read_body),
            context: None,
        }
    }

    /// Deliver the outcome on `context` instead of the subscribing runtime.
    pub fn deliver_on(self, context: impl CompletionContext) -> Self {
        self.deliver_on_shared(Arc::new(context))
    }

    /// Like [`deliver_on`](Self::deliver_on), for a context shared between requests.
    pub fn deliver_on_shared(mut self, context: Arc<dyn CompletionContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// Start the request and deliver its value or error to one of two callbacks.
    pub fn subscribe<S, E>(self, on_success: S, on_failure: E) -> Subscription
    where
        S: FnOnce(U) + Send + 'static,
        E: FnOnce(StoreError) + Send + 'static,
    {
        self.subscribe_outcome(move |outcome| match outcome {
            Ok(value) => on_success(value),
            Err(err) => on_failure(err),
        })
    }

    /// Start the request and deliver its [`Outcome`] to `callback`.
    ///
    /// Returns immediately. The transaction runs on the writer's connection
    /// thread, driven by the writer's runtime.
    pub fn subscribe_outcome<C>(self, callback: C) -> Subscription
    where
        C: FnOnce(Outcome<U>) + Send + 'static,
    {
        let Self {
            writer,
            write_body,
            read_body,
            context,
        } = self;

        let context = context.unwrap_or_else(|| default_context(&writer));
        let lifecycle = Arc::new(Lifecycle::new());
        let runtime = writer.runtime().clone();
        let task_lifecycle = Arc::clone(&lifecycle);

        runtime.spawn(async move {
            let gate = Arc::clone(&task_lifecycle);
            let result = writer
                .write_without_transaction(move |conn| {
                    if !gate.start() {
                        return Ok(None);
                    }
                    Ok(Some(coordinator::write_then_read(
                        conn, write_body, read_body,
                    )))
                })
                .await;

            let outcome = match result {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    debug!(writer = %writer.kind(), "cancelled before start, transaction skipped");
                    return;
                }
                Err(err) => Err(err),
            };
            dispatch::deliver(context.as_ref(), task_lifecycle, outcome, callback);
        });

        Subscription { lifecycle }
    }
}

/// The runtime the subscriber is on, or the writer's runtime when
/// subscribing from outside any runtime.
fn default_context<W: DatabaseWriter>(writer: &W) -> Arc<dyn CompletionContext> {
    let handle = Handle::try_current().unwrap_or_else(|_| writer.runtime().clone());
    Arc::new(RuntimeContext::new(handle))
}

impl<W, T, U> IntoFuture for WriteThenRead<W, T, U>
where
    W: DatabaseWriter,
    T: 'static,
    U: Send + 'static,
{
    type Output = Outcome<U>;
    type IntoFuture = Delivery<U>;

    fn into_future(self) -> Delivery<U> {
        let (sender, receiver) = oneshot::channel();
        let subscription = self.subscribe_outcome(move |outcome| {
            let _ = sender.send(outcome);
        });
        Delivery {
            receiver,
            subscription,
            finished: false,
        }
    }
}

/// Future returned by awaiting a [`WriteThenRead`].
///
/// Dropping it before it resolves cancels the subscription. Resolves to
/// [`StoreError::DeliveryDropped`] if the completion context discarded the
/// outcome.
#[must_use = "futures do nothing unless polled"]
pub struct Delivery<U> {
    receiver: oneshot::Receiver<Outcome<U>>,
    subscription: Subscription,
    finished: bool,
}

impl<U> Delivery<U> {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<U> Unpin for Delivery<U> {}

impl<U> Future for Delivery<U> {
    type Output = Outcome<U>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => {
                this.finished = true;
                Poll::Ready(outcome)
            }
            Poll::Ready(Err(_)) => {
                this.finished = true;
                Poll::Ready(Err(StoreError::DeliveryDropped))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<U> Drop for Delivery<U> {
    fn drop(&mut self) {
        if !self.finished {
            self.subscription.cancel();
        }
    }
}
