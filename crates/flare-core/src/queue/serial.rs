//! Order-preserving, single-flight task queue.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use super::TRACING_TARGET;

/// A unit of work boxed for the mailbox.
type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Reason a task pushed to a [`SerialTaskQueue`] did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum TaskError<E> {
    /// The task ran and returned an error.
    #[error("task failed: {0}")]
    Failed(#[source] E),
    /// The task panicked. The queue keeps running.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The queue worker stopped before the task result was delivered.
    #[error("queue closed before the task completed")]
    Closed,
}

impl<E> TaskError<E> {
    /// Returns the task's own error, if it failed rather than panicked.
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Panicked(_) | Self::Closed => None,
        }
    }
}

struct QueueInner {
    name: Cow<'static, str>,
    mailbox: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
    sequence: AtomicU64,
}

/// Executes pushed tasks one at a time, in push order.
///
/// Every instance owns a single worker task fed by an unbounded mailbox.
/// A task does not start until every task pushed before it has finished,
/// whether it succeeded, failed or panicked. Cloning the queue shares the
/// same worker; the worker stops once every clone is dropped and the
/// mailbox is drained.
///
/// Tasks have no timeout. A task that never completes stalls its queue.
///
/// # Examples
///
/// ```rust,no_run
/// use flare_core::queue::SerialTaskQueue;
///
/// # async fn example() {
/// let queue = SerialTaskQueue::new("database");
/// let handle = queue.push(|| async { Ok::<_, std::io::Error>(42) });
/// assert_eq!(handle.await.ok(), Some(42));
/// # }
/// ```
#[derive(Clone)]
pub struct SerialTaskQueue {
    inner: Arc<QueueInner>,
}

impl SerialTaskQueue {
    /// Creates a queue and spawns its worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        let (mailbox, receiver) = mpsc::unbounded_channel();

        tokio::spawn(run_worker(name.clone(), receiver));

        Self {
            inner: Arc::new(QueueInner {
                name,
                mailbox,
                pending: Arc::new(AtomicUsize::new(0)),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the queue name used in tracing output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the number of tasks pushed but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Returns whether no task is running or waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Appends a task and returns a handle to its result without blocking.
    ///
    /// The task is executed even if the returned handle is dropped.
    pub fn push<F, Fut, T, E>(&self, task: F) -> TaskHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.inner.pending);
        pending.fetch_add(1, Ordering::AcqRel);

        let span = tracing::debug_span!(
            target: TRACING_TARGET,
            "serial_task",
            queue = %self.inner.name,
            sequence
        );

        let job: Job = Box::new(move || {
            async move {
                let outcome = AssertUnwindSafe(async move { task().await })
                    .catch_unwind()
                    .await;

                let result = match outcome {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => {
                        tracing::debug!(target: TRACING_TARGET, "Task returned an error");
                        Err(TaskError::Failed(err))
                    }
                    Err(panic) => {
                        let message = panic_message(&*panic);
                        tracing::error!(
                            target: TRACING_TARGET,
                            message = %message,
                            "Task panicked"
                        );
                        Err(TaskError::Panicked(message))
                    }
                };

                pending.fetch_sub(1, Ordering::AcqRel);

                // The submitter may have dropped its handle.
                let _ = result_tx.send(result);
            }
            .instrument(span)
            .boxed()
        });

        if self.inner.mailbox.send(job).is_err() {
            self.inner.pending.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!(
                target: TRACING_TARGET,
                queue = %self.inner.name,
                sequence,
                "Queue worker is gone, task rejected"
            );
        }

        TaskHandle {
            receiver: result_rx,
        }
    }
}

impl fmt::Debug for SerialTaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTaskQueue")
            .field("name", &self.inner.name)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Future resolving to the result of a task pushed to a [`SerialTaskQueue`].
#[must_use = "dropping the handle discards the result, the task still runs"]
pub struct TaskHandle<T, E> {
    receiver: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E> Future for TaskHandle<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Closed)))
    }
}

impl<T, E> fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

async fn run_worker(name: Cow<'static, str>, mut mailbox: mpsc::UnboundedReceiver<Job>) {
    tracing::debug!(target: TRACING_TARGET, queue = %name, "Serial queue started");

    while let Some(job) = mailbox.recv().await {
        job().await;
    }

    tracing::debug!(target: TRACING_TARGET, queue = %name, "Serial queue stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| (*s).to_owned()))
        .unwrap_or_else(|| "unknown panic type".to_owned())
}
