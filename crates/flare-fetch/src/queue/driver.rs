//! Actor owning the queued and in-flight request sets.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};

use super::request::{FetchOutcome, FetchRequest, NotFoundReason};
use super::task::{FetchContext, run_fetch};
use super::{StatsCounters, TRACING_TARGET};
use crate::AdmissionOrder;

/// Message sent from [`FetchQueue`](super::FetchQueue) handles to the driver.
pub(crate) enum Command {
    Enqueue(FetchRequest),
}

pub(crate) struct Driver {
    context: Arc<FetchContext>,
    commands: mpsc::UnboundedReceiver<Command>,
    stats: Arc<StatsCounters>,
    queued: Vec<FetchRequest>,
    in_flight: HashMap<Id, String>,
    tasks: JoinSet<()>,
}

impl Driver {
    pub fn new(
        context: Arc<FetchContext>,
        commands: mpsc::UnboundedReceiver<Command>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            context,
            commands,
            stats,
            queued: Vec::new(),
            in_flight: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(
            target: TRACING_TARGET,
            max_concurrent = self.context.config.max_concurrent,
            admission = %self.context.config.admission,
            "Fetch queue started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Enqueue(request)) => self.enqueue(request),
                    None => break,
                },
                Some(joined) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => {
                    let id = match joined {
                        Ok((id, ())) => id,
                        Err(err) => {
                            tracing::error!(
                                target: TRACING_TARGET,
                                error = %err,
                                "Fetch task panicked"
                            );
                            err.id()
                        }
                    };
                    self.in_flight.remove(&id);
                }
            }

            self.promote();
            self.publish_stats();
        }

        self.shutdown().await;
    }

    fn enqueue(&mut self, request: FetchRequest) {
        self.queued.retain(|queued| !queued.token.is_cancelled());

        if let Some(index) = self.queued.iter().position(|queued| queued.key == request.key) {
            let superseded = self.queued.remove(index);
            tracing::debug!(
                target: TRACING_TARGET,
                key = %superseded.key,
                "Queued fetch superseded"
            );
            superseded.respond(FetchOutcome::NotFound(NotFoundReason::Superseded));
        }

        self.queued.push(request);
    }

    /// Admits queued requests until every slot is taken.
    fn promote(&mut self) {
        while self.in_flight.len() < self.context.config.max_concurrent {
            let Some(index) = self.next_admissible() else {
                break;
            };

            let request = self.queued.remove(index);
            if request.token.is_cancelled() {
                tracing::debug!(
                    target: TRACING_TARGET,
                    key = %request.key,
                    "Dropping cancelled fetch"
                );
                continue;
            }

            let key = request.key.clone();
            let context = Arc::clone(&self.context);
            let handle = self
                .tasks
                .spawn(async move { run_fetch(&context, request).await });
            tracing::trace!(target: TRACING_TARGET, key = %key, "Fetch admitted");
            self.in_flight.insert(handle.id(), key);
        }
    }

    /// Picks the next queued request whose key is not already being fetched.
    fn next_admissible(&self) -> Option<usize> {
        let admissible = |request: &FetchRequest| {
            request.token.is_cancelled() || !self.in_flight.values().any(|key| *key == request.key)
        };

        match self.context.config.admission {
            AdmissionOrder::Lifo => self.queued.iter().rposition(admissible),
            AdmissionOrder::Fifo => self.queued.iter().position(admissible),
        }
    }

    /// Publishes occupancy, pruning cancelled requests first so they are not counted.
    fn publish_stats(&mut self) {
        self.queued.retain(|queued| !queued.token.is_cancelled());

        let in_flight = self.in_flight.len();
        self.stats.queued.store(self.queued.len(), Ordering::Release);
        self.stats.in_flight.store(in_flight, Ordering::Release);
        self.stats.peak_in_flight.fetch_max(in_flight, Ordering::AcqRel);
    }

    /// Answers queued requests and lets in-flight fetches finish their writes.
    async fn shutdown(mut self) {
        for request in self.queued.drain(..) {
            request.respond(FetchOutcome::NotFound(NotFoundReason::Closed));
        }
        self.publish_stats();

        while self.tasks.join_next().await.is_some() {}

        self.in_flight.clear();
        self.publish_stats();
        tracing::debug!(target: TRACING_TARGET, "Fetch queue stopped");
    }
}
