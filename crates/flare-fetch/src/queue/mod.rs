//! Bounded, deduplicating and cancellable on-demand fetcher.
//!
//! A single driver task owns the queued and in-flight request sets. Handles
//! talk to it over a channel, so no lock guards that state. Each admitted
//! request runs as its own task that tees the upstream body to a disk
//! writer and to the requesting client.

mod driver;
mod request;
mod task;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flare_core::cache::AssetCache;
use flare_core::notify::ChangeNotifier;
use reqwest::{Client, redirect};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub use self::request::{FetchOutcome, FetchStream, FetchTicket, NotFoundReason};
use self::driver::{Command, Driver};
use self::request::FetchRequest;
use self::task::FetchContext;
use crate::{FetchConfig, FetchError, Result};

/// Tracing target for the fetch queue.
pub const TRACING_TARGET: &str = "flare_fetch::queue";

/// Maximum number of redirects followed per upstream request.
const MAX_REDIRECTS: usize = 10;

/// Snapshot of the fetch queue occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStats {
    /// Requests waiting for a slot.
    pub queued: usize,
    /// Requests currently being fetched.
    pub in_flight: usize,
    /// Highest number of requests ever fetched at once.
    pub peak_in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Handle to the fetch queue. Cloning shares the same driver.
///
/// The driver stops once every handle is dropped, after answering queued
/// requests with [`NotFoundReason::Closed`] and letting in-flight fetches
/// finish.
#[derive(Debug, Clone)]
pub struct FetchQueue {
    commands: mpsc::UnboundedSender<Command>,
    stats: Arc<StatsCounters>,
}

impl FetchQueue {
    /// Validates `config`, builds the HTTP client and spawns the driver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: FetchConfig, cache: AssetCache, notifier: ChangeNotifier) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(FetchError::Client)?;

        tracing::info!(
            target: TRACING_TARGET,
            base_url = %config.base_url,
            max_concurrent = config.max_concurrent,
            timeout_secs = config.timeout_secs,
            "Spawning fetch queue"
        );

        let context = Arc::new(FetchContext {
            client,
            config,
            cache,
            notifier,
        });

        let (commands, receiver) = mpsc::unbounded_channel();
        let stats = Arc::new(StatsCounters::default());
        tokio::spawn(Driver::new(context, receiver, Arc::clone(&stats)).run());

        Ok(Self { commands, stats })
    }

    /// Queues a fetch of `key`, superseding any queued request for the same key.
    pub fn enqueue(&self, key: impl Into<String>) -> FetchTicket {
        let key = key.into();
        let token = CancellationToken::new();
        let (responder, receiver) = oneshot::channel();

        let request = FetchRequest {
            key: key.clone(),
            token: token.clone(),
            responder,
        };

        // A closed driver drops the request, which resolves the ticket as closed.
        if self.commands.send(Command::Enqueue(request)).is_err() {
            tracing::warn!(target: TRACING_TARGET, key = %key, "Fetch queue is closed");
        }

        FetchTicket::new(key, receiver, token)
    }

    /// Returns the current queue occupancy.
    #[must_use]
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            queued: self.stats.queued.load(Ordering::Acquire),
            in_flight: self.stats.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.stats.peak_in_flight.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests;
