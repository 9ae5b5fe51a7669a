//! One serial queue per mutation domain.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};

use super::SerialTaskQueue;

/// Logical grouping of mutating operations that must never overlap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueDomain {
    /// Game, playlist and tag writes against the entity store.
    Database,
    /// Writes to curation working folders.
    Curation,
    /// Language file reconciliation.
    Language,
    /// Theme reconciliation.
    Theme,
}

/// The set of serial queues, one per [`QueueDomain`].
///
/// Cloning shares the underlying queues.
#[derive(Debug, Clone)]
pub struct DomainQueues {
    database: SerialTaskQueue,
    curation: SerialTaskQueue,
    language: SerialTaskQueue,
    theme: SerialTaskQueue,
}

impl DomainQueues {
    /// Creates every domain queue on the current tokio runtime.
    pub fn new() -> Self {
        Self {
            database: SerialTaskQueue::new(QueueDomain::Database.as_ref().to_owned()),
            curation: SerialTaskQueue::new(QueueDomain::Curation.as_ref().to_owned()),
            language: SerialTaskQueue::new(QueueDomain::Language.as_ref().to_owned()),
            theme: SerialTaskQueue::new(QueueDomain::Theme.as_ref().to_owned()),
        }
    }

    /// Returns the queue of a domain.
    #[must_use]
    pub fn get(&self, domain: QueueDomain) -> &SerialTaskQueue {
        match domain {
            QueueDomain::Database => &self.database,
            QueueDomain::Curation => &self.curation,
            QueueDomain::Language => &self.language,
            QueueDomain::Theme => &self.theme,
        }
    }

    /// Returns the total number of unfinished tasks across all domains.
    #[must_use]
    pub fn pending(&self) -> usize {
        QueueDomain::iter()
            .map(|domain| self.get(domain).pending())
            .sum()
    }
}

impl Default for DomainQueues {
    fn default() -> Self {
        Self::new()
    }
}
