use futures::stream::{self, StreamExt};
use std::fmt;
use thiserror::Error;

use super::scheduler::Tick;
use super::selector::{FeedSelector, SelectionError};
use super::sink::{InsertOutcome, PersistenceError, PostSink};
use crate::feed::{
    normalize, parse_document, DocumentFetcher, FetchError, NormalizationError, ParseError,
    RawEntry,
};
use crate::storage::{Feed, FeedStore};

// ============================================================================
// Cycle State
// ============================================================================

/// Where an ingestion cycle is.
///
/// `Idle → Selected → Fetching → Parsing → Ingesting(1..=N) → Idle`. Any
/// stage may fall back to `Idle` on error; nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Selected,
    Fetching,
    Parsing,
    /// Ingesting the entry at this 1-based position in the document.
    Ingesting { index: usize },
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStage::Idle => write!(f, "idle"),
            CycleStage::Selected => write!(f, "selected"),
            CycleStage::Fetching => write!(f, "fetching"),
            CycleStage::Parsing => write!(f, "parsing"),
            CycleStage::Ingesting { index } => write!(f, "ingesting #{index}"),
        }
    }
}

/// A failure that ended a cycle before any entry was ingested.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Failed to fetch feed {feed_id} ({url}): {source}")]
    Fetch {
        feed_id: i64,
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to parse feed {feed_id} ({url}): {source}")]
    Parse {
        feed_id: i64,
        url: String,
        #[source]
        source: ParseError,
    },
}

impl CycleError {
    /// The stage that was being entered when the cycle failed.
    pub fn stage(&self) -> CycleStage {
        match self {
            CycleError::Selection(_) => CycleStage::Selected,
            CycleError::Fetch { .. } => CycleStage::Fetching,
            CycleError::Parse { .. } => CycleStage::Parsing,
        }
    }

    /// True when the cycle had nothing to do because no feeds exist.
    pub fn is_no_feeds(&self) -> bool {
        matches!(self, CycleError::Selection(SelectionError::NoFeeds))
    }
}

// ============================================================================
// Per-Entry Outcomes
// ============================================================================

/// What happened to one entry of a fetched document.
#[derive(Debug)]
pub enum ItemOutcome {
    Inserted(i64),
    Duplicate,
    NormalizationFailed(NormalizationError),
    PersistenceFailed(PersistenceError),
}

/// Per-entry outcomes of one cycle, in document order.
#[derive(Debug)]
pub struct CycleSummary {
    pub feed_id: i64,
    pub feed_name: String,
    pub outcomes: Vec<ItemOutcome>,
}

impl CycleSummary {
    fn new(feed: &Feed, capacity: usize) -> Self {
        Self {
            feed_id: feed.id,
            feed_name: feed.name.clone(),
            outcomes: Vec::with_capacity(capacity),
        }
    }

    pub fn inserted(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Inserted(_)))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Duplicate))
    }

    /// Entries dropped because they could not be normalized.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::NormalizationFailed(_)))
    }

    /// Entries the store rejected for a reason other than a duplicate link.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::PersistenceFailed(_)))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Runs ingestion cycles: select one feed, fetch it, store its entries.
pub struct Aggregator<S> {
    selector: FeedSelector<S>,
    sink: PostSink<S>,
    fetcher: DocumentFetcher,
}

impl<S: FeedStore + Clone> Aggregator<S> {
    pub fn new(store: S, fetcher: DocumentFetcher) -> Self {
        Self {
            selector: FeedSelector::new(store.clone()),
            sink: PostSink::new(store),
            fetcher,
        }
    }

    /// Run one cycle to completion.
    ///
    /// Selection, fetch and parse failures end the cycle with nothing
    /// stored. Once the document is parsed, each entry is handled on its
    /// own: a bad or rejected entry is logged and its siblings still go in.
    pub async fn run_cycle(&self) -> Result<CycleSummary, CycleError> {
        let feed = self.selector.next().await?;

        tracing::debug!(
            feed_id = feed.id,
            url = %feed.url,
            stage = %CycleStage::Fetching,
            "Fetching feed"
        );
        let bytes = self
            .fetcher
            .retrieve(&feed.url)
            .await
            .map_err(|source| CycleError::Fetch {
                feed_id: feed.id,
                url: feed.url.clone(),
                source,
            })?;

        let document = parse_document(&bytes).map_err(|source| CycleError::Parse {
            feed_id: feed.id,
            url: feed.url.clone(),
            source,
        })?;

        let summary = self.ingest(&feed, &document.entries).await;
        tracing::info!(
            feed_id = feed.id,
            duplicates = summary.duplicates(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "{} posts saved for feed {}",
            summary.inserted(),
            feed.name
        );
        Ok(summary)
    }

    async fn ingest(&self, feed: &Feed, entries: &[RawEntry]) -> CycleSummary {
        stream::iter(entries.iter().enumerate())
            .then(|(i, entry)| self.ingest_entry(feed.id, i + 1, entry))
            .fold(CycleSummary::new(feed, entries.len()), |mut summary, outcome| async move {
                summary.outcomes.push(outcome);
                summary
            })
            .await
    }

    async fn ingest_entry(&self, feed_id: i64, index: usize, entry: &RawEntry) -> ItemOutcome {
        let stage = CycleStage::Ingesting { index };

        let candidate = match normalize(entry) {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(feed_id, stage = %stage, error = %e, "Skipping entry");
                return ItemOutcome::NormalizationFailed(e);
            }
        };

        match self.sink.insert(feed_id, &candidate).await {
            Ok(InsertOutcome::Inserted(id)) => ItemOutcome::Inserted(id),
            Ok(InsertOutcome::Duplicate) => {
                tracing::debug!(feed_id, url = %candidate.url, "Post already stored");
                ItemOutcome::Duplicate
            }
            Err(e) => {
                tracing::warn!(feed_id, stage = %stage, error = %e, "Failed to store post");
                ItemOutcome::PersistenceFailed(e)
            }
        }
    }
}

impl<S: FeedStore + Clone> Tick for Aggregator<S> {
    async fn tick(&mut self) {
        match self.run_cycle().await {
            Ok(_) => {}
            Err(e) if e.is_no_feeds() => {
                tracing::info!("No feeds to fetch, waiting for the next tick");
            }
            Err(e) => {
                tracing::warn!(stage = %e.stage(), error = %e, "Cycle failed");
            }
        }
    }
}
