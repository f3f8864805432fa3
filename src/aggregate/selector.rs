use thiserror::Error;

use crate::storage::{DatabaseError, Feed, FeedStore};

/// Why no feed was handed to the cycle.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The store holds no feeds; the cycle is a no-op.
    #[error("No feeds to fetch")]
    NoFeeds,

    #[error("Failed to look up the next feed: {0}")]
    Store(#[source] DatabaseError),

    /// The feed was found but could not be marked as fetched. It is not
    /// fetched this cycle.
    #[error("Failed to claim feed {feed_id}: {source}")]
    Claim {
        feed_id: i64,
        #[source]
        source: DatabaseError,
    },
}

/// Chooses which feed the next cycle polls.
///
/// The least recently fetched feed wins (never-fetched feeds first, ties by
/// creation order). Selection claims the feed by stamping `last_fetched_at`
/// *before* anything is fetched, so a feed that keeps failing still rotates
/// to the back of the queue instead of starving the others.
pub struct FeedSelector<S> {
    store: S,
}

impl<S: FeedStore> FeedSelector<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Select and claim the next feed, stamping it with the current time.
    pub async fn next(&self) -> Result<Feed, SelectionError> {
        self.next_at(chrono::Utc::now().timestamp_millis()).await
    }

    /// Select and claim the next feed with an explicit claim time (epoch millis).
    pub async fn next_at(&self, now_millis: i64) -> Result<Feed, SelectionError> {
        let mut feed = self
            .store
            .next_feed_to_fetch()
            .await
            .map_err(SelectionError::Store)?
            .ok_or(SelectionError::NoFeeds)?;

        self.store
            .mark_fetched(feed.id, now_millis)
            .await
            .map_err(|source| SelectionError::Claim {
                feed_id: feed.id,
                source,
            })?;

        tracing::debug!(feed_id = feed.id, url = %feed.url, "Claimed feed");
        let claimed_at = feed.last_fetched_at.map_or(now_millis, |at| at.max(now_millis));
        feed.last_fetched_at = Some(claimed_at);
        Ok(feed)
    }
}
