//! The persistence port consumed by the aggregator.
//!
//! The ingestion pipeline only needs three operations from storage. Keeping
//! them behind a trait lets the pipeline run against the SQLite [`Database`]
//! in production and against scripted stores in tests.

use std::future::Future;

use super::schema::Database;
use super::types::{DatabaseError, Feed, NewPost};

/// Storage operations used by the feed-polling pipeline.
pub trait FeedStore: Send + Sync {
    /// The feed with the smallest `last_fetched_at` (never-fetched first,
    /// ties by creation order), or `None` when there are no feeds.
    fn next_feed_to_fetch(&self)
        -> impl Future<Output = Result<Option<Feed>, DatabaseError>> + Send;

    /// Set `last_fetched_at` to `at` (epoch millis) unless it is already later.
    fn mark_fetched(
        &self,
        feed_id: i64,
        at: i64,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Insert a post keyed by its link URL, returning the new id.
    ///
    /// A link that already exists must fail with
    /// [`DatabaseError::UniqueViolation`].
    fn insert_post(
        &self,
        post: &NewPost,
    ) -> impl Future<Output = Result<i64, DatabaseError>> + Send;
}

impl FeedStore for Database {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        self.get_next_feed_to_fetch().await
    }

    async fn mark_fetched(&self, feed_id: i64, at: i64) -> Result<(), DatabaseError> {
        self.mark_feed_fetched(feed_id, at).await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<i64, DatabaseError> {
        self.create_post(post).await
    }
}
