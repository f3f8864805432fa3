use thiserror::Error;

use crate::feed::PostCandidate;
use crate::storage::{DatabaseError, FeedStore, NewPost};

/// Result of committing one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored as a new post with this id.
    Inserted(i64),
    /// A post with the same link already exists; nothing was written.
    Duplicate,
}

/// A store failure other than a duplicate link.
#[derive(Debug, Error)]
#[error("Failed to store post {url:?}: {source}")]
pub struct PersistenceError {
    pub url: String,
    #[source]
    pub source: DatabaseError,
}

/// Writes normalized candidates to the store.
///
/// The link URL is the dedup key. Inserting a link twice is not an error:
/// the second insert reports [`InsertOutcome::Duplicate`] and changes
/// nothing, which makes re-polling an unchanged feed harmless.
pub struct PostSink<S> {
    store: S,
}

impl<S: FeedStore> PostSink<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn insert(
        &self,
        feed_id: i64,
        candidate: &PostCandidate,
    ) -> Result<InsertOutcome, PersistenceError> {
        let post = NewPost {
            feed_id,
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            description: candidate.description.clone(),
            published_at: candidate.published_at.timestamp_millis(),
        };

        match self.store.insert_post(&post).await {
            Ok(id) => Ok(InsertOutcome::Inserted(id)),
            Err(e) if e.is_unique_violation() => Ok(InsertOutcome::Duplicate),
            Err(source) => Err(PersistenceError {
                url: post.url,
                source,
            }),
        }
    }
}
