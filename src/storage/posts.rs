use super::schema::Database;
use super::types::{now_millis, DatabaseError, NewPost, Post};

/// Maximum number of posts to return from any single query (OOM protection)
const MAX_POSTS: i64 = 2000;

const POST_COLUMNS: &str =
    "p.id, p.feed_id, p.title, p.url, p.description, p.published_at, p.created_at, p.updated_at";

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post, returning its id.
    ///
    /// Plain INSERT on purpose: a link that is already stored surfaces as
    /// `DatabaseError::UniqueViolation` so the caller can tell a duplicate
    /// from a real failure.
    pub async fn create_post(&self, post: &NewPost) -> Result<i64, DatabaseError> {
        let now = now_millis();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO posts (feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(id)
    }

    /// Newest posts from the feeds `user_id` follows.
    ///
    /// `limit` is capped at MAX_POSTS.
    pub async fn get_posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Post>, DatabaseError> {
        let safe_limit = limit.clamp(0, MAX_POSTS);
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.id DESC
            LIMIT ?
        "#
        ))
        .bind(user_id)
        .bind(safe_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(posts)
    }

    /// Posts of one feed in insertion order
    pub async fn get_posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            WHERE p.feed_id = ?
            ORDER BY p.id
            LIMIT ?
        "#
        ))
        .bind(feed_id)
        .bind(MAX_POSTS)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, NewPost};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/rss", user.id)
            .await
            .unwrap();
        (db, user.id, feed.id)
    }

    fn new_post(feed_id: i64, slug: &str, published_at: i64) -> NewPost {
        NewPost {
            feed_id,
            title: format!("Post {slug}"),
            url: format!("https://example.com/{slug}"),
            description: Some("Test description".to_string()),
            published_at,
        }
    }

    #[tokio::test]
    async fn test_create_post() {
        let (db, _, feed_id) = setup().await;
        let id = db.create_post(&new_post(feed_id, "a", 1_000)).await.unwrap();
        assert!(id > 0);

        let posts = db.get_posts_for_feed(feed_id).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://example.com/a");
        assert_eq!(posts[0].published_at, 1_000);
    }

    #[tokio::test]
    async fn test_duplicate_link_is_unique_violation_and_stores_once() {
        let (db, _, feed_id) = setup().await;
        db.create_post(&new_post(feed_id, "a", 1_000)).await.unwrap();

        let err = db
            .create_post(&new_post(feed_id, "a", 2_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
        assert_eq!(db.get_posts_for_feed(feed_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_posts_for_user_only_followed_newest_first() {
        let (db, user_id, feed_id) = setup().await;
        let other = db
            .create_feed("Other", "https://other.example.com/rss", user_id)
            .await
            .unwrap();
        db.create_feed_follow(user_id, feed_id).await.unwrap();

        db.create_post(&new_post(feed_id, "old", 1_000)).await.unwrap();
        db.create_post(&new_post(feed_id, "new", 3_000)).await.unwrap();
        db.create_post(&new_post(other.id, "unfollowed", 5_000))
            .await
            .unwrap();

        let posts = db.get_posts_for_user(user_id, 10).await.unwrap();
        let urls: Vec<&str> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/new", "https://example.com/old"]
        );
    }

    #[tokio::test]
    async fn test_posts_for_user_respects_limit() {
        let (db, user_id, feed_id) = setup().await;
        db.create_feed_follow(user_id, feed_id).await.unwrap();
        for i in 0..5 {
            db.create_post(&new_post(feed_id, &i.to_string(), i))
                .await
                .unwrap();
        }

        assert_eq!(db.get_posts_for_user(user_id, 2).await.unwrap().len(), 2);
        assert!(db.get_posts_for_user(user_id, -1).await.unwrap().is_empty());
    }
}
