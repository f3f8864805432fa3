use futures::future::BoxFuture;
use std::io::Write;

use super::feeds::normalize_feed_url;
use super::{CommandError, Invocation, State, UserCommand};
use crate::storage::{Feed, User};

async fn feed_by_url(state: &State, raw_url: &str) -> Result<Feed, CommandError> {
    let url = normalize_feed_url(raw_url)?;
    state
        .db
        .get_feed_by_url(&url)
        .await?
        .ok_or(CommandError::UnknownFeed(url))
}

/// `follow <url>`: follow a feed someone already added.
pub struct Follow;

impl UserCommand for Follow {
    fn usage(&self) -> &'static str {
        "<url>"
    }

    fn about(&self) -> &'static str {
        "Follow an existing feed"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
        user: User,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let [url] = invocation.expect_args::<1>(self.usage())?;
            let feed = feed_by_url(state, url).await?;

            let follow = match state.db.create_feed_follow(user.id, feed.id).await {
                Ok(follow) => follow,
                Err(e) if e.is_unique_violation() => {
                    return Err(CommandError::AlreadyExists(format!(
                        "{} already follows {}",
                        user.name, feed.name
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            writeln!(state.out, "{} now following {}", follow.user_name, follow.feed_name)?;
            Ok(())
        })
    }
}

/// `following`: list the feeds the current user follows.
pub struct Following;

impl UserCommand for Following {
    fn usage(&self) -> &'static str {
        ""
    }

    fn about(&self) -> &'static str {
        "List the feeds you follow"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
        user: User,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            invocation.expect_args::<0>(self.usage())?;
            let follows = state.db.get_feed_follows_for_user(user.id).await?;
            if follows.is_empty() {
                writeln!(state.out, "{} is not following any feeds.", user.name)?;
                return Ok(());
            }

            writeln!(state.out, "{} following {} feeds:", user.name, follows.len())?;
            for follow in &follows {
                writeln!(state.out, "* {}", follow.feed_name)?;
            }
            Ok(())
        })
    }
}

/// `unfollow <url>`: stop following a feed.
pub struct Unfollow;

impl UserCommand for Unfollow {
    fn usage(&self) -> &'static str {
        "<url>"
    }

    fn about(&self) -> &'static str {
        "Stop following a feed"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
        user: User,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let [url] = invocation.expect_args::<1>(self.usage())?;
            let feed = feed_by_url(state, url).await?;

            if !state.db.delete_feed_follow(user.id, feed.id).await? {
                return Err(CommandError::NotFollowing {
                    user: user.name,
                    feed: feed.name,
                });
            }
            writeln!(state.out, "{} unfollowed {}", user.name, feed.name)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{run, state, Captured};
    use super::*;

    const URL: &str = "https://example.com/rss";

    /// kahya adds the feed; holgith is logged in afterwards.
    async fn two_users_one_feed(name: &str) -> (State, Captured) {
        let (mut state, out) = state(name).await;
        run(&mut state, &["register", "kahya"]).await.unwrap();
        run(&mut state, &["addfeed", "Blog", URL]).await.unwrap();
        run(&mut state, &["register", "holgith"]).await.unwrap();
        out.clear();
        (state, out)
    }

    #[tokio::test]
    async fn test_follow_existing_feed() {
        let (mut state, out) = two_users_one_feed("follow").await;

        run(&mut state, &["follow", URL]).await.unwrap();
        assert_eq!(out.text(), "holgith now following Blog\n");

        out.clear();
        run(&mut state, &["following"]).await.unwrap();
        assert_eq!(out.text(), "holgith following 1 feeds:\n* Blog\n");
    }

    #[tokio::test]
    async fn test_follow_twice_fails() {
        let (mut state, _) = two_users_one_feed("follow_twice").await;
        run(&mut state, &["follow", URL]).await.unwrap();

        let err = run(&mut state, &["follow", URL]).await.unwrap_err();
        assert!(matches!(err, CommandError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_follow_unknown_feed() {
        let (mut state, _) = two_users_one_feed("follow_unknown").await;
        let err = run(&mut state, &["follow", "https://other.example/rss"])
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnknownFeed(_)));
    }

    #[tokio::test]
    async fn test_following_empty() {
        let (mut state, out) = two_users_one_feed("following_empty").await;
        run(&mut state, &["following"]).await.unwrap();
        assert_eq!(out.text(), "holgith is not following any feeds.\n");
    }

    #[tokio::test]
    async fn test_unfollow() {
        let (mut state, out) = two_users_one_feed("unfollow").await;
        run(&mut state, &["follow", URL]).await.unwrap();
        out.clear();

        run(&mut state, &["unfollow", URL]).await.unwrap();
        assert_eq!(out.text(), "holgith unfollowed Blog\n");

        let err = run(&mut state, &["unfollow", URL]).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFollowing { .. }));
    }
}
