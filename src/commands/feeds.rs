use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::io::Write;
use url::Url;

use super::{Command, CommandError, Invocation, State, UserCommand};
use crate::storage::User;

/// Validate a feed URL and return its normalized form.
///
/// Only `http` and `https` URLs with a host are accepted. The normalized
/// string (as produced by the `url` crate) is what gets stored, so lookups
/// by URL must go through this too.
pub fn normalize_feed_url(raw: &str) -> Result<String, CommandError> {
    let invalid = |reason: &str| CommandError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs are supported"));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(invalid("missing host")),
    }
    Ok(parsed.into())
}

pub(super) fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// `addfeed <name> <url>`: register a feed and follow it.
pub struct AddFeed;

impl UserCommand for AddFeed {
    fn usage(&self) -> &'static str {
        "<name> <url>"
    }

    fn about(&self) -> &'static str {
        "Add a feed and follow it"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
        user: User,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let [name, raw_url] = invocation.expect_args::<2>(self.usage())?;
            let url = normalize_feed_url(raw_url)?;

            let feed = match state.db.create_feed(name, &url, user.id).await {
                Ok(feed) => feed,
                Err(e) if e.is_unique_violation() => {
                    return Err(CommandError::AlreadyExists(format!(
                        "A feed with URL {url} is already registered (use `gator follow {url}`)"
                    )));
                }
                Err(e) => return Err(e.into()),
            };
            tracing::info!(feed_id = feed.id, url = %feed.url, user = %user.name, "Added feed");

            let follow = state.db.create_feed_follow(user.id, feed.id).await?;
            writeln!(state.out, "Added feed {} ({})", feed.name, feed.url)?;
            writeln!(state.out, "{} following {}", follow.user_name, follow.feed_name)?;
            Ok(())
        })
    }
}

/// `feeds`: list every registered feed.
pub struct Feeds;

impl Command for Feeds {
    fn usage(&self) -> &'static str {
        ""
    }

    fn about(&self) -> &'static str {
        "List all feeds"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            invocation.expect_args::<0>(self.usage())?;
            let feeds = state.db.get_feeds().await?;
            if feeds.is_empty() {
                writeln!(state.out, "No feeds registered.")?;
                return Ok(());
            }

            for feed in &feeds {
                let last_fetched = feed
                    .last_fetched_at
                    .map(format_millis)
                    .unwrap_or_else(|| "never".to_string());
                writeln!(state.out, "* Name:         {}", feed.name)?;
                writeln!(state.out, "* URL:          {}", feed.url)?;
                writeln!(state.out, "* Added by:     {}", feed.owner_name)?;
                writeln!(state.out, "* Last fetched: {last_fetched}")?;
                writeln!(state.out, "=====================================")?;
            }
            Ok(())
        })
    }
}
