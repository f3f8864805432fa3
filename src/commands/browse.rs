use futures::future::BoxFuture;
use std::io::Write;

use super::feeds::format_millis;
use super::{CommandError, Invocation, State, UserCommand};
use crate::storage::User;

/// `browse [limit]`: newest posts from the feeds the current user follows.
pub struct Browse;

impl UserCommand for Browse {
    fn usage(&self) -> &'static str {
        "[limit]"
    }

    fn about(&self) -> &'static str {
        "Show the newest posts from the feeds you follow"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
        user: User,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let limit = match invocation.args.as_slice() {
                [] => state.config.browse_limit,
                [raw] => match raw.parse::<i64>() {
                    Ok(n) if n > 0 => n,
                    _ => return Err(invocation.usage_error(self.usage())),
                },
                _ => return Err(invocation.usage_error(self.usage())),
            };

            let posts = state.db.get_posts_for_user(user.id, limit).await?;
            writeln!(state.out, "Found {} posts for user {}:", posts.len(), user.name)?;
            for post in &posts {
                writeln!(state.out, "------")?;
                writeln!(state.out, "{}", post.title)?;
                writeln!(state.out, "  Published: {}", format_millis(post.published_at))?;
                writeln!(state.out, "  URL:       {}", post.url)?;
                if let Some(description) = &post.description {
                    writeln!(state.out)?;
                    writeln!(state.out, "{description}")?;
                }
            }
            Ok(())
        })
    }
}
