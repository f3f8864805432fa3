//! The `gator <command> [args...]` surface.
//!
//! Commands are registered by name in a [`CommandRegistry`] that `main`
//! builds once and dispatches through. Commands that act on behalf of the
//! logged-in user implement [`UserCommand`] and are wrapped in [`LoggedIn`],
//! which resolves `current_user_name` before the handler runs.

mod agg;
mod browse;
mod feeds;
mod follows;
mod users;

use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::aggregate::IntervalError;
use crate::config::{Config, ConfigError};
use crate::storage::{Database, DatabaseError, User};

pub use agg::{run_aggregator, wait_for_shutdown_signal, Agg};
pub use browse::Browse;
pub use feeds::{normalize_feed_url, AddFeed, Feeds};
pub use follows::{Follow, Following, Unfollow};
pub use users::{Login, Register, Reset, Users};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum CommandError {
    /// Wrong number or shape of arguments.
    #[error("{0}")]
    Usage(String),

    #[error("Unknown command: {0} (run `gator help` for a list)")]
    UnknownCommand(String),

    #[error("Not logged in: run `gator login <name>` or `gator register <name>` first")]
    NotLoggedIn,

    #[error("User {0:?} does not exist")]
    UnknownUser(String),

    #[error("No feed registered with URL {0}")]
    UnknownFeed(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Invalid feed URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{user} is not following {feed}")]
    NotFollowing { user: String, feed: String },

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ============================================================================
// Invocation and State
// ============================================================================

/// A parsed command line: the command name and its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Exactly `N` arguments, or a usage error built from `usage`.
    pub fn expect_args<const N: usize>(&self, usage: &str) -> Result<[&str; N], CommandError> {
        if self.args.len() != N {
            return Err(self.usage_error(usage));
        }
        Ok(std::array::from_fn(|i| self.args[i].as_str()))
    }

    pub fn usage_error(&self, usage: &str) -> CommandError {
        CommandError::Usage(format!("usage: {} {}", self.name, usage).trim_end().to_string())
    }
}

/// Everything a command handler can touch.
pub struct State {
    pub config: Config,
    /// Where `config` is persisted when a command changes it.
    pub config_path: PathBuf,
    pub db: Database,
    /// User-facing output (stdout in the binary).
    pub out: Box<dyn Write + Send + Sync>,
}

impl State {
    /// Resolve the logged-in user from `current_user_name`.
    pub async fn current_user(&self) -> Result<User, CommandError> {
        let name = self
            .config
            .current_user_name
            .as_deref()
            .ok_or(CommandError::NotLoggedIn)?;
        self.db
            .get_user_by_name(name)
            .await?
            .ok_or_else(|| CommandError::UnknownUser(name.to_string()))
    }
}

// ============================================================================
// Command Traits
// ============================================================================

/// A command handler.
pub trait Command: Send + Sync {
    /// Argument synopsis, e.g. `"<name> <url>"`.
    fn usage(&self) -> &'static str;

    /// One-line description for `gator help`.
    fn about(&self) -> &'static str;

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>>;
}

/// A command that runs as the logged-in user.
pub trait UserCommand: Send + Sync {
    fn usage(&self) -> &'static str;

    fn about(&self) -> &'static str;

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
        user: User,
    ) -> BoxFuture<'a, Result<(), CommandError>>;
}

/// Adapts a [`UserCommand`] into a [`Command`] that requires a login.
pub struct LoggedIn<H>(pub H);

impl<H: UserCommand> Command for LoggedIn<H> {
    fn usage(&self) -> &'static str {
        self.0.usage()
    }

    fn about(&self) -> &'static str {
        self.0.about()
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let user = state.current_user().await?;
            tracing::debug!(user = %user.name, command = %invocation.name, "Running as user");
            self.0.execute(state, invocation, user).await
        })
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Command name → handler.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<&'static str, Box<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every gator command.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("register", Register);
        registry.register("login", Login);
        registry.register("users", Users);
        registry.register("reset", Reset);
        registry.register("addfeed", LoggedIn(AddFeed));
        registry.register("feeds", Feeds);
        registry.register("follow", LoggedIn(Follow));
        registry.register("following", LoggedIn(Following));
        registry.register("unfollow", LoggedIn(Unfollow));
        registry.register("browse", LoggedIn(Browse));
        registry.register("agg", Agg);
        registry
    }

    /// Register `command` under `name`, replacing any previous handler.
    pub fn register(&mut self, name: &'static str, command: impl Command + 'static) {
        self.commands.insert(name, Box::new(command));
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }

    /// Dispatch `invocation` to its handler. `help` is built in.
    pub async fn run(&self, state: &mut State, invocation: &Invocation) -> Result<(), CommandError> {
        if invocation.name == "help" {
            return self.help(state);
        }

        let command = self
            .commands
            .get(invocation.name.as_str())
            .ok_or_else(|| CommandError::UnknownCommand(invocation.name.clone()))?;

        tracing::debug!(command = %invocation.name, args = ?invocation.args, "Dispatching command");
        command.execute(state, invocation).await
    }

    fn help(&self, state: &mut State) -> Result<(), CommandError> {
        writeln!(state.out, "Usage: gator [--config FILE] <command> [args...]")?;
        writeln!(state.out)?;
        writeln!(state.out, "Commands:")?;
        for (name, command) in &self.commands {
            let synopsis = format!("{} {}", name, command.usage());
            writeln!(state.out, "  {:<28} {}", synopsis.trim_end(), command.about())?;
        }
        writeln!(state.out, "  {:<28} {}", "help", "Show this list")?;
        Ok(())
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// In-memory output sink and state builder for command tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        pub fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// A state on a fresh in-memory database with its config in a
    /// per-test temp directory.
    pub async fn state(test_name: &str) -> (State, Captured) {
        let dir = std::env::temp_dir().join(format!("gator_command_test_{test_name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();

        let captured = Captured::default();
        let state = State {
            config: Config::default(),
            config_path: dir.join("config.json"),
            db: Database::open(":memory:").await.unwrap(),
            out: Box::new(captured.clone()),
        };
        (state, captured)
    }

    pub async fn run(
        state: &mut State,
        line: &[&str],
    ) -> Result<(), CommandError> {
        let invocation = Invocation::new(line[0], line[1..].iter().copied());
        CommandRegistry::standard().run(state, &invocation).await
    }
}
