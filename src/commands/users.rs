use futures::future::BoxFuture;
use std::io::Write;

use super::{Command, CommandError, Invocation, State};

/// `register <name>`: create a user and log in as them.
pub struct Register;

impl Command for Register {
    fn usage(&self) -> &'static str {
        "<name>"
    }

    fn about(&self) -> &'static str {
        "Create a user and log in as them"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let [name] = invocation.expect_args::<1>(self.usage())?;
            let name = name.trim();
            if name.is_empty() {
                return Err(invocation.usage_error(self.usage()));
            }

            match state.db.create_user(name).await {
                Ok(user) => tracing::info!(user_id = user.id, name = %user.name, "Registered user"),
                Err(e) if e.is_unique_violation() => {
                    return Err(CommandError::AlreadyExists(format!(
                        "User {name:?} already exists"
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            state.config.set_user(name, &state.config_path)?;
            writeln!(state.out, "Registered user: {name}")?;
            Ok(())
        })
    }
}

/// `login <name>`: switch the current user.
pub struct Login;

impl Command for Login {
    fn usage(&self) -> &'static str {
        "<name>"
    }

    fn about(&self) -> &'static str {
        "Log in as an existing user"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let [name] = invocation.expect_args::<1>(self.usage())?;
            let user = state
                .db
                .get_user_by_name(name)
                .await?
                .ok_or_else(|| CommandError::UnknownUser(name.to_string()))?;

            state.config.set_user(&user.name, &state.config_path)?;
            writeln!(state.out, "Logged in as {}", user.name)?;
            Ok(())
        })
    }
}

/// `users`: list users, marking the current one.
pub struct Users;

impl Command for Users {
    fn usage(&self) -> &'static str {
        ""
    }

    fn about(&self) -> &'static str {
        "List users"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            invocation.expect_args::<0>(self.usage())?;
            let users = state.db.get_users().await?;
            let current = state.config.current_user_name.as_deref();

            for user in &users {
                if Some(user.name.as_str()) == current {
                    writeln!(state.out, "* {} (current)", user.name)?;
                } else {
                    writeln!(state.out, "* {}", user.name)?;
                }
            }
            Ok(())
        })
    }
}

/// `reset`: delete every user, and with them all feeds, follows and posts.
pub struct Reset;

impl Command for Reset {
    fn usage(&self) -> &'static str {
        ""
    }

    fn about(&self) -> &'static str {
        "Delete all users, feeds and posts"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            invocation.expect_args::<0>(self.usage())?;
            let deleted = state.db.delete_users().await?;
            tracing::info!(deleted, "Reset database");
            writeln!(state.out, "Users deleted ({deleted})")?;
            Ok(())
        })
    }
}
