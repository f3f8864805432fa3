use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use gator::commands::{CommandRegistry, Invocation, State};
use gator::config::Config;
use gator::storage::{Database, DatabaseError};

#[derive(Parser, Debug)]
#[command(
    name = "gator",
    about = "Command-line RSS aggregator",
    after_help = "Run `gator help` for the list of commands."
)]
struct Args {
    /// Config file (default: ~/.gatorconfig.json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Command to run
    command: String,

    /// Command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.db_path()?;
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::Locked) => {
            anyhow::bail!("The database is locked by another gator process. Please try again.");
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to open database {}: {}",
                db_path.display(),
                e
            ));
        }
    };

    let mut state = State {
        config,
        config_path,
        db,
        out: Box::new(std::io::stdout()),
    };
    let registry = CommandRegistry::standard();
    let invocation = Invocation::new(args.command, args.args);

    registry.run(&mut state, &invocation).await?;
    Ok(())
}
