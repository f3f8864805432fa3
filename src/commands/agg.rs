use anyhow::Context;
use futures::future::BoxFuture;
use std::io::Write;
use std::time::Duration;
use tokio::sync::watch;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::{Command, CommandError, Invocation, State};
use crate::aggregate::{parse_interval, Aggregator, Scheduler, SchedulerStats};
use crate::feed::DocumentFetcher;

/// `agg <interval>`: poll feeds until interrupted.
pub struct Agg;

impl Command for Agg {
    fn usage(&self) -> &'static str {
        "<interval>"
    }

    fn about(&self) -> &'static str {
        "Fetch one feed per interval (e.g. 30s, 1m) until Ctrl-C"
    }

    fn execute<'a>(
        &'a self,
        state: &'a mut State,
        invocation: &'a Invocation,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let [literal] = invocation.expect_args::<1>(self.usage())?;
            let period = parse_interval(literal)?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let listener = tokio::spawn(wait_for_shutdown_signal(shutdown_tx));
            let result = run_aggregator(state, period, shutdown_rx).await;
            listener.abort();
            result.map(|_| ())
        })
    }
}

/// Run the scheduler over the state's database until `shutdown` fires.
pub async fn run_aggregator(
    state: &mut State,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> Result<SchedulerStats, CommandError> {
    let scheduler = Scheduler::new(period)?;
    let fetcher = DocumentFetcher::new(state.config.fetch_timeout(), &state.config.user_agent)
        .context("Failed to build HTTP client")?;

    tracing::debug!(timeout = ?fetcher.timeout(), "Fetcher ready");
    writeln!(state.out, "Collecting feeds every {:?}", scheduler.period())?;
    state.out.flush()?;

    let mut aggregator = Aggregator::new(state.db.clone(), fetcher);
    let stats = scheduler.run(&mut aggregator, shutdown).await;

    writeln!(
        state.out,
        "Stopped after {} cycles ({} ticks skipped)",
        stats.cycles, stats.dropped_ticks
    )?;
    Ok(stats)
}

/// Send `true` on `shutdown` at the first SIGINT (Ctrl-C) or SIGTERM.
///
/// The sender is held until then, so the scheduler keeps running even if a
/// handler cannot be installed.
pub async fn wait_for_shutdown_signal(shutdown: watch::Sender<bool>) {
    #[cfg(unix)]
    let sigterm_fut = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm_fut = std::future::pending::<()>();

    let sigint_fut = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = sigterm_fut => tracing::info!("Received SIGTERM, shutting down gracefully"),
        () = sigint_fut => tracing::info!("Received SIGINT, shutting down gracefully"),
    }
    let _ = shutdown.send(true);
}

#[cfg(test)]
mod tests {
    use super::super::testing::{run, state};
    use super::*;
    use crate::aggregate::IntervalError;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_agg_requires_interval() {
        let (mut state, _) = state("agg_usage").await;
        let err = run(&mut state, &["agg"]).await.unwrap_err();
        assert_eq!(err.to_string(), "usage: agg <interval>");

        let err = run(&mut state, &["agg", "1m", "2m"]).await.unwrap_err();
        assert!(matches!(err, CommandError::Usage(_)));
    }

    #[tokio::test]
    async fn test_agg_rejects_bad_interval() {
        let (mut state, _) = state("agg_bad_interval").await;

        let err = run(&mut state, &["agg", "0s"]).await.unwrap_err();
        assert!(matches!(err, CommandError::Interval(IntervalError::NonPositive(_))));

        let err = run(&mut state, &["agg", "soon"]).await.unwrap_err();
        assert!(matches!(err, CommandError::Interval(_)));
    }

    #[tokio::test]
    async fn test_run_aggregator_ingests_until_shutdown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0"><channel><title>Blog</title>
                <item><title>Hello</title><link>https://example.com/hello</link>
                <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate></item>
                </channel></rss>"#,
            ))
            .mount(&server)
            .await;

        let (mut state, out) = state("agg_run").await;
        run(&mut state, &["register", "kahya"]).await.unwrap();
        run(&mut state, &["addfeed", "Blog", &server.uri()]).await.unwrap();
        let feed = state.db.get_feeds().await.unwrap().remove(0);
        out.clear();

        let db = state.db.clone();
        let (tx, rx) = watch::channel(false);
        let stop = async move {
            for _ in 0..200 {
                if !db.get_posts_for_feed(feed.id).await.unwrap().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            // let the cycle finish logging before stopping
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        };

        let (stats, ()) = tokio::join!(
            run_aggregator(&mut state, Duration::from_secs(3600), rx),
            stop
        );

        assert_eq!(stats.unwrap().cycles, 1);
        assert_eq!(state.db.get_posts_for_feed(feed.id).await.unwrap().len(), 1);
        assert_eq!(
            out.text(),
            "Collecting feeds every 3600s\nStopped after 1 cycles (0 ticks skipped)\n"
        );
    }
}
