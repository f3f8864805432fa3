//! The feed-polling pipeline.
//!
//! One [`Scheduler`] tick runs one ingestion cycle on the [`Aggregator`]:
//!
//! 1. [`FeedSelector`] picks the least recently fetched feed and claims it
//! 2. [`DocumentFetcher`](crate::feed::DocumentFetcher) retrieves and parses it
//! 3. each entry is normalized and handed to the [`PostSink`]
//!
//! Only a failed selection, fetch or parse ends a cycle early. Entry-level
//! problems are logged, recorded in the [`CycleSummary`], and skipped.

mod cycle;
mod interval;
mod scheduler;
mod selector;
mod sink;

pub use cycle::{Aggregator, CycleError, CycleStage, CycleSummary, ItemOutcome};
pub use interval::{parse_interval, IntervalError};
pub use scheduler::{Scheduler, SchedulerStats, Tick, TickSchedule};
pub use selector::{FeedSelector, SelectionError};
pub use sink::{InsertOutcome, PersistenceError, PostSink};
