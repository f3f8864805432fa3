//! gator: a command-line RSS aggregator.
//!
//! Users register feeds and follow them; `gator agg` polls one feed per tick
//! and stores new posts, which `gator browse` then lists.

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
