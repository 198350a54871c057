//! # votalloween-store
//!
//! SQLite persistence for the costume contest.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every component of
//! the contest: the singleton configuration, the costume registry, the vote
//! ledger and the results aggregator. Vote counts are never stored; they are
//! always derived from the vote rows.

pub mod config;
pub mod costumes;
pub mod database;
pub mod migrations;
pub mod models;
pub mod results;
pub mod votes;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use results::tally;
