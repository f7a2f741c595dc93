//! Admin/analytics store (SQLite via sqlx).
//!
//! Users (ban/premium flags, settings), the per-hour rate-limit buckets, the
//! download log used for statistics, and the persistent job queue.

mod db;
mod downloads;
mod jobs;
mod rate_limit;
mod types;
mod users;

pub use db::{unix_timestamp, Store};
pub use types::*;
