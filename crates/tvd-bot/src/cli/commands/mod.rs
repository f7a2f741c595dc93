//! CLI command handlers, one file per command.

mod ban;
mod checksum;
mod jobs;
mod probe;
mod run;
mod stats;
mod users;

pub use ban::{run_ban, run_premium};
pub use checksum::run_checksum;
pub use jobs::run_jobs;
pub use probe::run_probe;
pub use run::run_bot;
pub use stats::run_stats;
pub use users::run_users;
