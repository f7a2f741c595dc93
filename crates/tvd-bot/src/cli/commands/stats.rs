//! `tvd stats` – global usage statistics.

use anyhow::Result;
use tvd_core::store::{unix_timestamp, Store};

pub async fn run_stats(store: &Store) -> Result<()> {
    let g = store.global_stats(unix_timestamp()).await?;
    println!("Users:            {} ({} banned)", g.total_users, g.banned_users);
    println!("Downloads (all):  {}", g.total_downloads);
    println!("Downloads (24h):  {} ({} completed)", g.downloads_24h, g.completed_24h);
    if !g.per_platform.is_empty() {
        println!();
        println!("{:<16} {}", "PLATFORM", "DOWNLOADS");
        for (platform, n) in &g.per_platform {
            println!("{:<16} {}", platform, n);
        }
    }
    Ok(())
}
