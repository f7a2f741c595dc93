//! `tvd users` – list users, most active first.

use anyhow::Result;
use tvd_core::render::{format_date, user_level};
use tvd_core::store::Store;

pub async fn run_users(store: &Store, limit: i64) -> Result<()> {
    let users = store.list_users(limit).await?;
    if users.is_empty() {
        println!("No users yet.");
        return Ok(());
    }
    println!(
        "{:<12} {:<20} {:<10} {:<10} {:<17} {}",
        "ID", "USERNAME", "DOWNLOADS", "LEVEL", "JOINED", "FLAGS"
    );
    for u in users {
        let mut flags = Vec::new();
        if u.is_banned {
            flags.push("banned");
        }
        if u.is_premium {
            flags.push("premium");
        }
        println!(
            "{:<12} {:<20} {:<10} {:<10} {:<17} {}",
            u.user_id,
            u.username.as_deref().unwrap_or("-"),
            u.downloads_count,
            user_level(u.downloads_count),
            format_date(u.joined_at),
            flags.join(",")
        );
    }
    Ok(())
}
