//! `tvd ban|unban <id>` and `tvd premium <id> [--off]`: user flags.

use anyhow::Result;
use tvd_core::store::Store;

pub async fn run_ban(store: &Store, user_id: i64, banned: bool) -> Result<()> {
    store.set_banned(user_id, banned).await?;
    if banned {
        // A running bot would keep working on these; queued ones can go now.
        let cancelled = store.cancel_queued_jobs_for_user(user_id).await?;
        println!("Banned user {user_id} ({cancelled} queued job(s) cancelled)");
    } else {
        println!("Unbanned user {user_id}");
    }
    Ok(())
}

pub async fn run_premium(store: &Store, user_id: i64, premium: bool) -> Result<()> {
    store.set_premium(user_id, premium).await?;
    let verb = if premium { "Granted" } else { "Revoked" };
    println!("{verb} premium for user {user_id}");
    Ok(())
}
