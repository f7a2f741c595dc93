//! `tvd jobs` – show recent download jobs.

use anyhow::Result;
use tvd_core::render::format_date;
use tvd_core::store::Store;

pub async fn run_jobs(store: &Store, limit: i64) -> Result<()> {
    let jobs = store.list_jobs(limit).await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!(
        "{:<6} {:<12} {:<10} {:<12} {:<17} {}",
        "ID", "USER", "STATE", "PLATFORM", "UPDATED", "URL"
    );
    for j in jobs {
        println!(
            "{:<6} {:<12} {:<10} {:<12} {:<17} {}",
            j.id,
            j.user_id,
            j.state.as_str(),
            j.platform,
            format_date(j.updated_at),
            j.url
        );
    }
    Ok(())
}
