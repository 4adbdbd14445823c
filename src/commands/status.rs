//! `status` (spec §6): one-shot snapshot of `GET /status`'s contents
//! printed for a terminal instead of returned as JSON.

use crate::bootstrap::Engine;
use console::style;
use resonance_core::Result;

pub async fn run(engine: &Engine) -> Result<()> {
    let stats = engine.store.stats().await?;
    let storage_bytes = engine.artifacts.total_size().unwrap_or(0);

    println!("{}", style("submissions").bold());
    for (stage, count) in &stats.by_stage {
        println!("  {:<12} {}", stage.to_string(), count);
    }
    println!("  {:<12} {}", "total", stats.total_submissions);
    println!("  {:<12} {}", "pending", stats.pending_count);
    println!("  {:<12} {}", "failed", stats.failed_count);
    println!();
    println!("{}", style("operational").bold());
    println!("  lease expirations (1h): {}", stats.lease_expirations_last_hour);
    println!("  feedback events:        {}", stats.feedback_count);
    println!("  storage:                {} bytes", storage_bytes);
    Ok(())
}
