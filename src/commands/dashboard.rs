//! `dashboard` (spec §6): a denser terminal view than `status` — stage
//! counts and worker pool saturation side by side.

use crate::bootstrap::Engine;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use resonance_core::Result;

pub async fn run(engine: &Engine) -> Result<()> {
    let stats = engine.store.stats().await?;

    let mut stages = Table::new();
    stages.load_preset(UTF8_FULL).set_header(vec!["stage", "count"]);
    for (stage, count) in &stats.by_stage {
        stages.add_row(vec![Cell::new(stage.to_string()), Cell::new(count)]);
    }
    println!("{stages}");

    let c = &engine.config.concurrency;
    let mut pools = Table::new();
    pools.load_preset(UTF8_FULL).set_header(vec!["pool", "configured"]);
    pools.add_row(vec![Cell::new("download"), Cell::new(c.download)]);
    pools.add_row(vec![Cell::new("transcribe"), Cell::new(c.transcribe)]);
    pools.add_row(vec![Cell::new("chunk"), Cell::new(c.chunk)]);
    pools.add_row(vec![Cell::new("embed"), Cell::new(c.embed)]);
    pools.add_row(vec![Cell::new("global"), Cell::new(c.global_ceiling)]);
    println!("{pools}");

    println!("pending {} · failed {} · lease expirations (1h) {}", stats.pending_count, stats.failed_count, stats.lease_expirations_last_hour);
    Ok(())
}
