//! `ingest-job <urls…>` (spec §6): like `process`, but also enqueues the
//! `ProcessSubmission` Pipeline Job directly instead of waiting for the next
//! url-sensor poll (spec §4.4) to notice the new submission. Useful for
//! operators who want a source picked up on the Scheduler's very next tick.

use crate::bootstrap::Engine;
use chrono::{Duration, Utc};
use console::style;
use resonance_core::model::PipelineJobKind;
use resonance_core::Result;

pub async fn run(engine: &Engine, urls: &[String], user_id: &str, language: Option<&str>) -> Result<()> {
    for url in urls {
        let submission_id = engine
            .store
            .insert_submission(
                crate::commands::process::classify_source(url),
                url,
                user_id,
                language,
                Duration::hours(engine.config.dedup_window_hours),
                engine.config.backpressure_high_water_mark,
            )
            .await?;

        let kind = PipelineJobKind::ProcessSubmission { submission_id };
        if !engine.store.pipeline_job_exists(&kind).await? {
            engine.store.enqueue_pipeline_job(kind, 0, Utc::now()).await?;
        }

        println!("{} submission {} for {}", style("ingested").green(), style(submission_id).bold(), url);
    }
    Ok(())
}
