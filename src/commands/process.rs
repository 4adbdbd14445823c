//! `process <urls…>` (spec §6): submits one or more sources and returns
//! immediately — the Scheduler (run separately via `run-ingestion --all`)
//! picks them up. Mirrors `POST /process`'s classification and dedup rules.

use crate::bootstrap::Engine;
use chrono::Duration;
use console::style;
use resonance_core::model::SourceKind;
use resonance_core::Result;

pub fn classify_source(source: &str) -> SourceKind {
    if source.starts_with("http://") || source.starts_with("https://") {
        SourceKind::RemoteUrl
    } else {
        SourceKind::LocalFile
    }
}

pub async fn run(engine: &Engine, urls: &[String], user_id: &str, language: Option<&str>) -> Result<()> {
    for url in urls {
        let id = engine
            .store
            .insert_submission(
                classify_source(url),
                url,
                user_id,
                language,
                Duration::hours(engine.config.dedup_window_hours),
                engine.config.backpressure_high_water_mark,
            )
            .await?;
        println!("{} submission {} for {}", style("queued").green(), style(id).bold(), url);
    }
    Ok(())
}
