//! `init`: interactive first-run setup. Asks the handful of questions
//! spec §6's environment variables and `ResonanceConfig` concurrency
//! profile need, then persists `resonance.toml` and (optionally) a local
//! `.env` file with the secrets.

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use resonance_core::config::{ConcurrencyConfig, ResonanceConfig};
use std::path::{Path, PathBuf};

pub fn run() -> anyhow::Result<()> {
    print_welcome();

    let config_path = Path::new("resonance.toml");
    if config_path.exists()
        && !Confirm::with_theme(&ColorfulTheme::default()).with_prompt("resonance.toml already exists. Overwrite?").default(false).interact()?
    {
        println!("{}", style("Configuration unchanged.").cyan());
        return Ok(());
    }

    let data_root: String = Input::with_theme(&ColorfulTheme::default()).with_prompt("Data root directory").default("./data".to_string()).interact_text()?;

    let profile_idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Worker pool profile")
        .items(&["light (single host, low traffic)", "balanced (default)", "heavy (dedicated host)"])
        .default(1)
        .interact()?;

    let mut config = ResonanceConfig { data_root: PathBuf::from(data_root), ..ResonanceConfig::default() };
    config.concurrency = match profile_idx {
        0 => ConcurrencyConfig { download: 1, transcribe: 1, chunk: 2, embed: 2, global_ceiling: 4 },
        2 => ConcurrencyConfig { download: 4, transcribe: 2, chunk: 8, embed: 8, global_ceiling: 32 },
        _ => ConcurrencyConfig::default(),
    };

    config.to_file(config_path)?;
    println!("{} wrote {}", style("done").green(), config_path.display());

    if Confirm::with_theme(&ColorfulTheme::default()).with_prompt("Configure secrets (.env) now?").default(true).interact()? {
        write_env_file()?;
    }

    print_summary(&config);
    Ok(())
}

fn write_env_file() -> anyhow::Result<()> {
    let llm_api_key: String = Input::with_theme(&ColorfulTheme::default()).with_prompt("LLM_API_KEY (required for retrieval)").allow_empty(true).interact_text()?;
    let bot_token: String = Input::with_theme(&ColorfulTheme::default()).with_prompt("BOT_TOKEN (optional, chat interface)").allow_empty(true).interact_text()?;
    let admin_chat_id: String =
        Input::with_theme(&ColorfulTheme::default()).with_prompt("ADMIN_CHAT_ID (optional, alert dispatch)").allow_empty(true).interact_text()?;

    let device_idx = Select::with_theme(&ColorfulTheme::default()).with_prompt("DEVICE").items(&["auto", "cpu", "gpu"]).default(0).interact()?;
    let device = ["auto", "cpu", "gpu"][device_idx];

    let mut contents = String::new();
    if !llm_api_key.is_empty() {
        contents.push_str(&format!("LLM_API_KEY={llm_api_key}\n"));
    }
    if !bot_token.is_empty() {
        contents.push_str(&format!("BOT_TOKEN={bot_token}\n"));
    }
    if !admin_chat_id.is_empty() {
        contents.push_str(&format!("ADMIN_CHAT_ID={admin_chat_id}\n"));
    }
    contents.push_str(&format!("DEVICE={device}\n"));

    std::fs::write(".env", contents)?;
    println!("{} wrote .env", style("done").green());
    Ok(())
}

fn print_welcome() {
    println!();
    println!("{}", style("Resonance setup").cyan().bold());
    println!("This wizard creates resonance.toml and, optionally, a .env file with secrets.");
    println!();
}

fn print_summary(config: &ResonanceConfig) {
    println!();
    println!("{}", style("Summary").bold());
    println!("  data root:   {}", config.data_root.display());
    println!(
        "  concurrency: download={} transcribe={} chunk={} embed={}",
        config.concurrency.download, config.concurrency.transcribe, config.concurrency.chunk, config.concurrency.embed
    );
    println!();
    println!("Run `resonance run-ingestion --all` to start the scheduler, or `resonance process <url>` to submit a source.");
}
