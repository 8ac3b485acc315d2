//! cardiorisk: Heart disease risk scoring
//!
//! Reads one JSON request from stdin, scores it against the configured
//! artifact set and writes the JSON result to stdout.
//!
//! `cardiorisk --framingham` instead reads a Framingham request and writes
//! `{"tenYearRisk": ...}` without loading any artifacts.

use std::io::Read;

use anyhow::{Context, Result};

use cardiorisk::adapters::FsArtifactStore;
use cardiorisk::application::InferenceService;
use cardiorisk::config::Config;
use cardiorisk::domain::{ten_year_risk, FraminghamInput};

fn read_stdin() -> Result<String> {
    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("Failed to read request from stdin")?;
    Ok(body)
}

fn main() -> Result<()> {
    let config = Config::from_env();

    // stdout is the response channel; logs go to stderr or a file.
    let _guard =
        cardiorisk::logging::init(&config.log_mode).context("Failed to initialise logging")?;

    tracing::info!("Starting cardiorisk...");

    match std::env::args().nth(1).as_deref() {
        None => {}
        Some("--framingham") => {
            let input = FraminghamInput::from_json(&read_stdin()?)?;
            let risk = ten_year_risk(&input)?;
            tracing::info!("Framingham ten-year risk: {:.1}%", risk.ten_year_risk);
            println!("{}", serde_json::to_string(&risk)?);
            return Ok(());
        }
        Some(other) => anyhow::bail!("Unknown argument: {other}\nUsage: cardiorisk [--framingham]"),
    }

    let store = FsArtifactStore::from_config(&config)?;
    let service = InferenceService::from_store(&store)
        .with_context(|| format!("Failed to load artifacts from {:?}", config.artifact_dir))?;

    let result = service.infer_json(&read_stdin()?)?;
    println!("{}", serde_json::to_string(&result)?);

    Ok(())
}
