//! Training utility.
//!
//! Fits the scaler and random forest on a labeled dataset, prints the
//! held-out evaluation and writes the artifact set.
//!
//! # Usage
//!
//! ```bash
//! train_model <dataset> [--out <dir>] [--seed <n>] [--trees <n>] [--max-depth <n>]
//! ```
//!
//! `<dataset>` is a `.csv` file with a header row or a JSON array of records.
//! `--out` defaults to `CARDIORISK_ARTIFACT_DIR` (or `artifacts`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

use cardiorisk::adapters::dataset::load_dataset;
use cardiorisk::adapters::FsArtifactStore;
use cardiorisk::application::Trainer;
use cardiorisk::config::{Config, TrainingConfig};

const USAGE: &str =
    "Usage: train_model <dataset> [--out <dir>] [--seed <n>] [--trees <n>] [--max-depth <n>]";

struct Args {
    dataset: PathBuf,
    out: Option<PathBuf>,
    training: TrainingConfig,
}

/// Parse the numeric value following `flag`.
fn parse_value<T: FromStr>(flag: &str, value: Option<String>) -> Result<T> {
    let value = value.ok_or_else(|| anyhow!("{flag} needs a value\n{}", USAGE))?;
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{flag} must be a non-negative integer, got {value:?}"))
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut dataset: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut training = TrainingConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => out = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into()),
            "--seed" => training.seed = parse_value("--seed", args.next())?,
            "--trees" => training.n_estimators = parse_value("--trees", args.next())?,
            "--max-depth" => training.max_depth = parse_value("--max-depth", args.next())?,
            "-h" | "--help" => bail!(USAGE),
            _ if dataset.is_none() && !arg.starts_with('-') => dataset = Some(PathBuf::from(arg)),
            _ => bail!("Unknown argument: {arg}\n{}", USAGE),
        }
    }

    Ok(Args {
        dataset: dataset.ok_or_else(|| anyhow!(USAGE))?,
        out,
        training,
    })
}

fn main() -> Result<()> {
    let config = Config::from_env();
    let _guard =
        cardiorisk::logging::init(&config.log_mode).context("Failed to initialise logging")?;

    let args = parse_args()?;
    let out = args.out.unwrap_or(config.artifact_dir);

    let dataset = load_dataset(&args.dataset)?;
    let trainer = Trainer::new(args.training);
    let store = FsArtifactStore::new(&out);
    let outcome = trainer.train_and_save(&dataset, &store)?;

    tracing::info!("Held-out evaluation:\n{}", outcome.report);

    println!(
        "Trained on {} rows, evaluated on {} rows ({} trees, max_depth {}, seed {})",
        outcome.n_train,
        outcome.n_test,
        trainer.config().n_estimators,
        trainer.config().max_depth,
        trainer.config().seed
    );
    println!();
    println!("{}", outcome.report);
    println!();
    println!("Artifacts written to {out:?}");

    Ok(())
}
