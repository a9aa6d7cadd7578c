//! Grid search over hidden size, learning rate and weight decay on CIFAR-10.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use cifarnnet::config::Config;
use cifarnnet::data::load_splits;
use cifarnnet::sweep::{best, run_sweep};

#[derive(Parser, Debug)]
#[command(name = "cifar-sweep", about = "Hyperparameter grid search on CIFAR-10")]
struct Args {
    /// TOML configuration file; its `[sweep]` section defines the grid.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory containing `cifar-10-batches-bin`.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config);
    if let Some(dir) = args.data_dir {
        config.data.dir = dir;
    }
    config.training.progress = false;
    config.validate().context("invalid configuration")?;

    let splits = load_splits(&config.data).context("can't prepare CIFAR-10")?;
    let results = run_sweep(&config, &splits);

    for result in results.iter() {
        info!(
            "{}: val_acc = {:.4} test_acc = {:.4} test_loss = {:.4}",
            result.run_name, result.best_val_accuracy, result.test_accuracy, result.test_loss
        );
    }
    match best(&results) {
        Some(result) => info!("best run: {} (val_acc {:.4})", result.run_name, result.best_val_accuracy),
        None => bail!("every run failed"),
    }
    Ok(())
}
