//! Trains the network on CIFAR-10 and reports test metrics of the best checkpoint.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use cifarnnet::config::Config;
use cifarnnet::data::load_splits;
use cifarnnet::feedforward::{LogSink, Model, Trainer, DEFAULT_CHECKPOINT};

#[derive(Parser, Debug)]
#[command(name = "cifar-train", about = "Train a two-layer network on CIFAR-10")]
struct Args {
    /// TOML configuration file. Defaults are used when it can't be read.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory containing `cifar-10-batches-bin`.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Skip training and evaluate this checkpoint on the test split.
    #[arg(long)]
    eval_only: Option<PathBuf>,

    /// Overrides the number of epochs.
    #[arg(short, long)]
    epochs: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config);
    if let Some(dir) = args.data_dir {
        config.data.dir = dir;
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    config.validate().context("invalid configuration")?;

    let splits = load_splits(&config.data).context("can't prepare CIFAR-10")?;
    let checkpoint = config
        .training
        .checkpoint
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT));
    let mut model = Model::with_seed(config.model, config.training.seed).with_checkpoint(&checkpoint);

    match args.eval_only {
        Some(path) => {
            model.load(&path);
        }
        None => {
            let mut trainer = Trainer::new(config.training.clone());
            let report = trainer
                .run_with_sink(&mut model, &splits.train, &splits.val, &mut LogSink)
                .context("training failed")?;
            info!("best val_acc: {:.4}", report.best_val_accuracy);
            if report.saved_checkpoint() {
                model.load(&checkpoint);
            }
        }
    }

    let (accuracy, loss) = model.eval(splits.test.images(), splits.test.labels())?;
    info!("Final test results - accuracy: {:.4}, loss: {:.4}", accuracy, loss);
    Ok(())
}
