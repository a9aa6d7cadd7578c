//! Grid search over hidden size, learning rate and weight decay.

use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{Config, ModelConfig, TrainingConfig};
use crate::data::Splits;
use crate::feedforward::{LogSink, Model, TrainError, Trainer, DEFAULT_CHECKPOINT};

/// Outcome of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub run_name: String,
    pub hidden_dim1: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub best_val_accuracy: f64,
    /// Test metrics of the best checkpoint of the run.
    pub test_accuracy: f64,
    pub test_loss: f64,
}

/// Name of the run with these hyperparameters, also used for its checkpoint file.
///
/// # Examples
/// ```
/// # use cifarnnet::sweep::run_name;
/// assert_eq!(run_name(1024, 0.01, 0.0), "hidden_dim1_1024_lr_0.01_weight_decay_0");
/// ```
pub fn run_name(hidden_dim1: usize, learning_rate: f64, weight_decay: f64) -> String {
    format!(
        "hidden_dim1_{}_lr_{}_weight_decay_{}",
        hidden_dim1, learning_rate, weight_decay
    )
}

/// Model configurations of every run, hidden size varying slowest and weight decay fastest.
pub fn grid(config: &Config) -> Vec<ModelConfig> {
    let sweep = &config.sweep;
    let mut runs = Vec::with_capacity(sweep.hidden_dim1.len() * sweep.learning_rate.len() * sweep.weight_decay.len());
    for &hidden_dim1 in sweep.hidden_dim1.iter() {
        for &learning_rate in sweep.learning_rate.iter() {
            for &weight_decay in sweep.weight_decay.iter() {
                runs.push(ModelConfig {
                    hidden_dim1,
                    learning_rate,
                    weight_decay,
                    ..config.model
                });
            }
        }
    }
    runs
}

/// Trains one model per grid point and evaluates its best checkpoint on the test split.
///
/// Checkpoints go next to `config.training.checkpoint` (or `DEFAULT_CHECKPOINT`), one file
/// per run. A run that fails is logged and left out of the result.
pub fn run_sweep(config: &Config, splits: &Splits) -> Vec<SweepResult> {
    let dir = checkpoint_dir(
        config
            .training
            .checkpoint
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CHECKPOINT)),
    );
    let runs = grid(config);
    let total = runs.len();
    let mut results = Vec::with_capacity(total);

    for (i, model_config) in runs.into_iter().enumerate() {
        let name = run_name(
            model_config.hidden_dim1,
            model_config.learning_rate,
            model_config.weight_decay,
        );
        info!("run {}/{}: {}", i + 1, total, name);

        match run_one(config, model_config, &name, &dir, splits) {
            Ok(result) => {
                info!(
                    "{} finished - val_acc: {:.4}, test_acc: {:.4}, test_loss: {:.4}",
                    name, result.best_val_accuracy, result.test_accuracy, result.test_loss
                );
                results.push(result);
            }
            Err(err) => error!("{} failed: {}", name, err),
        }
    }
    results
}

/// The run with the highest validation accuracy. Earlier runs win ties.
pub fn best(results: &[SweepResult]) -> Option<&SweepResult> {
    results.iter().fold(None, |best: Option<&SweepResult>, result| match best {
        Some(b) if b.best_val_accuracy >= result.best_val_accuracy => Some(b),
        _ => Some(result),
    })
}

fn run_one(
    config: &Config,
    model_config: ModelConfig,
    name: &str,
    dir: &Path,
    splits: &Splits,
) -> Result<SweepResult, TrainError> {
    let checkpoint = dir.join(format!("{}.bin", name));
    let mut model = Model::with_seed(model_config, config.training.seed);
    let mut trainer = Trainer::new(TrainingConfig {
        checkpoint: Some(checkpoint.clone()),
        ..config.training.clone()
    });
    let report = trainer.run_with_sink(&mut model, &splits.train, &splits.val, &mut LogSink)?;

    if report.saved_checkpoint() {
        model.try_load(&checkpoint)?;
    }
    let (test_accuracy, test_loss) = model.eval(splits.test.images(), splits.test.labels())?;

    Ok(SweepResult {
        run_name: name.to_owned(),
        hidden_dim1: model_config.hidden_dim1,
        learning_rate: model_config.learning_rate,
        weight_decay: model_config.weight_decay,
        best_val_accuracy: report.best_val_accuracy,
        test_accuracy,
        test_loss,
    })
}

fn checkpoint_dir(checkpoint: &Path) -> PathBuf {
    match checkpoint.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
        _ => PathBuf::from("."),
    }
}
