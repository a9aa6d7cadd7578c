use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use ndarray::Axis;
use rand::{rngs::StdRng, seq::index, SeedableRng};
use serde::Serialize;
use thiserror::Error;

use super::metrics::{MetricsSink, NoSink};
use super::model::{count_correct, CheckpointError, Model, ModelError};
use crate::config::TrainingConfig;
use crate::data::Dataset;

/// Mini-batch gradient descent driver.
///
/// Training procedure will look like this:
/// * Every epoch runs `floor(train_size / batch_size)` iterations.
/// * Every iteration draws `batch_size` distinct samples uniformly from the whole training
/// set, independently of the other iterations. So an epoch is a fixed number of updates,
/// not a pass that is guaranteed to visit every sample.
/// * A batch goes through `Model::forward`, `Model::cross_entropy`, `Model::backward` and
/// `Model::update`, in that order.
/// * After the last iteration of an epoch the model is evaluated on the validation set.
/// Whenever validation accuracy beats the best one seen so far, `Model::save` is called.
///
/// Trainer never touches the parameters itself, only through the `Model` methods above.
pub struct Trainer {
    config: TrainingConfig,
    rng: StdRng,
}

/// Metrics of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochSummary {
    /// Counted from 1.
    pub epoch: usize,
    /// Mean of the batch losses.
    pub train_loss: f64,
    pub val_loss: f64,
    /// Correct batch predictions (made before each update) over the training set size.
    pub train_accuracy: f64,
    pub val_accuracy: f64,
    /// Validation accuracy beat every previous epoch and the model was saved.
    pub improved: bool,
}

/// Result of `Trainer::run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainReport {
    pub epochs: Vec<EpochSummary>,
    pub best_val_accuracy: f64,
}

impl TrainReport {
    /// Whether any epoch improved, so the checkpoint file was written.
    pub fn saved_checkpoint(&self) -> bool {
        self.epochs.iter().any(|e| e.improved)
    }
}

impl Trainer {
    /// Builds a trainer. Batches are sampled from a generator seeded with
    /// `config.seed`, or from entropy when there is no seed.
    pub fn new(config: TrainingConfig) -> Trainer {
        let rng = match config.seed {
            // Parameter initialization uses the seed as is
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Trainer { config, rng }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Turns the per-epoch progress bar on or off.
    pub fn with_progress(mut self, progress: bool) -> Trainer {
        self.config.progress = progress;
        self
    }

    /// Trains `model` on `train`, selecting the best epoch on `val`.
    /// If `config.checkpoint` is set, it replaces the model's checkpoint path first.
    ///
    /// # Returns
    /// * `Ok(TrainReport)` with a summary for every epoch;
    /// * `Err(TrainError::BadBatchSize)` if the batch size is 0 or larger than the training set;
    /// * `Err(TrainError::Model)` if the data doesn't fit the model;
    /// * `Err(TrainError::Checkpoint)` if the best model can't be saved.
    ///
    /// # Examples
    /// ```
    /// # use cifarnnet::config::{ModelConfig, TrainingConfig};
    /// # use cifarnnet::data::Dataset;
    /// # use cifarnnet::feedforward::{Model, Trainer};
    /// # use ndarray::array;
    /// let dir = tempfile::tempdir().unwrap();
    /// let config = ModelConfig { input_dim: 2, hidden_dim1: 3, out_dim: 2, ..ModelConfig::default() };
    /// let mut model = Model::new(config).with_checkpoint(dir.path().join("model.bin"));
    ///
    /// let data = Dataset::new(
    ///     array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0]],
    ///     array![[1.0, 0.0], [0.0, 1.0], [0.0, 1.0]],
    /// )
    /// .unwrap();
    /// let mut trainer = Trainer::new(TrainingConfig {
    ///     batch_size: 3,
    ///     epochs: 2,
    ///     progress: false,
    ///     ..TrainingConfig::default()
    /// });
    /// let report = trainer.run(&mut model, &data, &data).unwrap();
    /// assert_eq!(report.epochs.len(), 2);
    /// ```
    pub fn run(&mut self, model: &mut Model, train: &Dataset, val: &Dataset) -> Result<TrainReport, TrainError> {
        self.run_with_sink(model, train, val, &mut NoSink)
    }

    /// Same as `Trainer::run`, also reporting metrics to `sink`.
    pub fn run_with_sink(
        &mut self,
        model: &mut Model,
        train: &Dataset,
        val: &Dataset,
        sink: &mut dyn MetricsSink,
    ) -> Result<TrainReport, TrainError> {
        let train_size = train.len();
        let batch_size = self.config.batch_size;
        let epochs = self.config.epochs;

        if batch_size == 0 || batch_size > train_size {
            return Err(TrainError::BadBatchSize {
                train_size,
                batch_size,
            });
        }

        if let Some(path) = &self.config.checkpoint {
            model.set_checkpoint(path);
        }

        let iterations = train_size / batch_size;
        let mut best_val_accuracy = 0.0;
        let mut summaries = Vec::with_capacity(epochs);

        for epoch in 1..=epochs {
            let bar = self.progress_bar(iterations, epoch);
            let mut epoch_loss = 0.0;
            let mut correct = 0;

            for _ in 0..iterations {
                let indices = index::sample(&mut self.rng, train_size, batch_size).into_vec();
                let images = train.images().select(Axis(0), &indices);
                let labels = train.labels().select(Axis(0), &indices);

                let (output, activations) = model.forward(images.view())?;
                let loss = Model::cross_entropy(&output, labels.view())?;
                epoch_loss += loss;

                let gradients = model.backward(&output, labels.view(), activations)?;
                correct += count_correct(&output, labels.view());
                model.update(&gradients);

                sink.batch_loss(loss);
                bar.inc(1);
            }
            bar.finish_and_clear();

            let (val_accuracy, val_loss) = model.eval(val.images(), val.labels())?;
            let summary = EpochSummary {
                epoch,
                train_loss: epoch_loss / iterations as f64,
                val_loss,
                train_accuracy: correct as f64 / train_size as f64,
                val_accuracy,
                improved: val_accuracy > best_val_accuracy,
            };
            info!(
                "epoch: {} train_loss = {:.4} val_loss = {:.4} train_acc = {:.4} val_acc = {:.4}",
                epoch, summary.train_loss, summary.val_loss, summary.train_accuracy, summary.val_accuracy
            );
            sink.epoch_end(&summary);

            if summary.improved {
                best_val_accuracy = val_accuracy;
                model.save()?;
                info!("save best model, val_acc: {:.4}", best_val_accuracy);
            }
            summaries.push(summary);
        }

        Ok(TrainReport {
            epochs: summaries,
            best_val_accuracy,
        })
    }

    fn progress_bar(&self, iterations: usize, epoch: usize) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(iterations as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(format!("Epoch {}/{}", epoch, self.config.epochs));
        bar
    }
}

/// Error structure for `Trainer::run`
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Batch size must be from 1 to {train_size}, but got {batch_size}!")]
    BadBatchSize { train_size: usize, batch_size: usize },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}
