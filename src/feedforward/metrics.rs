use log::debug;

use super::trainer::EpochSummary;

/// Receives training metrics as `Trainer` produces them.
///
/// Both methods do nothing by default. Training goes exactly the same way whatever the sink
/// does with the values.
pub trait MetricsSink {
    /// Called after every batch with its mean cross-entropy.
    fn batch_loss(&mut self, _loss: f64) {}

    /// Called once per epoch, after validation.
    fn epoch_end(&mut self, _summary: &EpochSummary) {}
}

/// Sink that drops everything.
pub struct NoSink;

impl MetricsSink for NoSink {}

/// Writes batch losses to the debug log.
pub struct LogSink;

impl MetricsSink for LogSink {
    fn batch_loss(&mut self, loss: f64) {
        debug!("batch_loss = {:.4}", loss);
    }
}

/// Sink that keeps all the metrics it gets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsHistory {
    pub batch_losses: Vec<f64>,
    pub epochs: Vec<EpochSummary>,
}

impl MetricsSink for MetricsHistory {
    fn batch_loss(&mut self, loss: f64) {
        self.batch_losses.push(loss);
    }

    fn epoch_end(&mut self, summary: &EpochSummary) {
        self.epochs.push(*summary);
    }
}
