use pyo3::prelude::*;

use super::trainer::{ConsumableSession, Session, Trainer};
use super::{images, labels, to_rows};
use crate::config::{ModelConfig, TrainingConfig};
use crate::feedforward::{CheckpointError, Model as InnerModel, ModelError, Trainer as InnerTrainer};
use crate::{Impl_to_PyErr, MakeConsumable};

MakeConsumable!(ConsumableModel, InnerModel, Model);

/// Tensors in the order `W1, b1, W2, b2`, each as a list of rows.
type Exported = (Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<Vec<f64>>);

#[pyclass]
pub struct Model {
    pub(super) model: ConsumableModel,
}

#[pymethods]
impl Model {
    #[new]
    pub fn new(
        input_dim: usize,
        hidden_dim1: usize,
        out_dim: usize,
        weight_decay: f64,
        learning_rate: f64,
        seed: Option<u64>,
    ) -> Self {
        let config = ModelConfig {
            input_dim,
            hidden_dim1,
            out_dim,
            weight_decay,
            learning_rate,
        };
        Self {
            model: ConsumableModel::acquire(InnerModel::with_seed(config, seed)),
        }
    }

    /// `(input_dim, hidden_dim1, out_dim)`
    pub fn geometry(&self) -> PyResult<(usize, usize, usize)> {
        let config = self.model.get_ref()?.config();
        Ok((config.input_dim, config.hidden_dim1, config.out_dim))
    }

    pub fn export(&self) -> PyResult<Exported> {
        let params = self.model.get_ref()?.params();
        Ok((
            to_rows(&params.w1),
            to_rows(&params.b1),
            to_rows(&params.w2),
            to_rows(&params.b2),
        ))
    }

    /// Class probabilities, one row per sample.
    pub fn forward(&self, inputs: Vec<Vec<f64>>) -> PyResult<Vec<Vec<f64>>> {
        let model = self.model.get_ref()?;
        let inputs = images(inputs, model.config().input_dim)?;
        let (output, _) = model.forward(inputs.view())?;
        Ok(to_rows(&output.reversed_axes()))
    }

    pub fn predict(&self, inputs: Vec<Vec<f64>>) -> PyResult<Vec<usize>> {
        let model = self.model.get_ref()?;
        let inputs = images(inputs, model.config().input_dim)?;
        Ok(model.predict(inputs.view())?)
    }

    /// `(accuracy, loss)` on one-hot `desired_outputs`.
    pub fn eval(&self, inputs: Vec<Vec<f64>>, desired_outputs: Vec<Vec<f64>>) -> PyResult<(f64, f64)> {
        let model = self.model.get_ref()?;
        let config = model.config();
        let inputs = images(inputs, config.input_dim)?;
        let desired_outputs = labels(desired_outputs, config.out_dim)?;
        Ok(model.eval(inputs.view(), desired_outputs.view())?)
    }

    /// Writes the checkpoint, first switching to `path` when it is given.
    pub fn save(&mut self, path: Option<String>) -> PyResult<()> {
        if let Some(path) = path {
            let model = self.model.release()?;
            self.model = ConsumableModel::acquire(model.with_checkpoint(path));
        }
        Ok(self.model.get_ref()?.save()?)
    }

    /// Returns `False` and keeps the current parameters if `path` can't be loaded.
    pub fn load(&mut self, path: String) -> PyResult<bool> {
        Ok(self.model.get_ref_mut()?.load(path))
    }

    /// Moves the model into a new `Trainer`. This object can't be used afterwards.
    pub fn build_trainer(&mut self, batch_size: usize, epochs: usize, seed: Option<u64>) -> PyResult<Trainer> {
        let model = self.model.release()?;
        let config = TrainingConfig {
            batch_size,
            epochs,
            seed,
            checkpoint: None,
            progress: false,
        };
        Ok(Trainer {
            session: ConsumableSession::acquire(Session {
                model,
                trainer: InnerTrainer::new(config),
            }),
        })
    }

    #[staticmethod]
    pub fn cross_entropy(outputs: Vec<Vec<f64>>, desired_outputs: Vec<Vec<f64>>) -> PyResult<f64> {
        let width = outputs.first().map_or(0, |row| row.len());
        let outputs = images(outputs, width)?;
        let desired_outputs = labels(desired_outputs, width)?;
        Ok(InnerModel::cross_entropy(&outputs.reversed_axes(), desired_outputs.view())?)
    }
}

Impl_to_PyErr!(for ModelError, CheckpointError);
