use pyo3::prelude::*;

use super::model::{ConsumableModel, Model};
use super::{images, labels};
use crate::data::Dataset;
use crate::feedforward::{Model as InnerModel, TrainError, Trainer as InnerTrainer};
use crate::{Impl_to_PyErr, MakeConsumable};

/// A model together with the trainer that updates it.
pub(super) struct Session {
    pub(super) model: InnerModel,
    pub(super) trainer: InnerTrainer,
}

MakeConsumable!(ConsumableSession, Session, Trainer);

/// `(epoch, train_loss, val_loss, train_accuracy, val_accuracy, improved)`
type EpochRow = (usize, f64, f64, f64, f64, bool);

#[pyclass]
pub struct Trainer {
    pub(super) session: ConsumableSession,
}

#[pymethods]
impl Trainer {
    /// Runs every configured epoch and returns one row of metrics per epoch.
    pub fn run(
        &mut self,
        train_inputs: Vec<Vec<f64>>,
        train_outputs: Vec<Vec<f64>>,
        val_inputs: Vec<Vec<f64>>,
        val_outputs: Vec<Vec<f64>>,
    ) -> PyResult<Vec<EpochRow>> {
        let session = self.session.get_ref_mut()?;
        let config = *session.model.config();
        let dataset = |inputs: Vec<Vec<f64>>, outputs: Vec<Vec<f64>>| -> PyResult<Dataset> {
            let inputs = images(inputs, config.input_dim)?;
            let outputs = labels(outputs, config.out_dim)?;
            Dataset::new(inputs, outputs).map_err(|err| pyo3::exceptions::PyValueError::new_err(err.to_string()))
        };
        let train = dataset(train_inputs, train_outputs)?;
        let val = dataset(val_inputs, val_outputs)?;

        let report = session.trainer.run(&mut session.model, &train, &val)?;
        Ok(report
            .epochs
            .iter()
            .map(|e| (e.epoch, e.train_loss, e.val_loss, e.train_accuracy, e.val_accuracy, e.improved))
            .collect())
    }

    /// Gives the trained model back. This object can't be used afterwards.
    pub fn teardown(&mut self) -> PyResult<Model> {
        Ok(Model {
            model: ConsumableModel::acquire(self.session.release()?.model),
        })
    }
}

Impl_to_PyErr!(for TrainError);
