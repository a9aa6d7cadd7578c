pub mod model;
pub mod trainer;

use ndarray::{Array2, ArrayView1};
use pyo3::{prelude::*, wrap_pymodule};

use crate::feedforward::ModelError;

#[pymodule]
fn feedforward(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<model::Model>()?;
    m.add_class::<trainer::Trainer>()?;
    Ok(())
}

pub fn construct_module(m: &PyModule) -> PyResult<()> {
    m.add_wrapped(wrap_pymodule!(feedforward))?;
    Ok(())
}

/// Packs Python rows into a `rows x width` matrix.
/// `mismatch` builds the error for a row of another width.
pub(super) fn rows_to_array(
    rows: Vec<Vec<f64>>,
    width: usize,
    mismatch: fn(usize, usize) -> ModelError,
) -> Result<Array2<f64>, ModelError> {
    let mut array = Array2::zeros((rows.len(), width));
    for (mut dst, row) in array.outer_iter_mut().zip(rows.iter()) {
        if row.len() != width {
            return Err(mismatch(width, row.len()));
        }
        dst.assign(&ArrayView1::from(row.as_slice()));
    }
    Ok(array)
}

pub(super) fn images(rows: Vec<Vec<f64>>, width: usize) -> Result<Array2<f64>, ModelError> {
    rows_to_array(rows, width, |expected, got| ModelError::BadInputs { expected, got })
}

pub(super) fn labels(rows: Vec<Vec<f64>>, width: usize) -> Result<Array2<f64>, ModelError> {
    rows_to_array(rows, width, |expected, got| ModelError::BadLabels { expected, got })
}

pub(super) fn to_rows(array: &Array2<f64>) -> Vec<Vec<f64>> {
    array.outer_iter().map(|row| row.to_vec()).collect()
}
