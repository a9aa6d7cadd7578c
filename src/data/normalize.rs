use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::{DataError, RawDataset};

/// Added to the standard deviation so constant features don't divide by zero.
pub const STD_EPSILON: f64 = 1e-7;

/// Pixel bytes to `[0, 1]`.
pub fn to_unit_range(pixels: &Array2<u8>) -> Array2<f64> {
    pixels.mapv(|p| f64::from(p) / 255.0)
}

/// Per-feature standardization: `(x - mean) / (std + STD_EPSILON)`.
///
/// Statistics come from one set (the training set) and are then applied to any other set,
/// so validation and test data never contribute to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl Standardizer {
    /// Computes the mean and population standard deviation of every column.
    pub fn fit(data: ArrayView2<f64>) -> Result<Standardizer, DataError> {
        let mean = data.mean_axis(Axis(0)).ok_or(DataError::Empty)?;
        let std = data.std_axis(Axis(0), 0.0);
        Ok(Standardizer { mean, std })
    }

    pub fn transform(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, DataError> {
        if data.ncols() != self.mean.len() {
            return Err(DataError::BadFeatures {
                expected: self.mean.len(),
                got: data.ncols(),
            });
        }
        Ok((&data - &self.mean) / &(&self.std + STD_EPSILON))
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }
}

/// Scales all three sets to `[0, 1]` and standardizes them with training statistics.
///
/// # Returns
/// `(train, val, test)` images, in that order.
pub fn preprocess(
    train: &RawDataset,
    val: &RawDataset,
    test: &RawDataset,
) -> Result<(Array2<f64>, Array2<f64>, Array2<f64>), DataError> {
    let train = to_unit_range(train.images());
    let standardizer = Standardizer::fit(train.view())?;

    Ok((
        standardizer.transform(train.view())?,
        standardizer.transform(to_unit_range(val.images()).view())?,
        standardizer.transform(to_unit_range(test.images()).view())?,
    ))
}
