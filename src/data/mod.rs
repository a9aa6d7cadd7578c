//! Dataset loading and preprocessing
//!
//! The pipeline is: read CIFAR-10 batches (`cifar`), hold out a validation part of the
//! training set (`split`), standardize every split with training-set statistics
//! (`normalize`), and one-hot encode the labels.

pub mod cifar;
pub mod normalize;
pub mod split;

use log::info;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf};
use thiserror::Error;

use crate::config::DataConfig;
pub use cifar::{Cifar10, CLASSES, IMAGE_BYTES};
pub use normalize::Standardizer;
pub use split::train_val_split;

/// Images as stored on disk (one row of pixel bytes per image) with their class indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataset {
    images: Array2<u8>,
    labels: Vec<u8>,
}

impl RawDataset {
    pub fn new(images: Array2<u8>, labels: Vec<u8>) -> Result<RawDataset, DataError> {
        if images.nrows() != labels.len() {
            return Err(DataError::CountMismatch {
                images: images.nrows(),
                labels: labels.len(),
            });
        }
        Ok(RawDataset { images, labels })
    }

    /// Joins datasets one after another.
    pub fn concatenate(parts: &[RawDataset]) -> Result<RawDataset, DataError> {
        let views: Vec<_> = parts.iter().map(|p| p.images.view()).collect();
        let images = ndarray::concatenate(Axis(0), &views)?;
        let labels = parts.iter().flat_map(|p| p.labels.iter().copied()).collect();
        RawDataset::new(images, labels)
    }

    /// Returns the samples at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> RawDataset {
        RawDataset {
            images: self.images.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn images(&self) -> &Array2<u8> {
        &self.images
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Model-ready samples: `n x features` inputs and `n x classes` one-hot labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    images: Array2<f64>,
    labels: Array2<f64>,
}

impl Dataset {
    pub fn new(images: Array2<f64>, labels: Array2<f64>) -> Result<Dataset, DataError> {
        if images.nrows() != labels.nrows() {
            return Err(DataError::CountMismatch {
                images: images.nrows(),
                labels: labels.nrows(),
            });
        }
        Ok(Dataset { images, labels })
    }

    pub fn images(&self) -> ArrayView2<f64> {
        self.images.view()
    }

    pub fn labels(&self) -> ArrayView2<f64> {
        self.labels.view()
    }

    pub fn len(&self) -> usize {
        self.images.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.images.nrows() == 0
    }
}

/// Training, validation and test sets, all standardized with training statistics.
#[derive(Debug, Clone)]
pub struct Splits {
    pub train: Dataset,
    pub val: Dataset,
    pub test: Dataset,
}

/// One row per label with a 1 in the label's column.
///
/// # Returns
/// * `Ok(Array2)` of shape `labels x classes`;
/// * `Err(DataError::LabelOutOfRange)` if some label is not less than `classes`.
///
/// # Examples
/// ```
/// # use cifarnnet::data::one_hot;
/// let labels = one_hot(&[2, 0], 3).unwrap();
/// assert_eq!(labels, ndarray::array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
/// assert!(one_hot(&[3], 3).is_err());
/// ```
pub fn one_hot(labels: &[u8], classes: usize) -> Result<Array2<f64>, DataError> {
    let mut encoded = Array2::zeros((labels.len(), classes));
    for (index, (mut row, &label)) in encoded.axis_iter_mut(Axis(0)).zip(labels.iter()).enumerate() {
        if label as usize >= classes {
            return Err(DataError::LabelOutOfRange { index, label, classes });
        }
        row[label as usize] = 1.0;
    }
    Ok(encoded)
}

/// Loads CIFAR-10 from `config.dir` and prepares the three splits.
pub fn load_splits(config: &DataConfig) -> Result<Splits, DataError> {
    let (train, test) = Cifar10::new(&config.dir).load()?;
    let (train, val) = train_val_split(&train, config.validation_fraction, config.split_seed)?;
    let (train_images, val_images, test_images) = normalize::preprocess(&train, &val, &test)?;

    info!(
        "prepared {} training, {} validation and {} test samples",
        train.len(),
        val.len(),
        test.len()
    );

    Ok(Splits {
        train: Dataset::new(train_images, one_hot(train.labels(), CLASSES)?)?,
        val: Dataset::new(val_images, one_hot(val.labels(), CLASSES)?)?,
        test: Dataset::new(test_images, one_hot(test.labels(), CLASSES)?)?,
    })
}

/// Error structure for the data pipeline
#[derive(Debug, Error)]
pub enum DataError {
    #[error("CIFAR-10 data directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error("CIFAR-10 batch file not found: {}", .0.display())]
    MissingBatch(PathBuf),
    #[error("Can't read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Batch {} has {len} bytes, which is not a whole number of records!", .path.display())]
    BadBatchLength { path: PathBuf, len: usize },
    #[error("Record {index} of {} has label {label}, but there are only {} classes!", .path.display(), CLASSES)]
    BadLabel { path: PathBuf, index: usize, label: u8 },
    #[error("Label {label} of sample {index} is out of range, there are only {classes} classes!")]
    LabelOutOfRange { index: usize, label: u8, classes: usize },
    #[error("Got {images} image(s), but {labels} label(s)!")]
    CountMismatch { images: usize, labels: usize },
    #[error("Expected {expected} feature(s), but got {got}!")]
    BadFeatures { expected: usize, got: usize },
    #[error("Can't split {len} sample(s) with validation fraction {fraction}!")]
    BadSplit { len: usize, fraction: f64 },
    #[error("Can't compute statistics of an empty set!")]
    Empty,
    #[error("Malformed dataset cache: {0}")]
    Cache(#[from] bincode::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn one_hot_rows() {
        let encoded = one_hot(&[1, 9, 0], CLASSES).unwrap();
        assert_eq!(encoded.dim(), (3, 10));
        assert_eq!(encoded.sum(), 3.0);
        assert_eq!(encoded[[1, 9]], 1.0);
        assert_eq!(encoded[[2, 0]], 1.0);
    }

    #[test]
    fn one_hot_rejects_out_of_range_labels() {
        assert!(matches!(
            one_hot(&[1, 10, 0], CLASSES),
            Err(DataError::LabelOutOfRange { index: 1, label: 10, classes: 10 })
        ));
        assert!(one_hot(&[255], CLASSES).is_err());
        assert_eq!(one_hot(&[], CLASSES).unwrap().dim(), (0, 10));
    }

    #[test]
    fn raw_concatenate_and_select() {
        let a = RawDataset::new(array![[1u8, 2], [3, 4]], vec![0, 1]).unwrap();
        let b = RawDataset::new(array![[5u8, 6]], vec![2]).unwrap();
        let joined = RawDataset::concatenate(&[a, b]).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.images(), &array![[1u8, 2], [3, 4], [5, 6]]);

        let picked = joined.select(&[2, 0]);
        assert_eq!(picked.images(), &array![[5u8, 6], [1, 2]]);
        assert_eq!(picked.labels(), &[2u8, 0]);
    }

    #[test]
    fn count_mismatch() {
        assert!(matches!(
            RawDataset::new(array![[1u8]], vec![0, 1]),
            Err(DataError::CountMismatch { images: 1, labels: 2 })
        ));
        assert!(Dataset::new(Array2::zeros((2, 3)), Array2::zeros((1, 10))).is_err());
    }
}
