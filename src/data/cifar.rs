//! CIFAR-10 in its binary distribution format.
//!
//! Every batch file is a sequence of `1 + 3072` byte records: the class index followed by
//! the red, green and blue planes of a 32x32 image.

use log::{info, warn};
use ndarray::Array2;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::{DataError, RawDataset};

/// Pixel bytes per image (32 * 32 * 3).
pub const IMAGE_BYTES: usize = 32 * 32 * 3;

/// Number of classes.
pub const CLASSES: usize = 10;

const RECORD_BYTES: usize = 1 + IMAGE_BYTES;
const TRAIN_BATCHES: usize = 5;
const BATCHES_DIR: &str = "cifar-10-batches-bin";
const CACHE_FILE: &str = "cifar10_data.bin";

/// Reader of the CIFAR-10 batches found under a data directory.
///
/// Expected layout:
/// `data_dir/cifar-10-batches-bin/data_batch_{1..5}.bin` and `.../test_batch.bin`.
/// After the first successful read, the merged sets are cached in
/// `data_dir/cifar10_data.bin` and later loads read only the cache.
pub struct Cifar10 {
    data_dir: PathBuf,
}

impl Cifar10 {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Cifar10 {
        Cifar10 {
            data_dir: data_dir.into(),
        }
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.data_dir.join(BATCHES_DIR)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    /// Returns `(train, test)`: the five training batches merged, and the test batch.
    ///
    /// A missing data directory or batch file is an error. An unreadable cache is rebuilt.
    pub fn load(&self) -> Result<(RawDataset, RawDataset), DataError> {
        let cache = self.cache_path();
        if cache.is_file() {
            match read_cache(&cache) {
                Ok(sets) => {
                    info!("load processed data from {}", cache.display());
                    return Ok(sets);
                }
                Err(err) => warn!("ignoring dataset cache: {}", err),
            }
        }

        let dir = self.batches_dir();
        if !dir.is_dir() {
            return Err(DataError::MissingDirectory(dir));
        }

        let mut batches = Vec::with_capacity(TRAIN_BATCHES);
        for i in 1..=TRAIN_BATCHES {
            batches.push(read_batch(&dir.join(format!("data_batch_{}.bin", i)))?);
        }
        let train = RawDataset::concatenate(&batches)?;
        let test = read_batch(&dir.join("test_batch.bin"))?;

        match write_cache(&cache, &train, &test) {
            Ok(()) => info!("processed data saved to {}", cache.display()),
            Err(err) => warn!("can't write dataset cache: {}", err),
        }
        Ok((train, test))
    }
}

/// Reads one batch file.
pub fn read_batch(path: &Path) -> Result<RawDataset, DataError> {
    if !path.is_file() {
        return Err(DataError::MissingBatch(path.to_owned()));
    }
    let bytes = fs::read(path).map_err(|source| DataError::Io {
        path: path.to_owned(),
        source,
    })?;
    if bytes.len() % RECORD_BYTES != 0 {
        return Err(DataError::BadBatchLength {
            path: path.to_owned(),
            len: bytes.len(),
        });
    }

    let count = bytes.len() / RECORD_BYTES;
    let mut labels = Vec::with_capacity(count);
    let mut pixels = Vec::with_capacity(count * IMAGE_BYTES);
    for (index, record) in bytes.chunks_exact(RECORD_BYTES).enumerate() {
        let label = record[0];
        if label as usize >= CLASSES {
            return Err(DataError::BadLabel {
                path: path.to_owned(),
                index,
                label,
            });
        }
        labels.push(label);
        pixels.extend_from_slice(&record[1..]);
    }

    RawDataset::new(Array2::from_shape_vec((count, IMAGE_BYTES), pixels)?, labels)
}

fn read_cache(path: &Path) -> Result<(RawDataset, RawDataset), DataError> {
    let bytes = fs::read(path).map_err(|source| DataError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(bincode::deserialize(&bytes)?)
}

fn write_cache(path: &Path, train: &RawDataset, test: &RawDataset) -> Result<(), DataError> {
    let bytes = bincode::serialize(&(train, test))?;
    fs::write(path, bytes).map_err(|source| DataError::Io {
        path: path.to_owned(),
        source,
    })
}
