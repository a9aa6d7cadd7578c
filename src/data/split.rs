use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::{DataError, RawDataset};

/// Shuffles `data` and splits it into `(train, validation)`.
///
/// The validation part takes `ceil(len * fraction)` samples. The same seed always gives the
/// same split.
pub fn train_val_split(data: &RawDataset, fraction: f64, seed: u64) -> Result<(RawDataset, RawDataset), DataError> {
    let len = data.len();
    let val_size = (len as f64 * fraction).ceil() as usize;
    if !(fraction > 0.0 && fraction < 1.0) || val_size == 0 || val_size >= len {
        return Err(DataError::BadSplit { len, fraction });
    }

    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (val, train) = indices.split_at(val_size);

    Ok((data.select(train), data.select(val)))
}
