use log::{error, info};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::config::ModelConfig;

/// Where `Model::save` writes unless `Model::with_checkpoint` says otherwise.
pub const DEFAULT_CHECKPOINT: &str = "ckpt/model.bin";

/// Predictions are clipped to `[CLIP, 1 - CLIP]` before taking the logarithm.
pub const CLIP: f64 = 1e-12;

/// The four trainable tensors of the network.
///
/// Shapes:
/// * `w1` - `hidden_dim1 x input_dim`;
/// * `b1` - `hidden_dim1 x 1`;
/// * `w2` - `out_dim x hidden_dim1`;
/// * `b2` - `out_dim x 1`.
///
/// This is also the checkpoint format: the tensors are serialized under the keys
/// `W1`, `b1`, `W2` and `b2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(rename = "W1")]
    pub w1: Array2<f64>,
    #[serde(rename = "b1")]
    pub b1: Array2<f64>,
    #[serde(rename = "W2")]
    pub w2: Array2<f64>,
    #[serde(rename = "b2")]
    pub b2: Array2<f64>,
}

impl Params {
    /// Draws every entry from `N(0, 1) * sqrt(1 / fan)`, where fan is `hidden_dim1` for the
    /// first layer and `out_dim` for the second one.
    pub fn random<R: Rng + ?Sized>(config: &ModelConfig, rng: &mut R) -> Params {
        let (input, hidden, out) = (config.input_dim, config.hidden_dim1, config.out_dim);
        let scale1 = (1.0 / hidden as f64).sqrt();
        let scale2 = (1.0 / out as f64).sqrt();

        Params {
            w1: Array2::<f64>::random_using((hidden, input), StandardNormal, rng) * scale1,
            b1: Array2::<f64>::random_using((hidden, 1), StandardNormal, rng) * scale1,
            w2: Array2::<f64>::random_using((out, hidden), StandardNormal, rng) * scale2,
            b2: Array2::<f64>::random_using((out, 1), StandardNormal, rng) * scale2,
        }
    }

    /// Checks every tensor against the shapes implied by `config`.
    pub fn check_shapes(&self, config: &ModelConfig) -> Result<(), ModelError> {
        let (input, hidden, out) = (config.input_dim, config.hidden_dim1, config.out_dim);
        let expected = [
            ("W1", &self.w1, (hidden, input)),
            ("b1", &self.b1, (hidden, 1)),
            ("W2", &self.w2, (out, hidden)),
            ("b2", &self.b2, (out, 1)),
        ];

        for &(name, tensor, shape) in expected.iter() {
            if tensor.dim() != shape {
                return Err(ModelError::BadParam {
                    name,
                    expected: shape,
                    got: tensor.dim(),
                });
            }
        }
        Ok(())
    }
}

/// Gradients of the loss, one tensor per entry of `Params`, same shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub w1: Array2<f64>,
    pub b1: Array2<f64>,
    pub w2: Array2<f64>,
    pub b2: Array2<f64>,
}

/// Intermediate values of one forward pass that the backward pass needs.
///
/// Produced by `Model::forward` and consumed by `Model::backward`, so every backward pass
/// works on the activations of exactly one forward pass.
#[derive(Debug)]
pub struct Activations {
    /// Inputs, `input_dim x batch`.
    a0: Array2<f64>,
    /// First layer before ReLU, `hidden_dim1 x batch`.
    z1: Array2<f64>,
    /// First layer after ReLU, `hidden_dim1 x batch`.
    a1: Array2<f64>,
}

impl Activations {
    pub fn batch_size(&self) -> usize {
        self.a0.ncols()
    }
}

/// Two-layer network: `Linear -> ReLU -> Linear -> Softmax`.
///
/// Samples are rows of the input matrix, but internally the network works on columns:
/// the batch is transposed to `input_dim x batch` and every output is `out_dim x batch`.
#[derive(Debug, Clone)]
pub struct Model {
    pub(super) config: ModelConfig,
    pub(super) params: Params,
    pub(super) checkpoint: PathBuf,
}

impl Model {
    /// Returns a model with randomly initialized parameters.
    ///
    /// # Examples
    /// ```
    /// # use cifarnnet::config::ModelConfig;
    /// # use cifarnnet::feedforward::Model;
    /// let model = Model::new(ModelConfig {
    ///     input_dim: 6,
    ///     hidden_dim1: 4,
    ///     out_dim: 3,
    ///     ..ModelConfig::default()
    /// });
    /// assert_eq!(model.params().w1.dim(), (4, 6));
    /// ```
    pub fn new(config: ModelConfig) -> Model {
        Model::with_rng(config, &mut rand::thread_rng())
    }

    /// Same as `Model::new`, but draws the initial parameters from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(config: ModelConfig, rng: &mut R) -> Model {
        let params = Params::random(&config, rng);
        Model {
            config,
            params,
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
        }
    }

    /// Seeded initialization when `seed` is given, thread rng otherwise.
    pub fn with_seed(config: ModelConfig, seed: Option<u64>) -> Model {
        match seed {
            Some(seed) => Model::with_rng(config, &mut StdRng::seed_from_u64(seed)),
            None => Model::new(config),
        }
    }

    /// Returns a model that uses the given parameters.
    ///
    /// # Returns
    /// * `Ok(Model)` if every tensor has the shape implied by `config`;
    /// * `Err(ModelError::BadParam)` otherwise.
    pub fn from_params(config: ModelConfig, params: Params) -> Result<Model, ModelError> {
        params.check_shapes(&config)?;
        Ok(Model {
            config,
            params,
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT),
        })
    }

    /// Sets the file `Model::save` overwrites.
    pub fn with_checkpoint<P: Into<PathBuf>>(mut self, path: P) -> Model {
        self.set_checkpoint(path);
        self
    }

    pub fn set_checkpoint<P: Into<PathBuf>>(&mut self, path: P) {
        self.checkpoint = path.into();
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }

    /// Runs the network on a batch.
    ///
    /// # Arguments
    /// * `images` - `batch x input_dim` matrix, one sample per row.
    ///
    /// # Returns
    /// * `Ok((output, activations))`, where `output` holds class probabilities
    /// (`out_dim x batch`, every column sums to 1) and `activations` must be passed to
    /// `Model::backward` to get gradients for this batch;
    /// * `Err(ModelError::BadInputs)` if the rows are not `input_dim` wide.
    pub fn forward(&self, images: ArrayView2<f64>) -> Result<(Array2<f64>, Activations), ModelError> {
        if images.ncols() != self.config.input_dim {
            return Err(ModelError::BadInputs {
                expected: self.config.input_dim,
                got: images.ncols(),
            });
        }

        let a0 = images.t().to_owned();
        let z1 = self.params.w1.dot(&a0) + &self.params.b1;
        let a1 = relu(&z1);
        let z2 = self.params.w2.dot(&a1) + &self.params.b2;

        Ok((softmax(&z2), Activations { a0, z1, a1 }))
    }

    /// Computes gradients of the mean cross-entropy (plus weight decay) for one batch.
    /// Parameters are not changed, see `Model::update`.
    ///
    /// Softmax and cross-entropy are differentiated together, so the error at the output
    /// layer is just `(output - labels) / batch`.
    ///
    /// # Arguments
    /// * `output` - probabilities returned by `Model::forward` for this batch;
    /// * `labels` - `batch x out_dim` one-hot labels;
    /// * `activations` - activations returned by the same `Model::forward` call.
    pub fn backward(
        &self,
        output: &Array2<f64>,
        labels: ArrayView2<f64>,
        activations: Activations,
    ) -> Result<Gradients, ModelError> {
        let batch_size = activations.batch_size();
        self.check_labels(labels, batch_size)?;
        if output.dim() != (self.config.out_dim, batch_size) {
            return Err(ModelError::BadOutputs {
                expected: (self.config.out_dim, batch_size),
                got: output.dim(),
            });
        }
        if batch_size == 0 {
            return Err(ModelError::EmptyBatch);
        }

        let Activations { a0, z1, a1 } = activations;

        // batch x out_dim
        let error = (&output.t() - &labels) / batch_size as f64;
        let mut w2 = error.t().dot(&a1.t());
        let b2 = error.sum_axis(Axis(0)).insert_axis(Axis(1));

        // hidden_dim1 x batch
        let error = self.params.w2.t().dot(&error.t()) * &relu_derivative(&z1);
        let mut w1 = error.dot(&a0.t());
        let b1 = error.sum_axis(Axis(1)).insert_axis(Axis(1));

        // Biases are not decayed
        if self.config.weight_decay != 0.0 {
            w1.scaled_add(self.config.weight_decay, &self.params.w1);
            w2.scaled_add(self.config.weight_decay, &self.params.w2);
        }

        Ok(Gradients { w1, b1, w2, b2 })
    }

    /// Applies one step of plain gradient descent: `param -= learning_rate * gradient`.
    pub fn update(&mut self, gradients: &Gradients) {
        let step = -self.config.learning_rate;
        self.params.w1.scaled_add(step, &gradients.w1);
        self.params.b1.scaled_add(step, &gradients.b1);
        self.params.w2.scaled_add(step, &gradients.w2);
        self.params.b2.scaled_add(step, &gradients.b2);
    }

    /// Mean categorical cross-entropy of a batch.
    /// Implements the formula:
    /// `-sum(labels * log(clip(predictions)^T)) / batch`.
    ///
    /// # Arguments
    /// * `predictions` - `classes x batch` probabilities (as returned by `Model::forward`);
    /// * `labels` - `batch x classes` one-hot labels.
    ///
    /// # Examples
    /// ```
    /// # use cifarnnet::feedforward::Model;
    /// # use ndarray::array;
    /// let predictions = array![[1.0, 0.0], [0.0, 1.0]];
    /// let labels = array![[1.0, 0.0], [0.0, 1.0]];
    /// let loss = Model::cross_entropy(&predictions, labels.view()).unwrap();
    /// assert!(loss < 1e-11);
    /// ```
    pub fn cross_entropy(predictions: &Array2<f64>, labels: ArrayView2<f64>) -> Result<f64, ModelError> {
        if predictions.t().dim() != labels.dim() {
            return Err(ModelError::BadOutputs {
                expected: (labels.ncols(), labels.nrows()),
                got: predictions.dim(),
            });
        }
        if labels.nrows() == 0 {
            return Err(ModelError::EmptyBatch);
        }

        let log_predictions = predictions.mapv(|p| p.max(CLIP).min(1.0 - CLIP).ln());
        Ok(-(&labels * &log_predictions.t()).sum() / labels.nrows() as f64)
    }

    /// Returns `(accuracy, loss)` of the model on a labeled set.
    /// Accuracy is the fraction of samples whose most probable class is the labeled one.
    pub fn eval(&self, images: ArrayView2<f64>, labels: ArrayView2<f64>) -> Result<(f64, f64), ModelError> {
        if images.nrows() == 0 {
            return Err(ModelError::EmptyBatch);
        }
        self.check_labels(labels, images.nrows())?;

        let (output, _) = self.forward(images)?;
        let accuracy = count_correct(&output, labels) as f64 / labels.nrows() as f64;
        let loss = Model::cross_entropy(&output, labels)?;
        Ok((accuracy, loss))
    }

    /// Returns the most probable class of every sample.
    pub fn predict(&self, images: ArrayView2<f64>) -> Result<Vec<usize>, ModelError> {
        let (output, _) = self.forward(images)?;
        Ok(output.axis_iter(Axis(1)).map(argmax).collect())
    }

    /// Writes the parameters to the checkpoint file, creating its directory if needed.
    pub fn save(&self) -> Result<(), CheckpointError> {
        let path = &self.checkpoint;
        let io_error = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(io_error)?;
            }
        }
        let bytes = bincode::serialize(&self.params).map_err(|source| CheckpointError::Format {
            path: path.clone(),
            source,
        })?;
        fs::write(path, bytes).map_err(io_error)?;

        info!("save model to {}", path.display());
        Ok(())
    }

    /// Replaces the parameters with the ones stored at `path`.
    /// On error the current parameters are left untouched.
    pub fn try_load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| CheckpointError::Io {
            path: path.to_owned(),
            source,
        })?;
        let params: Params = bincode::deserialize(&bytes).map_err(|source| CheckpointError::Format {
            path: path.to_owned(),
            source,
        })?;
        params
            .check_shapes(&self.config)
            .map_err(|source| CheckpointError::Shape {
                path: path.to_owned(),
                source,
            })?;

        self.params = params;
        info!("load model from {}", path.display());
        Ok(())
    }

    /// Like `Model::try_load`, but only logs a failure.
    ///
    /// # Returns
    /// `true` if the parameters were replaced.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match self.try_load(path) {
            Ok(()) => true,
            Err(err) => {
                error!("load error: {}", err);
                false
            }
        }
    }

    fn check_labels(&self, labels: ArrayView2<f64>, batch_size: usize) -> Result<(), ModelError> {
        if labels.ncols() != self.config.out_dim {
            return Err(ModelError::BadLabels {
                expected: self.config.out_dim,
                got: labels.ncols(),
            });
        }
        if labels.nrows() != batch_size {
            return Err(ModelError::BadBatch {
                expected: batch_size,
                got: labels.nrows(),
            });
        }
        Ok(())
    }
}

/// `max(0, x)`, elementwise.
pub(super) fn relu(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.max(0.0))
}

/// ReLU derivative. Taken as 1 at zero.
pub(super) fn relu_derivative(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| if v >= 0.0 { 1.0 } else { 0.0 })
}

/// Column-wise softmax. The column maximum is subtracted before exponentiating.
pub fn softmax(x: &Array2<f64>) -> Array2<f64> {
    let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&m, &v| m.max(v));
    let exps = (x - &max.insert_axis(Axis(0))).mapv(f64::exp);
    let sums = exps.sum_axis(Axis(0));
    exps / &sums.insert_axis(Axis(0))
}

/// Index of the greatest value; the first one wins on ties.
pub(super) fn argmax(values: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Number of samples whose predicted class (`output` column) equals the labeled class
/// (`labels` row).
pub(super) fn count_correct(output: &Array2<f64>, labels: ArrayView2<f64>) -> usize {
    output
        .axis_iter(Axis(1))
        .zip(labels.axis_iter(Axis(0)))
        .filter(|(o, l)| argmax(o.view()) == argmax(l.view()))
        .count()
}

/// Error structure for `Model` computations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Expected {expected} input(s) per sample, but got {got}!")]
    BadInputs { expected: usize, got: usize },
    #[error("Expected {expected} label(s) per sample, but got {got}!")]
    BadLabels { expected: usize, got: usize },
    #[error("Expected {expected} labeled sample(s), but got {got}!")]
    BadBatch { expected: usize, got: usize },
    #[error("Expected outputs of shape {expected:?}, but got {got:?}!")]
    BadOutputs {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Expected {name} of shape {expected:?}, but got {got:?}!")]
    BadParam {
        name: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Batch must contain at least one sample!")]
    EmptyBatch,
}

/// Error structure for `Model::save` and `Model::try_load`
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Can't access checkpoint {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Checkpoint {} is malformed: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("Checkpoint {} does not fit the model: {source}", .path.display())]
    Shape {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn config(input_dim: usize, hidden_dim1: usize, out_dim: usize, weight_decay: f64) -> ModelConfig {
        ModelConfig {
            input_dim,
            hidden_dim1,
            out_dim,
            weight_decay,
            learning_rate: 0.1,
        }
    }

    fn batch(rng: &mut StdRng, size: usize, input_dim: usize, out_dim: usize) -> (Array2<f64>, Array2<f64>) {
        let images = Array2::<f64>::random_using((size, input_dim), StandardNormal, rng);
        let mut labels = Array2::zeros((size, out_dim));
        for i in 0..size {
            labels[[i, rng.gen_range(0..out_dim)]] = 1.0;
        }
        (images, labels)
    }

    fn loss(model: &Model, images: &Array2<f64>, labels: &Array2<f64>) -> f64 {
        let (output, _) = model.forward(images.view()).unwrap();
        let decay = 0.5
            * model.config.weight_decay
            * (model.params.w1.mapv(|w| w * w).sum() + model.params.w2.mapv(|w| w * w).sum());
        Model::cross_entropy(&output, labels.view()).unwrap() + decay
    }

    fn tensor(params: &mut Params, k: usize) -> &mut Array2<f64> {
        match k {
            0 => &mut params.w1,
            1 => &mut params.b1,
            2 => &mut params.w2,
            _ => &mut params.b2,
        }
    }

    #[test]
    fn init_shapes_and_scale() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = Model::with_rng(config(300, 100, 4, 0.0), &mut rng);
        assert!(model.params.check_shapes(&model.config).is_ok());

        let w1 = &model.params.w1;
        let var = w1.mapv(|w| w * w).mean().unwrap();
        assert_abs_diff_eq!(var, 1.0 / 100.0, epsilon = 2e-3);
        let w2 = &model.params.w2;
        let var = w2.mapv(|w| w * w).mean().unwrap();
        assert_abs_diff_eq!(var, 1.0 / 4.0, epsilon = 0.1);
    }

    #[test]
    fn seeded_init_is_reproducible() {
        let a = Model::with_seed(config(5, 3, 2, 0.0), Some(7));
        let b = Model::with_seed(config(5, 3, 2, 0.0), Some(7));
        assert_eq!(a.params, b.params);
    }

    #[test]
    fn softmax_columns_sum_to_one() {
        let x = array![[1.0, -1000.0, 0.0], [2.0, 1000.0, 0.0], [3.0, 0.5, 0.0]];
        let s = softmax(&x);
        for column in s.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-12);
            assert!(column.iter().all(|&p| p >= 0.0 && p.is_finite()));
        }
        assert_abs_diff_eq!(s[[0, 2]], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn forward_output_shape() {
        let mut rng = StdRng::seed_from_u64(2);
        let model = Model::with_rng(config(6, 4, 3, 0.0), &mut rng);
        let (images, _) = batch(&mut rng, 5, 6, 3);
        let (output, activations) = model.forward(images.view()).unwrap();
        assert_eq!(output.dim(), (3, 5));
        assert_eq!(activations.batch_size(), 5);
        for column in output.axis_iter(Axis(1)) {
            assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn forward_rejects_bad_width() {
        let model = Model::with_seed(config(6, 4, 3, 0.0), Some(0));
        let images = Array2::zeros((2, 5));
        assert_eq!(
            model.forward(images.view()).unwrap_err(),
            ModelError::BadInputs { expected: 6, got: 5 }
        );
    }

    #[test]
    fn cross_entropy_properties() {
        let labels = array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        let exact = labels.t().to_owned();
        let exact_loss = Model::cross_entropy(&exact, labels.view()).unwrap();
        assert!(exact_loss >= 0.0);
        assert!(exact_loss < 1e-11);

        let uniform = Array2::from_elem((3, 2), 1.0 / 3.0);
        let uniform_loss = Model::cross_entropy(&uniform, labels.view()).unwrap();
        assert_abs_diff_eq!(uniform_loss, 3.0f64.ln(), epsilon = 1e-12);

        // log(0) is clipped
        let wrong = array![[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
        let wrong_loss = Model::cross_entropy(&wrong, labels.view()).unwrap();
        assert!(wrong_loss.is_finite());
        assert_abs_diff_eq!(wrong_loss, -(CLIP.ln()), epsilon = 1e-9);
    }

    #[test]
    fn cross_entropy_rejects_mismatch() {
        let labels = Array2::zeros((2, 3));
        let predictions = Array2::zeros((2, 3));
        assert!(Model::cross_entropy(&predictions, labels.view()).is_err());
    }

    #[test]
    fn gradients_match_finite_differences() {
        for &weight_decay in [0.0, 0.05].iter() {
            let mut rng = StdRng::seed_from_u64(3);
            let mut model = Model::with_rng(config(5, 4, 3, weight_decay), &mut rng);
            let (images, labels) = batch(&mut rng, 3, 5, 3);

            let (output, activations) = model.forward(images.view()).unwrap();
            let gradients = model.backward(&output, labels.view(), activations).unwrap();

            let eps = 1e-5;
            let analytic = [&gradients.w1, &gradients.b1, &gradients.w2, &gradients.b2];
            for (k, analytic) in analytic.iter().enumerate() {
                let dim = tensor(&mut model.params, k).dim();
                for i in 0..dim.0 {
                    for j in 0..dim.1 {
                        let original = tensor(&mut model.params, k)[[i, j]];
                        tensor(&mut model.params, k)[[i, j]] = original + eps;
                        let plus = loss(&model, &images, &labels);
                        tensor(&mut model.params, k)[[i, j]] = original - eps;
                        let minus = loss(&model, &images, &labels);
                        tensor(&mut model.params, k)[[i, j]] = original;

                        let numeric = (plus - minus) / (2.0 * eps);
                        assert_abs_diff_eq!(analytic[[i, j]], numeric, epsilon = 1e-4);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_weight_decay_is_plain_gradient() {
        let mut rng = StdRng::seed_from_u64(4);
        let plain = Model::with_rng(config(4, 3, 2, 0.0), &mut rng);
        let mut decayed = plain.clone();
        decayed.config.weight_decay = 0.5;
        let (images, labels) = batch(&mut rng, 4, 4, 2);

        let (output, activations) = plain.forward(images.view()).unwrap();
        let g = plain.backward(&output, labels.view(), activations).unwrap();
        let (output, activations) = decayed.forward(images.view()).unwrap();
        let gd = decayed.backward(&output, labels.view(), activations).unwrap();

        assert_eq!(g.b1, gd.b1);
        assert_eq!(g.b2, gd.b2);
        assert_eq!(&g.w1 + &(&plain.params.w1 * 0.5), gd.w1);
        assert_eq!(&g.w2 + &(&plain.params.w2 * 0.5), gd.w2);
    }

    #[test]
    fn small_step_decreases_loss() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut cfg = config(8, 6, 4, 0.0);
        cfg.learning_rate = 1e-3;
        let mut model = Model::with_rng(cfg, &mut rng);
        let (images, labels) = batch(&mut rng, 6, 8, 4);

        let before = loss(&model, &images, &labels);
        let (output, activations) = model.forward(images.view()).unwrap();
        let gradients = model.backward(&output, labels.view(), activations).unwrap();
        model.update(&gradients);
        let after = loss(&model, &images, &labels);

        assert!(after < before, "{} !< {}", after, before);
    }

    #[test]
    fn update_subtracts_scaled_gradient() {
        let mut model = Model::with_seed(config(2, 2, 2, 0.0), Some(6));
        let before = model.params.clone();
        let ones = Gradients {
            w1: Array2::ones((2, 2)),
            b1: Array2::ones((2, 1)),
            w2: Array2::ones((2, 2)),
            b2: Array2::ones((2, 1)),
        };
        model.update(&ones);
        assert_eq!(model.params.w1, &before.w1 - 0.1);
        assert_eq!(model.params.b2, &before.b2 - 0.1);
    }

    #[test]
    fn backward_rejects_mismatched_labels() {
        let model = Model::with_seed(config(3, 2, 2, 0.0), Some(8));
        let images = Array2::zeros((4, 3));
        let (output, activations) = model.forward(images.view()).unwrap();
        let labels = Array2::zeros((3, 2));
        assert_eq!(
            model.backward(&output, labels.view(), activations).unwrap_err(),
            ModelError::BadBatch { expected: 4, got: 3 }
        );
    }

    #[test]
    fn eval_counts_argmax_matches() {
        // Second layer ignores the hidden layer and always prefers class 1
        let cfg = config(2, 2, 3, 0.0);
        let params = Params {
            w1: Array2::zeros((2, 2)),
            b1: Array2::zeros((2, 1)),
            w2: Array2::zeros((3, 2)),
            b2: array![[0.0], [5.0], [0.0]],
        };
        let model = Model::from_params(cfg, params).unwrap();
        let images = Array2::zeros((4, 2));
        let labels = array![[0.0, 1.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];

        let (accuracy, loss) = model.eval(images.view(), labels.view()).unwrap();
        assert_abs_diff_eq!(accuracy, 0.5);
        assert!(loss > 0.0);
        assert_eq!(model.predict(images.view()).unwrap(), vec![1; 4]);
    }

    #[test]
    fn from_params_checks_shapes() {
        let params = Params {
            w1: Array2::zeros((2, 3)),
            b1: Array2::zeros((2, 1)),
            w2: Array2::zeros((4, 2)),
            b2: Array2::zeros((2, 1)),
        };
        assert_eq!(
            Model::from_params(config(3, 2, 2, 0.0), params).unwrap_err(),
            ModelError::BadParam {
                name: "W2",
                expected: (2, 2),
                got: (4, 2)
            }
        );
    }

    #[test]
    fn argmax_prefers_first() {
        let values = array![0.2, 0.4, 0.4, 0.0];
        assert_eq!(argmax(values.view()), 1);
    }
}
