//! Two-layer fully connected network for CIFAR-10 image classification, trained from
//! scratch with hand-written backpropagation and mini-batch gradient descent.
//!
//! * `data` reads the CIFAR-10 binary batches and prepares standardized splits;
//! * `feedforward` holds the network (`Model`) and its training loop (`Trainer`);
//! * `sweep` runs a grid search over hyperparameters;
//! * `config` gathers the settings of all of the above.

pub mod config;
pub mod data;
pub mod feedforward;
pub mod sweep;

#[cfg(feature = "python")]
mod python_ffi;
