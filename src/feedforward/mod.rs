//! Two-layer network with hand-derived backpropagation and its mini-batch gradient descent trainer

mod metrics;
mod model;
mod trainer;

pub use metrics::*;
pub use model::*;
pub use trainer::*;
