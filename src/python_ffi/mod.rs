//! Python FFI
use pyo3::prelude::*;

pub mod feedforward;
mod gen_macros;

pub use gen_macros::Consumed;
use crate::Impl_to_PyErr;

#[pymodule]
fn cifarnnet(_py: Python, m: &PyModule) -> PyResult<()> {
    feedforward::construct_module(m)?;
    Ok(())
}

Impl_to_PyErr!(for Consumed);
