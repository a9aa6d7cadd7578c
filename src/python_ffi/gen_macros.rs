/// Error raised when a wrapper is used after its inner object was moved out of it.
#[derive(Debug, thiserror::Error)]
#[error("This {0} object is consumed and cannot be used")]
pub struct Consumed(pub &'static str);

/// Declares a wrapper that owns an inner object until some Python method moves it out
/// (for example `Model.build_trainer`), after which every access fails with `Consumed`.
#[macro_export]
macro_rules! MakeConsumable {
    ($name:ident,$inner_type:tt,$obj_name:ident) => {
        pub(super) struct $name {
            obj: Option<$inner_type>,
        }
        impl $name {
            pub(super) fn acquire(val: $inner_type) -> Self {
                Self { obj: Some(val) }
            }
            pub(super) fn get_ref(&self) -> Result<&$inner_type, $crate::python_ffi::Consumed> {
                self.obj
                    .as_ref()
                    .ok_or($crate::python_ffi::Consumed(std::stringify!($obj_name)))
            }
            pub(super) fn get_ref_mut(&mut self) -> Result<&mut $inner_type, $crate::python_ffi::Consumed> {
                self.obj
                    .as_mut()
                    .ok_or($crate::python_ffi::Consumed(std::stringify!($obj_name)))
            }
            pub(super) fn release(&mut self) -> Result<$inner_type, $crate::python_ffi::Consumed> {
                self.obj
                    .take()
                    .ok_or($crate::python_ffi::Consumed(std::stringify!($obj_name)))
            }
        }
    };
}

/// Maps library errors to Python `ValueError`.
#[macro_export]
macro_rules! Impl_to_PyErr {
    (for $($t:ty),+) => {
        $(impl From<$t> for pyo3::PyErr {
            fn from(err: $t) -> Self {
                pyo3::exceptions::PyValueError::new_err(format!("{}", err))
            }
        }
        )*
    }
}
