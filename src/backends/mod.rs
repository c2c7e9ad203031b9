use serde::{Deserialize, Serialize};

#[cfg(feature = "candle")]
pub mod candle_backend;
#[cfg(feature = "ort")]
pub mod ort_backend;
#[cfg(feature = "tch")]
pub mod tch_backend;

pub mod ndarray_backend;

/// The closed set of native tensor libraries a [`crate::Tensor`] can wrap.
///
/// Every variant is listed regardless of which cargo features are enabled, so the
/// capability table stays enumerable; only the adapters are feature-gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    strum_macros::EnumIter, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TensorBackend {
    /// Host arrays over `ndarray`, the numpy-like backend.
    NDArray,
    /// Eager `candle_core::Tensor`s.
    Candle,
    /// Eager libtorch tensors through `tch`.
    Tch,
    /// Constant `ort` values, as stored in an inference graph.
    Ort,
}

impl TensorBackend {
    pub fn is_compiled(&self) -> bool {
        match self {
            TensorBackend::NDArray => true,
            TensorBackend::Candle => cfg!(feature = "candle"),
            TensorBackend::Tch => cfg!(feature = "tch"),
            TensorBackend::Ort => cfg!(feature = "ort"),
        }
    }
}
