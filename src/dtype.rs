use half::{bf16, f16};
use serde::{Deserialize, Serialize};
use crate::backends::TensorBackend;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DTypeError {
    #[error("The backend {1} does not support the dtype {0}")]
    DTypeNotSupportedByBackend(TensorDataType, TensorBackend),
    #[error("The native dtype {0} has no canonical counterpart")]
    UnsupportedNativeDType(String),
}

/// Canonical element type shared by every backend.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Serialize, Deserialize,
    strum_macros::EnumIter, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TensorDataType {
    Float16,
    BFloat16,
    Float32,
    Float64,
    Int8,
    UInt8,
    Int32,
    Int64,
    Bool,
}

impl TensorDataType {
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            TensorDataType::Float16 | TensorDataType::BFloat16 | TensorDataType::Float32 | TensorDataType::Float64
        )
    }

    /// Relative tolerance that a value keeps after a round trip through this dtype.
    pub fn epsilon(&self) -> f64 {
        match self {
            TensorDataType::Float16 => f16::EPSILON.to_f64(),
            TensorDataType::BFloat16 => bf16::EPSILON.to_f64(),
            TensorDataType::Float32 => f32::EPSILON as f64,
            TensorDataType::Float64 => f64::EPSILON,
            _ => 0.0,
        }
    }
}

pub trait DTypeOfPrimitive {
    const DTYPE: TensorDataType;
}

impl DTypeOfPrimitive for f64 { const DTYPE: TensorDataType = TensorDataType::Float64; }
impl DTypeOfPrimitive for f32 { const DTYPE: TensorDataType = TensorDataType::Float32; }
impl DTypeOfPrimitive for bf16 { const DTYPE: TensorDataType = TensorDataType::BFloat16; }
impl DTypeOfPrimitive for f16 { const DTYPE: TensorDataType = TensorDataType::Float16; }
impl DTypeOfPrimitive for i64 { const DTYPE: TensorDataType = TensorDataType::Int64; }
impl DTypeOfPrimitive for i32 { const DTYPE: TensorDataType = TensorDataType::Int32; }
impl DTypeOfPrimitive for i8 { const DTYPE: TensorDataType = TensorDataType::Int8; }
impl DTypeOfPrimitive for u8 { const DTYPE: TensorDataType = TensorDataType::UInt8; }
impl DTypeOfPrimitive for bool { const DTYPE: TensorDataType = TensorDataType::Bool; }

/// A backend's own dtype token, as produced by [`from_canonical_dtype`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeDType {
    NDArray(TensorDataType),
    #[cfg(feature = "candle")]
    Candle(candle_core::DType),
    #[cfg(feature = "tch")]
    Tch(tch::Kind),
    #[cfg(feature = "ort")]
    Ort(ort::tensor::TensorElementType),
}

pub fn from_canonical_dtype(dtype: TensorDataType, backend: TensorBackend) -> Result<NativeDType, DTypeError> {
    if !crate::capabilities::supports_dtype(backend, dtype) {
        return Err(DTypeError::DTypeNotSupportedByBackend(dtype, backend));
    }
    Ok(match backend {
        TensorBackend::NDArray => NativeDType::NDArray(dtype),
        #[cfg(feature = "candle")]
        TensorBackend::Candle => NativeDType::Candle(dtype.try_into()?),
        #[cfg(feature = "tch")]
        TensorBackend::Tch => NativeDType::Tch(dtype.try_into()?),
        #[cfg(feature = "ort")]
        TensorBackend::Ort => NativeDType::Ort(dtype.try_into()?),
        #[allow(unreachable_patterns)]
        _ => Err(DTypeError::DTypeNotSupportedByBackend(dtype, backend))?,
    })
}

pub fn to_canonical_dtype(tensor: &crate::Tensor) -> Result<TensorDataType, DTypeError> {
    tensor.dtype()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn display_names_are_lowercase() {
        assert_eq!(TensorDataType::Float32.to_string(), "float32");
        assert_eq!(TensorDataType::BFloat16.to_string(), "bfloat16");
        assert_eq!(TensorDataType::Bool.to_string(), "bool");
    }

    #[test]
    fn ndarray_accepts_every_dtype() {
        for dtype in TensorDataType::iter() {
            assert_eq!(
                from_canonical_dtype(dtype, TensorBackend::NDArray),
                Ok(NativeDType::NDArray(dtype))
            );
        }
    }

    #[cfg(feature = "candle")]
    #[test]
    fn candle_refuses_int32() {
        assert_eq!(
            from_canonical_dtype(TensorDataType::Int32, TensorBackend::Candle),
            Err(DTypeError::DTypeNotSupportedByBackend(TensorDataType::Int32, TensorBackend::Candle))
        );
    }
}
