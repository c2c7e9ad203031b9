use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use crate::backends::TensorBackend;
use crate::device::TensorDeviceType;
use crate::dtype::TensorDataType;
use crate::tensor::TensorError;

/// Canonical operation names, the first key of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    strum_macros::EnumIter, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Negative,
    Abs,
    Compare,
    Sum,
    Max,
    Min,
    Mean,
    Squeeze,
    Unsqueeze,
    Reshape,
    Flatten,
    /// Integer and range indexing.
    Slice,
    /// Indexing with a list or tensor of positions.
    FancyIndex,
    Cast,
    ToCpu,
    ToHost,
}

pub fn is_supported(backend: TensorBackend, op: Operation) -> bool {
    match backend {
        TensorBackend::NDArray => true,
        TensorBackend::Candle => !matches!(op, Operation::FancyIndex),
        TensorBackend::Tch => true,
        TensorBackend::Ort => matches!(
            op,
            Operation::Reshape | Operation::Flatten | Operation::Cast | Operation::ToCpu | Operation::ToHost
        ),
    }
}

pub fn check(backend: TensorBackend, op: Operation) -> Result<(), TensorError> {
    if is_supported(backend, op) {
        Ok(())
    } else {
        log::debug!("Refusing {op} on backend {backend}");
        Err(TensorError::NotImplemented { op, backend })
    }
}

pub fn supported_operations(backend: TensorBackend) -> Vec<Operation> {
    Operation::iter().filter(|op| is_supported(backend, *op)).collect()
}

pub fn unsupported_operations(backend: TensorBackend) -> Vec<Operation> {
    Operation::iter().filter(|op| !is_supported(backend, *op)).collect()
}

pub fn supports_dtype(backend: TensorBackend, dtype: TensorDataType) -> bool {
    match backend {
        TensorBackend::NDArray => true,
        TensorBackend::Candle => matches!(
            dtype,
            TensorDataType::Float16
                | TensorDataType::BFloat16
                | TensorDataType::Float32
                | TensorDataType::Float64
                | TensorDataType::UInt8
                | TensorDataType::Int64
        ),
        TensorBackend::Tch => true,
        TensorBackend::Ort => true,
    }
}

pub fn supports_device(backend: TensorBackend, device: TensorDeviceType) -> bool {
    match device {
        TensorDeviceType::CPU => true,
        TensorDeviceType::GPU => matches!(backend, TensorBackend::Candle | TensorBackend::Tch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_only_lacks_fancy_indexing() {
        assert_eq!(unsupported_operations(TensorBackend::Candle), vec![Operation::FancyIndex]);
    }

    #[test]
    fn ort_constants_carry_no_compute() {
        assert!(!is_supported(TensorBackend::Ort, Operation::Add));
        assert!(!is_supported(TensorBackend::Ort, Operation::Squeeze));
        assert!(is_supported(TensorBackend::Ort, Operation::Cast));
        assert_eq!(supported_operations(TensorBackend::Ort).len(), 5);
    }

    #[test]
    fn refusal_names_the_pair() {
        let err = check(TensorBackend::Ort, Operation::Sum).unwrap_err();
        assert_eq!(err.to_string(), "Operation sum is not implemented for backend ort");
    }

    #[test]
    fn operation_names_are_snake_case() {
        assert_eq!(Operation::FancyIndex.to_string(), "fancy_index");
        assert_eq!(serde_json::to_string(&Operation::ToCpu).unwrap(), "\"to_cpu\"");
    }
}
