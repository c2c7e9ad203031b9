use std::sync::Arc;
use half::{bf16, f16};
use ort::tensor::TensorElementType;
use ort::value::DynValue;
use crate::backends::ndarray_backend::{NDArrayTensor, NDArrayTensorError};
use crate::dtype::{DTypeError, TensorDataType};
use crate::tensor::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum OrtTensorError {
    #[error(transparent)]
    DTypeError(#[from] DTypeError),
    #[error(transparent)]
    OrtError(#[from] ort::Error),
    #[error(transparent)]
    NDArrayError(#[from] NDArrayTensorError),
}

impl TryFrom<TensorDataType> for TensorElementType {
    type Error = DTypeError;
    fn try_from(value: TensorDataType) -> Result<Self, Self::Error> {
        Ok(match value {
            TensorDataType::Float32 => TensorElementType::Float32,
            TensorDataType::Float64 => TensorElementType::Float64,
            TensorDataType::BFloat16 => TensorElementType::Bfloat16,
            TensorDataType::Float16 => TensorElementType::Float16,
            TensorDataType::Int64 => TensorElementType::Int64,
            TensorDataType::Int32 => TensorElementType::Int32,
            TensorDataType::Int8 => TensorElementType::Int8,
            TensorDataType::UInt8 => TensorElementType::Uint8,
            TensorDataType::Bool => TensorElementType::Bool,
        })
    }
}

impl TryFrom<TensorElementType> for TensorDataType {
    type Error = DTypeError;
    fn try_from(value: TensorElementType) -> Result<Self, Self::Error> {
        Ok(match value {
            TensorElementType::Float64 => TensorDataType::Float64,
            TensorElementType::Float32 => TensorDataType::Float32,
            TensorElementType::Bfloat16 => TensorDataType::BFloat16,
            TensorElementType::Float16 => TensorDataType::Float16,
            TensorElementType::Int64 => TensorDataType::Int64,
            TensorElementType::Int32 => TensorDataType::Int32,
            TensorElementType::Int8 => TensorDataType::Int8,
            TensorElementType::Uint8 => TensorDataType::UInt8,
            TensorElementType::Bool => TensorDataType::Bool,
            other => Err(DTypeError::UnsupportedNativeDType(format!("{other:?}")))?,
        })
    }
}

/// A constant ORT value as stored in an inference graph. Always host resident; shape
/// and dtype changes rebuild the value from a host copy.
#[derive(Debug, Clone)]
pub struct OrtTensor(Arc<DynValue>);

impl From<DynValue> for OrtTensor {
    fn from(value: DynValue) -> Self {
        Self(Arc::new(value))
    }
}

impl OrtTensor {
    pub fn inner(&self) -> &DynValue {
        &self.0
    }

    pub fn element_type(&self) -> Result<TensorElementType, DTypeError> {
        self.0
            .dtype()
            .tensor_type()
            .ok_or_else(|| DTypeError::UnsupportedNativeDType(format!("{:?}", self.0.dtype())))
    }

    pub fn dtype(&self) -> Result<TensorDataType, DTypeError> {
        self.element_type()?.try_into()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.shape().to_vec().iter().map(|x| *x as usize).collect()
    }

    pub fn rank(&self) -> usize {
        self.0.shape().len()
    }

    pub fn from_ndarray(value: &NDArrayTensor) -> Result<Self, OrtTensorError> {
        let value = match value {
            NDArrayTensor::F64(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::F32(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::BF16(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::F16(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::I64(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::I32(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::I8(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::U8(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
            NDArrayTensor::BOOL(x) => ort::value::Value::from_array(x.as_standard_layout().to_owned())?.into_dyn(),
        };
        Ok(value.into())
    }

    pub fn to_ndarray(&self) -> Result<NDArrayTensor, OrtTensorError> {
        let value = &self.0;
        Ok(match self.element_type()? {
            TensorElementType::Float64 => NDArrayTensor::F64(value.try_extract_array::<f64>()?.to_shared()),
            TensorElementType::Float32 => NDArrayTensor::F32(value.try_extract_array::<f32>()?.to_shared()),
            TensorElementType::Bfloat16 => NDArrayTensor::BF16(value.try_extract_array::<bf16>()?.to_shared()),
            TensorElementType::Float16 => NDArrayTensor::F16(value.try_extract_array::<f16>()?.to_shared()),
            TensorElementType::Int64 => NDArrayTensor::I64(value.try_extract_array::<i64>()?.to_shared()),
            TensorElementType::Int32 => NDArrayTensor::I32(value.try_extract_array::<i32>()?.to_shared()),
            TensorElementType::Int8 => NDArrayTensor::I8(value.try_extract_array::<i8>()?.to_shared()),
            TensorElementType::Uint8 => NDArrayTensor::U8(value.try_extract_array::<u8>()?.to_shared()),
            TensorElementType::Bool => NDArrayTensor::BOOL(value.try_extract_array::<bool>()?.to_shared()),
            other => Err(DTypeError::UnsupportedNativeDType(format!("{other:?}")))?,
        })
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self, OrtTensorError> {
        Self::from_ndarray(&self.to_ndarray()?.reshape(shape)?)
    }

    pub fn flatten(&self) -> Result<Self, OrtTensorError> {
        Self::from_ndarray(&self.to_ndarray()?.flatten()?)
    }

    pub fn cast(&self, dtype: TensorDataType) -> Result<Self, OrtTensorError> {
        Self::from_ndarray(&self.to_ndarray()?.cast(dtype)?)
    }
}

pub fn classify(err: &OrtTensorError) -> ErrorCategory {
    match err {
        OrtTensorError::DTypeError(_) => ErrorCategory::UnsupportedDType,
        OrtTensorError::NDArrayError(inner) => crate::backends::ndarray_backend::classify(inner),
        OrtTensorError::OrtError(_) => ErrorCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_round_trip_through_host() {
        let x = NDArrayTensor::from_vec_shape(vec![1i64, 2, 3, 4], &[2, 2]).unwrap();
        let t = OrtTensor::from_ndarray(&x).unwrap();
        assert_eq!(t.dtype().unwrap(), TensorDataType::Int64);
        assert_eq!(t.shape(), vec![2, 2]);
        assert_eq!(t.to_ndarray().unwrap(), x);
    }

    #[test]
    fn reshape_rebuilds_the_value() {
        let x = NDArrayTensor::from_vec_shape(vec![0.5f32; 6], &[2, 3]).unwrap();
        let t = OrtTensor::from_ndarray(&x).unwrap().reshape(&[3, 2]).unwrap();
        assert_eq!(t.shape(), vec![3, 2]);
        assert_eq!(t.cast(TensorDataType::Float64).unwrap().dtype().unwrap(), TensorDataType::Float64);
    }
}
