use tch::{Device, Kind, Tensor};
use crate::axes::resolve_slice;
use crate::backends::TensorBackend;
use crate::backends::ndarray_backend::{AxisIndex, CompareOp, NDArrayTensor, ReduceOp};
use crate::device::{DeviceError, TensorDeviceType};
use crate::dtype::{DTypeError, TensorDataType};
use crate::tensor::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum TchTensorError {
    #[error(transparent)]
    DTypeError(#[from] DTypeError),
    #[error(transparent)]
    DeviceError(#[from] DeviceError),
    #[error(transparent)]
    TchError(#[from] tch::TchError),
    #[error(transparent)]
    NDArrayError(#[from] crate::backends::ndarray_backend::NDArrayTensorError),
}

impl TryFrom<TensorDataType> for Kind {
    type Error = DTypeError;
    fn try_from(value: TensorDataType) -> Result<Self, Self::Error> {
        Ok(match value {
            TensorDataType::Float64 => Kind::Double,
            TensorDataType::Float32 => Kind::Float,
            TensorDataType::BFloat16 => Kind::BFloat16,
            TensorDataType::Float16 => Kind::Half,
            TensorDataType::Int64 => Kind::Int64,
            TensorDataType::Int32 => Kind::Int,
            TensorDataType::Int8 => Kind::Int8,
            TensorDataType::UInt8 => Kind::Uint8,
            TensorDataType::Bool => Kind::Bool,
        })
    }
}

impl TryFrom<Kind> for TensorDataType {
    type Error = DTypeError;
    fn try_from(value: Kind) -> Result<Self, Self::Error> {
        Ok(match value {
            Kind::Double => TensorDataType::Float64,
            Kind::Float => TensorDataType::Float32,
            Kind::BFloat16 => TensorDataType::BFloat16,
            Kind::Half => TensorDataType::Float16,
            Kind::Int64 => TensorDataType::Int64,
            Kind::Int => TensorDataType::Int32,
            Kind::Int8 => TensorDataType::Int8,
            Kind::Uint8 => TensorDataType::UInt8,
            Kind::Bool => TensorDataType::Bool,
            other => Err(DTypeError::UnsupportedNativeDType(format!("{other:?}")))?,
        })
    }
}

impl From<Device> for TensorDeviceType {
    fn from(value: Device) -> Self {
        match value {
            Device::Cpu => TensorDeviceType::CPU,
            _ => TensorDeviceType::GPU,
        }
    }
}

pub fn device_for(device: TensorDeviceType) -> Result<Device, DeviceError> {
    match device {
        TensorDeviceType::CPU => Ok(Device::Cpu),
        TensorDeviceType::GPU if tch::Cuda::is_available() => Ok(Device::Cuda(0)),
        TensorDeviceType::GPU => Err(DeviceError::DeviceUnavailable(device, TensorBackend::Tch)),
    }
}

/// A libtorch tensor. Cloning is a shallow clone that shares storage.
#[derive(Debug)]
pub struct TchTensor {
    tensor: Tensor,
}

impl Clone for TchTensor {
    fn clone(&self) -> Self {
        Self {
            tensor: self.tensor.shallow_clone(),
        }
    }
}

impl From<Tensor> for TchTensor {
    fn from(tensor: Tensor) -> Self {
        Self { tensor }
    }
}

fn to_i64_dims(dims: &[usize]) -> Vec<i64> {
    dims.iter().map(|&d| d as i64).collect()
}

impl TchTensor {
    pub fn inner(&self) -> &Tensor {
        &self.tensor
    }

    pub fn dtype(&self) -> Result<TensorDataType, DTypeError> {
        self.tensor.kind().try_into()
    }

    pub fn device(&self) -> TensorDeviceType {
        self.tensor.device().into()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.tensor.size().iter().map(|&d| d as usize).collect()
    }

    pub fn rank(&self) -> usize {
        self.tensor.dim()
    }

    pub fn from_ndarray(value: &NDArrayTensor, device: TensorDeviceType) -> Result<Self, TchTensorError> {
        let device = device_for(device)?;
        let shape = to_i64_dims(&value.shape());
        let flat = match value {
            NDArrayTensor::F64(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::F32(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::BF16(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::F16(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::I64(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::I32(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::I8(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::U8(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
            NDArrayTensor::BOOL(x) => Tensor::f_from_slice(&x.iter().copied().collect::<Vec<_>>())?,
        };
        Ok(Self {
            tensor: flat.f_reshape(shape.as_slice())?.to_device(device),
        })
    }

    pub fn to_ndarray(&self) -> Result<NDArrayTensor, TchTensorError> {
        let shape = self.shape();
        let flat = self.tensor.to_device(Device::Cpu).f_reshape([-1i64])?;
        Ok(match self.tensor.kind() {
            Kind::Double => NDArrayTensor::from_vec_shape(Vec::<f64>::try_from(&flat)?, &shape)?,
            Kind::Float => NDArrayTensor::from_vec_shape(Vec::<f32>::try_from(&flat)?, &shape)?,
            Kind::BFloat16 => NDArrayTensor::from_vec_shape(Vec::<half::bf16>::try_from(&flat)?, &shape)?,
            Kind::Half => NDArrayTensor::from_vec_shape(Vec::<half::f16>::try_from(&flat)?, &shape)?,
            Kind::Int64 => NDArrayTensor::from_vec_shape(Vec::<i64>::try_from(&flat)?, &shape)?,
            Kind::Int => NDArrayTensor::from_vec_shape(Vec::<i32>::try_from(&flat)?, &shape)?,
            Kind::Int8 => NDArrayTensor::from_vec_shape(Vec::<i8>::try_from(&flat)?, &shape)?,
            Kind::Uint8 => NDArrayTensor::from_vec_shape(Vec::<u8>::try_from(&flat)?, &shape)?,
            Kind::Bool => NDArrayTensor::from_vec_shape(Vec::<bool>::try_from(&flat)?, &shape)?,
            other => Err(DTypeError::UnsupportedNativeDType(format!("{other:?}")))?,
        })
    }

    pub fn add(a: &Self, b: &Self) -> Result<Self, TchTensorError> {
        Ok(a.tensor.f_add(&b.tensor)?.into())
    }

    pub fn sub(a: &Self, b: &Self) -> Result<Self, TchTensorError> {
        Ok(a.tensor.f_sub(&b.tensor)?.into())
    }

    pub fn mul(a: &Self, b: &Self) -> Result<Self, TchTensorError> {
        Ok(a.tensor.f_mul(&b.tensor)?.into())
    }

    pub fn div(a: &Self, b: &Self) -> Result<Self, TchTensorError> {
        Ok(a.tensor.f_div(&b.tensor)?.into())
    }

    pub fn add_scalar(&self, value: f64) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_add_scalar(value)?.into())
    }

    pub fn mul_scalar(&self, value: f64) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_mul_scalar(value)?.into())
    }

    pub fn compare(a: &Self, b: &Self, op: CompareOp) -> Result<Self, TchTensorError> {
        let mask = match op {
            CompareOp::Less => a.tensor.f_lt_tensor(&b.tensor)?,
            CompareOp::Greater => a.tensor.f_gt_tensor(&b.tensor)?,
            CompareOp::Equal => a.tensor.f_eq_tensor(&b.tensor)?,
        };
        Ok(mask.into())
    }

    pub fn neg(&self) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_neg()?.into())
    }

    pub fn abs(&self) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_abs()?.into())
    }

    pub fn reduce(&self, axes: Option<&[isize]>, keepdims: bool, op: ReduceOp) -> Result<Self, TchTensorError> {
        let dims = match axes {
            Some(axes) => axes.iter().map(|&a| a as i64).collect::<Vec<_>>(),
            None => (0..self.rank() as i64).collect(),
        };
        let kind = self.tensor.kind();
        let out = match op {
            ReduceOp::Sum => self.tensor.f_sum_dim_intlist(dims.as_slice(), keepdims, kind)?,
            ReduceOp::Mean => self.tensor.f_mean_dim(dims.as_slice(), keepdims, kind)?,
            ReduceOp::Max => self.tensor.f_amax(dims.as_slice(), keepdims)?,
            ReduceOp::Min => self.tensor.f_amin(dims.as_slice(), keepdims)?,
        };
        Ok(out.into())
    }

    /// Follows torch: named dims whose size is not one are left in place.
    pub fn squeeze(&self, axes: Option<&[isize]>) -> Result<Self, TchTensorError> {
        Ok(match axes {
            None => self.tensor.f_squeeze()?,
            Some(axes) => {
                let dims = axes.iter().map(|&a| a as i64).collect::<Vec<_>>();
                self.tensor.f_squeeze_dims(dims.as_slice())?
            }
        }
        .into())
    }

    pub fn unsqueeze(&self, axis: isize) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_unsqueeze(axis as i64)?.into())
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_reshape(to_i64_dims(shape).as_slice())?.into())
    }

    pub fn flatten(&self) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_flatten(0, -1)?.into())
    }

    pub fn get_item(&self, index: &[AxisIndex]) -> Result<Self, TchTensorError> {
        let mut out = self.tensor.shallow_clone();
        let mut axis = 0i64;
        for entry in index {
            out = match entry {
                AxisIndex::At(i) => out.f_select(axis, *i as i64)?,
                AxisIndex::Slice(start, end) => {
                    let size = out.f_size()?.get(axis as usize).copied().unwrap_or(0) as usize;
                    let (start, end) = resolve_slice(*start, *end, size);
                    axis += 1;
                    out.f_narrow(axis - 1, start as i64, (end - start) as i64)?
                }
                AxisIndex::Full => {
                    axis += 1;
                    out
                }
                AxisIndex::Select(positions) => {
                    let size = out.f_size()?.get(axis as usize).copied().unwrap_or(0);
                    let positions = positions.iter().map(|&p| if p < 0 { p + size } else { p }).collect::<Vec<_>>();
                    let positions = Tensor::f_from_slice(&positions)?.to_device(out.device());
                    axis += 1;
                    out.f_index_select(axis - 1, &positions)?
                }
            };
        }
        Ok(out.into())
    }

    pub fn cast(&self, dtype: TensorDataType) -> Result<Self, TchTensorError> {
        Ok(self.tensor.f_to_kind(dtype.try_into()?)?.into())
    }

    pub fn to_cpu(&self) -> Self {
        self.tensor.to_device(Device::Cpu).into()
    }
}

/// Torch errors arrive as C++ exception text; IndexError messages mention the range.
pub fn classify(err: &TchTensorError) -> ErrorCategory {
    match err {
        TchTensorError::DTypeError(_) => ErrorCategory::UnsupportedDType,
        TchTensorError::DeviceError(_) => ErrorCategory::UnsupportedDevice,
        TchTensorError::NDArrayError(inner) => crate::backends::ndarray_backend::classify(inner),
        TchTensorError::TchError(inner) => {
            let message = inner.to_string();
            if message.contains("out of range") || message.contains("out of bounds") || message.contains("too many indices") {
                ErrorCategory::Index
            } else if message.contains("not implemented for") {
                ErrorCategory::UnsupportedDType
            } else if message.contains("CUDA") || message.contains("device") {
                ErrorCategory::UnsupportedDevice
            } else {
                ErrorCategory::Value
            }
        }
    }
}
