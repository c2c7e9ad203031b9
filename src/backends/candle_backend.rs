use candle_core::shape::Dim;
use candle_core::{D, Device};
use crate::axes::resolve_slice;
use crate::backends::TensorBackend;
use crate::backends::ndarray_backend::{AxisIndex, CompareOp, NDArrayTensor, ReduceOp};
use crate::device::{DeviceError, TensorDeviceType};
use crate::dtype::{DTypeError, TensorDataType};
use crate::tensor::{ErrorCategory, TensorError};

impl TryFrom<TensorDataType> for candle_core::DType {
    type Error = DTypeError;
    fn try_from(value: TensorDataType) -> Result<Self, Self::Error> {
        Ok(match value {
            TensorDataType::Float64 => candle_core::DType::F64,
            TensorDataType::Float32 => candle_core::DType::F32,
            TensorDataType::BFloat16 => candle_core::DType::BF16,
            TensorDataType::Float16 => candle_core::DType::F16,
            TensorDataType::Int64 => candle_core::DType::I64,
            TensorDataType::UInt8 => candle_core::DType::U8,
            _ => Err(DTypeError::DTypeNotSupportedByBackend(value, TensorBackend::Candle))?,
        })
    }
}

impl TryFrom<candle_core::DType> for TensorDataType {
    type Error = DTypeError;
    fn try_from(value: candle_core::DType) -> Result<Self, Self::Error> {
        Ok(match value {
            candle_core::DType::F64 => TensorDataType::Float64,
            candle_core::DType::F32 => TensorDataType::Float32,
            candle_core::DType::BF16 => TensorDataType::BFloat16,
            candle_core::DType::F16 => TensorDataType::Float16,
            candle_core::DType::I64 => TensorDataType::Int64,
            candle_core::DType::U8 => TensorDataType::UInt8,
            other => Err(DTypeError::UnsupportedNativeDType(format!("{other:?}")))?,
        })
    }
}

impl From<&Device> for TensorDeviceType {
    fn from(value: &Device) -> Self {
        match value {
            Device::Cpu => TensorDeviceType::CPU,
            _ => TensorDeviceType::GPU,
        }
    }
}

/// First accelerator this build of candle can open: CUDA device 0, then Metal device 0.
pub fn gpu_device() -> Result<Device, DeviceError> {
    if candle_core::utils::cuda_is_available() {
        if let Ok(device) = Device::new_cuda(0) {
            return Ok(device);
        }
    }
    if candle_core::utils::metal_is_available() {
        if let Ok(device) = Device::new_metal(0) {
            return Ok(device);
        }
    }
    Err(DeviceError::DeviceUnavailable(TensorDeviceType::GPU, TensorBackend::Candle))
}

pub fn device_for(device: TensorDeviceType) -> Result<Device, DeviceError> {
    match device {
        TensorDeviceType::CPU => Ok(Device::Cpu),
        TensorDeviceType::GPU => gpu_device(),
    }
}

pub(crate) fn load_to_device(value: &NDArrayTensor, device: &Device) -> Result<candle_core::Tensor, TensorError> {
    let shape = value.shape();
    Ok(match value {
        NDArrayTensor::F64(x) => candle_core::Tensor::from_vec(x.iter().copied().collect::<Vec<_>>(), shape, device)?,
        NDArrayTensor::F32(x) => candle_core::Tensor::from_vec(x.iter().copied().collect::<Vec<_>>(), shape, device)?,
        NDArrayTensor::BF16(x) => candle_core::Tensor::from_vec(x.iter().copied().collect::<Vec<_>>(), shape, device)?,
        NDArrayTensor::F16(x) => candle_core::Tensor::from_vec(x.iter().copied().collect::<Vec<_>>(), shape, device)?,
        NDArrayTensor::I64(x) => candle_core::Tensor::from_vec(x.iter().copied().collect::<Vec<_>>(), shape, device)?,
        NDArrayTensor::U8(x) => candle_core::Tensor::from_vec(x.iter().copied().collect::<Vec<_>>(), shape, device)?,
        _ => Err(DTypeError::DTypeNotSupportedByBackend(value.dtype(), TensorBackend::Candle))?,
    })
}

pub fn from_host(value: &NDArrayTensor, device: TensorDeviceType) -> Result<candle_core::Tensor, TensorError> {
    load_to_device(value, &device_for(device)?)
}

pub fn to_host(value: &candle_core::Tensor) -> Result<NDArrayTensor, TensorError> {
    let shape = value.dims().to_vec();
    let flat = value.flatten_all()?;
    Ok(match value.dtype() {
        candle_core::DType::F64 => NDArrayTensor::from_vec_shape(flat.to_vec1::<f64>()?, &shape)?,
        candle_core::DType::F32 => NDArrayTensor::from_vec_shape(flat.to_vec1::<f32>()?, &shape)?,
        candle_core::DType::BF16 => NDArrayTensor::from_vec_shape(flat.to_vec1::<half::bf16>()?, &shape)?,
        candle_core::DType::F16 => NDArrayTensor::from_vec_shape(flat.to_vec1::<half::f16>()?, &shape)?,
        candle_core::DType::I64 => NDArrayTensor::from_vec_shape(flat.to_vec1::<i64>()?, &shape)?,
        candle_core::DType::U8 => NDArrayTensor::from_vec_shape(flat.to_vec1::<u8>()?, &shape)?,
        other => Err(DTypeError::UnsupportedNativeDType(format!("{other:?}")))?,
    })
}

fn resolve_dim(value: &candle_core::Tensor, axis: isize, op: &'static str) -> candle_core::Result<usize> {
    if axis < 0 {
        D::Minus(axis.unsigned_abs()).to_index(value.shape(), op)
    } else {
        (axis as usize).to_index(value.shape(), op)
    }
}

pub fn compare(a: &candle_core::Tensor, b: &candle_core::Tensor, op: CompareOp) -> candle_core::Result<candle_core::Tensor> {
    match op {
        CompareOp::Less => a.broadcast_lt(b),
        CompareOp::Greater => a.broadcast_gt(b),
        CompareOp::Equal => a.broadcast_eq(b),
    }
}

/// Reduces one dim at a time with the `_keepdim` primitives, then drops the reduced dims
/// unless `keepdims` is set.
pub fn reduce(
    value: &candle_core::Tensor,
    axes: Option<&[isize]>,
    keepdims: bool,
    op: ReduceOp,
) -> candle_core::Result<candle_core::Tensor> {
    let mut dims = match axes {
        None => (0..value.rank()).collect::<Vec<_>>(),
        Some(axes) => axes
            .iter()
            .map(|&axis| resolve_dim(value, axis, "reduce"))
            .collect::<candle_core::Result<Vec<_>>>()?,
    };
    dims.sort_unstable();
    if dims.windows(2).any(|w| w[0] == w[1]) {
        return Err(candle_core::Error::Msg(format!("duplicate dim index in {op}: {axes:?}")));
    }
    let mut out = value.clone();
    for &dim in &dims {
        out = match op {
            ReduceOp::Sum => out.sum_keepdim(dim)?,
            ReduceOp::Max => out.max_keepdim(dim)?,
            ReduceOp::Min => out.min_keepdim(dim)?,
            ReduceOp::Mean => out.mean_keepdim(dim)?,
        };
    }
    if !keepdims {
        for &dim in dims.iter().rev() {
            out = out.squeeze(dim)?;
        }
    }
    Ok(out)
}

/// Non-unit dims named in `axes` are kept, as in PyTorch.
pub fn squeeze(value: &candle_core::Tensor, axes: Option<&[isize]>) -> candle_core::Result<candle_core::Tensor> {
    match axes {
        None => {
            let shape = value.dims().iter().copied().filter(|&d| d != 1).collect::<Vec<_>>();
            value.reshape(shape)
        }
        Some(axes) => {
            let mut dims = axes
                .iter()
                .map(|&axis| resolve_dim(value, axis, "squeeze"))
                .collect::<candle_core::Result<Vec<_>>>()?;
            dims.sort_unstable_by(|a, b| b.cmp(a));
            dims.dedup();
            let mut out = value.clone();
            for dim in dims {
                out = out.squeeze(dim)?;
            }
            Ok(out)
        }
    }
}

pub fn unsqueeze(value: &candle_core::Tensor, axis: isize) -> candle_core::Result<candle_core::Tensor> {
    let rank = value.rank() as isize;
    let resolved = if axis < 0 { axis + rank + 1 } else { axis };
    if resolved < 0 {
        return Err(candle_core::Error::Msg(format!(
            "unsqueeze: dimension index {axis} out of range for rank {rank}"
        )));
    }
    value.unsqueeze(resolved as usize)
}

pub fn get_item(value: &candle_core::Tensor, index: &[AxisIndex]) -> candle_core::Result<candle_core::Tensor> {
    if index.len() > value.rank() {
        return Err(candle_core::Error::Msg(format!(
            "too many indices for tensor of rank {}: {}",
            value.rank(),
            index.len()
        )));
    }
    let mut out = value.clone();
    let mut axis = 0;
    for entry in index {
        let size = out.dim(axis)?;
        match entry {
            AxisIndex::At(i) => {
                let resolved = if *i < 0 { *i + size as isize } else { *i };
                if resolved < 0 || resolved >= size as isize {
                    return Err(candle_core::Error::Msg(format!(
                        "index {i} is out of range for dimension {axis} with size {size}"
                    )));
                }
                out = out.narrow(axis, resolved as usize, 1)?.squeeze(axis)?;
            }
            AxisIndex::Slice(start, end) => {
                let (start, end) = resolve_slice(*start, *end, size);
                out = out.narrow(axis, start, end - start)?;
                axis += 1;
            }
            AxisIndex::Full => axis += 1,
            AxisIndex::Select(_) => {
                return Err(candle_core::Error::Msg("candle tensors do not accept index lists".to_string()));
            }
        }
    }
    Ok(out)
}

/// Candle reports most failures as formatted messages, so the category is read from the text.
pub fn classify(err: &candle_core::Error) -> ErrorCategory {
    let message = err.to_string();
    if message.contains("out of range") || message.contains("out of bounds") || message.contains("too many indices") {
        ErrorCategory::Index
    } else if message.contains("unsupported dtype") {
        ErrorCategory::UnsupportedDType
    } else if message.contains("has not been built with") {
        ErrorCategory::UnsupportedDevice
    } else if message.contains("mismatch")
        || message.contains("duplicate")
        || message.contains("broadcast")
        || message.contains("invalid")
        || message.contains("index lists")
    {
        ErrorCategory::Value
    } else {
        ErrorCategory::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(values: Vec<f32>, shape: &[usize]) -> NDArrayTensor {
        NDArrayTensor::from_vec_shape(values, shape).unwrap()
    }

    #[test]
    fn dtype_mapping_is_total_on_supported_set() {
        for dtype in [
            TensorDataType::Float16,
            TensorDataType::BFloat16,
            TensorDataType::Float32,
            TensorDataType::Float64,
            TensorDataType::UInt8,
            TensorDataType::Int64,
        ] {
            let native = candle_core::DType::try_from(dtype).unwrap();
            assert_eq!(TensorDataType::try_from(native).unwrap(), dtype);
        }
        assert!(candle_core::DType::try_from(TensorDataType::Bool).is_err());
        assert!(TensorDataType::try_from(candle_core::DType::U32).is_err());
    }

    #[test]
    fn host_round_trip() {
        let x = host(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let t = from_host(&x, TensorDeviceType::CPU).unwrap();
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(to_host(&t).unwrap(), x);
    }

    #[test]
    fn int32_hosts_are_refused() {
        let x = NDArrayTensor::from_vec(vec![1i32, 2]);
        let err = from_host(&x, TensorDeviceType::CPU).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnsupportedDType);
    }

    #[test]
    fn reduce_matches_numpy_shapes() {
        let t = from_host(&host((0..12).map(|x| x as f32).collect(), &[2, 3, 2]), TensorDeviceType::CPU).unwrap();
        let sum = reduce(&t, Some(&[0, -1]), false, ReduceOp::Sum).unwrap();
        assert_eq!(sum.dims(), &[3]);
        assert_eq!(sum.to_vec1::<f32>().unwrap(), vec![14.0, 22.0, 30.0]);
        let max = reduce(&t, Some(&[0, 2]), true, ReduceOp::Max).unwrap();
        assert_eq!(max.dims(), &[1, 3, 1]);
        let all = reduce(&t, None, false, ReduceOp::Mean).unwrap();
        assert_eq!(all.rank(), 0);
        approx::assert_abs_diff_eq!(all.to_scalar::<f32>().unwrap(), 5.5, epsilon = 1e-5);
    }

    #[test]
    fn squeeze_keeps_non_unit_dims() {
        let t = from_host(&host(vec![0.0; 4], &[1, 2, 1, 2]), TensorDeviceType::CPU).unwrap();
        assert_eq!(squeeze(&t, Some(&[0, 2])).unwrap().dims(), &[2, 2]);
        assert_eq!(squeeze(&t, Some(&[0, 1])).unwrap().dims(), &[2, 1, 2]);
        assert_eq!(squeeze(&t, None).unwrap().dims(), &[2, 2]);
        let err = squeeze(&t, Some(&[42])).unwrap_err();
        assert_eq!(classify(&err), ErrorCategory::Index);
    }

    #[test]
    fn indexing_narrows() {
        let t = from_host(&host((0..12).map(|x| x as f32).collect(), &[3, 4]), TensorDeviceType::CPU).unwrap();
        let row = get_item(&t, &[AxisIndex::At(-1)]).unwrap();
        assert_eq!(row.to_vec1::<f32>().unwrap(), vec![8.0, 9.0, 10.0, 11.0]);
        let block = get_item(&t, &[AxisIndex::Full, AxisIndex::Slice(Some(1), Some(3))]).unwrap();
        assert_eq!(block.dims(), &[3, 2]);
        let err = get_item(&t, &[AxisIndex::At(3)]).unwrap_err();
        assert_eq!(classify(&err), ErrorCategory::Index);
    }

    #[test]
    fn comparisons_yield_u8_masks() {
        let a = from_host(&host(vec![1.0, 5.0], &[2]), TensorDeviceType::CPU).unwrap();
        let b = from_host(&host(vec![3.0], &[1]), TensorDeviceType::CPU).unwrap();
        let mask = compare(&a, &b, CompareOp::Less).unwrap();
        assert_eq!(mask.dtype(), candle_core::DType::U8);
        assert_eq!(mask.to_vec1::<u8>().unwrap(), vec![1, 0]);
    }
}
