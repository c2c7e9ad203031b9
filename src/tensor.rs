use std::any::Any;
use half::{bf16, f16};
use ndarray::{ArcArray, ArrayD, IxDyn};
use crate::axes::{Axes, TensorIndex};
use crate::backends::TensorBackend;
use crate::backends::ndarray_backend::{self, AxisIndex, CompareOp, NDArrayTensor, NDArrayTensorError, ReduceOp};
#[cfg(feature = "candle")]
use crate::backends::candle_backend;
#[cfg(feature = "ort")]
use crate::backends::ort_backend::{self, OrtTensor, OrtTensorError};
#[cfg(feature = "tch")]
use crate::backends::tch_backend::{self, TchTensor, TchTensorError};
use crate::capabilities::{self, Operation};
use crate::device::{self, DeviceError, TensorDeviceType};
use crate::dtype::{DTypeError, TensorDataType};

#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    #[error("No backend accepts values of type {0}")]
    UnsupportedBackend(String),
    #[error(transparent)]
    DType(#[from] DTypeError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("Operation {op} is not implemented for backend {backend}")]
    NotImplemented { op: Operation, backend: TensorBackend },
    #[error("Operands come from different backends: {0} and {1}")]
    BackendMismatch(TensorBackend, TensorBackend),
    #[error("arrays used as indices must be of integer or boolean type, got {0}")]
    InvalidIndexDType(TensorDataType),
    #[error("boolean index did not match indexed array along axis {axis}; size of axis is {size} but size of boolean index is {mask}")]
    MaskLengthMismatch { axis: usize, size: usize, mask: usize },
    #[error(transparent)]
    NDArray(#[from] NDArrayTensorError),
    #[cfg(feature = "candle")]
    #[error(transparent)]
    Candle(#[from] candle_core::Error),
    #[cfg(feature = "tch")]
    #[error(transparent)]
    Tch(#[from] TchTensorError),
    #[cfg(feature = "ort")]
    #[error(transparent)]
    Ort(#[from] OrtTensorError),
}

/// Backend-independent classification of a [`TensorError`].
///
/// Native errors are never rewritten; their category is computed by the owning
/// adapter's `classify` function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    UnsupportedBackend,
    UnsupportedDType,
    UnsupportedDevice,
    NotImplemented,
    Value,
    Index,
    Other,
}

impl TensorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TensorError::UnsupportedBackend(_) => ErrorCategory::UnsupportedBackend,
            TensorError::DType(_) => ErrorCategory::UnsupportedDType,
            TensorError::Device(_) => ErrorCategory::UnsupportedDevice,
            TensorError::NotImplemented { .. } => ErrorCategory::NotImplemented,
            TensorError::BackendMismatch(..) => ErrorCategory::Value,
            TensorError::InvalidIndexDType(_) | TensorError::MaskLengthMismatch { .. } => ErrorCategory::Index,
            TensorError::NDArray(err) => ndarray_backend::classify(err),
            #[cfg(feature = "candle")]
            TensorError::Candle(err) => candle_backend::classify(err),
            #[cfg(feature = "tch")]
            TensorError::Tch(err) => tch_backend::classify(err),
            #[cfg(feature = "ort")]
            TensorError::Ort(err) => ort_backend::classify(err),
        }
    }
}

/// One native tensor from one backend; the variant is the backend.
#[derive(Debug, Clone)]
pub enum Tensor {
    NDArray(NDArrayTensor),
    #[cfg(feature = "candle")]
    Candle(candle_core::Tensor),
    #[cfg(feature = "tch")]
    Tch(TchTensor),
    #[cfg(feature = "ort")]
    Ort(OrtTensor),
}

macro_rules! dispatch_binary {
    ($self:ident, $other:ident, $op:expr, |$a:ident, $b:ident| {
        ndarray: $nd:expr,
        candle: $candle:expr,
        tch: $tch:expr $(,)?
    }) => {{
        let op = $op;
        $self.check_binary($other, op)?;
        Ok(match ($self, $other) {
            (Tensor::NDArray($a), Tensor::NDArray($b)) => Tensor::NDArray($nd?),
            #[cfg(feature = "candle")]
            (Tensor::Candle($a), Tensor::Candle($b)) => Tensor::Candle($candle?),
            #[cfg(feature = "tch")]
            (Tensor::Tch($a), Tensor::Tch($b)) => Tensor::Tch($tch?),
            #[allow(unreachable_patterns)]
            _ => return Err(TensorError::NotImplemented { op, backend: $self.backend() }),
        })
    }};
}

macro_rules! dispatch_unary {
    ($self:ident, $op:expr, |$x:ident| {
        ndarray: $nd:expr,
        candle: $candle:expr,
        tch: $tch:expr
        $(, ort: $ort:expr)? $(,)?
    }) => {{
        let op = $op;
        $self.check(op)?;
        Ok(match $self {
            Tensor::NDArray($x) => Tensor::NDArray($nd?),
            #[cfg(feature = "candle")]
            Tensor::Candle($x) => Tensor::Candle($candle?),
            #[cfg(feature = "tch")]
            Tensor::Tch($x) => Tensor::Tch($tch?),
            $(
                #[cfg(feature = "ort")]
                Tensor::Ort($x) => Tensor::Ort($ort?),
            )?
            #[allow(unreachable_patterns)]
            _ => return Err(TensorError::NotImplemented { op, backend: $self.backend() }),
        })
    }};
}

macro_rules! try_downcast {
    ($native:ident, $t:ty, |$x:ident| $wrap:expr) => {
        let $native = match $native.downcast::<$t>() {
            Ok($x) => {
                let $x = *$x;
                return Ok($wrap);
            }
            Err(other) => other,
        };
    };
}

macro_rules! try_downcast_arrays {
    ($native:ident, $($t:ty),*) => {
        $(
            try_downcast!($native, ArrayD<$t>, |x| Tensor::NDArray(x.into()));
            try_downcast!($native, ArcArray<$t, IxDyn>, |x| Tensor::NDArray(x.into()));
        )*
    };
}

fn reduce_operation(op: ReduceOp) -> Operation {
    match op {
        ReduceOp::Sum => Operation::Sum,
        ReduceOp::Max => Operation::Max,
        ReduceOp::Min => Operation::Min,
        ReduceOp::Mean => Operation::Mean,
    }
}

impl Tensor {
    /// Wraps a native value by inspecting its runtime type.
    pub fn wrap<T: Any>(native: T) -> Result<Tensor, TensorError> {
        let type_name = std::any::type_name::<T>();
        let native: Box<dyn Any> = Box::new(native);
        log::trace!("Wrapping value of type {type_name}");
        try_downcast!(native, Tensor, |x| x);
        try_downcast!(native, NDArrayTensor, |x| Tensor::NDArray(x));
        try_downcast_arrays!(native, f64, f32, bf16, f16, i64, i32, i8, u8, bool);
        #[cfg(feature = "candle")]
        try_downcast!(native, candle_core::Tensor, |x| Tensor::Candle(x));
        #[cfg(feature = "tch")]
        try_downcast!(native, TchTensor, |x| Tensor::Tch(x));
        #[cfg(feature = "tch")]
        try_downcast!(native, tch::Tensor, |x| Tensor::Tch(x.into()));
        #[cfg(feature = "ort")]
        try_downcast!(native, OrtTensor, |x| Tensor::Ort(x));
        #[cfg(feature = "ort")]
        try_downcast!(native, ort::value::DynValue, |x| Tensor::Ort(x.into()));
        drop(native);
        Err(TensorError::UnsupportedBackend(type_name.to_string()))
    }

    /// Creates a `backend` tensor from host data on the device of the current
    /// [`device::DeviceScope`]. Host-only backends ignore a GPU scope.
    pub fn from_host(host: NDArrayTensor, backend: TensorBackend) -> Result<Tensor, TensorError> {
        let mut device = device::current_device();
        if !capabilities::supports_device(backend, device) {
            log::warn!("Backend {backend} cannot place tensors on {device}, creating on CPU");
            device = TensorDeviceType::CPU;
        }
        log::trace!("Creating {backend} tensor on {device}");
        match backend {
            TensorBackend::NDArray => Ok(Tensor::NDArray(host)),
            #[cfg(feature = "candle")]
            TensorBackend::Candle => Ok(Tensor::Candle(candle_backend::from_host(&host, device)?)),
            #[cfg(feature = "tch")]
            TensorBackend::Tch => Ok(Tensor::Tch(TchTensor::from_ndarray(&host, device)?)),
            #[cfg(feature = "ort")]
            TensorBackend::Ort => Ok(Tensor::Ort(OrtTensor::from_ndarray(&host)?)),
            #[allow(unreachable_patterns)]
            _ => Err(TensorError::UnsupportedBackend(backend.to_string())),
        }
    }

    pub fn backend(&self) -> TensorBackend {
        match self {
            Tensor::NDArray(_) => TensorBackend::NDArray,
            #[cfg(feature = "candle")]
            Tensor::Candle(_) => TensorBackend::Candle,
            #[cfg(feature = "tch")]
            Tensor::Tch(_) => TensorBackend::Tch,
            #[cfg(feature = "ort")]
            Tensor::Ort(_) => TensorBackend::Ort,
        }
    }

    fn check(&self, op: Operation) -> Result<(), TensorError> {
        let backend = self.backend();
        capabilities::check(backend, op)?;
        log::trace!("Dispatching {op} to {backend}");
        Ok(())
    }

    fn check_binary(&self, other: &Tensor, op: Operation) -> Result<(), TensorError> {
        self.check(op)?;
        if self.backend() != other.backend() {
            return Err(TensorError::BackendMismatch(self.backend(), other.backend()));
        }
        Ok(())
    }

    pub fn dtype(&self) -> Result<TensorDataType, DTypeError> {
        match self {
            Tensor::NDArray(x) => Ok(x.dtype()),
            #[cfg(feature = "candle")]
            Tensor::Candle(x) => x.dtype().try_into(),
            #[cfg(feature = "tch")]
            Tensor::Tch(x) => x.dtype(),
            #[cfg(feature = "ort")]
            Tensor::Ort(x) => x.dtype(),
        }
    }

    pub fn device(&self) -> TensorDeviceType {
        match self {
            Tensor::NDArray(_) => TensorDeviceType::CPU,
            #[cfg(feature = "candle")]
            Tensor::Candle(x) => x.device().into(),
            #[cfg(feature = "tch")]
            Tensor::Tch(x) => x.device(),
            #[cfg(feature = "ort")]
            Tensor::Ort(_) => TensorDeviceType::CPU,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Tensor::NDArray(x) => x.shape(),
            #[cfg(feature = "candle")]
            Tensor::Candle(x) => x.dims().to_vec(),
            #[cfg(feature = "tch")]
            Tensor::Tch(x) => x.shape(),
            #[cfg(feature = "ort")]
            Tensor::Ort(x) => x.shape(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    pub fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements() == 0
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        dispatch_binary!(self, other, Operation::Add, |a, b| {
            ndarray: a.add(b),
            candle: a.broadcast_add(b),
            tch: TchTensor::add(a, b),
        })
    }

    pub fn sub(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        dispatch_binary!(self, other, Operation::Subtract, |a, b| {
            ndarray: a.sub(b),
            candle: a.broadcast_sub(b),
            tch: TchTensor::sub(a, b),
        })
    }

    pub fn mul(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        dispatch_binary!(self, other, Operation::Multiply, |a, b| {
            ndarray: a.mul(b),
            candle: a.broadcast_mul(b),
            tch: TchTensor::mul(a, b),
        })
    }

    pub fn div(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        dispatch_binary!(self, other, Operation::Divide, |a, b| {
            ndarray: a.div(b),
            candle: a.broadcast_div(b),
            tch: TchTensor::div(a, b),
        })
    }

    pub fn add_scalar(&self, value: f64) -> Result<Tensor, TensorError> {
        dispatch_unary!(self, Operation::Add, |x| {
            ndarray: x.add_scalar(value),
            candle: x.affine(1.0, value),
            tch: x.add_scalar(value),
        })
    }

    pub fn mul_scalar(&self, value: f64) -> Result<Tensor, TensorError> {
        dispatch_unary!(self, Operation::Multiply, |x| {
            ndarray: x.mul_scalar(value),
            candle: x.affine(value, 0.0),
            tch: x.mul_scalar(value),
        })
    }

    /// Elementwise comparison. NDArray and Tch produce `Bool` masks, Candle `UInt8`.
    pub fn compare(&self, other: &Tensor, op: CompareOp) -> Result<Tensor, TensorError> {
        dispatch_binary!(self, other, Operation::Compare, |a, b| {
            ndarray: a.compare(b, op),
            candle: candle_backend::compare(a, b, op),
            tch: TchTensor::compare(a, b, op),
        })
    }

    pub fn lt(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        self.compare(other, CompareOp::Less)
    }

    pub fn gt(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        self.compare(other, CompareOp::Greater)
    }

    pub fn eq(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        self.compare(other, CompareOp::Equal)
    }

    pub fn neg(&self) -> Result<Tensor, TensorError> {
        dispatch_unary!(self, Operation::Negative, |x| {
            ndarray: x.neg(),
            candle: x.neg(),
            tch: x.neg(),
        })
    }

    pub fn abs(&self) -> Result<Tensor, TensorError> {
        dispatch_unary!(self, Operation::Abs, |x| {
            ndarray: x.abs(),
            candle: x.abs(),
            tch: x.abs(),
        })
    }

    /// `axes = None` reduces every axis. Axis values keep their meaning on every
    /// backend: negative counts from the end.
    pub fn reduce(&self, axes: Option<Axes>, keepdims: bool, op: ReduceOp) -> Result<Tensor, TensorError> {
        let axes = axes.map(|a| a.to_vec());
        let axes = axes.as_deref();
        dispatch_unary!(self, reduce_operation(op), |x| {
            ndarray: x.reduce(axes, keepdims, op),
            candle: candle_backend::reduce(x, axes, keepdims, op),
            tch: x.reduce(axes, keepdims, op),
        })
    }

    pub fn sum(&self, axes: Option<Axes>, keepdims: bool) -> Result<Tensor, TensorError> {
        self.reduce(axes, keepdims, ReduceOp::Sum)
    }

    pub fn max(&self, axes: Option<Axes>, keepdims: bool) -> Result<Tensor, TensorError> {
        self.reduce(axes, keepdims, ReduceOp::Max)
    }

    pub fn min(&self, axes: Option<Axes>, keepdims: bool) -> Result<Tensor, TensorError> {
        self.reduce(axes, keepdims, ReduceOp::Min)
    }

    pub fn mean(&self, axes: Option<Axes>, keepdims: bool) -> Result<Tensor, TensorError> {
        self.reduce(axes, keepdims, ReduceOp::Mean)
    }

    pub fn squeeze(&self, axes: Option<Axes>) -> Result<Tensor, TensorError> {
        let axes = axes.map(|a| a.to_vec());
        let axes = axes.as_deref();
        dispatch_unary!(self, Operation::Squeeze, |x| {
            ndarray: x.squeeze(axes),
            candle: candle_backend::squeeze(x, axes),
            tch: x.squeeze(axes),
        })
    }

    pub fn unsqueeze(&self, axis: isize) -> Result<Tensor, TensorError> {
        dispatch_unary!(self, Operation::Unsqueeze, |x| {
            ndarray: x.unsqueeze(axis),
            candle: candle_backend::unsqueeze(x, axis),
            tch: x.unsqueeze(axis),
        })
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor, TensorError> {
        dispatch_unary!(self, Operation::Reshape, |x| {
            ndarray: x.reshape(shape),
            candle: x.reshape(shape.to_vec()),
            tch: x.reshape(shape),
            ort: x.reshape(shape),
        })
    }

    pub fn flatten(&self) -> Result<Tensor, TensorError> {
        dispatch_unary!(self, Operation::Flatten, |x| {
            ndarray: x.flatten(),
            candle: x.flatten_all(),
            tch: x.flatten(),
            ort: x.flatten(),
        })
    }

    /// Applies `index` to successive axes. List and tensor entries need
    /// [`Operation::FancyIndex`]; everything else needs [`Operation::Slice`].
    pub fn get_item(&self, index: &[TensorIndex]) -> Result<Tensor, TensorError> {
        if index.iter().any(TensorIndex::is_fancy) {
            self.check(Operation::FancyIndex)?;
        }
        let index = index
            .iter()
            .enumerate()
            .map(|(axis, entry)| -> Result<AxisIndex, TensorError> {
                Ok(match entry {
                    TensorIndex::At(i) => AxisIndex::At(*i),
                    TensorIndex::Slice { start, end } => AxisIndex::Slice(*start, *end),
                    TensorIndex::Full => AxisIndex::Full,
                    TensorIndex::Select(positions) => AxisIndex::Select(positions.clone()),
                    TensorIndex::SelectTensor(positions) => AxisIndex::Select(self.index_positions(axis, positions)?),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let index = index.as_slice();
        dispatch_unary!(self, Operation::Slice, |x| {
            ndarray: x.get_item(index),
            candle: candle_backend::get_item(x, index),
            tch: x.get_item(index),
        })
    }

    /// Integer index tensors are positions; a `Bool` mask selects the positions of its
    /// `true` entries and must match the length of `axis`.
    fn index_positions(&self, axis: usize, positions: &Tensor) -> Result<Vec<i64>, TensorError> {
        let dtype = positions.dtype()?;
        if dtype == TensorDataType::Bool {
            let mask = positions.to_host()?.try_to_vec::<bool>()?;
            let size = self.shape().get(axis).copied().unwrap_or(0);
            if positions.rank() != 1 || mask.len() != size {
                return Err(TensorError::MaskLengthMismatch { axis, size, mask: mask.len() });
            }
            return Ok(mask.iter().enumerate().filter(|(_, keep)| **keep).map(|(i, _)| i as i64).collect());
        }
        if dtype.is_float() {
            return Err(TensorError::InvalidIndexDType(dtype));
        }
        Ok(positions.to_host()?.cast(TensorDataType::Int64)?.try_to_vec::<i64>()?)
    }

    /// Casting to the current dtype returns a shallow clone without calling the backend.
    pub fn astype(&self, dtype: TensorDataType) -> Result<Tensor, TensorError> {
        self.check(Operation::Cast)?;
        if self.dtype()? == dtype {
            return Ok(self.clone());
        }
        let backend = self.backend();
        if !capabilities::supports_dtype(backend, dtype) {
            return Err(DTypeError::DTypeNotSupportedByBackend(dtype, backend).into());
        }
        dispatch_unary!(self, Operation::Cast, |x| {
            ndarray: x.cast(dtype),
            candle: x.to_dtype(dtype.try_into()?),
            tch: x.cast(dtype),
            ort: x.cast(dtype),
        })
    }

    /// Host-resident copy, or a shallow clone when already on the CPU.
    pub fn to_cpu(&self) -> Result<Tensor, TensorError> {
        self.check(Operation::ToCpu)?;
        Ok(match self {
            Tensor::NDArray(x) => Tensor::NDArray(x.clone()),
            #[cfg(feature = "candle")]
            Tensor::Candle(x) => Tensor::Candle(x.to_device(&candle_core::Device::Cpu)?),
            #[cfg(feature = "tch")]
            Tensor::Tch(x) => Tensor::Tch(x.to_cpu()),
            #[cfg(feature = "ort")]
            Tensor::Ort(x) => Tensor::Ort(x.clone()),
        })
    }

    pub fn to_host(&self) -> Result<NDArrayTensor, TensorError> {
        self.check(Operation::ToHost)?;
        Ok(match self {
            Tensor::NDArray(x) => x.clone(),
            #[cfg(feature = "candle")]
            Tensor::Candle(x) => candle_backend::to_host(x)?,
            #[cfg(feature = "tch")]
            Tensor::Tch(x) => x.to_ndarray()?,
            #[cfg(feature = "ort")]
            Tensor::Ort(x) => x.to_ndarray()?,
        })
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>, TensorError> {
        Ok(self.to_host()?.to_f64_vec())
    }

    pub fn item(&self) -> Result<f64, TensorError> {
        Ok(self.to_host()?.item()?)
    }
}

impl From<NDArrayTensor> for Tensor {
    fn from(value: NDArrayTensor) -> Self {
        Tensor::NDArray(value)
    }
}

#[cfg(feature = "candle")]
impl From<candle_core::Tensor> for Tensor {
    fn from(value: candle_core::Tensor) -> Self {
        Tensor::Candle(value)
    }
}

#[cfg(feature = "tch")]
impl From<TchTensor> for Tensor {
    fn from(value: TchTensor) -> Self {
        Tensor::Tch(value)
    }
}

#[cfg(feature = "tch")]
impl From<tch::Tensor> for Tensor {
    fn from(value: tch::Tensor) -> Self {
        Tensor::Tch(value.into())
    }
}

#[cfg(feature = "ort")]
impl From<OrtTensor> for Tensor {
    fn from(value: OrtTensor) -> Self {
        Tensor::Ort(value)
    }
}

#[cfg(feature = "ort")]
impl From<ort::value::DynValue> for Tensor {
    fn from(value: ort::value::DynValue) -> Self {
        Tensor::Ort(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(values: Vec<f32>, shape: &[usize]) -> Tensor {
        NDArrayTensor::from_vec_shape(values, shape).unwrap().into()
    }

    #[test]
    fn wrap_detects_arrays() {
        let array = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1i32, 2]).unwrap();
        let t = Tensor::wrap(array).unwrap();
        assert_eq!(t.backend(), TensorBackend::NDArray);
        assert_eq!(t.dtype().unwrap(), TensorDataType::Int32);
    }

    #[test]
    fn wrap_refuses_strangers() {
        let err = Tensor::wrap(vec![1.0f32, 2.0]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnsupportedBackend);
        assert!(err.to_string().contains("Vec<f32>"));
    }

    #[test]
    fn astype_to_same_dtype_is_shallow() {
        let t = host(vec![1.0, 2.0], &[2]);
        let same = t.astype(TensorDataType::Float32).unwrap();
        match (&t, &same) {
            (Tensor::NDArray(NDArrayTensor::F32(a)), Tensor::NDArray(NDArrayTensor::F32(b))) => {
                assert_eq!(a.as_ptr(), b.as_ptr());
            }
            _ => panic!("expected float32 host tensors"),
        }
    }

    #[test]
    fn ndarray_ignores_gpu_scope() {
        let _scope = device::DeviceScope::enter(TensorDeviceType::GPU);
        let t = Tensor::from_host(NDArrayTensor::from_vec(vec![1.0f32]), TensorBackend::NDArray).unwrap();
        assert_eq!(t.device(), TensorDeviceType::CPU);
    }

    #[test]
    fn scalar_ops_keep_dtype() {
        let t = host(vec![1.0, 2.0], &[2]);
        let out = t.mul_scalar(3.0).unwrap().add_scalar(1.0).unwrap();
        assert_eq!(out.dtype().unwrap(), TensorDataType::Float32);
        assert_eq!(out.to_f64_vec().unwrap(), vec![4.0, 7.0]);
    }

    #[test]
    fn boolean_masks_select_true_positions() {
        let t = host(vec![10.0, 20.0, 30.0], &[3]);
        let mask: Tensor = NDArrayTensor::from_vec(vec![true, false, true]).into();
        let out = t.get_item(&[TensorIndex::SelectTensor(mask)]).unwrap();
        assert_eq!(out.shape(), vec![2]);
        assert_eq!(out.to_f64_vec().unwrap(), vec![10.0, 30.0]);
    }

    #[test]
    fn boolean_mask_length_must_match() {
        let t = host(vec![10.0, 20.0, 30.0], &[3]);
        let mask: Tensor = NDArrayTensor::from_vec(vec![true, false]).into();
        let err = t.get_item(&[TensorIndex::SelectTensor(mask)]).unwrap_err();
        assert!(matches!(err, TensorError::MaskLengthMismatch { axis: 0, size: 3, mask: 2 }));
        assert_eq!(err.category(), ErrorCategory::Index);
    }

    #[test]
    fn float_index_tensors_are_refused() {
        let t = host(vec![10.0, 20.0, 30.0], &[3]);
        let positions: Tensor = NDArrayTensor::from_vec(vec![1.7f32]).into();
        let err = t.get_item(&[TensorIndex::SelectTensor(positions)]).unwrap_err();
        assert!(matches!(err, TensorError::InvalidIndexDType(TensorDataType::Float32)));
        assert_eq!(err.category(), ErrorCategory::Index);
    }

    #[test]
    fn integer_index_tensors_of_any_width() {
        let t = host(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], &[3, 2]);
        let positions: Tensor = NDArrayTensor::from_vec(vec![2i32, -3]).into();
        let out = t.get_item(&[TensorIndex::SelectTensor(positions)]).unwrap();
        assert_eq!(out.shape(), vec![2, 2]);
        assert_eq!(out.to_f64_vec().unwrap(), vec![4.0, 5.0, 0.0, 1.0]);
        let mask: Tensor = NDArrayTensor::from_vec(vec![false, true]).into();
        let columns = t.get_item(&[TensorIndex::Full, TensorIndex::SelectTensor(mask)]).unwrap();
        assert_eq!(columns.shape(), vec![3, 1]);
        assert_eq!(columns.to_f64_vec().unwrap(), vec![1.0, 3.0, 5.0]);
    }

    #[cfg(feature = "candle")]
    #[test]
    fn mixed_backends_are_a_value_error() {
        let a = host(vec![1.0], &[1]);
        let b = Tensor::from_host(NDArrayTensor::from_vec(vec![1.0f32]), TensorBackend::Candle).unwrap();
        let err = a.add(&b).unwrap_err();
        assert!(matches!(err, TensorError::BackendMismatch(TensorBackend::NDArray, TensorBackend::Candle)));
        assert_eq!(err.category(), ErrorCategory::Value);
    }
}
