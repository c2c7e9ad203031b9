use std::fmt::{Display, Formatter};
use half::{bf16, f16};
use ndarray::{ArcArray, IxDyn};
use serde::{Deserialize, Serialize};
use super::conversions::NDArrayNumericElement;
use super::ops::{self, AxisIndex, CompareOp, NDArrayOperationError, ReduceOp};
use crate::dtype::TensorDataType;
use crate::tensor::ErrorCategory;

#[derive(Debug, thiserror::Error)]
pub enum NDArrayTensorError {
    #[error("Requested dtype {0}, but had dtype {1}")]
    WrongDTypeError(TensorDataType, TensorDataType),
    #[error("Operands have mismatched dtypes {0} and {1}")]
    DTypeMismatch(TensorDataType, TensorDataType),
    #[error("Unsupported operation {0} for dtype {1}")]
    UnsupportedOperationForDType(String, TensorDataType),
    #[error("cannot reshape array of shape {0:?} into shape {1:?}")]
    InvalidReshape(Vec<usize>, Vec<usize>),
    #[error("can only convert an array of size 1 to a scalar, had {0} elements")]
    NotScalar(usize),
    #[error(transparent)]
    NDArrayOperationError(#[from] NDArrayOperationError),
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
}

/// Host tensor of the numpy-like backend. Cloning shares the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NDArrayTensor {
    F64(ArcArray<f64, IxDyn>),
    F32(ArcArray<f32, IxDyn>),
    BF16(ArcArray<bf16, IxDyn>),
    F16(ArcArray<f16, IxDyn>),
    I64(ArcArray<i64, IxDyn>),
    I32(ArcArray<i32, IxDyn>),
    I8(ArcArray<i8, IxDyn>),
    U8(ArcArray<u8, IxDyn>),
    BOOL(ArcArray<bool, IxDyn>),
}

macro_rules! for_each_variant {
    ($value:expr, $x:ident => $body:expr) => {
        match $value {
            NDArrayTensor::F64($x) => $body,
            NDArrayTensor::F32($x) => $body,
            NDArrayTensor::BF16($x) => $body,
            NDArrayTensor::F16($x) => $body,
            NDArrayTensor::I64($x) => $body,
            NDArrayTensor::I32($x) => $body,
            NDArrayTensor::I8($x) => $body,
            NDArrayTensor::U8($x) => $body,
            NDArrayTensor::BOOL($x) => $body,
        }
    };
}

/// Rebuilds the same variant from `$body`; valid for every dtype.
macro_rules! map_all {
    ($value:expr, $x:ident => $body:expr) => {
        match $value {
            NDArrayTensor::F64($x) => NDArrayTensor::F64($body),
            NDArrayTensor::F32($x) => NDArrayTensor::F32($body),
            NDArrayTensor::BF16($x) => NDArrayTensor::BF16($body),
            NDArrayTensor::F16($x) => NDArrayTensor::F16($body),
            NDArrayTensor::I64($x) => NDArrayTensor::I64($body),
            NDArrayTensor::I32($x) => NDArrayTensor::I32($body),
            NDArrayTensor::I8($x) => NDArrayTensor::I8($body),
            NDArrayTensor::U8($x) => NDArrayTensor::U8($body),
            NDArrayTensor::BOOL($x) => NDArrayTensor::BOOL($body),
        }
    };
}

/// Like `map_all`, but refuses `BOOL` with `UnsupportedOperationForDType`.
macro_rules! map_numeric {
    ($value:expr, $name:expr, $x:ident => $body:expr) => {
        match $value {
            NDArrayTensor::F64($x) => NDArrayTensor::F64($body),
            NDArrayTensor::F32($x) => NDArrayTensor::F32($body),
            NDArrayTensor::BF16($x) => NDArrayTensor::BF16($body),
            NDArrayTensor::F16($x) => NDArrayTensor::F16($body),
            NDArrayTensor::I64($x) => NDArrayTensor::I64($body),
            NDArrayTensor::I32($x) => NDArrayTensor::I32($body),
            NDArrayTensor::I8($x) => NDArrayTensor::I8($body),
            NDArrayTensor::U8($x) => NDArrayTensor::U8($body),
            NDArrayTensor::BOOL(_) => {
                return Err(NDArrayTensorError::UnsupportedOperationForDType(
                    $name.to_string(),
                    TensorDataType::Bool,
                ))
            }
        }
    };
}

macro_rules! zip_numeric {
    ($a:expr, $b:expr, $name:expr, ($x:ident, $y:ident) => $body:expr) => {
        match ($a, $b) {
            (NDArrayTensor::F64($x), NDArrayTensor::F64($y)) => NDArrayTensor::F64($body),
            (NDArrayTensor::F32($x), NDArrayTensor::F32($y)) => NDArrayTensor::F32($body),
            (NDArrayTensor::BF16($x), NDArrayTensor::BF16($y)) => NDArrayTensor::BF16($body),
            (NDArrayTensor::F16($x), NDArrayTensor::F16($y)) => NDArrayTensor::F16($body),
            (NDArrayTensor::I64($x), NDArrayTensor::I64($y)) => NDArrayTensor::I64($body),
            (NDArrayTensor::I32($x), NDArrayTensor::I32($y)) => NDArrayTensor::I32($body),
            (NDArrayTensor::I8($x), NDArrayTensor::I8($y)) => NDArrayTensor::I8($body),
            (NDArrayTensor::U8($x), NDArrayTensor::U8($y)) => NDArrayTensor::U8($body),
            (NDArrayTensor::BOOL(_), NDArrayTensor::BOOL(_)) => {
                return Err(NDArrayTensorError::UnsupportedOperationForDType(
                    $name.to_string(),
                    TensorDataType::Bool,
                ))
            }
            (a, b) => return Err(NDArrayTensorError::DTypeMismatch(a.dtype(), b.dtype())),
        }
    };
}

macro_rules! zip_to_bool {
    ($a:expr, $b:expr, ($x:ident, $y:ident) => $body:expr) => {
        match ($a, $b) {
            (NDArrayTensor::F64($x), NDArrayTensor::F64($y)) => $body,
            (NDArrayTensor::F32($x), NDArrayTensor::F32($y)) => $body,
            (NDArrayTensor::BF16($x), NDArrayTensor::BF16($y)) => $body,
            (NDArrayTensor::F16($x), NDArrayTensor::F16($y)) => $body,
            (NDArrayTensor::I64($x), NDArrayTensor::I64($y)) => $body,
            (NDArrayTensor::I32($x), NDArrayTensor::I32($y)) => $body,
            (NDArrayTensor::I8($x), NDArrayTensor::I8($y)) => $body,
            (NDArrayTensor::U8($x), NDArrayTensor::U8($y)) => $body,
            (NDArrayTensor::BOOL($x), NDArrayTensor::BOOL($y)) => $body,
            (a, b) => return Err(NDArrayTensorError::DTypeMismatch(a.dtype(), b.dtype())),
        }
    };
}

fn scalar_op<T: NDArrayNumericElement>(x: &ArcArray<T, IxDyn>, value: f64, f: impl Fn(T, T) -> T) -> ArcArray<T, IxDyn> {
    let value = T::from_f64(value);
    x.mapv(|v| f(v, value)).into_shared()
}

fn from_f64_array<T: NDArrayNumericElement>(values: &ArcArray<f64, IxDyn>) -> ArcArray<T, IxDyn> {
    values.mapv(T::from_f64).into_shared()
}

impl Display for NDArrayTensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for_each_variant!(self, x => x.fmt(f))
    }
}

impl NDArrayTensor {
    pub fn dtype(&self) -> TensorDataType {
        match self {
            NDArrayTensor::F64(_) => TensorDataType::Float64,
            NDArrayTensor::F32(_) => TensorDataType::Float32,
            NDArrayTensor::BF16(_) => TensorDataType::BFloat16,
            NDArrayTensor::F16(_) => TensorDataType::Float16,
            NDArrayTensor::I64(_) => TensorDataType::Int64,
            NDArrayTensor::I32(_) => TensorDataType::Int32,
            NDArrayTensor::I8(_) => TensorDataType::Int8,
            NDArrayTensor::U8(_) => TensorDataType::UInt8,
            NDArrayTensor::BOOL(_) => TensorDataType::Bool,
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        for_each_variant!(self, x => x.shape().to_vec())
    }

    pub fn rank(&self) -> usize {
        for_each_variant!(self, x => x.ndim())
    }

    pub fn num_elements(&self) -> usize {
        for_each_variant!(self, x => x.len())
    }

    pub fn add(&self, other: &Self) -> Result<Self, NDArrayTensorError> {
        Ok(zip_numeric!(self, other, "add", (a, b) => ops::binary(a, b, |x, y| x.add_elem(*y))?))
    }

    pub fn sub(&self, other: &Self) -> Result<Self, NDArrayTensorError> {
        Ok(zip_numeric!(self, other, "subtract", (a, b) => ops::binary(a, b, |x, y| x.sub_elem(*y))?))
    }

    pub fn mul(&self, other: &Self) -> Result<Self, NDArrayTensorError> {
        Ok(zip_numeric!(self, other, "multiply", (a, b) => ops::binary(a, b, |x, y| x.mul_elem(*y))?))
    }

    pub fn div(&self, other: &Self) -> Result<Self, NDArrayTensorError> {
        Ok(zip_numeric!(self, other, "divide", (a, b) => ops::try_binary(a, b, |x, y| x.div_elem(*y))?))
    }

    pub fn add_scalar(&self, value: f64) -> Result<Self, NDArrayTensorError> {
        Ok(map_numeric!(self, "add", x => scalar_op(x, value, |a, b| a.add_elem(b))))
    }

    pub fn mul_scalar(&self, value: f64) -> Result<Self, NDArrayTensorError> {
        Ok(map_numeric!(self, "multiply", x => scalar_op(x, value, |a, b| a.mul_elem(b))))
    }

    /// Elementwise comparison with broadcasting; the result is always `BOOL`.
    pub fn compare(&self, other: &Self, op: CompareOp) -> Result<Self, NDArrayTensorError> {
        let mask = zip_to_bool!(self, other, (a, b) => ops::binary(a, b, |x, y| op.apply(x, y))?);
        Ok(NDArrayTensor::BOOL(mask))
    }

    pub fn neg(&self) -> Result<Self, NDArrayTensorError> {
        Ok(map_numeric!(self, "negative", x => x.mapv(|v| v.neg_elem()).into_shared()))
    }

    pub fn abs(&self) -> Result<Self, NDArrayTensorError> {
        Ok(map_numeric!(self, "abs", x => x.mapv(|v| v.abs_elem()).into_shared()))
    }

    /// Integer and bool inputs are promoted to `Float64` before a mean, as numpy does.
    pub fn reduce(&self, axes: Option<&[isize]>, keepdims: bool, op: ReduceOp) -> Result<Self, NDArrayTensorError> {
        if op == ReduceOp::Mean && !self.dtype().is_float() {
            return self.cast(TensorDataType::Float64)?.reduce(axes, keepdims, op);
        }
        let resolved = ops::resolve_axes(axes, self.rank())?;
        Ok(map_numeric!(self, op, x => ops::raw_reduce(x, &resolved, keepdims, op)?))
    }

    pub fn squeeze(&self, axes: Option<&[isize]>) -> Result<Self, NDArrayTensorError> {
        Ok(map_all!(self, x => ops::squeeze(x, axes)?))
    }

    pub fn unsqueeze(&self, axis: isize) -> Result<Self, NDArrayTensorError> {
        Ok(map_all!(self, x => ops::unsqueeze(x, axis)?))
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self, NDArrayTensorError> {
        if shape.iter().product::<usize>() != self.num_elements() {
            return Err(NDArrayTensorError::InvalidReshape(self.shape(), shape.to_vec()));
        }
        Ok(map_all!(self, x => ops::reshape(x, shape.to_vec())?))
    }

    pub fn flatten(&self) -> Result<Self, NDArrayTensorError> {
        self.reshape(&[self.num_elements()])
    }

    pub fn get_item(&self, index: &[AxisIndex]) -> Result<Self, NDArrayTensorError> {
        Ok(map_all!(self, x => ops::get_item(x, index)?))
    }

    pub fn to_f64_array(&self) -> ArcArray<f64, IxDyn> {
        match self {
            NDArrayTensor::F64(x) => x.clone(),
            NDArrayTensor::F32(x) => x.mapv(|v| v.to_f64()).into_shared(),
            NDArrayTensor::BF16(x) => x.mapv(|v| v.to_f64()).into_shared(),
            NDArrayTensor::F16(x) => x.mapv(|v| v.to_f64()).into_shared(),
            NDArrayTensor::I64(x) => x.mapv(|v| v.to_f64()).into_shared(),
            NDArrayTensor::I32(x) => x.mapv(|v| v.to_f64()).into_shared(),
            NDArrayTensor::I8(x) => x.mapv(|v| v.to_f64()).into_shared(),
            NDArrayTensor::U8(x) => x.mapv(|v| v.to_f64()).into_shared(),
            NDArrayTensor::BOOL(x) => x.mapv(|v| if v { 1.0 } else { 0.0 }).into_shared(),
        }
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.to_f64_array().iter().copied().collect()
    }

    pub fn item(&self) -> Result<f64, NDArrayTensorError> {
        let n = self.num_elements();
        if n != 1 {
            return Err(NDArrayTensorError::NotScalar(n));
        }
        self.to_f64_array().iter().next().copied().ok_or(NDArrayTensorError::NotScalar(n))
    }

    /// Casts through `f64`. Float to integer truncates toward zero and saturates; any
    /// nonzero value becomes `true`.
    pub fn cast(&self, dtype: TensorDataType) -> Result<Self, NDArrayTensorError> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        let values = self.to_f64_array();
        Ok(match dtype {
            TensorDataType::Float64 => NDArrayTensor::F64(values),
            TensorDataType::Float32 => NDArrayTensor::F32(from_f64_array(&values)),
            TensorDataType::BFloat16 => NDArrayTensor::BF16(from_f64_array(&values)),
            TensorDataType::Float16 => NDArrayTensor::F16(from_f64_array(&values)),
            TensorDataType::Int64 => NDArrayTensor::I64(from_f64_array(&values)),
            TensorDataType::Int32 => NDArrayTensor::I32(from_f64_array(&values)),
            TensorDataType::Int8 => NDArrayTensor::I8(from_f64_array(&values)),
            TensorDataType::UInt8 => NDArrayTensor::U8(from_f64_array(&values)),
            TensorDataType::Bool => NDArrayTensor::BOOL(values.mapv(|v| v != 0.0).into_shared()),
        })
    }
}

/// Maps an adapter error onto the category a numpy user would expect from it.
pub fn classify(err: &NDArrayTensorError) -> ErrorCategory {
    match err {
        NDArrayTensorError::NDArrayOperationError(inner) => match inner {
            NDArrayOperationError::AxisOutOfBounds { .. }
            | NDArrayOperationError::IndexOutOfBounds { .. }
            | NDArrayOperationError::TooManyIndices { .. } => ErrorCategory::Index,
            NDArrayOperationError::SqueezeNonUnitAxis { .. }
            | NDArrayOperationError::DuplicateAxis(_)
            | NDArrayOperationError::Broadcast(..)
            | NDArrayOperationError::EmptyReduction(_)
            | NDArrayOperationError::DivisionByZero
            | NDArrayOperationError::Shape(_) => ErrorCategory::Value,
        },
        NDArrayTensorError::UnsupportedOperationForDType(..) => ErrorCategory::UnsupportedDType,
        NDArrayTensorError::WrongDTypeError(..)
        | NDArrayTensorError::DTypeMismatch(..)
        | NDArrayTensorError::InvalidReshape(..)
        | NDArrayTensorError::NotScalar(_)
        | NDArrayTensorError::ShapeError(_) => ErrorCategory::Value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_tensor(values: Vec<f32>, shape: &[usize]) -> NDArrayTensor {
        NDArrayTensor::from_vec_shape(values, shape).unwrap()
    }

    #[test]
    fn adds_with_broadcasting() {
        let a = f32_tensor(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let b = f32_tensor(vec![10.0, 20.0], &[2]);
        let out = a.add(&b).unwrap();
        assert_eq!(out.shape(), vec![2, 2]);
        assert_eq!(out.to_f64_vec(), vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn mismatched_dtypes_are_a_value_error() {
        let a = f32_tensor(vec![1.0], &[1]);
        let b = NDArrayTensor::from_vec(vec![1i64]);
        let err = a.add(&b).unwrap_err();
        assert!(matches!(err, NDArrayTensorError::DTypeMismatch(TensorDataType::Float32, TensorDataType::Int64)));
        assert_eq!(classify(&err), ErrorCategory::Value);
    }

    #[test]
    fn bools_refuse_arithmetic() {
        let mask = NDArrayTensor::from_vec(vec![true, false]);
        let err = mask.neg().unwrap_err();
        assert_eq!(classify(&err), ErrorCategory::UnsupportedDType);
        assert_eq!(mask.reduce(None, false, ReduceOp::Mean).unwrap().item().unwrap(), 0.5);
    }

    #[test]
    fn integer_mean_promotes_to_float64() {
        let x = NDArrayTensor::from_vec_shape(vec![1i32, 2, 3, 4], &[2, 2]).unwrap();
        let mean = x.reduce(Some(&[0]), false, ReduceOp::Mean).unwrap();
        assert_eq!(mean.dtype(), TensorDataType::Float64);
        assert_eq!(mean.to_f64_vec(), vec![2.0, 3.0]);
        let sum = x.reduce(None, true, ReduceOp::Sum).unwrap();
        assert_eq!(sum.dtype(), TensorDataType::Int32);
        assert_eq!(sum.shape(), vec![1, 1]);
        assert_eq!(sum.to_f64_vec(), vec![10.0]);
    }

    #[test]
    fn comparisons_produce_bool_masks() {
        let a = f32_tensor(vec![1.0, 5.0, 3.0], &[3]);
        let b = f32_tensor(vec![3.0], &[1]);
        let lt = a.compare(&b, CompareOp::Less).unwrap();
        assert_eq!(lt.dtype(), TensorDataType::Bool);
        assert_eq!(lt.to_f64_vec(), vec![1.0, 0.0, 0.0]);
        let eq = a.compare(&b, CompareOp::Equal).unwrap();
        assert_eq!(eq.to_f64_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn cast_round_trips_through_half() {
        let x = f32_tensor(vec![0.5, -1.25, 3.0], &[3]);
        let half = x.cast(TensorDataType::Float16).unwrap();
        assert_eq!(half.dtype(), TensorDataType::Float16);
        assert_eq!(half.cast(TensorDataType::Float32).unwrap(), x);
        let ints = x.cast(TensorDataType::Int64).unwrap();
        assert_eq!(ints.to_f64_vec(), vec![0.0, -1.0, 3.0]);
        let mask = x.cast(TensorDataType::Bool).unwrap();
        assert_eq!(mask.to_f64_vec(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn reshape_checks_element_count() {
        let x = f32_tensor(vec![0.0; 6], &[2, 3]);
        assert_eq!(x.reshape(&[3, 2]).unwrap().shape(), vec![3, 2]);
        assert_eq!(x.flatten().unwrap().shape(), vec![6]);
        assert!(matches!(x.reshape(&[4]), Err(NDArrayTensorError::InvalidReshape(_, _))));
    }

    #[test]
    fn item_needs_one_element() {
        assert_eq!(NDArrayTensor::from_scalar(2.5f64).item().unwrap(), 2.5);
        let err = f32_tensor(vec![1.0, 2.0], &[2]).item().unwrap_err();
        assert!(matches!(err, NDArrayTensorError::NotScalar(2)));
    }

    #[test]
    fn out_of_range_axes_classify_as_index() {
        let x = f32_tensor(vec![0.0; 4], &[1, 2, 1, 2]);
        let err = x.squeeze(Some(&[42])).unwrap_err();
        assert_eq!(classify(&err), ErrorCategory::Index);
        assert!(err.to_string().contains("out of bounds"));
        let err = x.squeeze(Some(&[0, 1])).unwrap_err();
        assert_eq!(classify(&err), ErrorCategory::Value);
        assert!(err.to_string().contains("not equal to one"));
    }

    #[test]
    fn host_tensors_serialize() {
        let x = f32_tensor(vec![1.0, 2.0], &[2]);
        let json = serde_json::to_string(&x).unwrap();
        let back: NDArrayTensor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, x);
    }
}
