use half::{bf16, f16};
use ndarray::{ArcArray, IxDyn};
use crate::backends::ndarray_backend::{NDArrayTensor, NDArrayTensorError};
use crate::dtype::DTypeOfPrimitive;

/// Element types that have a matching [`NDArrayTensor`] variant.
pub trait NDArrayTensorType: Sized + DTypeOfPrimitive + Clone + 'static {
    fn ndarray_tensor_from_ndarray(value: ArcArray<Self, IxDyn>) -> NDArrayTensor;
    fn ndarray_tensor_inner(tensor: &NDArrayTensor) -> Result<&ArcArray<Self, IxDyn>, NDArrayTensorError>;
}

/// Numeric element types. Integer arithmetic wraps and integer division by zero is an
/// error, so no operation on these types can panic.
pub trait NDArrayNumericElement: NDArrayTensorType + Copy + PartialOrd {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
    fn add_elem(self, other: Self) -> Self;
    fn sub_elem(self, other: Self) -> Self;
    fn mul_elem(self, other: Self) -> Self;
    fn div_elem(self, other: Self) -> Option<Self>;
    fn neg_elem(self) -> Self;
    fn abs_elem(self) -> Self;
    fn is_nan_elem(self) -> bool;
}

impl NDArrayTensor {
    pub fn from_vec_shape<T: NDArrayTensorType>(v: Vec<T>, shape: &[usize]) -> Result<Self, NDArrayTensorError> {
        let array = ArcArray::from_shape_vec(IxDyn(shape), v)?;
        Ok(T::ndarray_tensor_from_ndarray(array))
    }

    pub fn from_vec<T: NDArrayTensorType>(v: Vec<T>) -> Self {
        T::ndarray_tensor_from_ndarray(ArcArray::from_vec(v).into_dyn())
    }

    pub fn from_scalar<T: NDArrayTensorType>(v: T) -> Self {
        T::ndarray_tensor_from_ndarray(ArcArray::from_elem(IxDyn(&[]), v))
    }

    pub fn try_to_vec<T: NDArrayTensorType>(&self) -> Result<Vec<T>, NDArrayTensorError> {
        Ok(T::ndarray_tensor_inner(self)?.iter().cloned().collect())
    }
}

impl<T: NDArrayTensorType> From<Vec<T>> for NDArrayTensor {
    fn from(value: Vec<T>) -> Self {
        NDArrayTensor::from_vec(value)
    }
}

impl<T: NDArrayTensorType> From<ArcArray<T, IxDyn>> for NDArrayTensor {
    fn from(value: ArcArray<T, IxDyn>) -> Self {
        T::ndarray_tensor_from_ndarray(value)
    }
}

impl<T: NDArrayTensorType> From<ndarray::ArrayD<T>> for NDArrayTensor {
    fn from(value: ndarray::ArrayD<T>) -> Self {
        T::ndarray_tensor_from_ndarray(value.into_shared())
    }
}

macro_rules! impl_type_ndarray_backend {
    ($a:ident, $b:ident) => {
        impl NDArrayTensorType for $a {
            fn ndarray_tensor_from_ndarray(value: ArcArray<Self, IxDyn>) -> NDArrayTensor {
                NDArrayTensor::$b(value)
            }

            fn ndarray_tensor_inner(tensor: &NDArrayTensor) -> Result<&ArcArray<Self, IxDyn>, NDArrayTensorError> {
                if let NDArrayTensor::$b(x) = tensor {
                    Ok(x)
                }
                else {
                    Err(NDArrayTensorError::WrongDTypeError(Self::DTYPE, tensor.dtype()))
                }
            }
        }
    }
}

impl_type_ndarray_backend!(f64, F64);
impl_type_ndarray_backend!(f32, F32);
impl_type_ndarray_backend!(bf16, BF16);
impl_type_ndarray_backend!(f16, F16);
impl_type_ndarray_backend!(i64, I64);
impl_type_ndarray_backend!(i32, I32);
impl_type_ndarray_backend!(i8, I8);
impl_type_ndarray_backend!(u8, U8);
impl_type_ndarray_backend!(bool, BOOL);

macro_rules! impl_float_element {
    ($a:ident, $to:expr, $from:expr) => {
        impl NDArrayNumericElement for $a {
            fn to_f64(self) -> f64 { $to(self) }
            fn from_f64(value: f64) -> Self { $from(value) }
            fn add_elem(self, other: Self) -> Self { self + other }
            fn sub_elem(self, other: Self) -> Self { self - other }
            fn mul_elem(self, other: Self) -> Self { self * other }
            fn div_elem(self, other: Self) -> Option<Self> { Some(self / other) }
            fn neg_elem(self) -> Self { -self }
            fn abs_elem(self) -> Self { num_traits::Float::abs(self) }
            fn is_nan_elem(self) -> bool { num_traits::Float::is_nan(self) }
        }
    }
}

macro_rules! impl_int_element {
    ($a:ident) => {
        impl NDArrayNumericElement for $a {
            fn to_f64(self) -> f64 { self as f64 }
            fn from_f64(value: f64) -> Self { value as $a }
            fn add_elem(self, other: Self) -> Self { self.wrapping_add(other) }
            fn sub_elem(self, other: Self) -> Self { self.wrapping_sub(other) }
            fn mul_elem(self, other: Self) -> Self { self.wrapping_mul(other) }
            fn div_elem(self, other: Self) -> Option<Self> { self.checked_div(other) }
            fn neg_elem(self) -> Self { self.wrapping_neg() }
            fn abs_elem(self) -> Self { self.wrapping_abs() }
            fn is_nan_elem(self) -> bool { false }
        }
    }
}

impl_float_element!(f64, |x: f64| x, |x: f64| x);
impl_float_element!(f32, |x: f32| x as f64, |x: f64| x as f32);
impl_float_element!(f16, f16::to_f64, f16::from_f64);
impl_float_element!(bf16, bf16::to_f64, bf16::from_f64);
impl_int_element!(i64);
impl_int_element!(i32);
impl_int_element!(i8);

impl NDArrayNumericElement for u8 {
    fn to_f64(self) -> f64 { self as f64 }
    fn from_f64(value: f64) -> Self { value as u8 }
    fn add_elem(self, other: Self) -> Self { self.wrapping_add(other) }
    fn sub_elem(self, other: Self) -> Self { self.wrapping_sub(other) }
    fn mul_elem(self, other: Self) -> Self { self.wrapping_mul(other) }
    fn div_elem(self, other: Self) -> Option<Self> { self.checked_div(other) }
    fn neg_elem(self) -> Self { self.wrapping_neg() }
    fn abs_elem(self) -> Self { self }
    fn is_nan_elem(self) -> bool { false }
}
