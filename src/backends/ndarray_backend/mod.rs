pub mod conversions;
pub mod numeric_tensor;
pub mod ops;

pub use conversions::{NDArrayNumericElement, NDArrayTensorType};
pub use numeric_tensor::{NDArrayTensor, NDArrayTensorError, classify};
pub use ops::{AxisIndex, CompareOp, NDArrayOperationError, ReduceOp};
