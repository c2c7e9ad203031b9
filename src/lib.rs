pub mod axes;
pub mod backends;
pub mod capabilities;
pub mod device;
pub mod dtype;
pub mod tensor;

pub use axes::{Axes, TensorIndex};
pub use backends::TensorBackend;
pub use backends::ndarray_backend::{CompareOp, NDArrayTensor, ReduceOp};
pub use capabilities::Operation;
pub use device::{DeviceScope, TensorDeviceType, available_devices, current_device, to_canonical_device, with_device};
pub use dtype::{NativeDType, TensorDataType, from_canonical_dtype, to_canonical_dtype};
pub use tensor::{ErrorCategory, Tensor, TensorError};
