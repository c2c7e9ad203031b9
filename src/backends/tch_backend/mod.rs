pub mod numeric_tensor;

pub use numeric_tensor::{TchTensor, TchTensorError, classify};
