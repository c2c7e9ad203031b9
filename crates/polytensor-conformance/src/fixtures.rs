//! One fixture per backend and device combination this build can exercise.

use polytensor::{
    NDArrayTensor, Tensor, TensorBackend, TensorDataType, TensorDeviceType, TensorError, available_devices,
    with_device,
};
use crate::TensorFixture;
#[allow(unused_imports)]
use crate::{CaseId, CaseOverride};

/// Builds a native tensor of `backend` on `device` through the façade's device scope.
#[allow(dead_code)]
fn create_on(raw: NDArrayTensor, backend: TensorBackend, device: TensorDeviceType) -> Result<Tensor, TensorError> {
    with_device(device, || Tensor::from_host(raw, backend))
}

#[allow(dead_code)]
fn gpu_available(backend: TensorBackend) -> bool {
    available_devices(backend).contains(&TensorDeviceType::GPU)
}

pub struct NDArrayCpu;

impl TensorFixture for NDArrayCpu {
    type Native = NDArrayTensor;

    fn to_tensor(raw: NDArrayTensor) -> Result<NDArrayTensor, TensorError> {
        Ok(raw)
    }

    fn to_cpu(x: NDArrayTensor) -> Result<NDArrayTensor, TensorError> {
        Ok(x)
    }

    fn cast_to(x: NDArrayTensor, dtype: TensorDataType) -> Result<NDArrayTensor, TensorError> {
        Ok(x.cast(dtype)?)
    }

    fn backend() -> TensorBackend {
        TensorBackend::NDArray
    }

    fn device() -> TensorDeviceType {
        TensorDeviceType::CPU
    }
}

#[cfg(feature = "candle")]
mod candle_fixtures {
    use super::*;

    fn to_candle(raw: NDArrayTensor, device: TensorDeviceType) -> Result<candle_core::Tensor, TensorError> {
        match create_on(raw, TensorBackend::Candle, device)? {
            Tensor::Candle(x) => Ok(x),
            other => Err(TensorError::BackendMismatch(TensorBackend::Candle, other.backend())),
        }
    }

    fn cast_candle(x: candle_core::Tensor, dtype: TensorDataType) -> Result<candle_core::Tensor, TensorError> {
        Ok(x.to_dtype(dtype.try_into()?)?)
    }

    fn candle_overrides<F: TensorFixture>() -> Vec<CaseOverride> {
        vec![
            CaseOverride::Skip {
                case: CaseId::SqueezeAxisErrorNonUnit,
                reason: "Candle keeps non-unit dimensions on squeeze",
            },
            CaseOverride::Replace {
                case: CaseId::CompareOps,
                run: crate::cases::compare_ops_u8_mask::<F>,
            },
        ]
    }

    pub struct CandleCpu;

    impl TensorFixture for CandleCpu {
        type Native = candle_core::Tensor;

        fn to_tensor(raw: NDArrayTensor) -> Result<candle_core::Tensor, TensorError> {
            to_candle(raw, TensorDeviceType::CPU)
        }

        fn to_cpu(x: candle_core::Tensor) -> Result<candle_core::Tensor, TensorError> {
            Ok(x.to_device(&candle_core::Device::Cpu)?)
        }

        fn cast_to(x: candle_core::Tensor, dtype: TensorDataType) -> Result<candle_core::Tensor, TensorError> {
            cast_candle(x, dtype)
        }

        fn backend() -> TensorBackend {
            TensorBackend::Candle
        }

        fn device() -> TensorDeviceType {
            TensorDeviceType::CPU
        }

        fn overrides() -> Vec<CaseOverride> {
            candle_overrides::<Self>()
        }
    }

    pub struct CandleGpu;

    impl TensorFixture for CandleGpu {
        type Native = candle_core::Tensor;

        fn to_tensor(raw: NDArrayTensor) -> Result<candle_core::Tensor, TensorError> {
            to_candle(raw, TensorDeviceType::GPU)
        }

        fn to_cpu(x: candle_core::Tensor) -> Result<candle_core::Tensor, TensorError> {
            Ok(x.to_device(&candle_core::Device::Cpu)?)
        }

        fn cast_to(x: candle_core::Tensor, dtype: TensorDataType) -> Result<candle_core::Tensor, TensorError> {
            cast_candle(x, dtype)
        }

        fn backend() -> TensorBackend {
            TensorBackend::Candle
        }

        fn device() -> TensorDeviceType {
            TensorDeviceType::GPU
        }

        fn available() -> bool {
            gpu_available(TensorBackend::Candle)
        }

        fn overrides() -> Vec<CaseOverride> {
            candle_overrides::<Self>()
        }
    }
}

#[cfg(feature = "candle")]
pub use candle_fixtures::{CandleCpu, CandleGpu};

#[cfg(feature = "tch")]
mod tch_fixtures {
    use super::*;
    use polytensor::backends::tch_backend::TchTensor;

    fn to_tch(raw: NDArrayTensor, device: TensorDeviceType) -> Result<TchTensor, TensorError> {
        match create_on(raw, TensorBackend::Tch, device)? {
            Tensor::Tch(x) => Ok(x),
            other => Err(TensorError::BackendMismatch(TensorBackend::Tch, other.backend())),
        }
    }

    fn tch_overrides() -> Vec<CaseOverride> {
        vec![CaseOverride::Skip {
            case: CaseId::SqueezeAxisErrorNonUnit,
            reason: "Tch keeps non-unit dimensions on squeeze",
        }]
    }

    pub struct TchCpu;

    impl TensorFixture for TchCpu {
        type Native = TchTensor;

        fn to_tensor(raw: NDArrayTensor) -> Result<TchTensor, TensorError> {
            to_tch(raw, TensorDeviceType::CPU)
        }

        fn to_cpu(x: TchTensor) -> Result<TchTensor, TensorError> {
            Ok(x.to_cpu())
        }

        fn cast_to(x: TchTensor, dtype: TensorDataType) -> Result<TchTensor, TensorError> {
            Ok(x.cast(dtype)?)
        }

        fn backend() -> TensorBackend {
            TensorBackend::Tch
        }

        fn device() -> TensorDeviceType {
            TensorDeviceType::CPU
        }

        fn overrides() -> Vec<CaseOverride> {
            tch_overrides()
        }
    }

    pub struct TchGpu;

    impl TensorFixture for TchGpu {
        type Native = TchTensor;

        fn to_tensor(raw: NDArrayTensor) -> Result<TchTensor, TensorError> {
            to_tch(raw, TensorDeviceType::GPU)
        }

        fn to_cpu(x: TchTensor) -> Result<TchTensor, TensorError> {
            Ok(x.to_cpu())
        }

        fn cast_to(x: TchTensor, dtype: TensorDataType) -> Result<TchTensor, TensorError> {
            Ok(x.cast(dtype)?)
        }

        fn backend() -> TensorBackend {
            TensorBackend::Tch
        }

        fn device() -> TensorDeviceType {
            TensorDeviceType::GPU
        }

        fn available() -> bool {
            gpu_available(TensorBackend::Tch)
        }

        fn overrides() -> Vec<CaseOverride> {
            tch_overrides()
        }
    }
}

#[cfg(feature = "tch")]
pub use tch_fixtures::{TchCpu, TchGpu};

#[cfg(feature = "ort")]
mod ort_fixtures {
    use super::*;
    use polytensor::backends::ort_backend::OrtTensor;

    /// Constant values only; compute cases are skipped through the capability table.
    pub struct OrtCpu;

    impl TensorFixture for OrtCpu {
        type Native = OrtTensor;

        fn to_tensor(raw: NDArrayTensor) -> Result<OrtTensor, TensorError> {
            Ok(OrtTensor::from_ndarray(&raw)?)
        }

        fn to_cpu(x: OrtTensor) -> Result<OrtTensor, TensorError> {
            Ok(x)
        }

        fn cast_to(x: OrtTensor, dtype: TensorDataType) -> Result<OrtTensor, TensorError> {
            Ok(x.cast(dtype)?)
        }

        fn backend() -> TensorBackend {
            TensorBackend::Ort
        }

        fn device() -> TensorDeviceType {
            TensorDeviceType::CPU
        }
    }
}

#[cfg(feature = "ort")]
pub use ort_fixtures::OrtCpu;
