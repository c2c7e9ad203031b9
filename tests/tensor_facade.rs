use std::sync::Once;
use polytensor::capabilities::{self, unsupported_operations};
use polytensor::{
    Axes, ErrorCategory, NDArrayTensor, Operation, Tensor, TensorBackend, TensorDataType, TensorDeviceType,
    TensorError, TensorIndex, available_devices, current_device, from_canonical_dtype, with_device,
};
use strum::IntoEnumIterator;

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn host(values: Vec<f32>, shape: &[usize]) -> NDArrayTensor {
    NDArrayTensor::from_vec_shape(values, shape).unwrap()
}

fn apply(op: Operation, t: &Tensor) -> Result<Tensor, TensorError> {
    match op {
        Operation::Add => t.add(t),
        Operation::Subtract => t.sub(t),
        Operation::Multiply => t.mul(t),
        Operation::Divide => t.div(t),
        Operation::Negative => t.neg(),
        Operation::Abs => t.abs(),
        Operation::Compare => t.eq(t),
        Operation::Sum => t.sum(None, false),
        Operation::Max => t.max(None, false),
        Operation::Min => t.min(None, false),
        Operation::Mean => t.mean(None, false),
        Operation::Squeeze => t.squeeze(None),
        Operation::Unsqueeze => t.unsqueeze(0),
        Operation::Reshape => t.reshape(&[2]),
        Operation::Flatten => t.flatten(),
        Operation::Slice => t.get_item(&[TensorIndex::At(0)]),
        Operation::FancyIndex => t.get_item(&[TensorIndex::Select(vec![1])]),
        Operation::Cast => t.astype(TensorDataType::Float64),
        Operation::ToCpu => t.to_cpu(),
        Operation::ToHost => t.to_host().map(Tensor::from),
    }
}

#[test]
fn every_refusal_names_the_pair() {
    init_logging();
    for backend in TensorBackend::iter().filter(TensorBackend::is_compiled) {
        let t = Tensor::from_host(host(vec![1.0, 2.0], &[2]), backend).unwrap();
        for op in unsupported_operations(backend) {
            let err = apply(op, &t).unwrap_err();
            assert_eq!(err.category(), ErrorCategory::NotImplemented, "{op} on {backend}");
            assert_eq!(err.to_string(), format!("Operation {op} is not implemented for backend {backend}"));
        }
        for op in capabilities::supported_operations(backend) {
            if let Err(err) = apply(op, &t) {
                assert_ne!(err.category(), ErrorCategory::NotImplemented, "{op} on {backend}: {err}");
            }
        }
    }
}

#[test]
fn ndarray_supports_everything() {
    assert!(unsupported_operations(TensorBackend::NDArray).is_empty());
    assert_eq!(available_devices(TensorBackend::NDArray), vec![TensorDeviceType::CPU]);
}

#[test]
fn error_categories_follow_numpy() {
    init_logging();
    let t: Tensor = host(vec![0.0; 4], &[1, 2, 1, 2]).into();
    let non_unit = t.squeeze(Some(Axes::Multiple(vec![0, 1]))).unwrap_err();
    assert_eq!(non_unit.category(), ErrorCategory::Value);
    let out_of_range = t.squeeze(Some(Axes::Single(42))).unwrap_err();
    assert_eq!(out_of_range.category(), ErrorCategory::Index);
    let bad_reshape = t.reshape(&[3]).unwrap_err();
    assert_eq!(bad_reshape.category(), ErrorCategory::Value);
    let bools: Tensor = NDArrayTensor::from_vec(vec![true, false]).into();
    assert_eq!(bools.add(&bools).unwrap_err().category(), ErrorCategory::UnsupportedDType);
}

#[test]
fn mean_of_integers_is_float() {
    let t: Tensor = NDArrayTensor::from_vec(vec![1i64, 2, 4]).into();
    let mean = t.mean(None, false).unwrap();
    assert_eq!(mean.dtype().unwrap(), TensorDataType::Float64);
    approx::assert_abs_diff_eq!(mean.item().unwrap(), 7.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn tensor_indices_select_positions() {
    let t: Tensor = NDArrayTensor::from_vec_shape((0..6).map(|v| v as f32).collect(), &[3, 2]).unwrap().into();
    let positions: Tensor = NDArrayTensor::from_vec(vec![2i64, 0]).into();
    let rows = t.get_item(&[TensorIndex::SelectTensor(positions)]).unwrap();
    assert_eq!(rows.shape(), vec![2, 2]);
    assert_eq!(rows.to_f64_vec().unwrap(), vec![4.0, 5.0, 0.0, 1.0]);
}

#[test]
fn host_tensors_serialize() {
    let t = host(vec![1.5, 2.5], &[2]);
    let json = serde_json::to_string(&t).unwrap();
    let back: NDArrayTensor = serde_json::from_str(&json).unwrap();
    assert_eq!(back, t);
    assert_eq!(serde_json::to_string(&TensorBackend::NDArray).unwrap(), "\"ndarray\"");
}

#[cfg(feature = "candle")]
mod candle {
    use super::*;

    #[test]
    fn gpu_scope_is_released_after_creation() {
        init_logging();
        let result = with_device(TensorDeviceType::GPU, || {
            Tensor::from_host(host(vec![1.0], &[1]), TensorBackend::Candle)
        });
        match result {
            Ok(t) => assert_eq!(t.device(), TensorDeviceType::GPU),
            Err(err) => assert_eq!(err.category(), ErrorCategory::UnsupportedDevice),
        }
        assert_eq!(current_device(), TensorDeviceType::CPU);
    }

    #[test]
    fn wrap_detects_candle_tensors() {
        let native = candle_core::Tensor::new(&[1.0f32, 2.0], &candle_core::Device::Cpu).unwrap();
        let t = Tensor::wrap(native).unwrap();
        assert_eq!(t.backend(), TensorBackend::Candle);
        assert_eq!(t.device(), TensorDeviceType::CPU);
    }

    #[test]
    fn canonical_dtypes_map_to_candle() {
        use polytensor::NativeDType;
        assert_eq!(
            from_canonical_dtype(TensorDataType::Float32, TensorBackend::Candle).unwrap(),
            NativeDType::Candle(candle_core::DType::F32)
        );
        assert!(from_canonical_dtype(TensorDataType::Bool, TensorBackend::Candle).is_err());
    }

    #[test]
    fn candle_squeeze_keeps_non_unit_axes() {
        let t = Tensor::from_host(host(vec![0.0; 4], &[1, 2, 1, 2]), TensorBackend::Candle).unwrap();
        let squeezed = t.squeeze(Some(Axes::Multiple(vec![0, 1]))).unwrap();
        assert_eq!(squeezed.shape(), vec![2, 1, 2]);
    }

    #[test]
    fn candle_refuses_fancy_indexing() {
        let t = Tensor::from_host(host(vec![0.0; 4], &[4]), TensorBackend::Candle).unwrap();
        let err = t.get_item(&[TensorIndex::Select(vec![0])]).unwrap_err();
        assert!(matches!(err, TensorError::NotImplemented { op: Operation::FancyIndex, backend: TensorBackend::Candle }));
    }
}

#[cfg(feature = "ort")]
mod ort {
    use super::*;

    #[test]
    fn ort_constants_are_host_resident() {
        let t = with_device(TensorDeviceType::GPU, || {
            Tensor::from_host(host(vec![1.0, 2.0], &[2]), TensorBackend::Ort)
        })
        .unwrap();
        assert_eq!(t.device(), TensorDeviceType::CPU);
        assert_eq!(t.astype(TensorDataType::Int64).unwrap().to_f64_vec().unwrap(), vec![1.0, 2.0]);
    }
}
