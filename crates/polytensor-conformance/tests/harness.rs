use polytensor::{NDArrayTensor, TensorBackend, TensorDataType, TensorDeviceType, TensorError};
use polytensor_conformance::fixtures::NDArrayCpu;
use polytensor_conformance::{CaseId, CaseOutcome, CaseOverride, TensorFixture, run_case, run_suite};

/// Host arrays that claim to live on a GPU this machine does not have.
struct MissingGpu;

impl TensorFixture for MissingGpu {
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
        TensorDeviceType::GPU
    }

    fn available() -> bool {
        false
    }

    fn overrides() -> Vec<CaseOverride> {
        vec![CaseOverride::Replace {
            case: CaseId::Size,
            run: always_fails,
        }]
    }
}

fn always_fails() -> anyhow::Result<()> {
    anyhow::bail!("replacement body ran")
}

/// NDArray with a mix of overrides, for precedence checks.
struct Overridden;

impl TensorFixture for Overridden {
    type Native = NDArrayTensor;

    fn to_tensor(raw: NDArrayTensor) -> Result<NDArrayTensor, TensorError> {
        NDArrayCpu::to_tensor(raw)
    }

    fn to_cpu(x: NDArrayTensor) -> Result<NDArrayTensor, TensorError> {
        NDArrayCpu::to_cpu(x)
    }

    fn cast_to(x: NDArrayTensor, dtype: TensorDataType) -> Result<NDArrayTensor, TensorError> {
        NDArrayCpu::cast_to(x, dtype)
    }

    fn backend() -> TensorBackend {
        TensorBackend::NDArray
    }

    fn device() -> TensorDeviceType {
        TensorDeviceType::CPU
    }

    fn overrides() -> Vec<CaseOverride> {
        vec![
            CaseOverride::Skip { case: CaseId::Squeeze, reason: "squeeze is covered elsewhere" },
            CaseOverride::Replace { case: CaseId::Squeeze, run: always_fails },
            CaseOverride::Replace { case: CaseId::Flatten, run: always_fails },
            CaseOverride::Skip { case: CaseId::Unsqueeze, reason: "  " },
        ]
    }
}

/// Ort-like capabilities on top of host arrays.
struct ConstantsOnly;

impl TensorFixture for ConstantsOnly {
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
        TensorBackend::Ort
    }

    fn device() -> TensorDeviceType {
        TensorDeviceType::CPU
    }
}

/// Host arrays whose float64 casts pass through bfloat16 on the way.
struct LossyFloat64;

impl TensorFixture for LossyFloat64 {
    type Native = NDArrayTensor;

    fn to_tensor(raw: NDArrayTensor) -> Result<NDArrayTensor, TensorError> {
        Ok(raw)
    }

    fn to_cpu(x: NDArrayTensor) -> Result<NDArrayTensor, TensorError> {
        Ok(x)
    }

    fn cast_to(x: NDArrayTensor, dtype: TensorDataType) -> Result<NDArrayTensor, TensorError> {
        if dtype == TensorDataType::Float64 {
            return Ok(x.cast(TensorDataType::BFloat16)?.cast(dtype)?);
        }
        Ok(x.cast(dtype)?)
    }

    fn backend() -> TensorBackend {
        TensorBackend::NDArray
    }

    fn device() -> TensorDeviceType {
        TensorDeviceType::CPU
    }
}

#[test]
fn round_trip_tolerance_follows_the_dtype() {
    match run_case::<LossyFloat64>(CaseId::Astype) {
        CaseOutcome::Failed(message) => assert!(message.contains("float64"), "{message}"),
        other => panic!("expected a float64 precision failure, got {other:?}"),
    }
    assert_eq!(run_case::<NDArrayCpu>(CaseId::Astype), CaseOutcome::Passed);
}

#[test]
fn unavailable_device_skips_the_whole_suite() {
    polytensor_conformance::init_logging();
    let report = run_suite::<MissingGpu>();
    assert!(report.is_entirely_skipped());
    assert!(report.passed().is_empty());
    assert_eq!(
        report.outcome(CaseId::Size),
        Some(&CaseOutcome::Skipped("no GPU devices for ndarray".to_string()))
    );
}

#[test]
fn named_skip_wins_over_replacement() {
    assert_eq!(
        run_case::<Overridden>(CaseId::Squeeze),
        CaseOutcome::Skipped("squeeze is covered elsewhere".to_string())
    );
}

#[test]
fn replacement_runs_instead_of_the_shared_body() {
    assert_eq!(run_case::<NDArrayCpu>(CaseId::Flatten), CaseOutcome::Passed);
    assert_eq!(
        run_case::<Overridden>(CaseId::Flatten),
        CaseOutcome::Failed("replacement body ran".to_string())
    );
}

#[test]
fn skip_without_reason_is_a_failure() {
    assert!(matches!(run_case::<Overridden>(CaseId::Unsqueeze), CaseOutcome::Failed(_)));
}

#[test]
fn missing_capability_skips_with_the_operation_name() {
    assert_eq!(
        run_case::<ConstantsOnly>(CaseId::ReduceSum),
        CaseOutcome::Skipped("sum is not implemented for ort".to_string())
    );
}

#[test]
fn refusals_are_checked_against_the_table() {
    // Host arrays support every operation, so an Ort-labelled fixture sees no refusals.
    assert!(matches!(run_case::<ConstantsOnly>(CaseId::CapabilityRefusals), CaseOutcome::Failed(_)));
    assert_eq!(run_case::<NDArrayCpu>(CaseId::CapabilityRefusals), CaseOutcome::Passed);
}

#[test]
fn ndarray_passes_every_case() {
    let report = run_suite::<NDArrayCpu>();
    assert!(report.failed().is_empty(), "{:?}", report.outcomes);
    assert!(report.skipped().is_empty(), "{:?}", report.outcomes);
}
