//! Backend conformance suite for `polytensor`.
//!
//! The contract is written once in [`cases`] and instantiated per backend and
//! device through a [`TensorFixture`] and [`define_conformance_tests!`].

use std::sync::Once;
use polytensor::capabilities;
use polytensor::{NDArrayTensor, Tensor, TensorBackend, TensorDataType, TensorDeviceType, TensorError};

pub mod cases;
pub mod fixtures;

#[doc(hidden)]
pub use paste;
#[doc(hidden)]
pub use strum;

pub use cases::CaseId;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// What a backend instantiation supplies to the shared template.
pub trait TensorFixture {
    type Native: Into<Tensor> + Clone;

    fn to_tensor(raw: NDArrayTensor) -> Result<Self::Native, TensorError>;
    fn to_cpu(x: Self::Native) -> Result<Self::Native, TensorError>;
    fn cast_to(x: Self::Native, dtype: TensorDataType) -> Result<Self::Native, TensorError>;
    fn backend() -> TensorBackend;
    fn device() -> TensorDeviceType;

    /// False when the host has no device of [`TensorFixture::device`] for this backend.
    fn available() -> bool {
        true
    }

    fn overrides() -> Vec<CaseOverride> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub enum CaseOverride {
    /// Skips `case`; `reason` must be non-empty.
    Skip { case: CaseId, reason: &'static str },
    /// Runs `run` in place of the shared body of `case`.
    Replace { case: CaseId, run: fn() -> anyhow::Result<()> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    Skipped(String),
    Failed(String),
}

/// Resolves one case in order: fixture availability, named skips, capability
/// skips, replacement bodies, then the shared body.
pub fn run_case<F: TensorFixture>(case: CaseId) -> CaseOutcome {
    let backend = F::backend();
    let device = F::device();
    let outcome = if !F::available() {
        CaseOutcome::Skipped(format!("no {device} devices for {backend}"))
    } else {
        let overrides = F::overrides();
        let skip = overrides.iter().find_map(|o| match o {
            CaseOverride::Skip { case: c, reason } if *c == case => Some(*reason),
            _ => None,
        });
        let replacement = overrides.iter().find_map(|o| match o {
            CaseOverride::Replace { case: c, run } if *c == case => Some(*run),
            _ => None,
        });
        let missing = case
            .required_operations()
            .into_iter()
            .find(|op| !capabilities::is_supported(backend, *op));
        match (skip, missing) {
            (Some(reason), _) if reason.trim().is_empty() => {
                CaseOutcome::Failed(format!("skip of {case} gives no reason"))
            }
            (Some(reason), _) => CaseOutcome::Skipped(reason.to_string()),
            (None, Some(op)) => CaseOutcome::Skipped(format!("{op} is not implemented for {backend}")),
            (None, None) => {
                let result = match replacement {
                    Some(run) => run(),
                    None => cases::run_shared::<F>(case),
                };
                match result {
                    Ok(()) => CaseOutcome::Passed,
                    Err(err) => CaseOutcome::Failed(format!("{err:#}")),
                }
            }
        }
    };
    log::debug!("{case} on {backend}/{device}: {outcome:?}");
    outcome
}

#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub outcomes: Vec<(CaseId, CaseOutcome)>,
}

impl SuiteReport {
    pub fn passed(&self) -> Vec<CaseId> {
        self.select(|o| matches!(o, CaseOutcome::Passed))
    }

    pub fn skipped(&self) -> Vec<CaseId> {
        self.select(|o| matches!(o, CaseOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> Vec<CaseId> {
        self.select(|o| matches!(o, CaseOutcome::Failed(_)))
    }

    pub fn is_entirely_skipped(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|(_, o)| matches!(o, CaseOutcome::Skipped(_)))
    }

    pub fn outcome(&self, case: CaseId) -> Option<&CaseOutcome> {
        self.outcomes.iter().find(|(c, _)| *c == case).map(|(_, o)| o)
    }

    fn select(&self, f: impl Fn(&CaseOutcome) -> bool) -> Vec<CaseId> {
        self.outcomes.iter().filter(|(_, o)| f(o)).map(|(c, _)| *c).collect()
    }
}

pub fn run_suite<F: TensorFixture>() -> SuiteReport {
    use strum::IntoEnumIterator;
    SuiteReport {
        outcomes: CaseId::iter().map(|case| (case, run_case::<F>(case))).collect(),
    }
}

fn skip_notice<F: TensorFixture>(case: CaseId, reason: &str) -> String {
    format!("skipped {case} on {}/{}: {reason}", F::backend(), F::device())
}

/// Test-harness entry point: panics on `Failed`. A skip passes, with its reason
/// written to stderr so it shows in the captured test output.
pub fn assert_case<F: TensorFixture>(case: CaseId) {
    init_logging();
    match run_case::<F>(case) {
        CaseOutcome::Passed => {}
        CaseOutcome::Skipped(reason) => {
            let notice = skip_notice::<F>(case, &reason);
            log::info!("{notice}");
            eprintln!("{notice}");
        }
        CaseOutcome::Failed(message) => panic!("{case} failed on {}/{}: {message}", F::backend(), F::device()),
    }
}

/// Generates one `#[test]` per [`CaseId`] for `$fixture` inside `mod $module`, plus a
/// `suite_report` test over the whole template.
#[macro_export]
macro_rules! define_conformance_tests {
    ($module:ident, $fixture:ty) => {
        $crate::define_conformance_tests!(@cases $module, $fixture;
            BinaryOperators,
            ScalarOperators,
            CompareOps,
            UnaryOperators,
            BroadcastMismatch,
            ReduceSum,
            ReduceMaxMin,
            ReduceMean,
            ReduceAxisOutOfRange,
            Squeeze,
            SqueezeAxisErrorNonUnit,
            SqueezeAxisErrorOutOfRange,
            SqueezeAxisErrorOutOfRangeTuple,
            Unsqueeze,
            Reshape,
            Flatten,
            Getitem,
            GetitemOutOfRange,
            GetitemForIndices,
            GetitemForTensorIndices,
            Astype,
            AstypeSameDtype,
            Dtype,
            Device,
            Backend,
            Size,
            ToCpu,
            Item,
            HostRoundTrip,
            CapabilityRefusals
        );
    };
    (@cases $module:ident, $fixture:ty; $($case:ident),* $(,)?) => {
        mod $module {
            #[allow(unused_imports)]
            use super::*;

            $crate::paste::paste! {
                $(
                    #[test]
                    fn [<$case:snake>]() {
                        $crate::assert_case::<$fixture>($crate::CaseId::$case);
                    }
                )*
            }

            #[test]
            fn covers_every_case() {
                let listed = [$($crate::CaseId::$case),*];
                assert_eq!(listed.len(), <$crate::CaseId as $crate::strum::IntoEnumIterator>::iter().count());
            }

            #[test]
            fn suite_report() {
                $crate::init_logging();
                let report = $crate::run_suite::<$fixture>();
                let skipped = report.skipped();
                if !skipped.is_empty() {
                    eprintln!("{} of {} cases skipped: {:?}", skipped.len(), report.outcomes.len(), skipped);
                }
                let failed = report.failed();
                assert!(failed.is_empty(), "failed cases: {:?}", failed);
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::NDArrayCpu;

    #[test]
    fn skip_notice_names_case_and_fixture() {
        assert_eq!(
            skip_notice::<NDArrayCpu>(CaseId::GetitemForIndices, "no fancy indexing"),
            "skipped getitem_for_indices on ndarray/CPU: no fancy indexing"
        );
    }
}
