use polytensor_conformance::define_conformance_tests;
use polytensor_conformance::fixtures::*;

define_conformance_tests!(ndarray_cpu, NDArrayCpu);

#[cfg(feature = "candle")]
define_conformance_tests!(candle_cpu, CandleCpu);
#[cfg(feature = "candle")]
define_conformance_tests!(candle_gpu, CandleGpu);

#[cfg(feature = "tch")]
define_conformance_tests!(tch_cpu, TchCpu);
#[cfg(feature = "tch")]
define_conformance_tests!(tch_gpu, TchGpu);

#[cfg(feature = "ort")]
define_conformance_tests!(ort_cpu, OrtCpu);
