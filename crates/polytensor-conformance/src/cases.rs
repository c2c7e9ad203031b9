//! The shared per-backend contract.
//!
//! Each case is written once against the [`Tensor`] façade; a fixture only decides
//! how host data becomes a native tensor.

use anyhow::{anyhow, ensure};
use strum::IntoEnumIterator;
use polytensor::capabilities;
use polytensor::{
    Axes, ErrorCategory, NDArrayTensor, Operation, Tensor, TensorDataType, TensorDeviceType, TensorError,
    TensorIndex, to_canonical_device, to_canonical_dtype,
};
use crate::TensorFixture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::EnumIter, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CaseId {
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
    CapabilityRefusals,
}

impl CaseId {
    /// Operations the shared body calls. A backend lacking any of them skips the case.
    pub fn required_operations(&self) -> Vec<Operation> {
        use Operation::*;
        match self {
            CaseId::BinaryOperators => vec![Add, Subtract, Multiply, Divide, ToHost],
            CaseId::ScalarOperators => vec![Add, Multiply, ToHost],
            CaseId::CompareOps => vec![Compare, ToHost],
            CaseId::UnaryOperators => vec![Negative, Abs, ToHost],
            CaseId::BroadcastMismatch => vec![Add],
            CaseId::ReduceSum => vec![Sum, ToHost],
            CaseId::ReduceMaxMin => vec![Max, Min, ToHost],
            CaseId::ReduceMean => vec![Mean, ToHost],
            CaseId::ReduceAxisOutOfRange => vec![Sum],
            CaseId::Squeeze
            | CaseId::SqueezeAxisErrorNonUnit
            | CaseId::SqueezeAxisErrorOutOfRange
            | CaseId::SqueezeAxisErrorOutOfRangeTuple => vec![Squeeze],
            CaseId::Unsqueeze => vec![Unsqueeze],
            CaseId::Reshape => vec![Reshape, ToHost],
            CaseId::Flatten => vec![Flatten, ToHost],
            CaseId::Getitem => vec![Slice, ToHost],
            CaseId::GetitemOutOfRange => vec![Slice],
            CaseId::GetitemForIndices | CaseId::GetitemForTensorIndices => vec![Slice, FancyIndex, ToHost],
            CaseId::Astype | CaseId::AstypeSameDtype => vec![Cast, ToHost],
            CaseId::ToCpu => vec![ToCpu, ToHost],
            CaseId::Item | CaseId::HostRoundTrip => vec![ToHost],
            CaseId::Dtype | CaseId::Device | CaseId::Backend | CaseId::Size | CaseId::CapabilityRefusals => Vec::new(),
        }
    }
}

pub(crate) fn run_shared<F: TensorFixture>(case: CaseId) -> anyhow::Result<()> {
    match case {
        CaseId::BinaryOperators => binary_operators::<F>(),
        CaseId::ScalarOperators => scalar_operators::<F>(),
        CaseId::CompareOps => compare_ops::<F>(),
        CaseId::UnaryOperators => unary_operators::<F>(),
        CaseId::BroadcastMismatch => broadcast_mismatch::<F>(),
        CaseId::ReduceSum => reduce_sum::<F>(),
        CaseId::ReduceMaxMin => reduce_max_min::<F>(),
        CaseId::ReduceMean => reduce_mean::<F>(),
        CaseId::ReduceAxisOutOfRange => reduce_axis_out_of_range::<F>(),
        CaseId::Squeeze => squeeze::<F>(),
        CaseId::SqueezeAxisErrorNonUnit => squeeze_axis_error_non_unit::<F>(),
        CaseId::SqueezeAxisErrorOutOfRange => squeeze_axis_error_out_of_range::<F>(),
        CaseId::SqueezeAxisErrorOutOfRangeTuple => squeeze_axis_error_out_of_range_tuple::<F>(),
        CaseId::Unsqueeze => unsqueeze::<F>(),
        CaseId::Reshape => reshape::<F>(),
        CaseId::Flatten => flatten::<F>(),
        CaseId::Getitem => getitem::<F>(),
        CaseId::GetitemOutOfRange => getitem_out_of_range::<F>(),
        CaseId::GetitemForIndices => getitem_for_indices::<F>(),
        CaseId::GetitemForTensorIndices => getitem_for_tensor_indices::<F>(),
        CaseId::Astype => astype::<F>(),
        CaseId::AstypeSameDtype => astype_same_dtype::<F>(),
        CaseId::Dtype => dtype::<F>(),
        CaseId::Device => device::<F>(),
        CaseId::Backend => backend::<F>(),
        CaseId::Size => size::<F>(),
        CaseId::ToCpu => to_cpu::<F>(),
        CaseId::Item => item::<F>(),
        CaseId::HostRoundTrip => host_round_trip::<F>(),
        CaseId::CapabilityRefusals => capability_refusals::<F>(),
    }
}

fn tensor<F: TensorFixture>(values: Vec<f32>, shape: &[usize]) -> anyhow::Result<Tensor> {
    let raw = NDArrayTensor::from_vec_shape(values, shape)?;
    Ok(F::to_tensor(raw)?.into())
}

fn arange<F: TensorFixture>(shape: &[usize]) -> anyhow::Result<Tensor> {
    let n = shape.iter().product::<usize>();
    tensor::<F>((0..n).map(|v| v as f32).collect(), shape)
}

fn expect_values(what: &str, t: &Tensor, shape: &[usize], expected: &[f64]) -> anyhow::Result<()> {
    ensure!(t.shape() == shape, "{what}: shape {:?}, expected {:?}", t.shape(), shape);
    let actual = t.to_f64_vec()?;
    ensure!(actual.len() == expected.len(), "{what}: {actual:?}, expected {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        ensure!(approx::abs_diff_eq!(*a, *e, epsilon = 1e-6), "{what}: {actual:?}, expected {expected:?}");
    }
    Ok(())
}

fn expect_error(
    what: &str,
    result: Result<Tensor, TensorError>,
    category: ErrorCategory,
    needle: Option<&str>,
) -> anyhow::Result<()> {
    let err = match result {
        Ok(t) => return Err(anyhow!("{what}: expected a {category} error, got shape {:?}", t.shape())),
        Err(err) => err,
    };
    ensure!(err.category() == category, "{what}: expected {category}, got {} ({err})", err.category());
    if let Some(needle) = needle {
        let message = err.to_string().to_lowercase();
        ensure!(message.contains(needle), "{what}: message {message:?} lacks {needle:?}");
    }
    Ok(())
}

fn binary_operators<F: TensorFixture>() -> anyhow::Result<()> {
    let a = tensor::<F>(vec![1.0, 2.0, 3.0, 4.0], &[2, 2])?;
    let b = tensor::<F>(vec![10.0, 20.0], &[2])?;
    expect_values("add", &a.add(&b)?, &[2, 2], &[11.0, 22.0, 13.0, 24.0])?;
    expect_values("sub", &a.sub(&b)?, &[2, 2], &[-9.0, -18.0, -7.0, -16.0])?;
    expect_values("mul", &a.mul(&b)?, &[2, 2], &[10.0, 40.0, 30.0, 80.0])?;
    expect_values("div", &a.div(&b)?, &[2, 2], &[0.1, 0.1, 0.3, 0.2])
}

fn scalar_operators<F: TensorFixture>() -> anyhow::Result<()> {
    let a = tensor::<F>(vec![1.0, 2.0, 3.0, 4.0], &[4])?;
    expect_values("add_scalar", &a.add_scalar(2.0)?, &[4], &[3.0, 4.0, 5.0, 6.0])?;
    expect_values("mul_scalar", &a.mul_scalar(0.5)?, &[4], &[0.5, 1.0, 1.5, 2.0])
}

fn compare_inputs<F: TensorFixture>() -> anyhow::Result<(Tensor, Tensor)> {
    Ok((tensor::<F>(vec![1.0, 5.0, 3.0], &[3])?, tensor::<F>(vec![3.0], &[1])?))
}

fn check_masks(a: &Tensor, b: &Tensor, mask_dtype: TensorDataType) -> anyhow::Result<()> {
    let masks = [
        ("lt", a.lt(b)?, [1.0, 0.0, 0.0]),
        ("gt", a.gt(b)?, [0.0, 1.0, 0.0]),
        ("eq", a.eq(b)?, [0.0, 0.0, 1.0]),
    ];
    for (what, mask, expected) in masks {
        ensure!(mask.dtype()? == mask_dtype, "{what}: mask dtype {}", mask.dtype()?);
        expect_values(what, &mask, &[3], &expected)?;
    }
    Ok(())
}

fn compare_ops<F: TensorFixture>() -> anyhow::Result<()> {
    let (a, b) = compare_inputs::<F>()?;
    check_masks(&a, &b, TensorDataType::Bool)
}

/// Comparison for backends whose masks are `UInt8` rather than `Bool`.
pub fn compare_ops_u8_mask<F: TensorFixture>() -> anyhow::Result<()> {
    let (a, b) = compare_inputs::<F>()?;
    check_masks(&a, &b, TensorDataType::UInt8)
}

fn unary_operators<F: TensorFixture>() -> anyhow::Result<()> {
    let a = tensor::<F>(vec![-1.5, 0.0, 2.0], &[3])?;
    expect_values("neg", &a.neg()?, &[3], &[1.5, -0.0, -2.0])?;
    expect_values("abs", &a.abs()?, &[3], &[1.5, 0.0, 2.0])
}

fn broadcast_mismatch<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 3])?;
    let b = arange::<F>(&[4])?;
    expect_error("add", a.add(&b), ErrorCategory::Value, None)
}

fn reduce_sum<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 3])?;
    expect_values("sum()", &a.sum(None, false)?, &[], &[15.0])?;
    expect_values("sum(0)", &a.sum(Some(Axes::Single(0)), false)?, &[3], &[3.0, 5.0, 7.0])?;
    expect_values("sum((0, 1), keepdims)", &a.sum(Some(Axes::Multiple(vec![0, 1])), true)?, &[1, 1], &[15.0])?;
    expect_values("sum(-1)", &a.sum(Some(Axes::Single(-1)), false)?, &[2], &[3.0, 12.0])
}

fn reduce_max_min<F: TensorFixture>() -> anyhow::Result<()> {
    let a = tensor::<F>(vec![1.0, 5.0, 3.0, 4.0, 2.0, 6.0], &[2, 3])?;
    expect_values("max()", &a.max(None, false)?, &[], &[6.0])?;
    expect_values("max(1)", &a.max(Some(Axes::Single(1)), false)?, &[2], &[5.0, 6.0])?;
    expect_values("min(0)", &a.min(Some(Axes::Single(0)), false)?, &[3], &[1.0, 2.0, 3.0])?;
    expect_values("min(-1, keepdims)", &a.min(Some(Axes::Single(-1)), true)?, &[2, 1], &[1.0, 2.0])
}

fn reduce_mean<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 3])?;
    expect_values("mean()", &a.mean(None, false)?, &[], &[2.5])?;
    expect_values("mean(0)", &a.mean(Some(Axes::Single(0)), false)?, &[3], &[1.5, 2.5, 3.5])?;
    expect_values("mean(1, keepdims)", &a.mean(Some(Axes::Single(1)), true)?, &[2, 1], &[1.0, 4.0])
}

fn reduce_axis_out_of_range<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 3])?;
    expect_error("sum(5)", a.sum(Some(Axes::Single(5)), false), ErrorCategory::Index, Some("out of"))
}

fn squeeze<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[1, 2, 1, 2])?;
    ensure!(a.squeeze(Some(Axes::Multiple(vec![0, 2])))?.shape() == [2, 2], "squeeze((0, 2))");
    ensure!(a.squeeze(None)?.shape() == [2, 2], "squeeze()");
    let b = a.squeeze(Some(Axes::Single(-2)))?;
    expect_values("squeeze(-2)", &b, &[1, 2, 2], &[0.0, 1.0, 2.0, 3.0])
}

fn squeeze_axis_error_non_unit<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[1, 2, 1, 2])?;
    expect_error("squeeze((0, 1))", a.squeeze(Some(Axes::Multiple(vec![0, 1]))), ErrorCategory::Value, Some("not equal to one"))
}

fn squeeze_axis_error_out_of_range<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[1, 2, 1, 2])?;
    expect_error("squeeze(42)", a.squeeze(Some(Axes::Single(42))), ErrorCategory::Index, Some("out of"))
}

fn squeeze_axis_error_out_of_range_tuple<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[1, 2, 1, 2])?;
    expect_error("squeeze((0, 42))", a.squeeze(Some(Axes::Multiple(vec![0, 42]))), ErrorCategory::Index, Some("out of"))
}

fn unsqueeze<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 3])?;
    ensure!(a.unsqueeze(0)?.shape() == [1, 2, 3], "unsqueeze(0)");
    ensure!(a.unsqueeze(-1)?.shape() == [2, 3, 1], "unsqueeze(-1)");
    Ok(())
}

fn reshape<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[6])?;
    expect_values("reshape([3, 2])", &a.reshape(&[3, 2])?, &[3, 2], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0])?;
    expect_error("reshape([4])", a.reshape(&[4]), ErrorCategory::Value, None)
}

fn flatten<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 3])?;
    expect_values("flatten", &a.flatten()?, &[6], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
}

fn getitem<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[3, 4])?;
    expect_values("[1]", &a.get_item(&[TensorIndex::At(1)])?, &[4], &[4.0, 5.0, 6.0, 7.0])?;
    expect_values("[-1, 0]", &a.get_item(&[TensorIndex::At(-1), TensorIndex::At(0)])?, &[], &[8.0])?;
    let tail = a.get_item(&[TensorIndex::Slice { start: Some(1), end: None }])?;
    expect_values("[1:]", &tail, &[2, 4], &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0])?;
    let columns = a.get_item(&[TensorIndex::Full, TensorIndex::range(1, 3)])?;
    expect_values("[:, 1:3]", &columns, &[3, 2], &[1.0, 2.0, 5.0, 6.0, 9.0, 10.0])?;
    let clamped = a.get_item(&[TensorIndex::range(-2, 100)])?;
    expect_values("[-2:100]", &clamped, &[2, 4], &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0])
}

fn getitem_out_of_range<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[3, 4])?;
    expect_error("[3]", a.get_item(&[TensorIndex::At(3)]), ErrorCategory::Index, None)
}

fn getitem_for_indices<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[3, 4])?;
    let rows = a.get_item(&[TensorIndex::Select(vec![0, 2])])?;
    expect_values("[[0, 2]]", &rows, &[2, 4], &[0.0, 1.0, 2.0, 3.0, 8.0, 9.0, 10.0, 11.0])?;
    let last = a.get_item(&[TensorIndex::Full, TensorIndex::Select(vec![-1])])?;
    expect_values("[:, [-1]]", &last, &[3, 1], &[3.0, 7.0, 11.0])
}

fn getitem_for_tensor_indices<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[3, 4])?;
    let positions: Tensor = F::to_tensor(NDArrayTensor::from_vec(vec![0i64, 2]))?.into();
    let rows = a.get_item(&[TensorIndex::SelectTensor(positions)])?;
    expect_values("[tensor([0, 2])]", &rows, &[2, 4], &[0.0, 1.0, 2.0, 3.0, 8.0, 9.0, 10.0, 11.0])
}

/// Float dtypes round-trip within their own epsilon; integer and bool dtypes exactly.
fn astype<F: TensorFixture>() -> anyhow::Result<()> {
    let exact = vec![0.0f32, 1.0, 3.0];
    let inexact = vec![0.0f32, 1.0, 3.0, 0.1, 1.0 / 3.0, -2.7, 1000.5];
    for dtype in TensorDataType::iter().filter(|d| capabilities::supports_dtype(F::backend(), *d)) {
        let values = if dtype.is_float() { &inexact } else { &exact };
        let raw = NDArrayTensor::from_vec_shape(values.clone(), &[values.len()])?;
        let cast = F::cast_to(F::to_tensor(raw)?, dtype)?;
        let cast_tensor: Tensor = cast.clone().into();
        ensure!(cast_tensor.dtype()? == dtype, "astype({dtype}) gave {}", cast_tensor.dtype()?);
        let back: Tensor = F::cast_to(cast, TensorDataType::Float32)?.into();
        ensure!(back.shape() == [values.len()], "astype({dtype}): shape {:?}", back.shape());
        let actual = back.to_f64_vec()?;
        if dtype.is_float() {
            let tolerance = dtype.epsilon();
            for (a, e) in actual.iter().zip(values.iter().map(|v| *v as f64)) {
                ensure!(
                    approx::relative_eq!(*a, e, epsilon = 0.0, max_relative = tolerance),
                    "astype({dtype}) back to float32: {a} is not within {tolerance} of {e}"
                );
            }
        } else {
            let expected = if dtype == TensorDataType::Bool { vec![0.0, 1.0, 1.0] } else { vec![0.0, 1.0, 3.0] };
            ensure!(actual == expected, "astype({dtype}) back to float32: {actual:?}, expected {expected:?}");
        }
    }
    Ok(())
}

fn astype_same_dtype<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 2])?;
    let b = a.astype(TensorDataType::Float32)?;
    ensure!(b.dtype()? == TensorDataType::Float32, "dtype changed to {}", b.dtype()?);
    expect_values("astype(float32)", &b, &[2, 2], &[0.0, 1.0, 2.0, 3.0])
}

fn dtype<F: TensorFixture>() -> anyhow::Result<()> {
    let floats = arange::<F>(&[2])?;
    ensure!(to_canonical_dtype(&floats)? == TensorDataType::Float32, "float32 input");
    let ints: Tensor = F::to_tensor(NDArrayTensor::from_vec(vec![1i64, 2]))?.into();
    ensure!(to_canonical_dtype(&ints)? == TensorDataType::Int64, "int64 input");
    Ok(())
}

fn device<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2])?;
    ensure!(to_canonical_device(&a) == F::device(), "tensor lives on {}", to_canonical_device(&a));
    Ok(())
}

fn backend<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2])?;
    ensure!(a.backend() == F::backend(), "wrapped as {}", a.backend());
    Ok(())
}

fn size<F: TensorFixture>() -> anyhow::Result<()> {
    let a = arange::<F>(&[2, 3])?;
    ensure!(a.shape() == [2, 3], "shape {:?}", a.shape());
    ensure!(a.rank() == 2, "rank {}", a.rank());
    ensure!(a.num_elements() == 6, "{} elements", a.num_elements());
    Ok(())
}

fn to_cpu<F: TensorFixture>() -> anyhow::Result<()> {
    let raw = NDArrayTensor::from_vec_shape(vec![1.0f32, 2.0, 3.0], &[3])?;
    let once = F::to_cpu(F::to_tensor(raw)?)?;
    let twice: Tensor = F::to_cpu(once.clone())?.into();
    let once: Tensor = once.into();
    ensure!(once.device() == TensorDeviceType::CPU, "to_cpu left the tensor on {}", once.device());
    ensure!(twice.device() == TensorDeviceType::CPU, "second to_cpu moved to {}", twice.device());
    ensure!(once.to_host()? == twice.to_host()?, "to_cpu is not idempotent");
    expect_values("to_cpu", &twice, &[3], &[1.0, 2.0, 3.0])
}

fn item<F: TensorFixture>() -> anyhow::Result<()> {
    let one = tensor::<F>(vec![2.5], &[1])?;
    ensure!(one.item()? == 2.5, "item() gave {}", one.item()?);
    let two = tensor::<F>(vec![1.0, 2.0], &[2])?;
    match two.item() {
        Ok(v) => Err(anyhow!("item() of two elements gave {v}")),
        Err(err) => {
            ensure!(err.category() == ErrorCategory::Value, "item(): {}", err.category());
            Ok(())
        }
    }
}

fn host_round_trip<F: TensorFixture>() -> anyhow::Result<()> {
    let raw = NDArrayTensor::from_vec_shape(vec![0.5f32, -1.0, 2.25, 8.0], &[2, 2])?;
    let t: Tensor = F::to_tensor(raw.clone())?.into();
    ensure!(t.to_host()? == raw, "host copy differs from the input");
    Ok(())
}

/// Calls a representative façade method for `op`.
pub fn invoke(op: Operation, t: &Tensor) -> Result<Tensor, TensorError> {
    match op {
        Operation::Add => t.add(t),
        Operation::Subtract => t.sub(t),
        Operation::Multiply => t.mul(t),
        Operation::Divide => t.div(t),
        Operation::Negative => t.neg(),
        Operation::Abs => t.abs(),
        Operation::Compare => t.lt(t),
        Operation::Sum => t.sum(None, false),
        Operation::Max => t.max(None, false),
        Operation::Min => t.min(None, false),
        Operation::Mean => t.mean(None, false),
        Operation::Squeeze => t.squeeze(None),
        Operation::Unsqueeze => t.unsqueeze(0),
        Operation::Reshape => t.reshape(&[4]),
        Operation::Flatten => t.flatten(),
        Operation::Slice => t.get_item(&[TensorIndex::At(0)]),
        Operation::FancyIndex => t.get_item(&[TensorIndex::Select(vec![0])]),
        Operation::Cast => t.astype(TensorDataType::Float64),
        Operation::ToCpu => t.to_cpu(),
        Operation::ToHost => t.to_host().map(Tensor::NDArray),
    }
}

fn capability_refusals<F: TensorFixture>() -> anyhow::Result<()> {
    let backend = F::backend();
    let t = tensor::<F>(vec![1.0, 2.0, 3.0, 4.0], &[4])?;
    for op in Operation::iter() {
        let result = invoke(op, &t);
        if capabilities::is_supported(backend, op) {
            if let Err(err) = result {
                ensure!(err.category() != ErrorCategory::NotImplemented, "{op} is listed but refused: {err}");
            }
        } else {
            let err = match result {
                Ok(_) => return Err(anyhow!("{op} is not listed for {backend} but succeeded")),
                Err(err) => err,
            };
            ensure!(err.category() == ErrorCategory::NotImplemented, "{op}: {}", err.category());
            let expected = format!("Operation {op} is not implemented for backend {backend}");
            ensure!(err.to_string() == expected, "{op}: message {:?}", err.to_string());
        }
    }
    Ok(())
}
