use ndarray::{ArcArray, Axis, IxDyn, Zip};
use crate::axes::{normalize_axis, resolve_slice};
use crate::backends::ndarray_backend::conversions::NDArrayNumericElement;

#[derive(Debug, Clone, thiserror::Error)]
pub enum NDArrayOperationError {
    #[error("axis {axis} is out of bounds for array of dimension {rank}")]
    AxisOutOfBounds { axis: isize, rank: usize },
    #[error("index {index} is out of bounds for axis {axis} with size {size}")]
    IndexOutOfBounds { index: i64, axis: usize, size: usize },
    #[error("too many indices for array: array is {rank}-dimensional, but {given} were indexed")]
    TooManyIndices { rank: usize, given: usize },
    #[error("cannot select an axis to squeeze out which has size not equal to one")]
    SqueezeNonUnitAxis { axis: usize, size: usize },
    #[error("duplicate value in 'axis': {0}")]
    DuplicateAxis(isize),
    #[error("operands could not be broadcast together with shapes {0:?} {1:?}")]
    Broadcast(Vec<usize>, Vec<usize>),
    #[error("zero-size array to reduction operation {0} which has no identity")]
    EmptyReduction(ReduceOp),
    #[error("integer division by zero")]
    DivisionByZero,
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CompareOp {
    Less,
    Greater,
    Equal,
}

impl CompareOp {
    pub fn apply<T: PartialOrd>(&self, a: &T, b: &T) -> bool {
        match self {
            CompareOp::Less => a < b,
            CompareOp::Greater => a > b,
            CompareOp::Equal => a == b,
        }
    }
}

/// Positions along one axis, as understood by [`get_item`].
#[derive(Debug, Clone, PartialEq)]
pub enum AxisIndex {
    At(isize),
    Slice(Option<isize>, Option<isize>),
    Full,
    Select(Vec<i64>),
}

/// Resolves `axes` against `rank`; `None` means every axis. Result is sorted descending.
pub fn resolve_axes(axes: Option<&[isize]>, rank: usize) -> Result<Vec<usize>, NDArrayOperationError> {
    let mut resolved = match axes {
        None => (0..rank).collect::<Vec<_>>(),
        Some(axes) => {
            let mut out = Vec::with_capacity(axes.len());
            for &axis in axes {
                let a = normalize_axis(axis, rank).ok_or(NDArrayOperationError::AxisOutOfBounds { axis, rank })?;
                if out.contains(&a) {
                    return Err(NDArrayOperationError::DuplicateAxis(axis));
                }
                out.push(a);
            }
            out
        }
    };
    resolved.sort_unstable_by(|a, b| b.cmp(a));
    Ok(resolved)
}

pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>, NDArrayOperationError> {
    let rank = a.len().max(b.len());
    let mut out = vec![0; rank];
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return Err(NDArrayOperationError::Broadcast(a.to_vec(), b.to_vec())),
        };
    }
    Ok(out)
}

pub fn binary<T, U, F>(a: &ArcArray<T, IxDyn>, b: &ArcArray<T, IxDyn>, f: F) -> Result<ArcArray<U, IxDyn>, NDArrayOperationError>
where
    T: Clone,
    U: Clone,
    F: Fn(&T, &T) -> U,
{
    let shape = broadcast_shape(a.shape(), b.shape())?;
    let mismatch = || NDArrayOperationError::Broadcast(a.shape().to_vec(), b.shape().to_vec());
    let av = a.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;
    let bv = b.broadcast(IxDyn(&shape)).ok_or_else(mismatch)?;
    Ok(Zip::from(&av).and(&bv).map_collect(|x, y| f(x, y)).into_shared())
}

pub fn try_binary<T, F>(a: &ArcArray<T, IxDyn>, b: &ArcArray<T, IxDyn>, f: F) -> Result<ArcArray<T, IxDyn>, NDArrayOperationError>
where
    T: NDArrayNumericElement,
    F: Fn(&T, &T) -> Option<T>,
{
    let out = binary(a, b, f)?;
    if out.iter().any(Option::is_none) {
        return Err(NDArrayOperationError::DivisionByZero);
    }
    Ok(out.mapv(|x| x.unwrap_or(T::from_f64(0.0))).into_shared())
}

pub fn raw_reduce<T: NDArrayNumericElement>(
    x: &ArcArray<T, IxDyn>,
    axes: &[usize],
    keepdims: bool,
    op: ReduceOp,
) -> Result<ArcArray<T, IxDyn>, NDArrayOperationError> {
    let mut out = x.clone();
    // Axes arrive sorted descending, so removing one never shifts the next.
    for &axis in axes {
        let len = out.len_of(Axis(axis));
        if len == 0 && matches!(op, ReduceOp::Max | ReduceOp::Min) {
            return Err(NDArrayOperationError::EmptyReduction(op));
        }
        let reduced = out.map_axis(Axis(axis), |lane| match op {
            ReduceOp::Sum => lane.iter().fold(T::from_f64(0.0), |acc, v| acc.add_elem(*v)),
            // NaN wins once seen, as in numpy.
            ReduceOp::Max => lane
                .iter()
                .copied()
                .reduce(|a, b| if b.is_nan_elem() || b > a { b } else { a })
                .unwrap_or(T::from_f64(0.0)),
            ReduceOp::Min => lane
                .iter()
                .copied()
                .reduce(|a, b| if b.is_nan_elem() || b < a { b } else { a })
                .unwrap_or(T::from_f64(0.0)),
            ReduceOp::Mean => T::from_f64(lane.iter().map(|v| v.to_f64()).sum::<f64>() / len as f64),
        });
        out = if keepdims {
            reduced.insert_axis(Axis(axis)).into_shared()
        } else {
            reduced.into_shared()
        };
    }
    Ok(out)
}

pub fn reshape<T: Clone>(x: &ArcArray<T, IxDyn>, shape: Vec<usize>) -> Result<ArcArray<T, IxDyn>, NDArrayOperationError> {
    Ok(x.to_shape(shape)?.to_owned().into_shared())
}

pub fn squeeze<T: Clone>(x: &ArcArray<T, IxDyn>, axes: Option<&[isize]>) -> Result<ArcArray<T, IxDyn>, NDArrayOperationError> {
    let shape = x.shape().to_vec();
    let to_remove = match axes {
        None => (0..shape.len()).filter(|&a| shape[a] == 1).collect::<Vec<_>>(),
        Some(axes) => {
            let resolved = resolve_axes(Some(axes), shape.len())?;
            if let Some(&axis) = resolved.iter().find(|&&a| shape[a] != 1) {
                return Err(NDArrayOperationError::SqueezeNonUnitAxis { axis, size: shape[axis] });
            }
            resolved
        }
    };
    let new_shape = shape
        .iter()
        .enumerate()
        .filter(|(a, _)| !to_remove.contains(a))
        .map(|(_, d)| *d)
        .collect();
    reshape(x, new_shape)
}

pub fn unsqueeze<T: Clone>(x: &ArcArray<T, IxDyn>, axis: isize) -> Result<ArcArray<T, IxDyn>, NDArrayOperationError> {
    let rank = x.ndim() + 1;
    let axis = normalize_axis(axis, rank).ok_or(NDArrayOperationError::AxisOutOfBounds { axis, rank })?;
    Ok(x.clone().insert_axis(Axis(axis)))
}

fn resolve_position(index: i64, axis: usize, size: usize) -> Result<usize, NDArrayOperationError> {
    let resolved = if index < 0 { index + size as i64 } else { index };
    if resolved < 0 || resolved >= size as i64 {
        return Err(NDArrayOperationError::IndexOutOfBounds { index, axis, size });
    }
    Ok(resolved as usize)
}

pub fn get_item<T: Clone>(x: &ArcArray<T, IxDyn>, index: &[AxisIndex]) -> Result<ArcArray<T, IxDyn>, NDArrayOperationError> {
    if index.len() > x.ndim() {
        return Err(NDArrayOperationError::TooManyIndices { rank: x.ndim(), given: index.len() });
    }
    let mut out = x.clone();
    let mut axis = 0;
    for entry in index {
        let size = out.len_of(Axis(axis));
        match entry {
            AxisIndex::At(i) => {
                let i = resolve_position(*i as i64, axis, size)?;
                out = out.index_axis(Axis(axis), i).to_shared();
            }
            AxisIndex::Slice(start, end) => {
                let (start, end) = resolve_slice(*start, *end, size);
                out = out.slice_axis(Axis(axis), ndarray::Slice::from(start..end)).to_shared();
                axis += 1;
            }
            AxisIndex::Full => axis += 1,
            AxisIndex::Select(positions) => {
                let positions = positions
                    .iter()
                    .map(|&p| resolve_position(p, axis, size))
                    .collect::<Result<Vec<_>, _>>()?;
                out = out.select(Axis(axis), &positions).into_shared();
                axis += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    fn arange(shape: &[usize]) -> ArcArray<f32, IxDyn> {
        let n = shape.iter().product::<usize>();
        ArrayD::from_shape_vec(IxDyn(shape), (0..n).map(|x| x as f32).collect()).unwrap().into_shared()
    }

    #[test]
    fn broadcast_rules() {
        assert_eq!(broadcast_shape(&[2, 1, 3], &[4, 1]).unwrap(), vec![2, 4, 3]);
        assert_eq!(broadcast_shape(&[], &[3]).unwrap(), vec![3]);
        assert!(broadcast_shape(&[2, 3], &[4]).is_err());
    }

    #[test]
    fn reduce_over_two_axes() {
        let x = arange(&[2, 3, 2]);
        let axes = resolve_axes(Some(&[0, -1]), 3).unwrap();
        assert_eq!(axes, vec![2, 0]);
        let out = raw_reduce(&x, &axes, false, ReduceOp::Sum).unwrap();
        assert_eq!(out.shape(), &[3]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![14.0, 22.0, 30.0]);
        let kept = raw_reduce(&x, &axes, true, ReduceOp::Max).unwrap();
        assert_eq!(kept.shape(), &[1, 3, 1]);
        assert_eq!(kept.iter().copied().collect::<Vec<_>>(), vec![7.0, 9.0, 11.0]);
    }

    #[test]
    fn max_and_min_propagate_nan() {
        let x = ArcArray::from_vec(vec![1.0f32, f32::NAN, 2.0]).into_dyn();
        let max = raw_reduce(&x, &[0], false, ReduceOp::Max).unwrap();
        let min = raw_reduce(&x, &[0], false, ReduceOp::Min).unwrap();
        assert!(max.iter().all(|v| v.is_nan()));
        assert!(min.iter().all(|v| v.is_nan()));
        let leading = ArcArray::from_vec(vec![f32::NAN, 3.0]).into_dyn();
        assert!(raw_reduce(&leading, &[0], false, ReduceOp::Max).unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn nan_free_lanes_are_unaffected() {
        let x = ArcArray::from_shape_vec(IxDyn(&[2, 2]), vec![f64::NAN, 1.0, 4.0, -2.0]).unwrap();
        let max = raw_reduce(&x, &[1], false, ReduceOp::Max).unwrap().iter().copied().collect::<Vec<_>>();
        assert!(max[0].is_nan());
        assert_eq!(max[1], 4.0);
    }

    #[test]
    fn broadcast_binary_allocates_output_type() {
        let a = arange(&[2, 2]);
        let b = ArcArray::from_vec(vec![1.0f32, 3.0]).into_dyn();
        let out = binary(&a, &b, |x, y| x < y).unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![true, true, false, false]);
    }

    #[test]
    fn duplicate_axes_are_rejected() {
        assert!(matches!(resolve_axes(Some(&[1, -2]), 3), Err(NDArrayOperationError::DuplicateAxis(-2))));
    }

    #[test]
    fn empty_max_has_no_identity() {
        let x = arange(&[0, 2]);
        assert!(matches!(
            raw_reduce(&x, &[0], false, ReduceOp::Max),
            Err(NDArrayOperationError::EmptyReduction(ReduceOp::Max))
        ));
    }

    #[test]
    fn squeeze_errors_are_distinct() {
        let x = arange(&[1, 2, 1, 2]);
        assert_eq!(squeeze(&x, Some(&[0, 2])).unwrap().shape(), &[2, 2]);
        assert_eq!(squeeze(&x, None).unwrap().shape(), &[2, 2]);
        assert!(matches!(
            squeeze(&x, Some(&[0, 1])),
            Err(NDArrayOperationError::SqueezeNonUnitAxis { axis: 1, size: 2 })
        ));
        assert!(matches!(
            squeeze(&x, Some(&[42])),
            Err(NDArrayOperationError::AxisOutOfBounds { axis: 42, rank: 4 })
        ));
    }

    #[test]
    fn indexing_walks_axes() {
        let x = arange(&[3, 4]);
        let row = get_item(&x, &[AxisIndex::At(-1)]).unwrap();
        assert_eq!(row.iter().copied().collect::<Vec<_>>(), vec![8.0, 9.0, 10.0, 11.0]);
        let block = get_item(&x, &[AxisIndex::Slice(Some(1), None), AxisIndex::Select(vec![0, 3])]).unwrap();
        assert_eq!(block.shape(), &[2, 2]);
        assert_eq!(block.iter().copied().collect::<Vec<_>>(), vec![4.0, 7.0, 8.0, 11.0]);
        assert!(matches!(
            get_item(&x, &[AxisIndex::At(3)]),
            Err(NDArrayOperationError::IndexOutOfBounds { index: 3, axis: 0, size: 3 })
        ));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        let a = ArrayD::from_shape_vec(IxDyn(&[2]), vec![4i32, 2]).unwrap().into_shared();
        let b = ArrayD::from_shape_vec(IxDyn(&[2]), vec![2i32, 0]).unwrap().into_shared();
        assert!(matches!(try_binary(&a, &b, |x, y| x.div_elem(*y)), Err(NDArrayOperationError::DivisionByZero)));
    }
}
