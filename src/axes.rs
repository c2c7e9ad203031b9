use crate::tensor::Tensor;

/// Axis argument of reductions and `squeeze`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Axes {
    Single(isize),
    Multiple(Vec<isize>),
}

impl Axes {
    pub fn to_vec(&self) -> Vec<isize> {
        match self {
            Axes::Single(axis) => vec![*axis],
            Axes::Multiple(axes) => axes.clone(),
        }
    }
}

impl From<isize> for Axes {
    fn from(value: isize) -> Self {
        Axes::Single(value)
    }
}

impl From<Vec<isize>> for Axes {
    fn from(value: Vec<isize>) -> Self {
        Axes::Multiple(value)
    }
}

impl From<&[isize]> for Axes {
    fn from(value: &[isize]) -> Self {
        Axes::Multiple(value.to_vec())
    }
}

impl<const N: usize> From<[isize; N]> for Axes {
    fn from(value: [isize; N]) -> Self {
        Axes::Multiple(value.to_vec())
    }
}

/// Resolves a possibly negative axis against `rank`, numpy style.
pub(crate) fn normalize_axis(axis: isize, rank: usize) -> Option<usize> {
    let rank = rank as isize;
    let resolved = if axis < 0 { axis + rank } else { axis };
    (0..rank).contains(&resolved).then_some(resolved as usize)
}

/// One entry of a `get_item` index expression, applied to successive axes.
#[derive(Debug, Clone)]
pub enum TensorIndex {
    /// Selects one position and drops the axis. Negative positions count from the end.
    At(isize),
    /// Half-open range with Python clamping of out-of-range bounds.
    Slice { start: Option<isize>, end: Option<isize> },
    Full,
    Select(Vec<i64>),
    SelectTensor(Tensor),
}

impl TensorIndex {
    pub fn range(start: isize, end: isize) -> Self {
        TensorIndex::Slice { start: Some(start), end: Some(end) }
    }

    pub fn is_fancy(&self) -> bool {
        matches!(self, TensorIndex::Select(_) | TensorIndex::SelectTensor(_))
    }
}

/// Python slice bounds for an axis of length `len`, clamped into `0..=len`.
pub(crate) fn resolve_slice(start: Option<isize>, end: Option<isize>, len: usize) -> (usize, usize) {
    let len_i = len as isize;
    let clamp = |v: isize| -> usize {
        let v = if v < 0 { v + len_i } else { v };
        v.clamp(0, len_i) as usize
    };
    let start = start.map(clamp).unwrap_or(0);
    let end = end.map(clamp).unwrap_or(len);
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_axes_convert() {
        assert_eq!(Axes::from(42), Axes::Single(42));
        assert_eq!(Axes::from([0, 2]), Axes::Multiple(vec![0, 2]));
    }

    #[test]
    fn negative_axes_normalize() {
        assert_eq!(normalize_axis(-1, 4), Some(3));
        assert_eq!(normalize_axis(-5, 4), None);
        assert_eq!(normalize_axis(4, 4), None);
    }

    #[test]
    fn slices_clamp_like_python() {
        assert_eq!(resolve_slice(Some(1), Some(3), 6), (1, 3));
        assert_eq!(resolve_slice(Some(-2), None, 6), (4, 6));
        assert_eq!(resolve_slice(Some(4), Some(100), 6), (4, 6));
        assert_eq!(resolve_slice(Some(5), Some(2), 6), (5, 5));
    }
}
