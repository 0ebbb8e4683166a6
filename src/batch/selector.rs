//! Record selectors for decollation
//!
//! Negative slice bounds count from the end, as do negative steps. Masks must
//! match the batch length exactly. Selection order is preserved and
//! duplicates are allowed.

use crate::error::{BatchError, Result};
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// Which records to extract from a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// One record
    Index(usize),
    /// Records in the given order (duplicates allowed)
    Indices(Vec<usize>),
    /// Records whose flag is set; length must equal the batch length
    Mask(Vec<bool>),
    /// `start:stop:step` with negative bounds counted from the end
    Slice {
        /// First position (defaults to the start, or the end for negative steps)
        start: Option<isize>,
        /// One past the last position
        stop: Option<isize>,
        /// Stride; never zero
        step: isize,
    },
}

impl Selector {
    /// Slice with step 1
    #[must_use]
    pub const fn slice(start: Option<isize>, stop: Option<isize>) -> Self {
        Self::Slice {
            start,
            stop,
            step: 1,
        }
    }

    /// Resolve to concrete record indices for a batch of `len` records
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::SelectorOutOfRange`] for indices `>= len`, masks
    /// of the wrong length, and zero steps.
    ///
    /// # Example
    ///
    /// ```
    /// use graph_batch::Selector;
    ///
    /// let last_two = Selector::slice(Some(-2), None);
    /// assert_eq!(last_two.resolve(5).unwrap(), vec![3, 4]);
    ///
    /// let reversed = Selector::Slice { start: None, stop: None, step: -2 };
    /// assert_eq!(reversed.resolve(5).unwrap(), vec![4, 2, 0]);
    /// ```
    pub fn resolve(&self, len: usize) -> Result<Vec<usize>> {
        match self {
            Self::Index(i) => check_index(*i, len).map(|i| vec![i]),
            Self::Indices(indices) => indices.iter().map(|&i| check_index(i, len)).collect(),
            Self::Mask(mask) => {
                if mask.len() != len {
                    return Err(BatchError::SelectorOutOfRange {
                        len,
                        detail: format!("mask of length {}", mask.len()),
                    });
                }
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &keep)| keep.then_some(i))
                    .collect())
            }
            Self::Slice { start, stop, step } => resolve_slice(*start, *stop, *step, len),
        }
    }
}

fn check_index(index: usize, len: usize) -> Result<usize> {
    if index < len {
        Ok(index)
    } else {
        Err(BatchError::SelectorOutOfRange {
            len,
            detail: format!("index {index}"),
        })
    }
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn resolve_slice(
    start: Option<isize>,
    stop: Option<isize>,
    step: isize,
    len: usize,
) -> Result<Vec<usize>> {
    if step == 0 {
        return Err(BatchError::SelectorOutOfRange {
            len,
            detail: "slice step 0".to_string(),
        });
    }

    let n = len as isize;
    // Clamp into [lo, hi]; lo/hi differ by direction so a reversed slice can reach index 0
    let (lo, hi) = if step > 0 { (0, n) } else { (-1, n - 1) };
    let clamp = |bound: isize| {
        let bound = if bound < 0 { bound + n } else { bound };
        bound.clamp(lo, hi)
    };
    let first = start.map_or(if step > 0 { lo } else { hi }, clamp);
    let last = stop.map_or(if step > 0 { hi } else { lo }, clamp);

    let mut out = Vec::new();
    let mut i = first;
    while (step > 0 && i < last) || (step < 0 && i > last) {
        out.push(i as usize);
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(out)
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Vec<usize>> for Selector {
    fn from(indices: Vec<usize>) -> Self {
        Self::Indices(indices)
    }
}

impl From<&[usize]> for Selector {
    fn from(indices: &[usize]) -> Self {
        Self::Indices(indices.to_vec())
    }
}

impl From<Vec<bool>> for Selector {
    fn from(mask: Vec<bool>) -> Self {
        Self::Mask(mask)
    }
}

impl From<&[bool]> for Selector {
    fn from(mask: &[bool]) -> Self {
        Self::Mask(mask.to_vec())
    }
}

impl From<Range<usize>> for Selector {
    #[allow(clippy::cast_possible_wrap)]
    fn from(range: Range<usize>) -> Self {
        Self::slice(Some(range.start as isize), Some(range.end as isize))
    }
}

impl From<RangeFrom<usize>> for Selector {
    #[allow(clippy::cast_possible_wrap)]
    fn from(range: RangeFrom<usize>) -> Self {
        Self::slice(Some(range.start as isize), None)
    }
}

impl From<RangeTo<usize>> for Selector {
    #[allow(clippy::cast_possible_wrap)]
    fn from(range: RangeTo<usize>) -> Self {
        Self::slice(None, Some(range.end as isize))
    }
}

impl From<RangeFull> for Selector {
    fn from(_: RangeFull) -> Self {
        Self::slice(None, None)
    }
}
