//! Offset tables (pointer arrays) and membership vectors
//!
//! # Pointer array
//!
//! ```text
//! Row counts per record: [3, 2]
//!
//! ptr:        [0, 3, 5]        // record 0: rows [0..3), record 1: rows [3..5)
//! membership: [0, 0, 0, 1, 1]  // owning record of every merged row
//! ```
//!
//! The same structure delimits the per-record extent of every merged
//! attribute (along its own concatenation axis), not only the row space.

use std::ops::Range;

/// Cumulative counts delimiting each source record inside a merged dimension
///
/// Invariants: `ptr[0] == 0`, non-decreasing, `len == num_records + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OffsetTable {
    ptr: Vec<usize>,
}

impl Default for OffsetTable {
    fn default() -> Self {
        Self { ptr: vec![0] }
    }
}

impl OffsetTable {
    /// Build from per-record counts
    ///
    /// # Example
    ///
    /// ```
    /// use graph_batch::OffsetTable;
    ///
    /// let table = OffsetTable::from_counts([3, 2]);
    /// assert_eq!(table.ptr(), &[0, 3, 5]);
    /// assert_eq!(table.membership(), vec![0, 0, 0, 1, 1]);
    /// ```
    pub fn from_counts<I: IntoIterator<Item = usize>>(counts: I) -> Self {
        let counts = counts.into_iter();
        let mut ptr = Vec::with_capacity(counts.size_hint().0 + 1);
        let mut total = 0;
        ptr.push(total);
        for count in counts {
            total += count;
            ptr.push(total);
        }
        Self { ptr }
    }

    /// Pointer array
    #[must_use]
    pub fn ptr(&self) -> &[usize] {
        &self.ptr
    }

    /// Number of records delimited
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.ptr.len() - 1
    }

    /// Sum of all counts (`ptr[-1]`)
    #[must_use]
    pub fn total(&self) -> usize {
        self.ptr.last().copied().unwrap_or(0)
    }

    /// Cumulative count of the records before `record`
    ///
    /// # Panics
    ///
    /// Panics if `record > num_records()`.
    #[must_use]
    pub fn offset(&self, record: usize) -> usize {
        self.ptr[record]
    }

    /// Count of `record`
    ///
    /// # Panics
    ///
    /// Panics if `record >= num_records()`.
    #[must_use]
    pub fn count(&self, record: usize) -> usize {
        self.ptr[record + 1] - self.ptr[record]
    }

    /// Half-open merged range owned by `record`
    ///
    /// # Panics
    ///
    /// Panics if `record >= num_records()`.
    #[must_use]
    pub fn range(&self, record: usize) -> Range<usize> {
        self.ptr[record]..self.ptr[record + 1]
    }

    /// Per-record counts
    pub fn counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.ptr.windows(2).map(|w| w[1] - w[0])
    }

    /// Owning record of every merged position (non-decreasing)
    #[must_use]
    pub fn membership(&self) -> Vec<usize> {
        let mut membership = Vec::with_capacity(self.total());
        for (record, count) in self.counts().enumerate() {
            membership.extend(std::iter::repeat(record).take(count));
        }
        membership
    }

    /// Table whose counts are the per-record sums of `tables`
    ///
    /// All tables must delimit the same number of records.
    #[must_use]
    pub fn sum_of<'a, I>(num_records: usize, tables: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let mut counts = vec![0; num_records];
        for table in tables {
            for (slot, count) in counts.iter_mut().zip(table.counts()) {
                *slot += count;
            }
        }
        Self::from_counts(counts)
    }
}
