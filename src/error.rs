//! Error types for collation and decollation
//!
//! Every failure carries the attribute path it was raised for (`x`,
//! `edge_index[1]`, `feat.author`, ...). A failing leaf aborts the whole call;
//! no partial batch is ever returned.

use crate::storage::DType;
use thiserror::Error;

/// Errors raised while merging records or splitting a batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// Values disagree on an axis that is not being concatenated
    #[error("shape mismatch for `{path}`: {detail}")]
    ShapeMismatch {
        /// Attribute path
        path: String,
        /// What differed
        detail: String,
    },

    /// Mapping keys, sequence lengths or value kinds differ across records
    #[error("structural mismatch for `{path}`: {detail}")]
    StructuralMismatch {
        /// Attribute path (or type name for heterogeneous records)
        path: String,
        /// What differed
        detail: String,
    },

    /// Element types differ across records, or an offset targets a `bool` array
    #[error("dtype mismatch for `{path}`: expected {expected}, found {found}")]
    DtypeMismatch {
        /// Attribute path
        path: String,
        /// Dtype of the representative value
        expected: DType,
        /// Offending dtype
        found: DType,
    },

    /// A selector names a record outside `[0, len)`
    #[error("selector out of range: {detail} (batch holds {len} records)")]
    SelectorOutOfRange {
        /// Number of records in the batch
        len: usize,
        /// Offending index, mask length or step
        detail: String,
    },

    /// Attribute present in some but not all records, with no fill value
    #[error("attribute `{path}` present in {present} of {total} records")]
    PartialAttributePresence {
        /// Attribute key
        path: String,
        /// Records holding the key
        present: usize,
        /// Records in the batch
        total: usize,
    },

    /// A `Shared` attribute holds different values across records
    #[error("shared attribute `{path}` differs between record 0 and record {record}")]
    SharedValueConflict {
        /// Attribute path
        path: String,
        /// First record whose value differs from record 0
        record: usize,
    },

    /// The resolved policy cannot be applied to this kind of value
    #[error("cannot apply {policy} to `{path}`: {reason}")]
    UnsupportedPolicy {
        /// Attribute path
        path: String,
        /// Policy name
        policy: String,
        /// Why it does not apply
        reason: String,
    },
}

impl BatchError {
    pub(crate) fn shape(path: &str, detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            path: path.to_owned(),
            detail: detail.into(),
        }
    }

    pub(crate) fn structure(path: &str, detail: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            path: path.to_owned(),
            detail: detail.into(),
        }
    }

    pub(crate) fn unsupported(path: &str, policy: impl std::fmt::Debug, reason: &str) -> Self {
        Self::UnsupportedPolicy {
            path: path.to_owned(),
            policy: format!("{policy:?}"),
            reason: reason.to_owned(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BatchError>;
