//! Error types and SNAFU context selectors for the storage engine.
//!
//! Every public operation returns [`StoreResult`]. The variants fall into the
//! three classes callers usually care about:
//!
//! - range errors ([`StoreError::Range`]),
//! - schema mismatches, detected before any statement is built
//!   ([`StoreError::is_schema_mismatch`]),
//! - backend failures ([`StoreError::Backend`]), raised after the enclosing
//!   transaction has been rolled back.
//!
//! Absent data is never an error.

use snafu::prelude::*;

use crate::{
    backend::BackendError,
    layout::{ColumnKind, LayoutError},
    period::{Period, PeriodError},
};

/// Result alias used across the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from block storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// An exclusive range whose end lies before its start.
    #[snafu(display("invalid range: end {end} is before start {start}"))]
    Range {
        /// Requested start period.
        start: Period,
        /// Requested end period.
        end: Period,
    },

    /// A timestamp or period could not be mapped onto the time axis.
    #[snafu(display("period error: {source}"))]
    Period {
        /// Underlying conversion error.
        source: PeriodError,
    },

    /// The declared layout is inconsistent.
    #[snafu(display("layout error: {source}"))]
    Layout {
        /// Underlying validation error.
        source: LayoutError,
    },

    /// The number of values differs from the number of periods written.
    #[snafu(display("schema mismatch: range covers {expected} periods but {actual} values were given"))]
    ValueCount {
        /// Periods in the range.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },

    /// A value does not fit the kind of the column it lands in.
    #[snafu(display("schema mismatch: value {value} does not fit {kind:?} column '{column}'"))]
    ValueKind {
        /// Target column.
        column: String,
        /// Column kind.
        kind: ColumnKind,
        /// Rendered offending value.
        value: String,
    },

    /// A delete range does not start and end on block boundaries.
    #[snafu(display(
        "schema mismatch: delete of [{start}, {end}) is not aligned to blocks of {capacity} periods"
    ))]
    UnalignedDelete {
        /// Requested start period.
        start: Period,
        /// Requested end period.
        end: Period,
        /// Block capacity.
        capacity: usize,
    },

    /// A stored row does not have the declared shape.
    #[snafu(display("schema mismatch: row from '{table}' has {found} columns, expected {expected}"))]
    RowShape {
        /// Table read from.
        table: String,
        /// Columns in the select list.
        expected: usize,
        /// Columns returned.
        found: usize,
    },

    /// The same table and owner type were registered with a different layout.
    #[snafu(display(
        "series for table '{table}' and owner type '{owner_type}' is already registered with a different layout"
    ))]
    RegistryConflict {
        /// Table name.
        table: String,
        /// Owner type name.
        owner_type: String,
    },

    /// Statement execution failed.
    #[snafu(display("backend error: {source}"))]
    Backend {
        /// Underlying backend error.
        source: BackendError,
    },
}

impl StoreError {
    /// Whether this is a range error.
    pub fn is_range_error(&self) -> bool {
        matches!(self, StoreError::Range { .. })
    }

    /// Whether the request disagreed with the declared schema.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            StoreError::ValueCount { .. }
                | StoreError::ValueKind { .. }
                | StoreError::UnalignedDelete { .. }
                | StoreError::RowShape { .. }
                | StoreError::Layout {
                    source: LayoutError::CapacityMismatch { .. }
                }
        )
    }

    /// Whether the backend failed.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, StoreError::Backend { .. })
    }
}

impl From<BackendError> for StoreError {
    fn from(source: BackendError) -> Self {
        StoreError::Backend { source }
    }
}

impl From<PeriodError> for StoreError {
    fn from(source: PeriodError) -> Self {
        StoreError::Period { source }
    }
}

impl From<LayoutError> for StoreError {
    fn from(source: LayoutError) -> Self {
        StoreError::Layout { source }
    }
}
