//! Write planning: turn a period-range write into block-aligned patches.
//!
//! Planning is pure. It takes the currently stored rows for the touched blocks
//! and decides, per block, between a merge-update (the row exists) and an
//! insert (it does not). Nothing here talks to a backend.

use std::{collections::BTreeMap, ops::Range};

use snafu::prelude::*;

use crate::{
    error::{StoreResult, UnalignedDeleteSnafu, ValueCountSnafu, ValueKindSnafu},
    layout::BlockLayout,
    period::{BlockIndex, Period, PeriodIndexer},
    value::Value,
};

/// Full-width stored rows keyed by block index.
pub type StoredBlocks = BTreeMap<BlockIndex, Vec<Value>>;

/// New contents for one block row.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPatch {
    /// Target block.
    pub block_index: BlockIndex,
    /// Complete slot values after the write (`capacity` entries).
    pub values: Vec<Value>,
    /// Slots the write actually changed.
    pub touched: Range<usize>,
}

/// Patches produced by one logical `set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePlan {
    /// Blocks that already have a row: merge into it.
    pub updates: Vec<BlockPatch>,
    /// Blocks without a row: create it.
    pub inserts: Vec<BlockPatch>,
}

impl WritePlan {
    /// Whether the plan touches nothing.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty()
    }

    /// Number of block rows touched.
    pub fn block_count(&self) -> usize {
        self.updates.len() + self.inserts.len()
    }

    /// Every patch, updates first.
    pub fn patches(&self) -> impl Iterator<Item = &BlockPatch> {
        self.updates.iter().chain(self.inserts.iter())
    }
}

/// Whole blocks selected for removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePlan {
    /// Block indices to delete, ascending.
    pub block_indices: Vec<BlockIndex>,
}

/// Plan writing `values` to `[start, end)`.
///
/// `existing` must hold the stored row of every touched block that has one;
/// rows for other blocks are ignored. Values are fitted to their column kind
/// before anything is planned.
pub fn plan_set(
    layout: &BlockLayout,
    indexer: &PeriodIndexer,
    start: Period,
    end: Period,
    values: &[Value],
    existing: &StoredBlocks,
) -> StoreResult<WritePlan> {
    check_value_count(start, end, values.len())?;

    let mut plan = WritePlan::default();
    let mut cursor = 0usize;
    for span in indexer.range_to_blocks(start, end)? {
        let (mut row, is_update) = match existing.get(&span.block_index) {
            Some(stored) => (stored.clone(), true),
            None => (layout.default_row(), false),
        };

        for slot in span.first_slot..span.end_slot {
            let column = layout.column_for_slot(slot);
            let value = &values[cursor];
            row[slot] = column
                .kind
                .coerce(value.clone())
                .with_context(|| ValueKindSnafu {
                    column: &column.name,
                    kind: column.kind,
                    value: value.to_string(),
                })?;
            cursor += 1;
        }

        let patch = BlockPatch {
            block_index: span.block_index,
            values: row,
            touched: span.first_slot..span.end_slot,
        };
        if is_update {
            plan.updates.push(patch);
        } else {
            plan.inserts.push(patch);
        }
    }

    Ok(plan)
}

/// Fail unless `actual` values exactly cover `[start, end)`.
pub fn check_value_count(start: Period, end: Period, actual: usize) -> StoreResult<()> {
    let expected = usize::try_from(end.saturating_sub(start)).unwrap_or(0);
    ensure!(actual == expected, ValueCountSnafu { expected, actual });
    Ok(())
}

/// Plan deleting the whole blocks covering `[start, end)`.
///
/// Both ends must sit on block boundaries; partial-block deletes are rejected.
pub fn plan_delete(indexer: &PeriodIndexer, start: Period, end: Period) -> StoreResult<DeletePlan> {
    ensure!(
        indexer.is_block_aligned(start) && indexer.is_block_aligned(end),
        UnalignedDeleteSnafu {
            start,
            end,
            capacity: indexer.capacity(),
        }
    );
    let block_indices = (indexer.block_index(start)..indexer.block_index(end)).collect();
    Ok(DeletePlan { block_indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreError,
        layout::{ColumnKind, ColumnSpec},
        period::{IndexerConfig, Resolution},
    };

    fn layout(capacity: usize) -> BlockLayout {
        BlockLayout::uniform("blocks", "t", capacity, ColumnKind::Float, 0.0).unwrap()
    }

    fn indexer(capacity: usize) -> PeriodIndexer {
        PeriodIndexer::new(IndexerConfig::new(Resolution::HOURLY), capacity)
    }

    fn floats(values: &[f64]) -> Vec<Value> {
        values.iter().copied().map(Value::Float).collect()
    }

    #[test]
    fn value_count_must_match_range() {
        let err = plan_set(&layout(4), &indexer(4), 0, 3, &floats(&[1.0]), &StoredBlocks::new())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::ValueCount {
                expected: 3,
                actual: 1
            }
        ));
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn new_blocks_are_inserted_with_defaults() {
        let plan = plan_set(
            &layout(4),
            &indexer(4),
            2,
            6,
            &floats(&[1.0, 2.0, 3.0, 4.0]),
            &StoredBlocks::new(),
        )
        .unwrap();
        assert!(plan.updates.is_empty());
        assert_eq!(
            plan.inserts,
            vec![
                BlockPatch {
                    block_index: 0,
                    values: floats(&[0.0, 0.0, 1.0, 2.0]),
                    touched: 2..4,
                },
                BlockPatch {
                    block_index: 1,
                    values: floats(&[3.0, 4.0, 0.0, 0.0]),
                    touched: 0..2,
                },
            ]
        );
    }

    #[test]
    fn existing_blocks_merge_untouched_slots() {
        let mut existing = StoredBlocks::new();
        existing.insert(1, floats(&[9.0, 9.0, 9.0, 9.0]));

        let plan = plan_set(&layout(4), &indexer(4), 3, 6, &floats(&[1.0, 2.0, 3.0]), &existing)
            .unwrap();
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].block_index, 0);
        assert_eq!(
            plan.updates,
            vec![BlockPatch {
                block_index: 1,
                values: floats(&[2.0, 3.0, 9.0, 9.0]),
                touched: 0..2,
            }]
        );
        assert_eq!(plan.block_count(), 2);
    }

    #[test]
    fn integers_widen_into_float_columns() {
        let plan = plan_set(
            &layout(2),
            &indexer(2),
            0,
            1,
            &[Value::Int(5)],
            &StoredBlocks::new(),
        )
        .unwrap();
        assert_eq!(plan.inserts[0].values, floats(&[5.0, 0.0]));
    }

    #[test]
    fn values_that_do_not_fit_are_rejected() {
        let status = BlockLayout::new(
            "status_blocks",
            1,
            vec![ColumnSpec::new("s", ColumnKind::Categorical).with_default("normal")],
        )
        .unwrap();
        let err = plan_set(
            &status,
            &indexer(1),
            0,
            1,
            &[Value::Float(1.5)],
            &StoredBlocks::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::ValueKind { .. }));
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn empty_range_plans_nothing() {
        let plan = plan_set(&layout(4), &indexer(4), 5, 5, &[], &StoredBlocks::new()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn year_long_block_holds_a_sparse_write() {
        // One block per year of hourly periods.
        let capacity = 8760;
        let idx = indexer(capacity);
        let start = idx.block_start(31).unwrap();
        let plan = plan_set(
            &layout(capacity),
            &idx,
            start,
            start + 3,
            &floats(&[1.0, 2.0, 3.0]),
            &StoredBlocks::new(),
        )
        .unwrap();
        assert_eq!(plan.inserts.len(), 1);
        let row = &plan.inserts[0].values;
        assert_eq!(row.len(), capacity);
        assert_eq!(row.iter().filter(|v| **v != Value::Float(0.0)).count(), 3);
    }

    #[test]
    fn delete_requires_block_alignment() {
        let idx = indexer(24);
        assert_eq!(
            plan_delete(&idx, 48, 120).unwrap().block_indices,
            vec![2, 3, 4]
        );
        assert!(plan_delete(&idx, 48, 48).unwrap().block_indices.is_empty());

        let err = plan_delete(&idx, 50, 72).unwrap_err();
        assert!(matches!(err, StoreError::UnalignedDelete { .. }));
        assert!(plan_delete(&idx, 48, 70).is_err());
    }
}
