//! Read path: fetch the covering block rows and rebuild a dense sequence.
//!
//! A range read costs exactly one `SELECT`, bounded by the first and last
//! covering block index. Only rows that exist come back; every period without
//! a row, or whose stored cell is `NULL`, reads as its slot default.

use std::sync::Arc;

use snafu::prelude::*;
use tracing::trace;

use crate::{
    backend::{Backend, Dialect},
    error::{RangeSnafu, RowShapeSnafu, StoreResult, ValueKindSnafu},
    layout::{BLOCK_INDEX_COLUMN, BlockLayout, ColumnKind},
    period::{BlockIndex, BlockSpan, Period},
    planner::StoredBlocks,
    sequence::Sequence,
    value::Value,
    writer::{WriteTarget, owner_filter},
};

/// Whether a range includes its end period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RangeBound {
    /// `[start, end)`
    #[default]
    Exclusive,
    /// `[start, end]`
    Inclusive,
}

/// Exclusive end of the requested range.
///
/// `end < start` is a range error for the exclusive form. The inclusive form
/// of `start == end` covers one period.
pub fn effective_end(start: Period, end: Period, bound: RangeBound) -> StoreResult<Period> {
    let effective = match bound {
        RangeBound::Exclusive => Some(end),
        RangeBound::Inclusive => end.checked_add(1),
    };
    match effective {
        Some(effective) if effective >= start => Ok(effective),
        _ => RangeSnafu { start, end }.fail(),
    }
}

/// `SELECT block_index, c0, .. FROM tbl WHERE owner match AND block_index BETWEEN first AND last`
pub fn select_blocks_sql(
    dialect: &Dialect,
    target: &WriteTarget<'_>,
    first: BlockIndex,
    last: BlockIndex,
) -> String {
    let block_col = dialect.quote_ident(BLOCK_INDEX_COLUMN);
    let columns = std::iter::once(block_col.clone())
        .chain(target.layout.columns().iter().map(|c| dialect.quote_ident(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {columns} FROM {} WHERE {} AND {block_col} BETWEEN {first} AND {last}",
        dialect.quote_ident(target.layout.table()),
        owner_filter(dialect, target, None),
    )
}

/// Decode rows returned by [`select_blocks_sql`].
///
/// Cells are fitted to their column kind; `NULL` cells become the slot
/// default.
pub fn decode_rows(layout: &BlockLayout, rows: Vec<Vec<Value>>) -> StoreResult<StoredBlocks> {
    let expected = layout.capacity() + 1;
    let mut blocks = StoredBlocks::new();
    for row in rows {
        ensure!(
            row.len() == expected,
            RowShapeSnafu {
                table: layout.table(),
                expected,
                found: row.len(),
            }
        );
        let mut cells = row.into_iter();
        let block_index = match cells.next() {
            Some(Value::Int(i)) => i,
            other => {
                return ValueKindSnafu {
                    column: BLOCK_INDEX_COLUMN,
                    kind: ColumnKind::Integer,
                    value: other.map(|v| v.to_string()).unwrap_or_default(),
                }
                .fail();
            }
        };

        let mut values = Vec::with_capacity(layout.capacity());
        for (slot, cell) in cells.enumerate() {
            let column = layout.column_for_slot(slot);
            let value = match column.kind.coerce(cell.clone()) {
                Some(Value::Null) => layout.default_for_slot(slot).clone(),
                Some(value) => value,
                None => {
                    return ValueKindSnafu {
                        column: &column.name,
                        kind: column.kind,
                        value: cell.to_string(),
                    }
                    .fail();
                }
            };
            values.push(value);
        }
        blocks.insert(block_index, values);
    }
    Ok(blocks)
}

/// Fetch the stored rows for blocks `first..=last` of one owner.
pub fn fetch_blocks<B>(
    backend: &B,
    target: &WriteTarget<'_>,
    first: BlockIndex,
    last: BlockIndex,
) -> StoreResult<StoredBlocks>
where
    B: Backend + ?Sized,
{
    if last < first {
        return Ok(StoredBlocks::new());
    }
    let sql = select_blocks_sql(&backend.dialect(), target, first, last);
    trace!(%sql, "query");
    let rows = backend.query(&sql)?;
    decode_rows(target.layout, rows)
}

/// Fetch the stored rows touched by `spans`.
pub fn fetch_spans<B>(backend: &B, target: &WriteTarget<'_>, spans: &[BlockSpan]) -> StoreResult<StoredBlocks>
where
    B: Backend + ?Sized,
{
    match (spans.first(), spans.last()) {
        (Some(first), Some(last)) => fetch_blocks(backend, target, first.block_index, last.block_index),
        _ => Ok(StoredBlocks::new()),
    }
}

/// Rebuild the dense sequence for `spans` from the stored rows.
///
/// Pure: no backend access.
pub fn reconstruct(
    layout: Arc<BlockLayout>,
    start: Period,
    spans: &[BlockSpan],
    blocks: &StoredBlocks,
) -> Sequence {
    let len = spans.iter().map(BlockSpan::len).sum();
    let mut values = Vec::with_capacity(len);
    for span in spans {
        match blocks.get(&span.block_index) {
            Some(row) => values.extend_from_slice(&row[span.first_slot..span.end_slot]),
            None => values.extend(
                (span.first_slot..span.end_slot).map(|slot| layout.default_for_slot(slot).clone()),
            ),
        }
    }
    Sequence::new(start, values, layout)
}
