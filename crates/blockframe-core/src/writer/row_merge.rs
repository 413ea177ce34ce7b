//! Profile A: merge a literal row set into the table in one statement.
//!
//! ```sql
//! WITH blockframe_patch ("block_index", "v_1", "v_2") AS (VALUES (3, 1.0, 2.0), (4, 5.0, 6.0))
//! UPDATE "blocks" SET "v_1" = blockframe_patch."v_1", "v_2" = blockframe_patch."v_2"
//! FROM blockframe_patch
//! WHERE "blocks"."owner_id" = 7 AND "blocks"."owner_type" = 'Airport'
//!   AND "blocks"."block_index" = blockframe_patch."block_index"
//! ```
//!
//! Only the union of touched slot columns is carried. A block that did not
//! touch one of those columns carries its stored value for it, so the merge is
//! a no-op there.

use crate::{
    backend::{Dialect, Profile, Statement},
    layout::BLOCK_INDEX_COLUMN,
    planner::BlockPatch,
};

use super::{BulkWriter, WriteTarget, literal, owner_filter, touched_slots};

const PATCH_ALIAS: &str = "blockframe_patch";

/// Row-merge (`UPDATE .. FROM`) writer.
#[derive(Debug, Clone)]
pub struct RowMergeWriter {
    dialect: Dialect,
}

impl RowMergeWriter {
    /// Writer rendering for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl BulkWriter for RowMergeWriter {
    fn profile(&self) -> Profile {
        Profile::RowMerge
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn bulk_update(&self, target: &WriteTarget<'_>, patches: &[BlockPatch]) -> Vec<Statement> {
        if patches.is_empty() {
            return Vec::new();
        }
        let d = &self.dialect;
        let layout = target.layout;
        let slots = touched_slots(layout.capacity(), patches);
        let table = d.quote_ident(layout.table());
        let alias = d.quote_ident(PATCH_ALIAS);
        let block_col = d.quote_ident(BLOCK_INDEX_COLUMN);
        let slot_cols: Vec<String> = slots
            .iter()
            .map(|&slot| d.quote_ident(&layout.column_for_slot(slot).name))
            .collect();

        let rows = patches
            .iter()
            .map(|patch| {
                let cells = std::iter::once(patch.block_index.to_string())
                    .chain(slots.iter().map(|&slot| literal::encode(&patch.values[slot], d)))
                    .collect::<Vec<_>>();
                format!("({})", cells.join(", "))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let assignments = slot_cols
            .iter()
            .map(|col| format!("{col} = {alias}.{col}"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "WITH {alias} ({block_col}, {cols}) AS (VALUES {rows}) \
             UPDATE {table} SET {assignments} FROM {alias} \
             WHERE {owner} AND {table}.{block_col} = {alias}.{block_col}",
            cols = slot_cols.join(", "),
            owner = owner_filter(d, target, Some(layout.table())),
        );
        vec![Statement::new(sql)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::test_util::*;

    #[test]
    fn one_statement_over_touched_columns() {
        let layout = layout();
        let writer = RowMergeWriter::new(Dialect::Postgres);
        let statements = writer.bulk_update(
            &target(&layout),
            &[patch(3, [9.0, 1.0, 2.0], 1..3), patch(4, [5.0, 6.0, 9.0], 0..2)],
        );
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].as_str(),
            "WITH \"blockframe_patch\" (\"block_index\", \"v_0\", \"v_1\", \"v_2\") \
             AS (VALUES (3, 9.0, 1.0, 2.0), (4, 5.0, 6.0, 9.0)) \
             UPDATE \"blocks\" SET \"v_0\" = \"blockframe_patch\".\"v_0\", \
             \"v_1\" = \"blockframe_patch\".\"v_1\", \"v_2\" = \"blockframe_patch\".\"v_2\" \
             FROM \"blockframe_patch\" \
             WHERE \"blocks\".\"owner_id\" = 7 AND \"blocks\".\"owner_type\" = 'Airport' \
             AND \"blocks\".\"block_index\" = \"blockframe_patch\".\"block_index\""
        );
    }

    #[test]
    fn untouched_columns_are_left_out() {
        let layout = layout();
        let writer = RowMergeWriter::new(Dialect::Sqlite);
        let statements = writer.bulk_update(&target(&layout), &[patch(0, [1.0, 2.0, 3.0], 1..2)]);
        let sql = statements[0].as_str();
        assert!(sql.contains("(\"block_index\", \"v_1\")"));
        assert!(sql.contains("VALUES (0, 2.0)"));
        assert!(!sql.contains("\"v_0\""));
        assert!(!sql.contains("\"v_2\""));
    }
}
