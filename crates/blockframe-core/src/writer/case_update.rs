//! Profile C: plain `UPDATE`s that any SQL database accepts.
//!
//! One statement per touched column:
//!
//! ```sql
//! UPDATE "blocks" SET "v_1" = CASE "block_index" WHEN 3 THEN 1.0 WHEN 4 THEN 6.0 ELSE "v_1" END
//! WHERE "owner_id" = 7 AND "owner_type" = 'Airport' AND "block_index" IN (3, 4)
//! ```
//!
//! This profile can only modify rows; new blocks go through the shared bulk
//! insert.

use crate::{
    backend::{Dialect, Profile, Statement},
    layout::BLOCK_INDEX_COLUMN,
    planner::BlockPatch,
};

use super::{BulkWriter, WriteTarget, join_indices, literal, owner_filter, touched_slots};

/// `CASE`-based fallback writer.
#[derive(Debug, Clone)]
pub struct CaseUpdateWriter {
    dialect: Dialect,
}

impl CaseUpdateWriter {
    /// Writer rendering for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl BulkWriter for CaseUpdateWriter {
    fn profile(&self) -> Profile {
        Profile::CaseUpdate
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn bulk_update(&self, target: &WriteTarget<'_>, patches: &[BlockPatch]) -> Vec<Statement> {
        let d = &self.dialect;
        let layout = target.layout;
        let table = d.quote_ident(layout.table());
        let block_col = d.quote_ident(BLOCK_INDEX_COLUMN);
        let owner = owner_filter(d, target, None);

        touched_slots(layout.capacity(), patches)
            .into_iter()
            .map(|slot| {
                let column = d.quote_ident(&layout.column_for_slot(slot).name);
                let hits: Vec<&BlockPatch> = patches
                    .iter()
                    .filter(|p| p.touched.contains(&slot))
                    .collect();
                let arms = hits
                    .iter()
                    .map(|p| format!("WHEN {} THEN {}", p.block_index, literal::encode(&p.values[slot], d)))
                    .collect::<Vec<_>>()
                    .join(" ");
                Statement::new(format!(
                    "UPDATE {table} SET {column} = CASE {block_col} {arms} ELSE {column} END \
                     WHERE {owner} AND {block_col} IN ({})",
                    join_indices(hits.iter().map(|p| p.block_index))
                ))
            })
            .collect()
    }
}
