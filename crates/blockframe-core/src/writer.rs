//! Bulk persistence of planned patches.
//!
//! A [`BulkWriter`] renders a set of patches as the fewest statements its
//! [`Profile`] allows. The strategy is picked once, from the backend's
//! declared profile, when a series is registered:
//!
//! | Profile | Update statement(s) |
//! |---|---|
//! | [`Profile::RowMerge`] | one `UPDATE .. FROM` joined against a literal row set |
//! | [`Profile::Upsert`] | one `INSERT .. ON CONFLICT` overwriting every column |
//! | [`Profile::CaseUpdate`] | one `UPDATE .. CASE block_index` per touched column |
//!
//! Inserts and deletes do not depend on the profile: new blocks always go
//! through a single multi-row `INSERT`, removals through a single `DELETE`.
//! Empty inputs render no statement.

pub mod case_update;
pub mod literal;
pub mod row_merge;
pub mod upsert;

use std::fmt;

use crate::{
    backend::{Dialect, Profile, Statement},
    layout::{BLOCK_INDEX_COLUMN, BlockLayout, OWNER_ID_COLUMN, OWNER_TYPE_COLUMN},
    period::BlockIndex,
    planner::{BlockPatch, DeletePlan, WritePlan},
};

pub use case_update::CaseUpdateWriter;
pub use row_merge::RowMergeWriter;
pub use upsert::UpsertWriter;

/// Rows a write is aimed at: one layout, one owner.
#[derive(Debug, Clone, Copy)]
pub struct WriteTarget<'a> {
    /// Table layout.
    pub layout: &'a BlockLayout,
    /// Owner id.
    pub owner_id: i64,
    /// Owner type name.
    pub owner_type: &'a str,
}

/// Renders bulk update/insert/delete statements for one dialect.
pub trait BulkWriter: fmt::Debug + Send + Sync {
    /// Strategy implemented by this writer.
    fn profile(&self) -> Profile;

    /// Dialect statements are rendered for.
    fn dialect(&self) -> &Dialect;

    /// Overwrite the touched columns of existing rows.
    fn bulk_update(&self, target: &WriteTarget<'_>, patches: &[BlockPatch]) -> Vec<Statement>;

    /// Create new rows, one row literal per block.
    fn bulk_insert(&self, target: &WriteTarget<'_>, patches: &[BlockPatch]) -> Option<Statement> {
        if patches.is_empty() {
            return None;
        }
        let sql = format!(
            "{} VALUES {}",
            insert_head(self.dialect(), target.layout),
            row_literals(self.dialect(), target, patches)
        );
        Some(Statement::new(sql))
    }

    /// Remove whole blocks.
    fn bulk_delete(&self, target: &WriteTarget<'_>, block_indices: &[BlockIndex]) -> Option<Statement> {
        if block_indices.is_empty() {
            return None;
        }
        let d = self.dialect();
        let sql = format!(
            "DELETE FROM {} WHERE {} AND {} IN ({})",
            d.quote_ident(target.layout.table()),
            owner_filter(d, target, None),
            d.quote_ident(BLOCK_INDEX_COLUMN),
            join_indices(block_indices.iter().copied())
        );
        Some(Statement::new(sql))
    }
}

/// Writer implementing `profile` for `dialect`.
pub fn writer_for(profile: Profile, dialect: Dialect) -> Box<dyn BulkWriter> {
    match profile {
        Profile::RowMerge => Box::new(RowMergeWriter::new(dialect)),
        Profile::Upsert => Box::new(UpsertWriter::new(dialect)),
        Profile::CaseUpdate => Box::new(CaseUpdateWriter::new(dialect)),
    }
}

/// Statements persisting a whole write plan: updates first, then inserts.
pub fn render_write_plan(
    writer: &dyn BulkWriter,
    target: &WriteTarget<'_>,
    plan: &WritePlan,
) -> Vec<Statement> {
    let mut statements = writer.bulk_update(target, &plan.updates);
    statements.extend(writer.bulk_insert(target, &plan.inserts));
    statements
}

/// Statements persisting a delete plan.
pub fn render_delete_plan(
    writer: &dyn BulkWriter,
    target: &WriteTarget<'_>,
    plan: &DeletePlan,
) -> Vec<Statement> {
    writer
        .bulk_delete(target, &plan.block_indices)
        .into_iter()
        .collect()
}

/// Sorted union of the slots touched by `patches`.
pub(crate) fn touched_slots(capacity: usize, patches: &[BlockPatch]) -> Vec<usize> {
    let mut mask = vec![false; capacity];
    for patch in patches {
        for slot in patch.touched.clone() {
            mask[slot] = true;
        }
    }
    mask.iter()
        .enumerate()
        .filter_map(|(slot, touched)| touched.then_some(slot))
        .collect()
}

/// `INSERT INTO tbl (owner_id, owner_type, block_index, c0, ..)`
pub(crate) fn insert_head(d: &Dialect, layout: &BlockLayout) -> String {
    let columns = [OWNER_ID_COLUMN, OWNER_TYPE_COLUMN, BLOCK_INDEX_COLUMN]
        .into_iter()
        .chain(layout.columns().iter().map(|c| c.name.as_str()))
        .map(|name| d.quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({columns})", d.quote_ident(layout.table()))
}

/// `(owner_id, 'owner_type', block_index, v0, ..), ..`
pub(crate) fn row_literals(d: &Dialect, target: &WriteTarget<'_>, patches: &[BlockPatch]) -> String {
    let owner_type = literal::encode_text(target.owner_type, d);
    patches
        .iter()
        .map(|patch| {
            let mut cells = Vec::with_capacity(patch.values.len() + 3);
            cells.push(target.owner_id.to_string());
            cells.push(owner_type.clone());
            cells.push(patch.block_index.to_string());
            cells.extend(patch.values.iter().map(|v| literal::encode(v, d)));
            format!("({})", cells.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `tbl.owner_id = 1 AND tbl.owner_type = 'x'`, optionally table-qualified.
pub(crate) fn owner_filter(d: &Dialect, target: &WriteTarget<'_>, qualifier: Option<&str>) -> String {
    let col = |name: &str| match qualifier {
        Some(q) => format!("{}.{}", d.quote_ident(q), d.quote_ident(name)),
        None => d.quote_ident(name),
    };
    format!(
        "{} = {} AND {} = {}",
        col(OWNER_ID_COLUMN),
        target.owner_id,
        col(OWNER_TYPE_COLUMN),
        literal::encode_text(target.owner_type, d)
    )
}

pub(crate) fn join_indices(indices: impl Iterator<Item = BlockIndex>) -> String {
    indices
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::{layout::ColumnKind, value::Value};

    pub(crate) fn layout() -> BlockLayout {
        BlockLayout::uniform("blocks", "v", 3, ColumnKind::Float, 0.0).unwrap()
    }

    pub(crate) fn patch(block_index: BlockIndex, values: [f64; 3], touched: std::ops::Range<usize>) -> BlockPatch {
        BlockPatch {
            block_index,
            values: values.into_iter().map(Value::Float).collect(),
            touched,
        }
    }

    pub(crate) fn target(layout: &BlockLayout) -> WriteTarget<'_> {
        WriteTarget {
            layout,
            owner_id: 7,
            owner_type: "Airport",
        }
    }
}
