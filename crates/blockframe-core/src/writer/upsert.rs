//! Profile B: one `INSERT` whose conflict clause overwrites every slot column.
//!
//! MySQL spells the clause `ON DUPLICATE KEY UPDATE c = VALUES(c)`; everything
//! else gets `ON CONFLICT (key) DO UPDATE SET c = excluded.c`.

use crate::{
    backend::{Dialect, Profile, Statement},
    layout::{BLOCK_INDEX_COLUMN, OWNER_ID_COLUMN, OWNER_TYPE_COLUMN},
    planner::BlockPatch,
};

use super::{BulkWriter, WriteTarget, insert_head, row_literals};

/// Upsert (`INSERT .. ON CONFLICT`) writer.
#[derive(Debug, Clone)]
pub struct UpsertWriter {
    dialect: Dialect,
}

impl UpsertWriter {
    /// Writer rendering for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn conflict_clause(&self, target: &WriteTarget<'_>) -> String {
        let d = &self.dialect;
        let columns = target.layout.columns().iter().map(|c| d.quote_ident(&c.name));
        match d {
            Dialect::MySql => format!(
                "ON DUPLICATE KEY UPDATE {}",
                columns
                    .map(|c| format!("{c} = VALUES({c})"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            _ => format!(
                "ON CONFLICT ({}, {}, {}) DO UPDATE SET {}",
                d.quote_ident(OWNER_ID_COLUMN),
                d.quote_ident(OWNER_TYPE_COLUMN),
                d.quote_ident(BLOCK_INDEX_COLUMN),
                columns
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl BulkWriter for UpsertWriter {
    fn profile(&self) -> Profile {
        Profile::Upsert
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn bulk_update(&self, target: &WriteTarget<'_>, patches: &[BlockPatch]) -> Vec<Statement> {
        if patches.is_empty() {
            return Vec::new();
        }
        let sql = format!(
            "{} VALUES {} {}",
            insert_head(&self.dialect, target.layout),
            row_literals(&self.dialect, target, patches),
            self.conflict_clause(target)
        );
        vec![Statement::new(sql)]
    }
}
