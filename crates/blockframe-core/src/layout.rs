//! Declared physical layout of a block table.
//!
//! One block row is `{owner_id, owner_type, block_index, slot_0 .. slot_{C-1}}`
//! and is unique on `(owner_id, owner_type, block_index)`. Slot `k` of a block
//! is stored in declared column `k`; that 1:1 mapping is only relied upon
//! through [`BlockLayout::column_for_slot`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{backend::Dialect, value::Value};

/// Column holding the owner id.
pub const OWNER_ID_COLUMN: &str = "owner_id";
/// Column holding the owner type name.
pub const OWNER_TYPE_COLUMN: &str = "owner_type";
/// Column holding the block index.
pub const BLOCK_INDEX_COLUMN: &str = "block_index";

const KEY_COLUMNS: [&str; 3] = [OWNER_ID_COLUMN, OWNER_TYPE_COLUMN, BLOCK_INDEX_COLUMN];
const MAX_IDENTIFIER_LEN: usize = 63;

/// Errors raised while validating a declared layout.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum LayoutError {
    /// Block capacity must be at least one period.
    #[snafu(display("block capacity must be > 0"))]
    ZeroCapacity,

    /// The number of declared columns differs from the block capacity.
    #[snafu(display("layout declares {columns} columns for a block capacity of {capacity}"))]
    CapacityMismatch {
        /// Declared capacity.
        capacity: usize,
        /// Number of declared columns.
        columns: usize,
    },

    /// A table or column name is not a plain SQL identifier.
    #[snafu(display("'{name}' is not a valid identifier (letters, digits, '_'; at most 63 chars)"))]
    InvalidIdentifier {
        /// The rejected name.
        name: String,
    },

    /// A slot column collides with another column.
    #[snafu(display("column '{name}' is declared more than once or shadows a key column"))]
    DuplicateColumn {
        /// The duplicated name.
        name: String,
    },

    /// A declared default does not fit its column kind.
    #[snafu(display("default {default:?} does not fit {kind:?} column '{column}'"))]
    DefaultKind {
        /// Column name.
        column: String,
        /// Column kind.
        kind: ColumnKind,
        /// Offending default.
        default: String,
    },
}

/// Opaque identity a value sequence belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// Owner id.
    pub id: i64,
    /// Owner type name; lets many owner types share one table.
    pub type_name: String,
}

impl Owner {
    /// Create an owner identity.
    pub fn new(id: i64, type_name: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
        }
    }
}

/// Value domain of a slot column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Double precision numbers; integers are widened on write.
    Float,
    /// 64-bit integers.
    Integer,
    /// Short text symbols.
    Categorical,
}

impl ColumnKind {
    /// Default used when a column declares none.
    pub fn zero(&self) -> Value {
        match self {
            ColumnKind::Float => Value::Float(0.0),
            ColumnKind::Integer => Value::Int(0),
            ColumnKind::Categorical => Value::Text(String::new()),
        }
    }

    /// Convert `value` into this column's domain, or `None` if it does not fit.
    ///
    /// `Null` fits every kind.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => Some(Value::Null),
            (ColumnKind::Float, Value::Float(v)) => Some(Value::Float(v)),
            (ColumnKind::Float, Value::Int(v)) => Some(Value::Float(v as f64)),
            (ColumnKind::Integer, Value::Int(v)) => Some(Value::Int(v)),
            (ColumnKind::Integer, Value::Float(v)) if v.fract() == 0.0 && v.is_finite() => {
                Some(Value::Int(v as i64))
            }
            (ColumnKind::Categorical, Value::Text(s)) => Some(Value::Text(s)),
            _ => None,
        }
    }

    fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Float => "DOUBLE PRECISION",
            ColumnKind::Integer => "BIGINT",
            ColumnKind::Categorical => "VARCHAR(255)",
        }
    }
}

/// One declared slot column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Value domain.
    pub kind: ColumnKind,
    /// Value returned for periods that were never written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ColumnSpec {
    /// A column defaulting to its kind's zero value.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    /// Set an explicit default.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// The value unread periods resolve to.
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or_else(|| self.kind.zero())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LayoutDef {
    table: String,
    capacity: usize,
    columns: Vec<ColumnSpec>,
}

/// Validated block table layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LayoutDef", into = "LayoutDef")]
pub struct BlockLayout {
    table: String,
    capacity: usize,
    columns: Vec<ColumnSpec>,
    defaults: Vec<Value>,
}

impl BlockLayout {
    /// Validate and build a layout.
    ///
    /// Fails when `columns.len() != capacity`, when any name is not a plain
    /// identifier, when names collide, or when a default does not fit its
    /// column.
    pub fn new(
        table: impl Into<String>,
        capacity: usize,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self, LayoutError> {
        let table = table.into();
        ensure!(capacity > 0, ZeroCapacitySnafu);
        ensure!(
            columns.len() == capacity,
            CapacityMismatchSnafu {
                capacity,
                columns: columns.len(),
            }
        );
        check_identifier(&table)?;

        let mut seen: HashSet<&str> = KEY_COLUMNS.into_iter().collect();
        let mut defaults = Vec::with_capacity(capacity);
        for column in &columns {
            check_identifier(&column.name)?;
            ensure!(
                seen.insert(column.name.as_str()),
                DuplicateColumnSnafu { name: &column.name }
            );
            let default = column.default_value();
            let fitted = column.kind.coerce(default.clone()).context(DefaultKindSnafu {
                column: &column.name,
                kind: column.kind,
                default: default.to_string(),
            })?;
            defaults.push(fitted);
        }

        Ok(Self {
            table,
            capacity,
            columns,
            defaults,
        })
    }

    /// Layout whose columns are `{prefix}_0 .. {prefix}_{capacity-1}`, all of
    /// one kind and default.
    pub fn uniform(
        table: impl Into<String>,
        prefix: &str,
        capacity: usize,
        kind: ColumnKind,
        default: impl Into<Value>,
    ) -> Result<Self, LayoutError> {
        let default = default.into();
        let columns = (0..capacity)
            .map(|slot| ColumnSpec::new(format!("{prefix}_{slot}"), kind).with_default(default.clone()))
            .collect();
        Self::new(table, capacity, columns)
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Periods per block.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Declared slot columns in slot order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Column storing slot `offset`.
    pub fn column_for_slot(&self, offset: usize) -> &ColumnSpec {
        &self.columns[offset]
    }

    /// Default for slot `offset`.
    pub fn default_for_slot(&self, offset: usize) -> &Value {
        &self.defaults[offset]
    }

    /// A fresh block row filled with defaults.
    pub fn default_row(&self) -> Vec<Value> {
        self.defaults.clone()
    }

    /// `CREATE TABLE IF NOT EXISTS` for this layout.
    ///
    /// Only meant for bootstrapping tests and scratch databases; schema
    /// evolution is the caller's job.
    pub fn create_table_sql(&self, dialect: &Dialect) -> String {
        let q = |name: &str| dialect.quote_ident(name);
        let mut columns = vec![
            format!("{} BIGINT NOT NULL", q(OWNER_ID_COLUMN)),
            format!("{} VARCHAR(255) NOT NULL", q(OWNER_TYPE_COLUMN)),
            format!("{} BIGINT NOT NULL", q(BLOCK_INDEX_COLUMN)),
        ];
        columns.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", q(&c.name), c.kind.sql_type())),
        );
        columns.push(format!(
            "PRIMARY KEY ({}, {}, {})",
            q(OWNER_ID_COLUMN),
            q(OWNER_TYPE_COLUMN),
            q(BLOCK_INDEX_COLUMN)
        ));
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            q(&self.table),
            columns.join(", ")
        )
    }
}

impl TryFrom<LayoutDef> for BlockLayout {
    type Error = LayoutError;

    fn try_from(def: LayoutDef) -> Result<Self, Self::Error> {
        BlockLayout::new(def.table, def.capacity, def.columns)
    }
}

impl From<BlockLayout> for LayoutDef {
    fn from(layout: BlockLayout) -> Self {
        LayoutDef {
            table: layout.table,
            capacity: layout.capacity,
            columns: layout.columns,
        }
    }
}

fn check_identifier(name: &str) -> Result<(), LayoutError> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_IDENTIFIER_LEN
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    ensure!(valid, InvalidIdentifierSnafu { name });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_must_match_column_count() {
        let columns = vec![ColumnSpec::new("a", ColumnKind::Float)];
        assert_eq!(
            BlockLayout::new("t", 2, columns),
            Err(LayoutError::CapacityMismatch {
                capacity: 2,
                columns: 1
            })
        );
        assert_eq!(
            BlockLayout::new("t", 0, vec![]),
            Err(LayoutError::ZeroCapacity)
        );
    }

    #[test]
    fn identifiers_are_validated() {
        let bad_table = BlockLayout::uniform("t; DROP", "c", 2, ColumnKind::Float, 0.0);
        assert!(matches!(bad_table, Err(LayoutError::InvalidIdentifier { .. })));

        let bad_column = BlockLayout::new(
            "t",
            1,
            vec![ColumnSpec::new("1st", ColumnKind::Float)],
        );
        assert!(matches!(bad_column, Err(LayoutError::InvalidIdentifier { .. })));
    }

    #[test]
    fn key_columns_cannot_be_shadowed() {
        let layout = BlockLayout::new(
            "t",
            2,
            vec![
                ColumnSpec::new("a", ColumnKind::Float),
                ColumnSpec::new("block_index", ColumnKind::Float),
            ],
        );
        assert!(matches!(layout, Err(LayoutError::DuplicateColumn { .. })));
    }

    #[test]
    fn defaults_are_fitted_to_kind() {
        let layout = BlockLayout::new(
            "status_blocks",
            3,
            vec![
                ColumnSpec::new("s0", ColumnKind::Categorical).with_default("normal"),
                ColumnSpec::new("s1", ColumnKind::Float).with_default(1),
                ColumnSpec::new("s2", ColumnKind::Integer),
            ],
        )
        .unwrap();
        assert_eq!(layout.default_for_slot(0), &Value::from("normal"));
        assert_eq!(layout.default_for_slot(1), &Value::Float(1.0));
        assert_eq!(layout.default_for_slot(2), &Value::Int(0));

        let bad = BlockLayout::new(
            "t",
            1,
            vec![ColumnSpec::new("a", ColumnKind::Integer).with_default("x")],
        );
        assert!(matches!(bad, Err(LayoutError::DefaultKind { .. })));
    }

    #[test]
    fn coerce_by_kind() {
        assert_eq!(ColumnKind::Float.coerce(Value::Int(2)), Some(Value::Float(2.0)));
        assert_eq!(ColumnKind::Integer.coerce(Value::Float(2.0)), Some(Value::Int(2)));
        assert_eq!(ColumnKind::Integer.coerce(Value::Float(2.5)), None);
        assert_eq!(ColumnKind::Categorical.coerce(Value::Int(1)), None);
        assert_eq!(ColumnKind::Float.coerce(Value::Null), Some(Value::Null));
    }

    #[test]
    fn layout_deserializes_through_validation() {
        let json = r#"{
            "table": "temperature_blocks",
            "capacity": 2,
            "columns": [
                {"name": "t1", "kind": "float"},
                {"name": "t2", "kind": "float", "default": 0.5}
            ]
        }"#;
        let layout: BlockLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.capacity(), 2);
        assert_eq!(layout.default_row(), vec![Value::Float(0.0), Value::Float(0.5)]);

        let mismatched = r#"{"table": "t", "capacity": 3, "columns": [{"name": "a", "kind": "float"}]}"#;
        assert!(serde_json::from_str::<BlockLayout>(mismatched).is_err());
    }

    #[test]
    fn create_table_sql_declares_composite_key() {
        let layout = BlockLayout::uniform("blocks", "v", 2, ColumnKind::Float, 0.0).unwrap();
        let sql = layout.create_table_sql(&Dialect::Sqlite);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"blocks\" (\"owner_id\" BIGINT NOT NULL, \
             \"owner_type\" VARCHAR(255) NOT NULL, \"block_index\" BIGINT NOT NULL, \
             \"v_0\" DOUBLE PRECISION, \"v_1\" DOUBLE PRECISION, \
             PRIMARY KEY (\"owner_id\", \"owner_type\", \"block_index\"))"
        );
    }
}
