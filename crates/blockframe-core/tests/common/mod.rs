#![allow(dead_code)]

use blockframe_core::{
    BlockLayout, ColumnKind, Database, IndexerConfig, Profile, Resolution, SeriesConfig, Value,
    backend::sqlite::SqliteBackend,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Every bulk strategy, with and without multi-statement scripts.
pub const SETUPS: &[(Profile, bool)] = &[
    (Profile::RowMerge, true),
    (Profile::RowMerge, false),
    (Profile::Upsert, true),
    (Profile::Upsert, false),
    (Profile::CaseUpdate, true),
    (Profile::CaseUpdate, false),
];

pub fn open(profile: Profile, multi_statement: bool) -> Result<Database<SqliteBackend>, Box<dyn std::error::Error>> {
    let backend = SqliteBackend::open_in_memory()?
        .with_profile(profile)
        .with_multi_statement(multi_statement);
    Ok(Database::new(backend))
}

pub fn hourly(capacity: usize) -> Result<SeriesConfig, Box<dyn std::error::Error>> {
    let layout = BlockLayout::uniform("loads", "h", capacity, ColumnKind::Float, 0.0)?;
    Ok(SeriesConfig::new(layout, IndexerConfig::new(Resolution::HOURLY)))
}

/// Open a database for `profile` and create the table of `config`.
pub fn setup(
    profile: Profile,
    multi_statement: bool,
    config: &SeriesConfig,
) -> Result<Database<SqliteBackend>, Box<dyn std::error::Error>> {
    let db = open(profile, multi_statement)?;
    db.create_table(&config.layout)?;
    Ok(db)
}

pub fn floats(values: &[f64]) -> Vec<Value> {
    values.iter().copied().map(Value::Float).collect()
}

pub fn row_count(db: &Database<SqliteBackend>, table: &str) -> Result<i64, Box<dyn std::error::Error>> {
    let n = db
        .backend()
        .connection()
        .query_row(&format!("SELECT count(*) FROM \"{table}\""), [], |row| row.get(0))?;
    Ok(n)
}
