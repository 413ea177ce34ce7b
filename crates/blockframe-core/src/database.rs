//! User-facing surface: a [`Database`] over one backend, and [`Frame`]s bound
//! to one series and one owner.
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # fn demo() -> blockframe_core::StoreResult<()> {
//! use blockframe_core::{
//!     BlockLayout, ColumnKind, Database, IndexerConfig, Owner, RangeBound, Resolution,
//!     SeriesConfig, Value, backend::sqlite::SqliteBackend,
//! };
//!
//! let db = Database::new(SqliteBackend::open_in_memory()?);
//! let layout = BlockLayout::uniform("loads", "h", 24, ColumnKind::Float, 0.0)?;
//! db.create_table(&layout)?;
//!
//! let config = SeriesConfig::new(layout, IndexerConfig::new(Resolution::HOURLY));
//! let frame = db.frame(&config, &Owner::new(1, "Meter"))?;
//! db.with_batch(|| {
//!     frame.set_from("2024-01-01 00:00", &[Value::Float(1.5), Value::Float(2.5)])?;
//!     frame.set_from("2024-03-01", &[Value::Float(7.0)])
//! })?;
//! let day = frame.get_between("2024-01-01", "2024-01-02", RangeBound::Exclusive)?;
//! assert_eq!(day.len(), 24);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::debug;

use crate::{
    backend::{Backend, Profile, run_statements, with_transaction},
    batch::{BatchSession, FrameKey},
    error::{RangeSnafu, StoreResult},
    layout::{BlockLayout, Owner},
    period::{IndexerConfig, Period, PeriodIndexer},
    planner::{check_value_count, plan_delete, plan_set},
    registry::{BlockSeries, SeriesRegistry},
    sequence::Sequence,
    store::{RangeBound, effective_end, fetch_spans, reconstruct},
    value::Value,
    writer::{WriteTarget, render_delete_plan, render_write_plan},
};

/// Layout plus time axis; the content of a series config file.
///
/// ```json
/// {
///   "layout": { "table": "loads", "capacity": 2, "columns": [
///     { "name": "h_0", "kind": "float" }, { "name": "h_1", "kind": "float" } ] },
///   "indexer": { "resolution": "1h", "timezone": "Pacific/Auckland" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Block table layout.
    pub layout: BlockLayout,
    /// Time axis.
    #[serde(default)]
    pub indexer: IndexerConfig,
}

impl SeriesConfig {
    /// Bundle a layout and a time axis.
    pub fn new(layout: BlockLayout, indexer: IndexerConfig) -> Self {
        Self { layout, indexer }
    }
}

/// Block storage over one backend.
///
/// Holds the series registry and the batch session, so it is meant to be
/// used from one worker at a time.
#[derive(Debug)]
pub struct Database<B> {
    backend: B,
    registry: SeriesRegistry,
    batch: BatchSession,
}

impl<B: Backend> Database<B> {
    /// Wrap `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: SeriesRegistry::new(),
            batch: BatchSession::new(),
        }
    }

    /// Underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Give the backend back.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Bulk update profile in use.
    pub fn profile(&self) -> Profile {
        self.backend.profile()
    }

    /// Batch session of this database.
    pub fn batch_session(&self) -> &BatchSession {
        &self.batch
    }

    /// Registered series.
    pub fn registry(&self) -> &SeriesRegistry {
        &self.registry
    }

    /// Create the block table for `layout` if it does not exist.
    pub fn create_table(&self, layout: &BlockLayout) -> StoreResult<()> {
        let sql = layout.create_table_sql(&self.backend.dialect());
        debug!(table = layout.table(), "creating block table");
        self.backend.execute(&sql)?;
        Ok(())
    }

    /// A frame over `config`'s series for `owner`.
    pub fn frame(&self, config: &SeriesConfig, owner: &Owner) -> StoreResult<Frame<'_, B>> {
        let series = self.registry.get_or_register(
            &config.layout,
            &config.indexer,
            &owner.type_name,
            self.backend.profile(),
            self.backend.dialect(),
        )?;
        let key = FrameKey {
            table: config.layout.table().to_string(),
            owner_type: owner.type_name.clone(),
            owner_id: owner.id,
        };
        Ok(Frame {
            db: self,
            series,
            owner: owner.clone(),
            key,
        })
    }

    /// Run `body` with every write buffered, flushing once when the
    /// outermost batch exits.
    ///
    /// See [`BatchSession::scope`] for the failure rules.
    pub fn with_batch<T>(&self, body: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
        self.batch.scope(&self.backend, body)
    }
}

/// One owner's view of one series.
#[derive(Debug)]
pub struct Frame<'a, B> {
    db: &'a Database<B>,
    series: Arc<BlockSeries>,
    owner: Owner,
    key: FrameKey,
}

impl<B: Backend> Frame<'_, B> {
    /// Owner of the rows.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Registered series.
    pub fn series(&self) -> &BlockSeries {
        &self.series
    }

    /// Time axis.
    pub fn indexer(&self) -> &PeriodIndexer {
        self.series.indexer()
    }

    /// Period containing the timestamp `input`.
    pub fn period(&self, input: &str) -> StoreResult<Period> {
        Ok(self.indexer().period_of(input)?)
    }

    fn target(&self) -> WriteTarget<'_> {
        WriteTarget {
            layout: self.series.layout(),
            owner_id: self.owner.id,
            owner_type: &self.owner.type_name,
        }
    }

    /// Values for `[start, end)` or `[start, end]`, default-filled.
    pub fn get_range(&self, start: Period, end: Period, bound: RangeBound) -> StoreResult<Sequence> {
        let end = effective_end(start, end, bound)?;
        self.indexer().check_period(start)?;
        let spans = self.indexer().range_to_blocks(start, end)?;
        let target = self.target();
        let mut blocks = fetch_spans(&self.db.backend, &target, &spans)?;
        if let (true, Some(first), Some(last)) = (self.db.batch.is_active(), spans.first(), spans.last()) {
            self.db
                .batch
                .overlay(&self.key, first.block_index, last.block_index, &mut blocks);
        }
        Ok(reconstruct(Arc::clone(self.series.layout()), start, &spans, &blocks))
    }

    /// Value of one period.
    pub fn get_at(&self, period: Period) -> StoreResult<Value> {
        let seq = self.get_range(period, period, RangeBound::Inclusive)?;
        Ok(seq.into_values().into_iter().next().unwrap_or(Value::Null))
    }

    /// Values between two timestamps.
    pub fn get_between(&self, start: &str, end: &str, bound: RangeBound) -> StoreResult<Sequence> {
        self.get_range(self.period(start)?, self.period(end)?, bound)
    }

    /// Value of the period containing `timestamp`.
    pub fn get_at_time(&self, timestamp: &str) -> StoreResult<Value> {
        self.get_at(self.period(timestamp)?)
    }

    /// Write `values` to `[start, end)`.
    ///
    /// Existing blocks keep their untouched slots; missing blocks are created
    /// with defaults around the written slots.
    pub fn set_range(&self, start: Period, end: Period, values: &[Value]) -> StoreResult<()> {
        ensure!(end >= start, RangeSnafu { start, end });
        self.indexer().check_period(start)?;
        check_value_count(start, end, values.len())?;
        if start == end {
            return Ok(());
        }

        let series = &self.series;
        let spans = series.indexer().range_to_blocks(start, end)?;
        let target = self.target();
        let batch = &self.db.batch;

        if batch.is_active() {
            let mut existing = fetch_spans(&self.db.backend, &target, &spans)?;
            if let (Some(first), Some(last)) = (spans.first(), spans.last()) {
                batch.overlay(&self.key, first.block_index, last.block_index, &mut existing);
            }
            let plan = plan_set(series.layout(), series.indexer(), start, end, values, &existing)?;
            let statements = render_write_plan(series.writer(), &target, &plan);
            debug!(
                table = series.layout().table(),
                owner_id = self.owner.id,
                blocks = plan.block_count(),
                statements = statements.len(),
                "buffered write"
            );
            batch.record_rows(&self.key, plan.patches());
            batch.enqueue(statements);
            return Ok(());
        }

        with_transaction(&self.db.backend, |backend| {
            let existing = fetch_spans(backend, &target, &spans)?;
            let plan = plan_set(series.layout(), series.indexer(), start, end, values, &existing)?;
            let statements = render_write_plan(series.writer(), &target, &plan);
            debug!(
                table = series.layout().table(),
                owner_id = self.owner.id,
                updates = plan.updates.len(),
                inserts = plan.inserts.len(),
                statements = statements.len(),
                "write"
            );
            run_statements(backend, &statements)?;
            Ok(())
        })
    }

    /// Write one value.
    pub fn set_at(&self, period: Period, value: impl Into<Value>) -> StoreResult<()> {
        let end = period.checked_add(1).context(RangeSnafu {
            start: period,
            end: period,
        })?;
        self.set_range(period, end, &[value.into()])
    }

    /// Write `values` starting at the period containing `start`.
    pub fn set_from(&self, start: &str, values: &[Value]) -> StoreResult<()> {
        let start = self.period(start)?;
        let end = i64::try_from(values.len())
            .ok()
            .and_then(|len| start.checked_add(len))
            .context(RangeSnafu { start, end: start })?;
        self.set_range(start, end, values)
    }

    /// Remove the whole blocks covering `[start, end)`.
    ///
    /// Both ends must be block-aligned.
    pub fn delete_periods(&self, start: Period, end: Period) -> StoreResult<()> {
        ensure!(end >= start, RangeSnafu { start, end });
        self.indexer().check_period(start)?;
        let plan = plan_delete(self.indexer(), start, end)?;
        if plan.block_indices.is_empty() {
            return Ok(());
        }

        let target = self.target();
        let statements = render_delete_plan(self.series.writer(), &target, &plan);
        debug!(
            table = target.layout.table(),
            owner_id = self.owner.id,
            blocks = plan.block_indices.len(),
            "delete"
        );
        let batch = &self.db.batch;
        if batch.is_active() {
            batch.record_deleted(&self.key, &plan.block_indices);
            batch.enqueue(statements);
            return Ok(());
        }
        with_transaction(&self.db.backend, |backend| {
            run_statements(backend, &statements)?;
            Ok(())
        })
    }
}
