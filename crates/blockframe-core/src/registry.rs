//! Per-(table, owner type) series registry.
//!
//! Registering is idempotent: asking twice for the same key with the same
//! layout and time axis yields the same shared [`BlockSeries`]. Asking with a
//! different layout or axis is a conflict, since the table can only have one
//! shape.

use std::{cell::RefCell, collections::HashMap, sync::Arc};

use snafu::prelude::*;
use tracing::debug;

use crate::{
    backend::{Dialect, Profile},
    error::{RegistryConflictSnafu, StoreResult},
    layout::BlockLayout,
    period::{IndexerConfig, PeriodIndexer},
    writer::{BulkWriter, writer_for},
};

/// Registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    /// Block table.
    pub table: String,
    /// Owner type stored in the table.
    pub owner_type: String,
}

/// Everything needed to read and write one kind of series.
#[derive(Debug)]
pub struct BlockSeries {
    key: SeriesKey,
    layout: Arc<BlockLayout>,
    indexer: PeriodIndexer,
    writer: Box<dyn BulkWriter>,
}

impl BlockSeries {
    /// Registry key.
    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Table layout.
    pub fn layout(&self) -> &Arc<BlockLayout> {
        &self.layout
    }

    /// Time axis.
    pub fn indexer(&self) -> &PeriodIndexer {
        &self.indexer
    }

    /// Bulk writer chosen for the backend.
    pub fn writer(&self) -> &dyn BulkWriter {
        self.writer.as_ref()
    }
}

/// Memoized series, keyed by [`SeriesKey`].
#[derive(Debug, Default)]
pub struct SeriesRegistry {
    series: RefCell<HashMap<SeriesKey, Arc<BlockSeries>>>,
}

impl SeriesRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The series for `(layout.table, owner_type)`, registering it on first use.
    pub fn get_or_register(
        &self,
        layout: &BlockLayout,
        indexer: &IndexerConfig,
        owner_type: &str,
        profile: Profile,
        dialect: Dialect,
    ) -> StoreResult<Arc<BlockSeries>> {
        let key = SeriesKey {
            table: layout.table().to_string(),
            owner_type: owner_type.to_string(),
        };
        if let Some(existing) = self.series.borrow().get(&key) {
            ensure!(
                existing.layout.as_ref() == layout && existing.indexer.config() == indexer,
                RegistryConflictSnafu {
                    table: &key.table,
                    owner_type: &key.owner_type,
                }
            );
            return Ok(Arc::clone(existing));
        }

        debug!(table = %key.table, owner_type = %key.owner_type, %profile, "registering series");
        let series = Arc::new(BlockSeries {
            indexer: PeriodIndexer::new(indexer.clone(), layout.capacity()),
            layout: Arc::new(layout.clone()),
            writer: writer_for(profile, dialect),
            key: key.clone(),
        });
        self.series.borrow_mut().insert(key, Arc::clone(&series));
        Ok(series)
    }

    /// Number of registered series.
    pub fn len(&self) -> usize {
        self.series.borrow().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.series.borrow().is_empty()
    }
}
