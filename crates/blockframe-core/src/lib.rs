//! Block-packed, period-indexed time series stored in SQL tables.
//!
//! A series is a conceptually infinite, default-valued sequence of values,
//! one per period of a fixed [`Resolution`]. Consecutive periods are packed
//! into fixed-width *blocks*, one row per block, keyed by
//! `(owner_id, owner_type, block_index)`:
//!
//! - [`period`] maps timestamps to periods and periods to block/slot
//!   coordinates.
//! - [`store`] rebuilds dense [`Sequence`]s from the sparse rows that exist.
//! - [`planner`] turns a range write into merge-update and insert patches.
//! - [`writer`] renders patches as bulk statements for the backend's
//!   [`Profile`].
//! - [`batch`] defers writes until the outermost batch scope exits.
//! - [`database`] ties these together behind [`Database`] and [`Frame`].
//!
//! The engine does not own connections; it drives a [`Backend`]. A SQLite
//! backend is included behind the default `sqlite` feature.
#![deny(missing_docs)]
pub mod backend;
pub mod batch;
pub mod database;
pub mod error;
pub mod layout;
pub mod period;
pub mod planner;
pub mod registry;
pub mod sequence;
pub mod store;
pub mod value;
pub mod writer;

pub use backend::{Backend, BackendError, Dialect, Profile, Statement};
pub use batch::{BatchSession, BatchState};
pub use database::{Database, Frame, SeriesConfig};
pub use error::{StoreError, StoreResult};
pub use layout::{BlockLayout, ColumnKind, ColumnSpec, LayoutError, Owner};
pub use period::{
    BlockIndex, BlockSpan, IndexerConfig, Period, PeriodError, PeriodIndexer, Resolution,
};
pub use sequence::Sequence;
pub use store::RangeBound;
pub use value::Value;
