//! Mapping between timestamps, periods and block/slot coordinates.
//!
//! Everything in this module is pure arithmetic over a fixed definition of the
//! time axis:
//!
//! - Period `0` starts at the configured epoch (the Unix epoch by default).
//! - Periods are contiguous, non-overlapping half-open intervals of
//!   [`Resolution::seconds`] each.
//! - A block holds `capacity` consecutive periods: `block_index = period / C`
//!   and `slot_offset = period mod C`.
//!
//! Wall-clock strings without an explicit offset (`2001-01-01`,
//! `2001-01-01 03:00`) are interpreted in the indexer's IANA timezone, so a
//! day-aligned range can span 23 or 25 hourly periods around DST changes.

pub mod resolution;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

pub use resolution::{ParseResolutionError, Resolution};

/// Index of a discrete time unit. Valid periods are `>= 0`.
pub type Period = i64;

/// Index of a block row (`period / capacity`).
pub type BlockIndex = i64;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Errors raised while converting between timestamps and periods.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PeriodError {
    /// A period (or a timestamp mapping to one) lies before the epoch.
    #[snafu(display("period {period} is negative; periods start at the epoch"))]
    Negative {
        /// The offending period.
        period: Period,
    },

    /// A period or timestamp computation overflowed.
    #[snafu(display("period arithmetic overflowed: {detail}"))]
    OutOfRange {
        /// What was being computed.
        detail: String,
    },

    /// The input string is not a recognized timestamp format.
    #[snafu(display(
        "cannot parse timestamp '{input}' (expected RFC 3339, YYYY-MM-DD or YYYY-MM-DD HH:MM[:SS])"
    ))]
    UnparseableTimestamp {
        /// The original input.
        input: String,
    },

    /// The wall-clock time does not exist in the configured timezone (DST gap).
    #[snafu(display("local time '{input}' does not exist in timezone {timezone}"))]
    NonexistentLocalTime {
        /// The original input.
        input: String,
        /// Name of the timezone used for interpretation.
        timezone: String,
    },
}

/// Serializable definition of the time axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Length of one period.
    #[serde(default)]
    pub resolution: Resolution,

    /// Start of period `0`.
    #[serde(default = "default_epoch")]
    pub epoch: DateTime<Utc>,

    /// Timezone used to interpret wall-clock strings that carry no offset.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn default_timezone() -> Tz {
    Tz::UTC
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            epoch: default_epoch(),
            timezone: default_timezone(),
        }
    }
}

impl IndexerConfig {
    /// Config with the given resolution, Unix epoch and UTC wall clock.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    /// Replace the wall-clock timezone.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Replace the epoch.
    pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }
}

/// The part of one block covered by a period range.
///
/// `first_slot..end_slot` is the half-open slot interval inside the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// Block row index.
    pub block_index: BlockIndex,
    /// First covered slot (inclusive).
    pub first_slot: usize,
    /// Last covered slot (exclusive).
    pub end_slot: usize,
}

impl BlockSpan {
    /// Number of slots covered.
    pub fn len(&self) -> usize {
        self.end_slot - self.first_slot
    }

    /// Whether the span covers no slot.
    pub fn is_empty(&self) -> bool {
        self.first_slot == self.end_slot
    }

    /// Whether the span covers the whole block.
    pub fn is_full(&self, capacity: usize) -> bool {
        self.first_slot == 0 && self.end_slot == capacity
    }
}

/// Converts timestamps into periods and periods into block coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodIndexer {
    config: IndexerConfig,
    capacity: i64,
}

impl PeriodIndexer {
    /// Build an indexer for blocks of `capacity` periods.
    ///
    /// `capacity` comes from a validated layout and is therefore non-zero.
    pub fn new(config: IndexerConfig, capacity: usize) -> Self {
        debug_assert!(capacity > 0, "block capacity must be positive");
        Self {
            config,
            capacity: capacity as i64,
        }
    }

    /// The time-axis definition.
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Number of periods per block.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Reject negative periods.
    pub fn check_period(&self, period: Period) -> Result<Period, PeriodError> {
        ensure!(period >= 0, NegativeSnafu { period });
        Ok(period)
    }

    /// Map an instant to its period: `floor((ts - epoch) / len)`.
    pub fn to_period(&self, ts: DateTime<Utc>) -> Result<Period, PeriodError> {
        let len = self.config.resolution.seconds();
        let secs = ts.signed_duration_since(self.config.epoch).num_seconds();
        self.check_period(secs.div_euclid(len))
    }

    /// Start instant of `period`.
    pub fn period_start(&self, period: Period) -> Result<DateTime<Utc>, PeriodError> {
        let secs = period
            .checked_mul(self.config.resolution.seconds())
            .context(OutOfRangeSnafu {
                detail: format!("start of period {period}"),
            })?;
        let delta = Duration::try_seconds(secs).context(OutOfRangeSnafu {
            detail: format!("{secs} seconds"),
        })?;
        self.config
            .epoch
            .checked_add_signed(delta)
            .context(OutOfRangeSnafu {
                detail: format!("start of period {period}"),
            })
    }

    /// Parse a timestamp string into an instant.
    ///
    /// RFC 3339 strings carry their own offset. Naive forms are wall-clock
    /// times in the configured timezone; ambiguous times (DST fall-back)
    /// resolve to the earlier instant.
    pub fn parse_timestamp(&self, input: &str) -> Result<DateTime<Utc>, PeriodError> {
        let trimmed = input.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(ts.with_timezone(&Utc));
        }

        let naive = NAIVE_DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .context(UnparseableTimestampSnafu { input })?;

        match self.config.timezone.from_local_datetime(&naive) {
            LocalResult::Single(ts) => Ok(ts.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => NonexistentLocalTimeSnafu {
                input,
                timezone: self.config.timezone.name(),
            }
            .fail(),
        }
    }

    /// Parse a timestamp string and map it to its period.
    pub fn period_of(&self, input: &str) -> Result<Period, PeriodError> {
        self.to_period(self.parse_timestamp(input)?)
    }

    /// Block row holding `period`.
    pub fn block_index(&self, period: Period) -> BlockIndex {
        period.div_euclid(self.capacity)
    }

    /// Slot of `period` inside its block.
    pub fn slot_offset(&self, period: Period) -> usize {
        period.rem_euclid(self.capacity) as usize
    }

    /// First period stored in `block_index`.
    pub fn block_start(&self, block_index: BlockIndex) -> Result<Period, PeriodError> {
        block_index
            .checked_mul(self.capacity)
            .context(OutOfRangeSnafu {
                detail: format!("start of block {block_index}"),
            })
    }

    /// Whether `period` is the first slot of a block.
    pub fn is_block_aligned(&self, period: Period) -> bool {
        period.rem_euclid(self.capacity) == 0
    }

    /// Ordered block spans covering `[start, end)`.
    ///
    /// The first and last spans may be partial; every span in between covers
    /// its whole block. Returns an empty list when `end <= start`.
    ///
    /// Fails when a covered block would end past the largest period.
    pub fn range_to_blocks(&self, start: Period, end: Period) -> Result<Vec<BlockSpan>, PeriodError> {
        let mut spans = Vec::new();
        let mut period = start;
        while period < end {
            let block_index = self.block_index(period);
            let block_start = self.block_start(block_index)?;
            let block_end = block_start
                .checked_add(self.capacity)
                .context(OutOfRangeSnafu {
                    detail: format!("end of block {block_index}"),
                })?;
            let stop = end.min(block_end);
            spans.push(BlockSpan {
                block_index,
                first_slot: (period - block_start) as usize,
                end_slot: (stop - block_start) as usize,
            });
            period = stop;
        }
        Ok(spans)
    }
}
