//! Period resolution: how long one period lasts.
//!
//! A [`Resolution`] is written in the same short form everywhere (config files,
//! CLI flags, logs): a positive integer followed by a unit suffix, for example
//! `1h`, `15m`, `30s` or `1d`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Why a resolution string was rejected.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseResolutionError {
    /// Not a count followed by a unit.
    #[snafu(display("resolution '{input}' must be a count followed by a unit, like 15m"))]
    Malformed {
        /// The rejected input.
        input: String,
    },

    /// The count was zero.
    #[snafu(display("resolution '{input}' has zero length"))]
    ZeroLength {
        /// The rejected input.
        input: String,
    },

    /// The count does not fit in 32 bits.
    #[snafu(display("resolution count in '{input}' is too large"))]
    TooLong {
        /// The rejected input.
        input: String,
    },

    /// The unit is not seconds, minutes, hours or days.
    #[snafu(display("unknown unit '{unit}' in resolution '{input}' (expected s, m, h or d)"))]
    UnknownUnit {
        /// The rejected input.
        input: String,
        /// The unit as written.
        unit: String,
    },
}

/// Length of a single period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    /// A period spanning a fixed number of seconds.
    Seconds(u32),
    /// A period spanning a fixed number of minutes.
    Minutes(u32),
    /// A period spanning a fixed number of hours.
    Hours(u32),
    /// A period spanning a fixed number of days.
    Days(u32),
}

impl Resolution {
    /// One period per hour, the most common layout for dense sensor data.
    pub const HOURLY: Resolution = Resolution::Hours(1);

    /// Shorthand for `input.parse()`.
    pub fn parse(input: &str) -> Result<Self, ParseResolutionError> {
        input.parse()
    }

    /// Period length in whole seconds.
    pub fn seconds(&self) -> i64 {
        let (count, unit_seconds) = match *self {
            Resolution::Seconds(n) => (n, 1),
            Resolution::Minutes(n) => (n, 60),
            Resolution::Hours(n) => (n, 3_600),
            Resolution::Days(n) => (n, 86_400),
        };
        i64::from(count) * unit_seconds
    }
}

/// Variant constructor for a unit name, case-insensitive.
fn unit_constructor(unit: &str) -> Option<fn(u32) -> Resolution> {
    let make: fn(u32) -> Resolution = match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => Resolution::Seconds,
        "m" | "min" | "mins" | "minute" | "minutes" => Resolution::Minutes,
        "h" | "hr" | "hrs" | "hour" | "hours" => Resolution::Hours,
        "d" | "day" | "days" => Resolution::Days,
        _ => return None,
    };
    Some(make)
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::HOURLY
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Seconds(n) => write!(f, "{n}s"),
            Resolution::Minutes(n) => write!(f, "{n}m"),
            Resolution::Hours(n) => write!(f, "{n}h"),
            Resolution::Days(n) => write!(f, "{n}d"),
        }
    }
}

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    /// Whitespace is ignored, so `15 min` and `15min` are the same.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let digits = compact.bytes().take_while(u8::is_ascii_digit).count();
        let (count, unit) = compact.split_at(digits);
        ensure!(!count.is_empty() && !unit.is_empty(), MalformedSnafu { input });

        let make = unit_constructor(unit).context(UnknownUnitSnafu { input, unit })?;
        // Only digits remain, so a parse failure is an overflow.
        let count: u32 = count.parse().ok().context(TooLongSnafu { input })?;
        ensure!(count > 0, ZeroLengthSnafu { input });
        Ok(make(count))
    }
}

impl TryFrom<String> for Resolution {
    type Error = ParseResolutionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}
