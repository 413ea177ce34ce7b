//! Dense read results.

use std::{ops::Index, sync::Arc};

use crate::{layout::BlockLayout, period::Period, value::Value};

/// Default-filled values for a contiguous period range.
///
/// Index `i` holds period `start + i`. Every position has a value: periods
/// with no stored block read as the default of the slot they map to.
#[derive(Debug, Clone)]
pub struct Sequence {
    start: Period,
    values: Vec<Value>,
    layout: Arc<BlockLayout>,
}

impl Sequence {
    pub(crate) fn new(start: Period, values: Vec<Value>, layout: Arc<BlockLayout>) -> Self {
        Self {
            start,
            values,
            layout,
        }
    }

    /// First period covered.
    pub fn start(&self) -> Period {
        self.start
    }

    /// Number of periods.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the sequence covers no period.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at position `i`.
    pub fn get(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    /// First value, i.e. the value at [`Sequence::start`].
    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    /// Iterate values in period order.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Values as a slice.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Take the values out.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Default that applies at position `i`.
    pub fn default_at(&self, i: usize) -> &Value {
        let capacity = self.layout.capacity() as i64;
        let slot = (self.start + i as i64).rem_euclid(capacity) as usize;
        self.layout.default_for_slot(slot)
    }

    /// `(position, value)` for every value that differs from its default.
    pub fn non_default(&self) -> Vec<(usize, &Value)> {
        self.values
            .iter()
            .enumerate()
            .filter(|(i, v)| *v != self.default_at(*i))
            .collect()
    }

    /// Positions holding a non-default value.
    pub fn non_default_indices(&self) -> Vec<usize> {
        self.non_default().into_iter().map(|(i, _)| i).collect()
    }

    /// Copy with float cells rounded to `digits` decimal places.
    pub fn round(&self, digits: u32) -> Sequence {
        Sequence {
            start: self.start,
            values: self.values.iter().map(|v| v.round(digits)).collect(),
            layout: Arc::clone(&self.layout),
        }
    }

    /// Numeric view; categorical and null cells become `NaN`.
    pub fn to_f64(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect()
    }
}

impl Index<usize> for Sequence {
    type Output = Value;

    fn index(&self, i: usize) -> &Value {
        &self.values[i]
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start && self.values == other.values
    }
}

impl PartialEq<[Value]> for Sequence {
    fn eq(&self, other: &[Value]) -> bool {
        self.values == other
    }
}

impl PartialEq<Vec<Value>> for Sequence {
    fn eq(&self, other: &Vec<Value>) -> bool {
        &self.values == other
    }
}

impl<const N: usize> PartialEq<[Value; N]> for Sequence {
    fn eq(&self, other: &[Value; N]) -> bool {
        self.values == other
    }
}
