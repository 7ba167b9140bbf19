// =============================================================================
// Series — timestamped values with gaps
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Candle;

/// One point of a series.  `value == None` marks an undefined entry
/// (window not yet full, zero variance, …).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Time-ordered series of observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series {
    points: Vec<Observation>,
}

impl Series {
    pub fn new(points: Vec<Observation>) -> Self {
        Self { points }
    }

    /// Fully defined series from `(timestamp, value)` pairs.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        Self {
            points: values
                .into_iter()
                .map(|(timestamp, v)| Observation {
                    timestamp,
                    value: Some(v),
                })
                .collect(),
        }
    }

    /// Close prices keyed by interval start.
    pub fn closes(candles: &[Candle]) -> Self {
        Self::from_values(candles.iter().map(|c| (c.interval_start, c.close)))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.points.iter()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().and_then(|p| p.value)
    }

    /// Defined values only, in order.
    pub fn defined(&self) -> Vec<f64> {
        self.points.iter().filter_map(|p| p.value).collect()
    }
}

/// A timestamp present and defined in both series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedPoint {
    pub timestamp: DateTime<Utc>,
    pub a: f64,
    pub b: f64,
}

/// Inner join on timestamp, keeping `a`'s order.  Timestamps missing (or
/// undefined) on either side are dropped.
pub fn align(a: &Series, b: &Series) -> Vec<AlignedPoint> {
    let lookup: HashMap<DateTime<Utc>, f64> = b
        .iter()
        .filter_map(|p| p.value.map(|v| (p.timestamp, v)))
        .collect();

    a.iter()
        .filter_map(|p| {
            let va = p.value?;
            let vb = *lookup.get(&p.timestamp)?;
            Some(AlignedPoint {
                timestamp: p.timestamp,
                a: va,
                b: vb,
            })
        })
        .collect()
}
