//! Domain types shared across the workspace.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lower bound for a cycle value.
pub const CYCLE_MIN: f64 = -1.0;
/// Upper bound for a cycle value.
pub const CYCLE_MAX: f64 = 1.0;

/// A person record as served by `GET /people/{id}`.
///
/// Immutable once fetched; a refetch replaces the record wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
}

/// One sampled day of the three cycles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BiorhythmPoint {
    pub date: NaiveDate,
    pub physical: f64,
    pub emotional: f64,
    pub intellectual: f64,
}

impl BiorhythmPoint {
    /// True when all three cycle values are finite and inside [-1.0, 1.0].
    pub fn in_range(&self) -> bool {
        [self.physical, self.emotional, self.intellectual]
            .iter()
            .all(|v| v.is_finite() && (CYCLE_MIN..=CYCLE_MAX).contains(v))
    }
}

/// An ordered series of points, strictly increasing by date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiorhythmSeries {
    pub person_id: u64,
    pub points: Vec<BiorhythmPoint>,
}

impl BiorhythmSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Acknowledgement for a triggered remote recalculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationAck {
    #[serde(default)]
    pub calculation_id: Option<u64>,
    #[serde(default)]
    pub data_points_created: u64,
}

/// API identity record from `GET /`, used for connectivity checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub api_name: String,
    #[serde(default)]
    pub version: String,
}
