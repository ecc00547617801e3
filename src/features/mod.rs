//! Feature engineering for demand forecasting
//!
//! Turns daily observations into numeric vectors:
//! - Calendar encodings (raw, seasonal flags, cyclic sin/cos)
//! - Room type code
//! - Lagged occupancy (1, 7, 14, 30 days by default)
//! - Trailing rolling mean/variance of occupancy (7 and 30 days by default)
//!
//! The same encoding path serves training and recursive forecasting, see
//! [`FeatureBuilder::vector_for`].

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;

use crate::error::{Result, RevenueError};
use crate::types::Observation;


/// Calendar feature names, in schema order
pub const CALENDAR_FEATURES: [&str; 11] = [
    "month",
    "day_of_week",
    "week_of_year",
    "is_weekend",
    "is_summer",
    "is_winter",
    "day_sin",
    "day_cos",
    "month_sin",
    "month_cos",
    "has_special_event",
];

/// Feature builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Lag offsets in days
    pub lags: Vec<u32>,
    /// Trailing window sizes in days
    pub rolling_windows: Vec<u32>,
    /// Minimum observations per room type
    pub min_observations: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 7, 14, 30],
            rolling_windows: vec![7, 30],
            min_observations: 14,
        }
    }
}

impl FeatureConfig {
    /// A lag or window of 0 days would read the target itself
    pub fn validate(&self) -> Result<()> {
        if self.lags.contains(&0) || self.rolling_windows.contains(&0) {
            return Err(RevenueError::Config(
                "feature lags and rolling windows must be at least 1 day".to_string(),
            ));
        }
        if self.min_observations == 0 {
            return Err(RevenueError::Config(
                "features.min_observations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ordered feature layout plus the room type encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub names: Vec<String>,
    /// Sorted room type categories; the code of a room type is its index
    pub room_types: Vec<String>,
    pub lags: Vec<u32>,
    pub windows: Vec<u32>,
}

impl FeatureSchema {
    pub fn new(mut room_types: Vec<String>, lags: &[u32], windows: &[u32]) -> Self {
        room_types.sort();
        room_types.dedup();

        let mut names: Vec<String> = CALENDAR_FEATURES.iter().map(|n| n.to_string()).collect();
        names.push("room_type".to_string());
        names.extend(lags.iter().map(|k| format!("occupancy_lag_{}", k)));
        for w in windows {
            names.push(format!("occupancy_mean_{}", w));
            names.push(format!("occupancy_var_{}", w));
        }

        Self {
            names,
            room_types,
            lags: lags.to_vec(),
            windows: windows.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn room_code(&self, room_type: &str) -> Option<usize> {
        self.room_types.binary_search_by(|r| r.as_str().cmp(room_type)).ok()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Names match the calendar, lag and window layout
    pub fn is_consistent(&self) -> bool {
        self.names.len() == CALENDAR_FEATURES.len() + 1 + self.lags.len() + 2 * self.windows.len()
    }
}

/// Encoded observation
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub date: NaiveDate,
    pub room_type: String,
    /// Values in schema order
    pub values: Vec<f64>,
    /// Observed occupancy (regression target)
    pub target: f64,
}

/// Builds feature vectors from observation history
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Schema covering every room type present in `observations`
    pub fn schema_for(&self, observations: &[Observation]) -> FeatureSchema {
        FeatureSchema::new(
            observations.iter().map(|o| o.room_type.clone()).collect(),
            &self.config.lags,
            &self.config.rolling_windows,
        )
    }

    /// Build one vector per observation, in input order
    pub fn build(&self, observations: &[Observation], as_of: NaiveDate) -> Result<Vec<FeatureVector>> {
        let schema = self.schema_for(observations);
        self.build_with_schema(observations, as_of, &schema)
    }

    /// Build against an existing schema
    pub fn build_with_schema(
        &self,
        observations: &[Observation],
        as_of: NaiveDate,
        schema: &FeatureSchema,
    ) -> Result<Vec<FeatureVector>> {
        self.config.validate()?;
        if observations.is_empty() {
            return Ok(Vec::new());
        }

        let histories = self.index_history(observations, as_of)?;

        for (room_type, history) in &histories {
            if history.len() < self.config.min_observations {
                return Err(RevenueError::Validation(format!(
                    "room type {} has {} observations, need at least {} for lag features",
                    room_type,
                    history.len(),
                    self.config.min_observations
                )));
            }
        }

        let means: HashMap<&str, f64> = histories
            .iter()
            .map(|(room, history)| (*room, mean(history.values().copied())))
            .collect();

        observations
            .iter()
            .map(|obs| {
                let room = obs.room_type.as_str();
                let values = Self::vector_for(
                    schema,
                    room,
                    obs.date,
                    &histories[room],
                    means[room],
                    obs.has_special_event(),
                )?;
                Ok(FeatureVector {
                    date: obs.date,
                    room_type: obs.room_type.clone(),
                    values,
                    target: obs.occupancy_rate,
                })
            })
            .collect()
    }

    /// Per room type, date-ordered occupancy. Rejects invalid, duplicate and future rows.
    fn index_history<'a>(
        &self,
        observations: &'a [Observation],
        as_of: NaiveDate,
    ) -> Result<BTreeMap<&'a str, BTreeMap<NaiveDate, f64>>> {
        let mut histories: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();

        for obs in observations {
            obs.validate()?;
            if obs.date > as_of {
                return Err(RevenueError::Validation(format!(
                    "{} {}: observation is dated after as-of date {}",
                    obs.date, obs.room_type, as_of
                )));
            }
            let history = histories.entry(obs.room_type.as_str()).or_default();
            if history.insert(obs.date, obs.occupancy_rate).is_some() {
                return Err(RevenueError::Validation(format!(
                    "duplicate observation for {} on {}",
                    obs.room_type, obs.date
                )));
            }
        }

        Ok(histories)
    }

    /// Encode one (room type, date) against an arbitrary occupancy history.
    ///
    /// `history` maps dates to occupancy for this room type only. Lags missing from it
    /// fall back to `fallback_mean`; rolling windows only see dates strictly before `date`.
    /// A window with no points also yields `fallback_mean` (variance 0). Callers pass the
    /// room type's own mean, not the mean across all rooms.
    pub fn vector_for(
        schema: &FeatureSchema,
        room_type: &str,
        date: NaiveDate,
        history: &BTreeMap<NaiveDate, f64>,
        fallback_mean: f64,
        special_event: bool,
    ) -> Result<Vec<f64>> {
        let room_code = schema
            .room_code(room_type)
            .ok_or_else(|| RevenueError::UnknownCategory(room_type.to_string()))?;

        let mut values = calendar_features(date, special_event);
        values.reserve(schema.len().saturating_sub(values.len()));
        values.push(room_code as f64);

        for &lag in &schema.lags {
            let value = date
                .checked_sub_days(Days::new(lag as u64))
                .and_then(|d| history.get(&d).copied())
                .unwrap_or(fallback_mean);
            values.push(value);
        }

        for &window in &schema.windows {
            let (window_mean, window_var) = match date.checked_sub_days(Days::new(window as u64)) {
                Some(start) => rolling_stats(history.range(start..date).map(|(_, v)| *v)),
                None => None,
            }
            .unwrap_or((fallback_mean, 0.0));
            values.push(window_mean);
            values.push(window_var);
        }

        debug_assert_eq!(values.len(), schema.len());
        Ok(values)
    }
}

/// Calendar encodings, in [`CALENDAR_FEATURES`] order
pub fn calendar_features(date: NaiveDate, special_event: bool) -> Vec<f64> {
    let month = date.month();
    let day_of_week = date.weekday().num_days_from_monday();
    let flag = |b: bool| if b { 1.0 } else { 0.0 };

    vec![
        month as f64,
        day_of_week as f64,
        date.iso_week().week() as f64,
        flag(day_of_week >= 5),
        flag((6..=8).contains(&month)),
        flag(month == 12 || month <= 2),
        (2.0 * PI * day_of_week as f64 / 7.0).sin(),
        (2.0 * PI * day_of_week as f64 / 7.0).cos(),
        (2.0 * PI * month as f64 / 12.0).sin(),
        (2.0 * PI * month as f64 / 12.0).cos(),
        flag(special_event),
    ]
}

/// Mean and population variance; None for an empty window
fn rolling_stats(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance))
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
