//! Demand forecasting
//!
//! Bagged regression trees over engineered occupancy features:
//! - Forward-chaining validation cut on distinct dates (never shuffles across time)
//! - Final forest fit on the whole history
//! - Recursive multi-day forecasting that feeds predictions back as lag inputs
//!
//! A [`TrainedModel`] is immutable once built; [`DemandForecaster`] only replaces its
//! model after a fully successful training run.

pub mod forest;
pub mod slot;
pub mod tree;
pub mod validation;

#[cfg(test)]
mod tests;

pub use forest::{ForestConfig, RandomForest};
pub use slot::ModelSlot;
pub use validation::{forward_chaining_folds, mean_absolute_error, Fold};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{Result, RevenueError};
use crate::features::{mean, FeatureBuilder, FeatureConfig, FeatureSchema};
use crate::types::{DemandPrediction, Observation};

/// Forecaster configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecasterConfig {
    pub forest: ForestConfig,
    /// Forward-chaining validation folds
    pub folds: usize,
    /// Interval half-width in standard deviations of the tree predictions
    pub interval_z: f64,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            folds: 5,
            interval_z: 1.96,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub occupancy: f64,
}

/// Observed occupancy for one room type, ascending by date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomHistory {
    pub points: Vec<HistoryPoint>,
    /// Mean occupancy, used to impute missing lags
    pub mean: f64,
}

impl RoomHistory {
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Training metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Mean of the per-fold validation MAEs
    pub mae: f64,
    pub fold_mae: Vec<f64>,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub observations: usize,
    pub seed: u64,
    pub n_trees: usize,
}

/// Fitted forecaster state: forest, encoder schema and the history it forecasts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    schema: FeatureSchema,
    forest: RandomForest,
    history: BTreeMap<String, RoomHistory>,
    summary: TrainingSummary,
    interval_z: f64,
}

impl TrainedModel {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn summary(&self) -> &TrainingSummary {
        &self.summary
    }

    pub fn room_types(&self) -> &[String] {
        &self.schema.room_types
    }

    pub fn history(&self, room_type: &str) -> Option<&RoomHistory> {
        self.history.get(room_type)
    }

    /// Forecast `days` consecutive dates starting at `start`.
    ///
    /// Walks forward from the day after the last observation of `room_type` (or from
    /// `start` if earlier), so every lag inside the window is either observed or
    /// predicted earlier in this call. Only dates in `[start, start + days)` are returned.
    pub fn predict_demand(
        &self,
        start: NaiveDate,
        days: i64,
        room_type: &str,
    ) -> Result<Vec<DemandPrediction>> {
        if days <= 0 {
            return Err(RevenueError::InvalidHorizon(days));
        }
        let room = match (self.schema.room_code(room_type), self.history.get(room_type)) {
            (Some(_), Some(room)) => room,
            _ => return Err(RevenueError::UnknownCategory(room_type.to_string())),
        };
        let end = start.checked_add_days(Days::new(days as u64)).ok_or_else(|| {
            RevenueError::Validation(format!("forecast window from {} overflows the calendar", start))
        })?;

        let mut buffer: BTreeMap<NaiveDate, f64> =
            room.points.iter().map(|p| (p.date, p.occupancy)).collect();
        let mut date = room
            .last_date()
            .and_then(|last| last.succ_opt())
            .map_or(start, |next| next.min(start));

        tracing::debug!(
            room_type,
            %start,
            days,
            warm_up_from = %date,
            "Forecasting demand"
        );

        let mut predictions = Vec::with_capacity(days as usize);
        while date < end {
            let values =
                FeatureBuilder::vector_for(&self.schema, room_type, date, &buffer, room.mean, false)?;
            let (mean, spread) = self.forest.predict_with_spread(&values);
            let occupancy = mean.clamp(0.0, 1.0);
            buffer.entry(date).or_insert(occupancy);

            if date >= start {
                let half_width = self.interval_z * spread;
                predictions.push(DemandPrediction {
                    date,
                    room_type: room_type.to_string(),
                    predicted_occupancy: occupancy,
                    lower_bound: Some((mean - half_width).clamp(0.0, 1.0)),
                    upper_bound: Some((mean + half_width).clamp(0.0, 1.0)),
                });
            }

            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        Ok(predictions)
    }

    /// Normalised impurity-decrease importance per feature, highest first
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .schema
            .names
            .iter()
            .cloned()
            .zip(self.forest.feature_importances().iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a model written by [`TrainedModel::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        if !model.schema.is_consistent()
            || model.forest.n_features() != model.schema.len()
            || !model.forest.is_consistent()
        {
            return Err(RevenueError::Serialization(format!(
                "inconsistent model: forest expects {} features, schema has {}",
                model.forest.n_features(),
                model.schema.len()
            )));
        }
        if let Some(room) = model.history.keys().find(|r| model.schema.room_code(r).is_none()) {
            return Err(RevenueError::Serialization(format!(
                "history references room type {} missing from schema",
                room
            )));
        }
        Ok(model)
    }
}

/// Demand forecaster: untrained until the first successful [`DemandForecaster::train`]
#[derive(Debug, Clone, Default)]
pub struct DemandForecaster {
    builder: FeatureBuilder,
    config: ForecasterConfig,
    model: Option<Arc<TrainedModel>>,
}

impl DemandForecaster {
    pub fn new(features: FeatureConfig, config: ForecasterConfig) -> Self {
        Self {
            builder: FeatureBuilder::new(features),
            config,
            model: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &ForecasterConfig {
        &self.config
    }

    pub fn model(&self) -> Option<Arc<TrainedModel>> {
        self.model.clone()
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Install a previously trained model
    pub fn load_model(&mut self, model: Arc<TrainedModel>) {
        self.model = Some(model);
    }

    /// Train and publish a new model. Returns it with its validation MAE.
    ///
    /// On failure the current model (if any) is kept.
    pub fn train(&mut self, observations: &[Observation]) -> Result<(Arc<TrainedModel>, f64)> {
        let model = Arc::new(self.fit(observations)?);
        let mae = model.summary.mae;
        self.model = Some(Arc::clone(&model));
        Ok((model, mae))
    }

    /// Forecast with the current model
    pub fn predict_demand(
        &self,
        start: NaiveDate,
        days: i64,
        room_type: &str,
    ) -> Result<Vec<DemandPrediction>> {
        self.model
            .as_ref()
            .ok_or(RevenueError::NotTrained)?
            .predict_demand(start, days, room_type)
    }

    /// Build a model without touching forecaster state
    pub fn fit(&self, observations: &[Observation]) -> Result<TrainedModel> {
        self.builder.config().validate()?;
        let min = self.builder.config().min_observations;
        tracing::info!(
            observations = observations.len(),
            folds = self.config.folds,
            n_trees = self.config.forest.n_trees,
            "Training demand forecaster"
        );

        let mut seen = HashSet::with_capacity(observations.len());
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for obs in observations {
            obs.validate()?;
            if !seen.insert((obs.date, obs.room_type.as_str())) {
                return Err(RevenueError::Validation(format!(
                    "duplicate observation for {} on {}",
                    obs.room_type, obs.date
                )));
            }
            *counts.entry(obs.room_type.as_str()).or_default() += 1;
        }

        if let Some(actual) = counts.values().copied().find(|&n| n < min) {
            return Err(RevenueError::InsufficientData { required: min, actual });
        }

        let mut sorted = observations.to_vec();
        sorted.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.room_type.cmp(&b.room_type)));
        let (first_date, last_date) = match (sorted.first(), sorted.last()) {
            (Some(first), Some(last)) if sorted.len() >= min => (first.date, last.date),
            _ => {
                return Err(RevenueError::InsufficientData {
                    required: min,
                    actual: sorted.len(),
                })
            }
        };

        let schema = self.builder.schema_for(&sorted);
        let features = self.builder.build_with_schema(&sorted, last_date, &schema)?;
        let rows: Vec<Vec<f64>> = features.iter().map(|f| f.values.clone()).collect();
        let targets: Vec<f64> = features.iter().map(|f| f.target).collect();
        let dates: Vec<NaiveDate> = features.iter().map(|f| f.date).collect();

        let folds = forward_chaining_folds(&dates, self.config.folds)?;
        let mut fold_mae = Vec::with_capacity(folds.len());
        for (i, fold) in folds.iter().enumerate() {
            let train_rows: Vec<Vec<f64>> = fold.train.iter().map(|&r| rows[r].clone()).collect();
            let train_targets: Vec<f64> = fold.train.iter().map(|&r| targets[r]).collect();
            let forest = RandomForest::fit(&train_rows, &train_targets, &self.config.forest);

            let actual: Vec<f64> = fold.validate.iter().map(|&r| targets[r]).collect();
            let predicted: Vec<f64> = fold
                .validate
                .iter()
                .map(|&r| forest.predict(&rows[r]).clamp(0.0, 1.0))
                .collect();
            let mae = mean_absolute_error(&actual, &predicted);
            tracing::debug!(
                fold = i,
                train = fold.train.len(),
                validate = fold.validate.len(),
                mae,
                "Validation fold"
            );
            fold_mae.push(mae);
        }
        let mae = mean(fold_mae.iter().copied());

        let forest = RandomForest::fit(&rows, &targets, &self.config.forest);

        let mut history: BTreeMap<String, RoomHistory> = BTreeMap::new();
        for obs in &sorted {
            history
                .entry(obs.room_type.clone())
                .or_insert_with(|| RoomHistory {
                    points: Vec::new(),
                    mean: 0.0,
                })
                .points
                .push(HistoryPoint {
                    date: obs.date,
                    occupancy: obs.occupancy_rate,
                });
        }
        for room in history.values_mut() {
            room.mean = mean(room.points.iter().map(|p| p.occupancy));
        }

        tracing::info!(
            mae,
            rooms = history.len(),
            %first_date,
            %last_date,
            "Demand forecaster trained"
        );

        Ok(TrainedModel {
            schema,
            forest,
            history,
            summary: TrainingSummary {
                mae,
                fold_mae,
                first_date,
                last_date,
                observations: sorted.len(),
                seed: self.config.forest.seed,
                n_trees: self.config.forest.n_trees,
            },
            interval_z: self.config.interval_z,
        })
    }
}
