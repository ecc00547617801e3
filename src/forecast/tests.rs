//! Tests for the demand forecaster

use super::*;
use crate::testing::weekly_pattern;
use chrono::Duration;
use rust_decimal_macros::dec;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// 60 days of "Standard": 0.9 on weekends, 0.4 on weekdays
fn weekly_history() -> Vec<Observation> {
    weekly_pattern("Standard", start(), 60, 0.4, 0.9)
}

fn fast() -> ForecasterConfig {
    ForecasterConfig {
        forest: ForestConfig {
            n_trees: 25,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn trained() -> DemandForecaster {
    let mut forecaster = DemandForecaster::new(FeatureConfig::default(), fast());
    forecaster.train(&weekly_history()).unwrap();
    forecaster
}

#[test]
fn test_weekly_history_trains_accurately() {
    let mut forecaster = DemandForecaster::with_defaults();
    let (model, mae) = forecaster.train(&weekly_history()).unwrap();

    assert!(mae < 0.15, "mae = {}", mae);
    assert!(forecaster.is_trained());
    assert_eq!(model.summary().fold_mae.len(), 5);
    assert_eq!(model.summary().observations, 60);
    assert_eq!(model.summary().n_trees, 100);
    assert_eq!(model.summary().last_date, start() + Duration::days(59));
}

#[test]
fn test_seven_day_forecast_from_day_61() {
    let forecaster = trained();
    let day61 = start() + Duration::days(60);

    let predictions = forecaster.predict_demand(day61, 7, "Standard").unwrap();

    assert_eq!(predictions.len(), 7);
    for (i, p) in predictions.iter().enumerate() {
        assert_eq!(p.date, day61 + Duration::days(i as i64));
        assert_eq!(p.room_type, "Standard");
        assert!((0.0..=1.0).contains(&p.predicted_occupancy));
        let (lower, upper) = (p.lower_bound.unwrap(), p.upper_bound.unwrap());
        assert!(lower <= p.predicted_occupancy && p.predicted_occupancy <= upper);
    }
    assert!(predictions.windows(2).all(|w| w[0].date < w[1].date));

    // 2024-03-02 is a Saturday, 2024-03-06 a Wednesday
    assert!(predictions[1].predicted_occupancy > predictions[5].predicted_occupancy);
}

#[test]
fn test_training_is_deterministic() {
    let mut a = DemandForecaster::new(FeatureConfig::default(), fast());
    let mut b = DemandForecaster::new(FeatureConfig::default(), fast());
    let (model_a, mae_a) = a.train(&weekly_history()).unwrap();
    let (model_b, mae_b) = b.train(&weekly_history()).unwrap();

    assert_eq!(mae_a, mae_b);
    assert_eq!(model_a, model_b);

    let day61 = start() + Duration::days(60);
    assert_eq!(
        model_a.predict_demand(day61, 7, "Standard").unwrap(),
        model_b.predict_demand(day61, 7, "Standard").unwrap()
    );
}

#[test]
fn test_input_order_does_not_matter() {
    let mut shuffled = weekly_history();
    shuffled.reverse();

    let forecaster = DemandForecaster::new(FeatureConfig::default(), fast());
    let a = forecaster.fit(&weekly_history()).unwrap();
    let b = forecaster.fit(&shuffled).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_predict_is_idempotent() {
    let forecaster = trained();
    let day61 = start() + Duration::days(60);

    let first = forecaster.predict_demand(day61, 14, "Standard").unwrap();
    let second = forecaster.predict_demand(day61, 14, "Standard").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_json_round_trip_predicts_identically() {
    let forecaster = trained();
    let model = forecaster.model().unwrap();

    let json = model.to_json().unwrap();
    let restored = TrainedModel::from_json(&json).unwrap();
    assert_eq!(&restored, model.as_ref());

    let day61 = start() + Duration::days(60);
    assert_eq!(
        restored.predict_demand(day61, 7, "Standard").unwrap(),
        model.predict_demand(day61, 7, "Standard").unwrap()
    );
}

#[test]
fn test_from_json_rejects_mismatched_schema() {
    let model = trained().model().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&model.to_json().unwrap()).unwrap();
    value["schema"]["names"].as_array_mut().unwrap().pop();

    let err = TrainedModel::from_json(&value.to_string()).unwrap_err();
    assert!(matches!(err, RevenueError::Serialization(_)));

    let err = TrainedModel::from_json("{not json").unwrap_err();
    assert!(matches!(err, RevenueError::Serialization(_)));
}

#[test]
fn test_non_positive_horizon() {
    let forecaster = trained();
    assert_eq!(
        forecaster.predict_demand(start(), 0, "Standard").unwrap_err(),
        RevenueError::InvalidHorizon(0)
    );
    assert_eq!(
        forecaster.predict_demand(start(), -3, "Standard").unwrap_err(),
        RevenueError::InvalidHorizon(-3)
    );
}

#[test]
fn test_five_observations_is_insufficient() {
    let mut forecaster = DemandForecaster::with_defaults();
    let err = forecaster
        .train(&weekly_pattern("Standard", start(), 5, 0.4, 0.9))
        .unwrap_err();

    assert_eq!(err, RevenueError::InsufficientData { required: 14, actual: 5 });
    assert!(!forecaster.is_trained());
}

#[test]
fn test_empty_history_is_insufficient() {
    let forecaster = DemandForecaster::with_defaults();
    assert_eq!(
        forecaster.fit(&[]).unwrap_err(),
        RevenueError::InsufficientData { required: 14, actual: 0 }
    );
}

#[test]
fn test_invalid_feature_config_is_rejected_before_fitting() {
    let no_minimum = DemandForecaster::new(
        FeatureConfig {
            min_observations: 0,
            ..Default::default()
        },
        fast(),
    );
    assert!(matches!(no_minimum.fit(&[]), Err(RevenueError::Config(_))));

    let zero_lag = DemandForecaster::new(
        FeatureConfig {
            lags: vec![0],
            ..Default::default()
        },
        fast(),
    );
    assert!(matches!(zero_lag.fit(&weekly_history()), Err(RevenueError::Config(_))));
}

#[test]
fn test_short_room_type_is_insufficient() {
    let mut history = weekly_history();
    history.extend(weekly_pattern("Suite", start(), 5, 0.5, 0.7));

    let forecaster = DemandForecaster::new(FeatureConfig::default(), fast());
    assert_eq!(
        forecaster.fit(&history).unwrap_err(),
        RevenueError::InsufficientData { required: 14, actual: 5 }
    );
}

#[test]
fn test_more_folds_than_dates() {
    let config = ForecasterConfig {
        folds: 100,
        ..fast()
    };
    let forecaster = DemandForecaster::new(FeatureConfig::default(), config);
    assert_eq!(
        forecaster.fit(&weekly_history()).unwrap_err(),
        RevenueError::InsufficientData { required: 101, actual: 60 }
    );
}

#[test]
fn test_invalid_rows_fail_validation() {
    let forecaster = DemandForecaster::new(FeatureConfig::default(), fast());

    let mut duplicated = weekly_history();
    duplicated.push(duplicated[10].clone());
    assert!(matches!(forecaster.fit(&duplicated), Err(RevenueError::Validation(_))));

    let mut negative = weekly_history();
    negative[3].price = dec!(-5);
    assert!(matches!(forecaster.fit(&negative), Err(RevenueError::Validation(_))));

    let mut out_of_range = weekly_history();
    out_of_range[7].occupancy_rate = 1.5;
    assert!(matches!(forecaster.fit(&out_of_range), Err(RevenueError::Validation(_))));
}

#[test]
fn test_unknown_room_type() {
    let forecaster = trained();
    assert_eq!(
        forecaster.predict_demand(start(), 7, "Penthouse").unwrap_err(),
        RevenueError::UnknownCategory("Penthouse".to_string())
    );
}

#[test]
fn test_untrained_forecaster() {
    let forecaster = DemandForecaster::with_defaults();
    assert_eq!(
        forecaster.predict_demand(start(), 7, "Standard").unwrap_err(),
        RevenueError::NotTrained
    );
}

#[test]
fn test_failed_training_keeps_previous_model() {
    let mut forecaster = trained();
    let before = forecaster.model().unwrap();

    let result = forecaster.train(&weekly_pattern("Standard", start(), 3, 0.4, 0.9));
    assert!(result.is_err());

    let after = forecaster.model().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[test]
fn test_forecast_after_gap_warms_up() {
    let forecaster = trained();
    let later = start() + Duration::days(75);

    let predictions = forecaster.predict_demand(later, 5, "Standard").unwrap();

    assert_eq!(predictions.len(), 5);
    assert_eq!(predictions[0].date, later);
    assert!(predictions
        .iter()
        .all(|p| (0.0..=1.0).contains(&p.predicted_occupancy)));
}

#[test]
fn test_forecast_feeds_predictions_back_as_lags() {
    let lag_only = FeatureConfig {
        lags: vec![1],
        rolling_windows: Vec::new(),
        ..Default::default()
    };
    let mut forecaster = DemandForecaster::new(lag_only, fast());
    let (model, _) = forecaster.train(&weekly_history()).unwrap();

    let day61 = start() + Duration::days(60);
    let predictions = model.predict_demand(day61, 3, "Standard").unwrap();
    let room = model.history("Standard").unwrap();
    let lag_1 = model.schema().index_of("occupancy_lag_1").unwrap();

    let mut buffer: BTreeMap<NaiveDate, f64> =
        room.points.iter().map(|p| (p.date, p.occupancy)).collect();
    for pair in predictions.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        buffer.insert(previous.date, previous.predicted_occupancy);

        let values =
            FeatureBuilder::vector_for(model.schema(), "Standard", next.date, &buffer, room.mean, false)
                .unwrap();
        assert_eq!(values[lag_1], previous.predicted_occupancy);
        assert!((values[lag_1] - room.mean).abs() > 1e-6);
        assert_eq!(
            model.forest.predict(&values).clamp(0.0, 1.0),
            next.predicted_occupancy
        );
    }
}

#[test]
fn test_forecast_overlapping_history() {
    let forecaster = trained();
    let inside = start() + Duration::days(55);

    let predictions = forecaster.predict_demand(inside, 10, "Standard").unwrap();

    assert_eq!(predictions.len(), 10);
    assert_eq!(predictions[0].date, inside);
    assert_eq!(predictions[9].date, inside + Duration::days(9));
}

#[test]
fn test_feature_importance_ranked() {
    let model = trained().model().unwrap();
    let ranked = model.feature_importance();

    assert_eq!(ranked.len(), model.schema().len());
    assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    let total: f64 = ranked.iter().map(|(_, v)| v).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn test_model_slot_swaps_without_disturbing_readers() {
    let first = trained().model().unwrap();
    let slot = ModelSlot::with_model(Arc::clone(&first));

    let mut other = DemandForecaster::new(
        FeatureConfig::default(),
        ForecasterConfig {
            forest: ForestConfig {
                n_trees: 10,
                seed: 9,
                ..Default::default()
            },
            ..Default::default()
        },
    );
    let (second, _) = other.train(&weekly_history()).unwrap();
    let day61 = start() + Duration::days(60);
    let expected = first.predict_demand(day61, 3, "Standard").unwrap();

    std::thread::scope(|scope| {
        let held = slot.load().unwrap();
        let reader = scope.spawn(move || held.predict_demand(day61, 3, "Standard").unwrap());

        let replaced = slot.swap(Arc::clone(&second)).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert_eq!(reader.join().unwrap(), expected);
    });

    assert!(Arc::ptr_eq(&slot.load().unwrap(), &second));
    assert!(ModelSlot::new().load().is_none());
}
