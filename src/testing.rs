//! Synthetic hotel history
//!
//! Deterministic generators used by the test suites and by the `sample` CLI command.

use chrono::{Datelike, Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use crate::types::Observation;

/// Settings for [`synthetic_history`]
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub start: NaiveDate,
    pub days: i64,
    /// Room types with their base price
    pub rooms: Vec<(String, Decimal)>,
    /// Weekday occupancy level before seasonality
    pub base_occupancy: f64,
    /// Added on Friday and Saturday nights
    pub weekend_uplift: f64,
    /// Amplitude of the yearly cycle
    pub seasonal_amplitude: f64,
    /// Uniform noise half-width
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            days: 90,
            rooms: vec![
                ("Standard".to_string(), dec!(120)),
                ("Deluxe".to_string(), dec!(180)),
            ],
            base_occupancy: 0.6,
            weekend_uplift: 0.2,
            seasonal_amplitude: 0.1,
            noise: 0.05,
            seed: 42,
        }
    }
}

/// Seeded daily history for every configured room type, ordered by date then room
pub fn synthetic_history(config: &SyntheticConfig) -> Vec<Observation> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut observations = Vec::with_capacity(config.days.max(0) as usize * config.rooms.len());

    for offset in 0..config.days {
        let date = config.start + Duration::days(offset);
        let season = (2.0 * std::f64::consts::PI * date.ordinal0() as f64 / 365.0).cos();
        let weekend = matches!(date.weekday().num_days_from_monday(), 4 | 5);

        for (room, base_price) in &config.rooms {
            let mut occupancy = config.base_occupancy - config.seasonal_amplitude * season;
            if weekend {
                occupancy += config.weekend_uplift;
            }
            if config.noise > 0.0 {
                occupancy += rng.random_range(-config.noise..config.noise);
            }
            let occupancy = (occupancy.clamp(0.3, 0.95) * 10_000.0).round() / 10_000.0;

            let swing = Decimal::from_f64(rng.random_range(-0.1..0.1)).unwrap_or_default();
            let price = (base_price * (Decimal::ONE + swing)).round_dp(2);

            let mut obs = Observation::new(date, room.as_str(), occupancy, price);
            obs.reservations = (occupancy * 100.0).round() as u32;
            obs.revenue = (price * Decimal::from(obs.reservations)).round_dp(2);
            observations.push(obs);
        }
    }

    observations
}

/// Noise-free weekly oscillation: `weekend` on Saturday and Sunday, `weekday` otherwise
pub fn weekly_pattern(
    room: &str,
    start: NaiveDate,
    days: i64,
    weekday: f64,
    weekend: f64,
) -> Vec<Observation> {
    (0..days)
        .map(|offset| {
            let date = start + Duration::days(offset);
            let occupancy = if date.weekday().num_days_from_monday() >= 5 {
                weekend
            } else {
                weekday
            };
            Observation::new(date, room, occupancy, dec!(120))
        })
        .collect()
}
