//! Business advice for a pricing decision and historical pricing analytics

use chrono::{Datelike, Weekday};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, RevenueError};
use crate::types::{DemandPrediction, Observation, PricePolicy, PricingDecision};

const HIGH_DEMAND: f64 = 0.90;
const LOW_DEMAND: f64 = 0.60;
/// Relative distance from the competitor price that counts as far above/below
const COMPETITOR_MARGIN: f64 = 0.15;
/// Relative distance from the policy bounds that counts as near floor/ceiling
const BOUND_MARGIN: f64 = 0.05;
/// Correlation above this means demand barely reacts to price
const LOW_SENSITIVITY_CORRELATION: f64 = -0.3;
const HIGH_PRICE_VOLATILITY: f64 = 0.15;

/// Advice attached to a pricing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Forecast above 90%: room for a higher rate
    HighDemand { occupancy: f64 },
    /// Forecast below 60%: consider a promotion
    LowDemand { occupancy: f64 },
    /// More than 15% above the competitor price
    AboveCompetition { premium_pct: f64 },
    /// More than 15% below the competitor price
    BelowCompetition { discount_pct: f64 },
    /// Within 5% of min_price
    NearFloor,
    /// Within 5% of max_price
    NearCeiling,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::HighDemand { occupancy } => write!(
                f,
                "High demand ({:.0}% forecast): consider raising the rate",
                occupancy * 100.0
            ),
            Recommendation::LowDemand { occupancy } => write!(
                f,
                "Weak demand ({:.0}% forecast): consider a promotion",
                occupancy * 100.0
            ),
            Recommendation::AboveCompetition { premium_pct } => write!(
                f,
                "Priced {:.1}% above the competition",
                premium_pct
            ),
            Recommendation::BelowCompetition { discount_pct } => write!(
                f,
                "Priced {:.1}% below the competition: room to increase",
                discount_pct
            ),
            Recommendation::NearFloor => write!(f, "Price is close to the floor: review the strategy"),
            Recommendation::NearCeiling => write!(f, "Premium price: make sure the offer justifies it"),
        }
    }
}

/// Advice for `decision`, given the forecast it was computed from
pub fn recommendations(
    decision: &PricingDecision,
    prediction: &DemandPrediction,
    policy: &PricePolicy,
) -> Vec<Recommendation> {
    let mut advice = Vec::new();
    let price = decision.recommended_price.to_f64().unwrap_or(0.0);

    if let Some(competitor) = policy.competitor_price.and_then(|c| c.to_f64()).filter(|c| *c > 0.0) {
        let relative = price / competitor - 1.0;
        if relative > COMPETITOR_MARGIN {
            advice.push(Recommendation::AboveCompetition {
                premium_pct: relative * 100.0,
            });
        } else if relative < -COMPETITOR_MARGIN {
            advice.push(Recommendation::BelowCompetition {
                discount_pct: -relative * 100.0,
            });
        }
    }

    let occupancy = prediction.predicted_occupancy;
    if occupancy > HIGH_DEMAND {
        advice.push(Recommendation::HighDemand { occupancy });
    } else if occupancy < LOW_DEMAND {
        advice.push(Recommendation::LowDemand { occupancy });
    }

    let min = policy.min_price.to_f64().unwrap_or(0.0);
    let max = policy.max_price.to_f64().unwrap_or(0.0);
    if price <= min * (1.0 + BOUND_MARGIN) {
        advice.push(Recommendation::NearFloor);
    } else if price >= max * (1.0 - BOUND_MARGIN) {
        advice.push(Recommendation::NearCeiling);
    }

    advice
}

/// Averages per day of week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayPerformance {
    pub weekday: Weekday,
    pub avg_price: f64,
    pub avg_occupancy: f64,
    pub avg_revpar: f64,
    pub observations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opportunity {
    /// Occupancy barely reacts to price changes
    LowPriceSensitivity,
    /// Prices swing more than 15% around their mean
    HighPriceVolatility,
}

/// Summary of historical pricing performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingInsights {
    pub avg_price: f64,
    pub avg_occupancy: f64,
    pub avg_revpar: f64,
    /// Coefficient of variation of price
    pub price_volatility: f64,
    /// Sample standard deviation of occupancy
    pub occupancy_volatility: f64,
    /// Pearson correlation; None when either series is constant or too short
    pub price_occupancy_correlation: Option<f64>,
    /// Monday first, only weekdays present in the history
    pub weekday_performance: Vec<WeekdayPerformance>,
    pub opportunities: Vec<Opportunity>,
}

/// Analyse historical price/occupancy pairs
pub fn pricing_insights(history: &[Observation]) -> Result<PricingInsights> {
    if history.is_empty() {
        return Err(RevenueError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    for obs in history {
        obs.validate()?;
    }

    let prices: Vec<f64> = history.iter().map(|o| o.price.to_f64().unwrap_or(0.0)).collect();
    let occupancy: Vec<f64> = history.iter().map(|o| o.occupancy_rate).collect();
    let revpar: Vec<f64> = history.iter().map(Observation::revpar).collect();

    let avg_price = mean(&prices);
    let price_volatility = if avg_price > 0.0 {
        sample_std(&prices) / avg_price
    } else {
        0.0
    };
    let correlation = pearson(&prices, &occupancy);

    let mut by_day: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, obs) in history.iter().enumerate() {
        by_day
            .entry(obs.date.weekday().num_days_from_monday())
            .or_default()
            .push(i);
    }
    let weekday_performance = by_day
        .values()
        .map(|rows| {
            let pick = |series: &[f64]| mean(&rows.iter().map(|&i| series[i]).collect::<Vec<_>>());
            WeekdayPerformance {
                weekday: history[rows[0]].date.weekday(),
                avg_price: pick(&prices),
                avg_occupancy: pick(&occupancy),
                avg_revpar: pick(&revpar),
                observations: rows.len(),
            }
        })
        .collect();

    let mut opportunities = Vec::new();
    if correlation.is_some_and(|c| c > LOW_SENSITIVITY_CORRELATION) {
        opportunities.push(Opportunity::LowPriceSensitivity);
    }
    if price_volatility > HIGH_PRICE_VOLATILITY {
        opportunities.push(Opportunity::HighPriceVolatility);
    }

    Ok(PricingInsights {
        avg_price,
        avg_occupancy: mean(&occupancy),
        avg_revpar: mean(&revpar),
        price_volatility,
        occupancy_volatility: sample_std(&occupancy),
        price_occupancy_correlation: correlation,
        weekday_performance,
        opportunities,
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 2 {
        return None;
    }
    let (mx, my) = (mean(x), mean(y));
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}
