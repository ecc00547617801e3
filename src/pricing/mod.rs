//! Pricing Engine
//!
//! Turns a demand forecast into a price recommendation:
//! 1. Piecewise-linear response around a target occupancy band
//! 2. Rounded to cents and clamped to the policy bounds
//! 3. Capped relative to the competitor price when one is known
//!
//! The response is non-decreasing in predicted occupancy for a fixed policy.

pub mod insights;
pub mod scenario;


pub use insights::{
    pricing_insights, recommendations, Opportunity, PricingInsights, Recommendation,
    WeekdayPerformance,
};
pub use scenario::{best_scenario, OptimizationTarget, PriceScenario};

use rayon::prelude::*;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RevenueError};
use crate::types::{DemandPrediction, PricePolicy, PricingDecision};

/// Pricing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Below this occupancy the price moves toward min_price
    pub low_occupancy: f64,
    /// Above this occupancy the price moves toward max_price
    pub high_occupancy: f64,
    /// Allowed premium over the competitor price (0.10 = 10%)
    pub competitor_tolerance: Decimal,
    /// Grid step for scenario analysis
    pub price_step: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            low_occupancy: 0.60,
            high_occupancy: 0.85,
            competitor_tolerance: dec!(0.10),
            price_step: dec!(5),
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<()> {
        let band_ok = self.low_occupancy.is_finite()
            && self.high_occupancy.is_finite()
            && 0.0 < self.low_occupancy
            && self.low_occupancy <= self.high_occupancy
            && self.high_occupancy < 1.0;
        if !band_ok {
            return Err(RevenueError::Config(format!(
                "pricing band must satisfy 0 < low <= high < 1, got [{}, {}]",
                self.low_occupancy, self.high_occupancy
            )));
        }
        if self.competitor_tolerance < Decimal::ZERO {
            return Err(RevenueError::Config(format!(
                "competitor_tolerance must not be negative, got {}",
                self.competitor_tolerance
            )));
        }
        if self.price_step <= Decimal::ZERO {
            return Err(RevenueError::Config(format!(
                "price_step must be positive, got {}",
                self.price_step
            )));
        }
        Ok(())
    }
}

/// Constrained price search driven by demand forecasts
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Reject policies under which no price can satisfy every constraint
    pub fn validate_policy(&self, policy: &PricePolicy) -> Result<()> {
        let prices = [
            ("min_price", Some(policy.min_price)),
            ("max_price", Some(policy.max_price)),
            ("base_price", Some(policy.base_price)),
            ("competitor_price", policy.competitor_price),
        ];
        for (name, value) in prices {
            if let Some(value) = value {
                if value < Decimal::ZERO {
                    return Err(RevenueError::InvalidPolicy(format!(
                        "{} must not be negative, got {}",
                        name, value
                    )));
                }
            }
        }
        if policy.min_price > policy.max_price {
            return Err(RevenueError::InvalidPolicy(format!(
                "min_price {} exceeds max_price {}",
                policy.min_price, policy.max_price
            )));
        }
        if !policy.elasticity.is_finite() || policy.elasticity < 0.0 {
            return Err(RevenueError::InvalidPolicy(format!(
                "elasticity must be a finite non-negative number, got {}",
                policy.elasticity
            )));
        }
        if let Some(ceiling) = self.competitor_ceiling(policy)? {
            if ceiling < policy.min_price {
                return Err(RevenueError::InvalidPolicy(format!(
                    "competitor ceiling {} is below min_price {}",
                    ceiling, policy.min_price
                )));
            }
        }
        Ok(())
    }

    /// Recommend a price for one forecast
    pub fn compute_price(
        &self,
        prediction: &DemandPrediction,
        policy: &PricePolicy,
    ) -> Result<PricingDecision> {
        self.validate_policy(policy)?;
        self.price_validated(prediction, policy)
    }

    /// Price each forecast independently; output order matches input order.
    ///
    /// Fails with the error of the first invalid prediction.
    pub fn compute_prices(
        &self,
        predictions: &[DemandPrediction],
        policy: &PricePolicy,
    ) -> Result<Vec<PricingDecision>> {
        self.validate_policy(policy)?;
        let decisions: Vec<Result<PricingDecision>> = predictions
            .par_iter()
            .map(|p| self.price_validated(p, policy))
            .collect();
        decisions.into_iter().collect()
    }

    fn price_validated(
        &self,
        prediction: &DemandPrediction,
        policy: &PricePolicy,
    ) -> Result<PricingDecision> {
        let occupancy = prediction.predicted_occupancy;
        if !occupancy.is_finite() || !(0.0..=1.0).contains(&occupancy) {
            return Err(RevenueError::Validation(format!(
                "{} {}: predicted occupancy {} outside [0, 1]",
                prediction.date, prediction.room_type, occupancy
            )));
        }

        let mut price = self
            .response_price(occupancy, policy)
            .round_dp(2)
            .clamp(policy.min_price, policy.max_price);

        if let Some(ceiling) = self.competitor_ceiling(policy)? {
            if price > ceiling {
                let capped = ceiling
                    .round_dp_with_strategy(2, RoundingStrategy::ToZero)
                    .max(policy.min_price);
                tracing::warn!(
                    date = %prediction.date,
                    room_type = %prediction.room_type,
                    %price,
                    %capped,
                    "Competitor ceiling binds"
                );
                price = capped;
            }
        }

        let expected_revenue = expected_revenue(price, occupancy, policy.room_inventory)?;
        tracing::debug!(
            date = %prediction.date,
            room_type = %prediction.room_type,
            occupancy,
            %price,
            %expected_revenue,
            "Priced forecast"
        );

        Ok(PricingDecision {
            date: prediction.date,
            room_type: prediction.room_type.clone(),
            recommended_price: price,
            expected_revenue,
        })
    }

    /// Unclamped price from the occupancy response curve
    fn response_price(&self, occupancy: f64, policy: &PricePolicy) -> Decimal {
        let low = self.config.low_occupancy;
        let high = self.config.high_occupancy;
        let base = policy.base_price;

        if occupancy < low && low > 0.0 {
            let deviation = (low - occupancy) / low;
            let weight = decimal((policy.elasticity * deviation).min(1.0));
            base - (base - policy.min_price) * weight
        } else if occupancy > high && high < 1.0 {
            let deviation = (occupancy - high) / (1.0 - high);
            let weight = decimal((policy.elasticity * deviation).min(1.0));
            base + (policy.max_price - base) * weight
        } else {
            base
        }
    }

    fn competitor_ceiling(&self, policy: &PricePolicy) -> Result<Option<Decimal>> {
        let Some(competitor) = policy.competitor_price else {
            return Ok(None);
        };
        competitor
            .checked_mul(Decimal::ONE + self.config.competitor_tolerance)
            .map(Some)
            .ok_or_else(|| {
                RevenueError::InvalidPolicy(format!(
                    "competitor ceiling for {} is not representable",
                    competitor
                ))
            })
    }
}

/// price x occupancy, times the room count when known; rounded to cents
pub fn expected_revenue(price: Decimal, occupancy: f64, room_inventory: Option<u32>) -> Result<Decimal> {
    let rooms = Decimal::from(room_inventory.unwrap_or(1));
    price
        .checked_mul(decimal(occupancy))
        .and_then(|revenue| revenue.checked_mul(rooms))
        .map(|revenue| revenue.round_dp(2))
        .ok_or_else(|| {
            RevenueError::InvalidPolicy(format!(
                "expected revenue for {} x {} rooms is not representable",
                price, rooms
            ))
        })
}

pub(crate) fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}
