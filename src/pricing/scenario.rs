//! What-if analysis over a grid of prices

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use super::{decimal, PricingEngine};
use crate::error::{Result, RevenueError};
use crate::types::PricePolicy;

/// Occupancy bounds of the constant-elasticity response
const MIN_RESPONSE_OCCUPANCY: f64 = 0.05;
const MAX_RESPONSE_OCCUPANCY: f64 = 0.98;

const GOLDEN_ITERATIONS: usize = 60;

/// Quantity maximised by [`PricingEngine::optimal_price`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationTarget {
    #[default]
    Revpar,
    Occupancy,
}

impl OptimizationTarget {
    fn score(self, price: f64, occupancy: f64) -> f64 {
        match self {
            Self::Revpar => price * occupancy,
            Self::Occupancy => occupancy,
        }
    }
}

/// One row of a price grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceScenario {
    pub price: Decimal,
    pub occupancy: f64,
    /// price x occupancy, rounded to cents
    pub revpar: Decimal,
    /// Premium over the reference price in percent (negative = discount)
    pub premium_pct: f64,
}

impl PricingEngine {
    /// Evaluate prices from `min_price` up to (excluding) `max_price` in `price_step` steps.
    ///
    /// Occupancy follows `base_demand * (price / reference)^(-elasticity)`, clamped to
    /// [0.05, 0.98]; the reference is the competitor price if set, else the base price.
    pub fn scenario_analysis(&self, base_demand: f64, policy: &PricePolicy) -> Result<Vec<PriceScenario>> {
        self.validate_policy(policy)?;
        if !base_demand.is_finite() || !(0.0..=1.0).contains(&base_demand) {
            return Err(RevenueError::Validation(format!(
                "base demand {} outside [0, 1]",
                base_demand
            )));
        }
        let step = self.config.price_step;
        if step <= Decimal::ZERO {
            return Err(RevenueError::Config(format!("price_step must be positive, got {}", step)));
        }

        let reference = reference_price(policy)?;

        let mut scenarios = Vec::new();
        let mut price = policy.min_price;
        loop {
            scenarios.push(self.scenario_at(price, base_demand, reference, policy.elasticity));
            price = match price.checked_add(step) {
                Some(next) if next < policy.max_price => next,
                _ => break,
            };
        }

        tracing::debug!(
            scenarios = scenarios.len(),
            base_demand,
            reference,
            "Scenario analysis"
        );
        Ok(scenarios)
    }

    /// Continuous optimum of `target` over [min_price, max_price].
    ///
    /// The grid winner of [`PricingEngine::scenario_analysis`] (plus `max_price`) seeds a
    /// golden-section search within one `price_step` either side. The clamped response is
    /// only piecewise smooth, so the search never returns a worse point than the grid.
    pub fn optimal_price(
        &self,
        base_demand: f64,
        policy: &PricePolicy,
        target: OptimizationTarget,
    ) -> Result<PriceScenario> {
        let scenarios = self.scenario_analysis(base_demand, policy)?;
        let reference = reference_price(policy)?;
        let score = |price: f64| {
            target.score(price, response_occupancy(price, base_demand, reference, policy.elasticity))
        };

        let min = policy.min_price.to_f64().unwrap_or(0.0);
        let max = policy.max_price.to_f64().unwrap_or(min);
        let step = self.config.price_step.to_f64().unwrap_or(0.0);

        let mut best = min;
        let mut best_score = score(min);
        let grid = scenarios.iter().filter_map(|s| s.price.to_f64());
        for price in grid.chain(std::iter::once(max)) {
            let value = score(price);
            if value > best_score {
                best = price;
                best_score = value;
            }
        }

        let ratio = (5f64.sqrt() - 1.0) / 2.0;
        let (mut lo, mut hi) = ((best - step).max(min), (best + step).min(max));
        let mut a = hi - ratio * (hi - lo);
        let mut b = lo + ratio * (hi - lo);
        let (mut fa, mut fb) = (score(a), score(b));
        for _ in 0..GOLDEN_ITERATIONS {
            if fa < fb {
                lo = a;
                a = b;
                fa = fb;
                b = lo + ratio * (hi - lo);
                fb = score(b);
            } else {
                hi = b;
                b = a;
                fb = fa;
                a = hi - ratio * (hi - lo);
                fa = score(a);
            }
        }
        let refined = (lo + hi) / 2.0;
        let price = if score(refined) > best_score { refined } else { best };
        let price = decimal(price).round_dp(2).clamp(policy.min_price, policy.max_price);

        tracing::debug!(?target, %price, base_demand, "Optimal price");
        Ok(self.scenario_at(price, base_demand, reference, policy.elasticity))
    }

    fn scenario_at(&self, price: Decimal, base_demand: f64, reference: f64, elasticity: f64) -> PriceScenario {
        let price_f64 = price.to_f64().unwrap_or(0.0);
        let occupancy = response_occupancy(price_f64, base_demand, reference, elasticity);

        PriceScenario {
            price,
            occupancy,
            revpar: (price * decimal(occupancy)).round_dp(2),
            premium_pct: (price_f64 / reference - 1.0) * 100.0,
        }
    }
}

/// Competitor price when known, else the base price
fn reference_price(policy: &PricePolicy) -> Result<f64> {
    policy
        .competitor_price
        .unwrap_or(policy.base_price)
        .to_f64()
        .filter(|r| *r > 0.0)
        .ok_or_else(|| {
            RevenueError::InvalidPolicy("reference price for scenario analysis must be positive".to_string())
        })
}

fn response_occupancy(price: f64, base_demand: f64, reference: f64, elasticity: f64) -> f64 {
    let ratio = price / reference;
    if ratio > 0.0 {
        (base_demand * ratio.powf(-elasticity)).clamp(MIN_RESPONSE_OCCUPANCY, MAX_RESPONSE_OCCUPANCY)
    } else {
        MAX_RESPONSE_OCCUPANCY
    }
}

/// Highest-RevPAR row; the lowest price wins ties
pub fn best_scenario(scenarios: &[PriceScenario]) -> Option<&PriceScenario> {
    scenarios
        .iter()
        .fold(None, |best: Option<&PriceScenario>, s| match best {
            Some(b) if b.revpar >= s.revpar => Some(b),
            _ => Some(s),
        })
}
