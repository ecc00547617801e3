//! Hotel Revenue Optimizer Core
//!
//! Short-term room demand forecasting and constrained price recommendation.
//!
//! ## Architecture
//!
//! ```text
//! Observations → Feature Builder → Forest (forward-chaining validated) → TrainedModel
//!                                                                          ↓
//!                                  PricingDecision ← Pricing Engine ← DemandPrediction
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod pricing;
pub mod testing;
pub mod types;

pub use error::{Result, RevenueError};
pub use forecast::{DemandForecaster, ModelSlot, TrainedModel};
pub use pricing::PricingEngine;
pub use types::{DemandPrediction, Observation, PricePolicy, PricingDecision};
