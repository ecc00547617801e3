//! Core domain types shared by the forecaster and the pricing engine

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, RevenueError};

/// One day of history for one room type, as delivered by data ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub room_type: String,
    /// Fraction of rooms sold (0-1)
    pub occupancy_rate: f64,
    pub price: Decimal,
    #[serde(default)]
    pub reservations: u32,
    /// Average daily rate
    #[serde(rename = "avg_daily_rate", default)]
    pub adr: Decimal,
    #[serde(default)]
    pub revenue: Decimal,
    #[serde(rename = "weekend", default, deserialize_with = "flag_from_number")]
    pub is_weekend: bool,
    /// 1-12
    pub month: u32,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    #[serde(default)]
    pub special_event: Option<String>,
}

impl Observation {
    /// Create an observation with calendar fields derived from the date
    pub fn new(date: NaiveDate, room_type: impl Into<String>, occupancy_rate: f64, price: Decimal) -> Self {
        let day_of_week = date.weekday().num_days_from_monday();
        Self {
            date,
            room_type: room_type.into(),
            occupancy_rate,
            price,
            reservations: 0,
            adr: price,
            revenue: Decimal::ZERO,
            is_weekend: day_of_week >= 5,
            month: date.month(),
            day_of_week,
            special_event: None,
        }
    }

    pub fn with_special_event(mut self, event: impl Into<String>) -> Self {
        self.special_event = Some(event.into());
        self
    }

    /// True when a non-blank event is attached to this day
    pub fn has_special_event(&self) -> bool {
        self.special_event
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }

    /// Revenue per available room for this day
    pub fn revpar(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.price.to_f64().unwrap_or(0.0) * self.occupancy_rate
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if self.room_type.trim().is_empty() {
            return Err(RevenueError::Validation(format!(
                "{}: room_type must not be empty",
                self.date
            )));
        }
        if !self.occupancy_rate.is_finite() || !(0.0..=1.0).contains(&self.occupancy_rate) {
            return Err(RevenueError::Validation(format!(
                "{} {}: occupancy_rate {} outside [0, 1]",
                self.date, self.room_type, self.occupancy_rate
            )));
        }
        for (name, value) in [("price", self.price), ("avg_daily_rate", self.adr), ("revenue", self.revenue)] {
            if value < Decimal::ZERO {
                return Err(RevenueError::Validation(format!(
                    "{} {}: {} must not be negative, got {}",
                    self.date, self.room_type, name, value
                )));
            }
        }
        if !(1..=12).contains(&self.month) {
            return Err(RevenueError::Validation(format!(
                "{} {}: month {} outside 1-12",
                self.date, self.room_type, self.month
            )));
        }
        if self.day_of_week > 6 {
            return Err(RevenueError::Validation(format!(
                "{} {}: day_of_week {} outside 0-6",
                self.date, self.room_type, self.day_of_week
            )));
        }
        let day_of_week = self.date.weekday().num_days_from_monday();
        if self.month != self.date.month()
            || self.day_of_week != day_of_week
            || self.is_weekend != (day_of_week >= 5)
        {
            return Err(RevenueError::Validation(format!(
                "{} {}: calendar fields (month {}, day_of_week {}, weekend {}) disagree with the date",
                self.date, self.room_type, self.month, self.day_of_week, self.is_weekend
            )));
        }
        Ok(())
    }
}

/// Ingestion delivers `weekend` as 0/1; accept booleans too
fn flag_from_number<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Float(f) => f != 0.0,
    })
}

/// Forecast occupancy for one room type on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPrediction {
    pub date: NaiveDate,
    pub room_type: String,
    /// Clipped to [0, 1]
    pub predicted_occupancy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
}

impl DemandPrediction {
    pub fn new(date: NaiveDate, room_type: impl Into<String>, predicted_occupancy: f64) -> Self {
        Self {
            date,
            room_type: room_type.into(),
            predicted_occupancy,
            lower_bound: None,
            upper_bound: None,
        }
    }
}

/// Caller-supplied pricing bounds and assumptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePolicy {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub base_price: Decimal,
    #[serde(default)]
    pub competitor_price: Option<Decimal>,
    /// Sensitivity of the price response to occupancy deviation (unit-less, >= 0)
    pub elasticity: f64,
    /// Rooms available for sale; scales expected revenue when present
    #[serde(default)]
    pub room_inventory: Option<u32>,
}

impl PricePolicy {
    pub fn new(min_price: Decimal, max_price: Decimal, base_price: Decimal, elasticity: f64) -> Self {
        Self {
            min_price,
            max_price,
            base_price,
            competitor_price: None,
            elasticity,
            room_inventory: None,
        }
    }

    pub fn with_competitor_price(mut self, price: Decimal) -> Self {
        self.competitor_price = Some(price);
        self
    }

    pub fn with_inventory(mut self, rooms: u32) -> Self {
        self.room_inventory = Some(rooms);
        self
    }
}

/// Recommended price for one room type on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingDecision {
    pub date: NaiveDate,
    pub room_type: String,
    pub recommended_price: Decimal,
    pub expected_revenue: Decimal,
}
