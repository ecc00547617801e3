//! Hotel Revenue Optimizer
//!
//! Command-line glue around the forecaster and the pricing engine. Observations, models and
//! results are exchanged as JSON files.

use anyhow::Context;
use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};
use hotel_revenue::{
    config::Config,
    forecast::{DemandForecaster, TrainedModel},
    pricing::{recommendations, PricingEngine},
    testing::{synthetic_history, SyntheticConfig},
    types::{Observation, PricePolicy},
};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hotel-revenue")]
#[command(about = "Demand forecasting and price recommendation for hotel room types")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic observation history
    Sample {
        #[arg(short, long, default_value = "history.json")]
        output: PathBuf,
        /// Number of days
        #[arg(long, default_value = "90")]
        days: i64,
        /// First date (YYYY-MM-DD)
        #[arg(long, default_value = "2023-01-01")]
        start: NaiveDate,
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Train a model on an observation history
    Train {
        /// Observations (JSON array)
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the trained model
        #[arg(short, long, default_value = "model.json")]
        model: PathBuf,
    },
    /// Forecast occupancy for a room type
    Forecast {
        #[arg(short, long, default_value = "model.json")]
        model: PathBuf,
        #[arg(short, long)]
        room_type: String,
        /// First forecast date; defaults to the day after the training history
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(short, long, default_value = "7")]
        days: i64,
    },
    /// Forecast and price a room type
    Price {
        #[arg(short, long, default_value = "model.json")]
        model: PathBuf,
        #[arg(short, long)]
        room_type: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(short, long, default_value = "7")]
        days: i64,
        #[arg(long)]
        min_price: Decimal,
        #[arg(long)]
        max_price: Decimal,
        #[arg(long)]
        base_price: Decimal,
        #[arg(long, default_value = "1.0")]
        elasticity: f64,
        #[arg(long)]
        competitor_price: Option<Decimal>,
        /// Rooms available per night
        #[arg(long)]
        inventory: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Sample {
            output,
            days,
            start,
            seed,
        } => sample(&output, start, days, seed),
        Commands::Train { input, model } => train(config, &input, &model),
        Commands::Forecast {
            model,
            room_type,
            start,
            days,
        } => forecast(&model, &room_type, start, days),
        Commands::Price {
            model,
            room_type,
            start,
            days,
            min_price,
            max_price,
            base_price,
            elasticity,
            competitor_price,
            inventory,
        } => {
            let mut policy = PricePolicy::new(min_price, max_price, base_price, elasticity);
            policy.competitor_price = competitor_price;
            policy.room_inventory = inventory;
            price(config, &model, &room_type, start, days, &policy)
        }
    }
}

fn sample(output: &Path, start: NaiveDate, days: i64, seed: u64) -> anyhow::Result<()> {
    let history = synthetic_history(&SyntheticConfig {
        start,
        days,
        seed,
        ..Default::default()
    });
    fs::write(output, serde_json::to_string_pretty(&history)?)
        .with_context(|| format!("writing {}", output.display()))?;
    tracing::info!(rows = history.len(), path = %output.display(), "Wrote sample history");
    Ok(())
}

fn train(config: Config, input: &Path, model_path: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let observations: Vec<Observation> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;

    let mut forecaster = DemandForecaster::new(config.features, config.forecaster);
    let (model, mae) = forecaster.train(&observations)?;

    fs::write(model_path, model.to_json()?)
        .with_context(|| format!("writing {}", model_path.display()))?;

    println!("Validation MAE: {:.4}", mae);
    println!("Top features:");
    for (name, importance) in model.feature_importance().iter().take(5) {
        println!("  {:<24} {:.3}", name, importance);
    }
    Ok(())
}

fn load_model(path: &Path) -> anyhow::Result<TrainedModel> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(TrainedModel::from_json(&raw)?)
}

fn default_start(model: &TrainedModel, start: Option<NaiveDate>) -> anyhow::Result<NaiveDate> {
    match start {
        Some(date) => Ok(date),
        None => model
            .summary()
            .last_date
            .checked_add_days(Days::new(1))
            .context("training history ends at the last representable date"),
    }
}

fn forecast(model_path: &Path, room_type: &str, start: Option<NaiveDate>, days: i64) -> anyhow::Result<()> {
    let model = load_model(model_path)?;
    let start = default_start(&model, start)?;
    let predictions = model.predict_demand(start, days, room_type)?;
    println!("{}", serde_json::to_string_pretty(&predictions)?);
    Ok(())
}

fn price(
    config: Config,
    model_path: &Path,
    room_type: &str,
    start: Option<NaiveDate>,
    days: i64,
    policy: &PricePolicy,
) -> anyhow::Result<()> {
    let model = load_model(model_path)?;
    let start = default_start(&model, start)?;
    let predictions = model.predict_demand(start, days, room_type)?;

    let engine = PricingEngine::new(config.pricing);
    let decisions = engine.compute_prices(&predictions, policy)?;

    for (decision, prediction) in decisions.iter().zip(&predictions) {
        println!(
            "{}  {:>5.1}%  {:>9}  {:>10}",
            decision.date,
            prediction.predicted_occupancy * 100.0,
            decision.recommended_price,
            decision.expected_revenue
        );
        for advice in recommendations(decision, prediction, policy) {
            println!("    - {}", advice);
        }
    }
    Ok(())
}
