use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::constants::{market, pricing};
use crate::error::{AuctionError, Result};

/// Configuration of one substation market
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MarketConfig {
    /// Market name used in logs and records (default: "Market_1")
    pub name: String,

    /// Maximum admissible bid price in $/kWh; `±price_cap` marks unresponsive steps (default: 1.0)
    pub price_cap: f64,

    /// Historical mean price the market starts from in $/kWh (default: 0.02078)
    pub initial_price: f64,

    /// Historical price standard deviation in $/kWh (default: 0.01)
    pub initial_std_dev: f64,

    /// Settlement period length in seconds (default: 300)
    pub period_secs: u64,

    /// Backstop supply the grid offers unless seller bids pre-empt it, in kW (default: 5000.0)
    pub max_capacity_reference_bid_quantity: f64,

    /// Tie-break nudge in $/kWh (default: 1e-4)
    pub bid_offset: f64,

    /// Interpolation weight between best bids when nothing trades (default: 0.5)
    pub clearing_scalar: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            name: market::DEFAULT_MARKET_NAME.to_string(),
            price_cap: pricing::DEFAULT_PRICE_CAP,
            initial_price: pricing::DEFAULT_INITIAL_PRICE,
            initial_std_dev: pricing::DEFAULT_INITIAL_STD_DEV,
            period_secs: market::DEFAULT_PERIOD_SECS,
            max_capacity_reference_bid_quantity: market::DEFAULT_MAX_CAPACITY_REFERENCE_BID_QUANTITY,
            bid_offset: pricing::BID_OFFSET,
            clearing_scalar: pricing::CLEARING_SCALAR,
        }
    }
}

impl MarketConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> std::result::Result<Self, ValidationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults on bad values
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("AUCTION_MARKET_NAME") {
            if name.trim().is_empty() {
                warn!("Invalid market name: empty, using default");
            } else {
                info!("Using custom market name: {}", name);
                config.name = name;
            }
        }

        override_value(
            &lookup,
            "AUCTION_PRICE_CAP",
            "price cap",
            "must be > 0",
            |cap: &f64| *cap > 0.0 && cap.is_finite(),
            &mut config.price_cap,
        );
        override_value(
            &lookup,
            "AUCTION_INIT_PRICE",
            "initial price",
            "must be finite",
            |price: &f64| price.is_finite(),
            &mut config.initial_price,
        );
        override_value(
            &lookup,
            "AUCTION_INIT_STDEV",
            "initial price std dev",
            "must be >= 0",
            |std_dev: &f64| *std_dev >= 0.0 && std_dev.is_finite(),
            &mut config.initial_std_dev,
        );
        override_value(
            &lookup,
            "AUCTION_PERIOD_SECS",
            "period seconds",
            "must be between 1 and 86400",
            |secs: &u64| (market::MIN_PERIOD_SECS..=market::MAX_PERIOD_SECS).contains(secs),
            &mut config.period_secs,
        );
        override_value(
            &lookup,
            "AUCTION_MAX_CAPACITY_REFERENCE_BID_QUANTITY",
            "backstop quantity",
            "must be >= 0",
            |quantity: &f64| *quantity >= 0.0 && quantity.is_finite(),
            &mut config.max_capacity_reference_bid_quantity,
        );
        override_value(
            &lookup,
            "AUCTION_BID_OFFSET",
            "bid offset",
            "must be > 0",
            |offset: &f64| *offset > 0.0 && offset.is_finite(),
            &mut config.bid_offset,
        );
        override_value(
            &lookup,
            "AUCTION_CLEARING_SCALAR",
            "clearing scalar",
            "must be between 0 and 1",
            |scalar: &f64| (0.0..=1.0).contains(scalar),
            &mut config.clearing_scalar,
        );

        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config
            .validate()
            .map_err(|e| AuctionError::Configuration(e.to_string()))?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if !(self.price_cap > 0.0 && self.price_cap.is_finite()) {
            return Err(ValidationError::InvalidPriceCap(self.price_cap));
        }
        if !self.initial_price.is_finite() || self.initial_price.abs() > self.price_cap {
            return Err(ValidationError::InitialPriceOutsideCap {
                price: self.initial_price,
                cap: self.price_cap,
            });
        }
        if !(market::MIN_PERIOD_SECS..=market::MAX_PERIOD_SECS).contains(&self.period_secs) {
            return Err(ValidationError::InvalidPeriod(self.period_secs));
        }
        if !(self.max_capacity_reference_bid_quantity >= 0.0
            && self.max_capacity_reference_bid_quantity.is_finite())
        {
            return Err(ValidationError::InvalidBackstopQuantity(
                self.max_capacity_reference_bid_quantity,
            ));
        }
        if !(self.bid_offset > 0.0 && self.bid_offset < self.price_cap) {
            return Err(ValidationError::InvalidBidOffset(self.bid_offset));
        }
        if !(0.0..=1.0).contains(&self.clearing_scalar) {
            return Err(ValidationError::InvalidClearingScalar(self.clearing_scalar));
        }
        Ok(())
    }
}

fn override_value<T, F, V>(
    lookup: &F,
    key: &str,
    label: &str,
    requirement: &str,
    is_valid: V,
    target: &mut T,
) where
    T: FromStr + Display,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(val) = lookup(key) else {
        return;
    };
    match val.trim().parse::<T>() {
        Ok(parsed) if is_valid(&parsed) => {
            info!("Using custom {}: {}", label, parsed);
            *target = parsed;
        }
        Ok(_) => warn!("Invalid {}: {}, {}, using default", label, val, requirement),
        Err(_) => warn!("Failed to parse {}: {}, using default", label, val),
    }
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Price cap {0} must be a positive finite number")]
    InvalidPriceCap(f64),

    #[error("Initial price {price} lies outside the price cap band of ±{cap}")]
    InitialPriceOutsideCap { price: f64, cap: f64 },

    #[error("Period length {0}s must be between 1s and one day")]
    InvalidPeriod(u64),

    #[error("Backstop quantity {0} kW must be non-negative")]
    InvalidBackstopQuantity(f64),

    #[error("Bid offset {0} must be positive and below the price cap")]
    InvalidBidOffset(f64),

    #[error("Clearing scalar {0} must be between 0 and 1")]
    InvalidClearingScalar(f64),
}
