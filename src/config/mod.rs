use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

use crate::constants::logging;

pub mod market;
pub use market::{MarketConfig, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: String,
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format
    pub log_json: bool,
    pub market: MarketConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| logging::DEFAULT_LEVEL.to_string()),
            log_json: env::var("LOG_JSON")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            market: MarketConfig::from_env()
                .map_err(|e| anyhow::anyhow!("Failed to load market config: {}", e))?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Production deployments always log JSON lines
    pub fn json_logs(&self) -> bool {
        self.log_json || self.is_production()
    }
}
