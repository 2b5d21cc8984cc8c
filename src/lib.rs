pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod services;

pub use config::{Config, MarketConfig};
pub use error::{AuctionError, ErrorCode, Result};
pub use services::market_clearing::{
    AccountingRecord, Bid, BidCurve, ClearingOutcome, ClearingParams, ClearingType,
    MarketClearingEngine, MarketCondition, MarketPeriod, PeriodInput, PeriodReport, PeriodStatus,
    PublicMarketInfo, Role, SubstationAuction, SurplusReport,
};
