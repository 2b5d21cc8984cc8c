//! Substation double-auction market.
//!
//! One `SubstationAuction` owns a buyer curve and a seller curve for the
//! current period and is driven through
//! `clear_bids -> collect_bid* -> aggregate_bids -> clear_market -> surplus`
//! by an external scheduler. The engine is synchronous and holds no locks;
//! a host sharing it between threads wraps it in its own mutex.

pub mod aggregation;
pub mod bids;
pub mod curve;
pub mod epoch;
pub mod matching;
pub mod period;
pub mod publication;
pub mod surplus;
pub mod types;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::MarketConfig;
use crate::error::{AuctionError, Result};

pub use curve::{BidCurve, CurveStep};
pub use epoch::MarketPeriod;
pub use matching::{ClearingParams, MarketClearingEngine};
pub use period::{PeriodInput, PeriodReport};
pub use publication::{AccountingRecord, ClearingDiagnostics, MetricMetadata, PublicMarketInfo};
pub use types::*;

#[derive(Debug, Clone)]
pub struct SubstationAuction {
    config: MarketConfig,
    period: MarketPeriod,
    status: PeriodStatus,

    // updated in collect_bid, used in clear_market
    bids: Vec<Bid>,
    curve_buyer: BidCurve,
    curve_seller: BidCurve,
    role_counts: RoleCounts,
    unresponsive_buy: f64,  // kW
    unresponsive_sell: f64, // kW

    reference_price: f64, // $/kWh, wholesale LMP
    reference_price_std_dev: f64,
    reference_load: f64,  // kW, substation load

    // updated in aggregate_bids
    buyer_aggregate: AggregateCurve,
    seller_aggregate: AggregateCurve,
    market_condition: MarketCondition,

    // updated in clear_market and surplus
    outcome: ClearingOutcome,
    surplus: SurplusReport,
}

impl SubstationAuction {
    pub fn new(config: MarketConfig) -> Self {
        let period = MarketPeriod::containing(Utc::now(), config.period_secs);
        let outcome = ClearingOutcome {
            clearing_price: config.initial_price,
            ..ClearingOutcome::default()
        };
        Self {
            reference_price: config.initial_price,
            reference_price_std_dev: config.initial_std_dev,
            unresponsive_sell: config.max_capacity_reference_bid_quantity,
            curve_buyer: BidCurve::new(CurveSide::Buyer),
            curve_seller: BidCurve::new(CurveSide::Seller),
            period,
            status: PeriodStatus::Pending,
            bids: Vec::new(),
            role_counts: RoleCounts::default(),
            unresponsive_buy: 0.0,
            reference_load: 0.0,
            buyer_aggregate: AggregateCurve::default(),
            seller_aggregate: AggregateCurve::default(),
            market_condition: MarketCondition::default(),
            outcome,
            surplus: SurplusReport::default(),
            config,
        }
    }

    /// Reset clearing price and reference price to the configured historical
    /// mean and the price spread to the historical standard deviation
    pub fn init_auction(&mut self) {
        self.outcome.clearing_price = self.config.initial_price;
        self.reference_price = self.config.initial_price;
        self.reference_price_std_dev = self.config.initial_std_dev;
        info!(
            "Initialized market {} at {:.6} $/kWh (std dev {:.6})",
            self.config.name, self.config.initial_price, self.config.initial_std_dev
        );
    }

    /// Start collecting bids for the period containing `timestamp`
    pub fn open_period(&mut self, timestamp: DateTime<Utc>) {
        self.period = MarketPeriod::containing(timestamp, self.config.period_secs);
        self.reset_period_state();
    }

    /// Latest locational marginal price from the bulk system market
    pub fn set_reference_price(&mut self, price: f64) -> Result<()> {
        if !price.is_finite() {
            return Err(AuctionError::InvalidPrice(price));
        }
        self.reference_price = price;
        Ok(())
    }

    /// Latest substation load in kW, kept for diagnostics
    pub fn set_reference_load(&mut self, load: f64) -> Result<()> {
        if !load.is_finite() {
            return Err(AuctionError::InvalidQuantity(load));
        }
        self.reference_load = load;
        Ok(())
    }

    pub(crate) fn ensure_status(
        &self,
        operation: &'static str,
        allowed: &[PeriodStatus],
    ) -> Result<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(AuctionError::out_of_order(operation, self.status))
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn period(&self) -> &MarketPeriod {
        &self.period
    }

    pub fn status(&self) -> PeriodStatus {
        self.status
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn buyer_curve(&self) -> &BidCurve {
        &self.curve_buyer
    }

    pub fn seller_curve(&self) -> &BidCurve {
        &self.curve_seller
    }

    pub fn role_counts(&self) -> RoleCounts {
        self.role_counts
    }

    pub fn unresponsive_buy_estimate(&self) -> f64 {
        self.unresponsive_buy
    }

    pub fn unresponsive_sell_estimate(&self) -> f64 {
        self.unresponsive_sell
    }

    pub fn reference_price(&self) -> f64 {
        self.reference_price
    }

    /// Historical spread of the reference price in $/kWh
    pub fn reference_price_std_dev(&self) -> f64 {
        self.reference_price_std_dev
    }

    pub fn reference_load(&self) -> f64 {
        self.reference_load
    }

    pub fn buyer_aggregate(&self) -> &AggregateCurve {
        &self.buyer_aggregate
    }

    pub fn seller_aggregate(&self) -> &AggregateCurve {
        &self.seller_aggregate
    }

    pub fn market_condition(&self) -> MarketCondition {
        self.market_condition
    }

    pub fn outcome(&self) -> &ClearingOutcome {
        &self.outcome
    }

    /// Published clearing price of the latest clear
    pub fn clearing_price(&self) -> f64 {
        self.outcome.clearing_price
    }

    pub fn surplus_report(&self) -> &SurplusReport {
        &self.surplus
    }
}
