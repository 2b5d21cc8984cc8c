use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::observability::metrics::track_bid_rejected;

use super::epoch::MarketPeriod;
use super::publication::{AccountingRecord, PublicMarketInfo};
use super::types::{AggregateCurve, Bid, ClearingOutcome, MarketCondition, Role, SurplusReport};
use super::SubstationAuction;

/// Everything one period needs from the collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PeriodInput {
    pub reference_price: Option<f64>,
    pub reference_load: Option<f64>,
    /// Must-serve load not covered by any bid (kW)
    pub unresponsive_load: f64,
    pub bids: Vec<Bid>,
    /// Direct supplier steps as `(price, quantity)`
    pub supplier_bids: Vec<(f64, f64)>,
}

impl PeriodInput {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Published results of one full period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodReport {
    pub period: MarketPeriod,
    pub rejected_bids: usize,
    pub market_condition: MarketCondition,
    pub buyer_aggregate: AggregateCurve,
    pub seller_aggregate: AggregateCurve,
    pub outcome: ClearingOutcome,
    pub surplus: SurplusReport,
    pub record: AccountingRecord,
    pub public_info: PublicMarketInfo,
}

impl SubstationAuction {
    /// Drive one period through `clear_bids -> collect_bid* -> aggregate_bids -> clear_market -> surplus`.
    ///
    /// Invalid bids and supplier steps are skipped and counted; any other error
    /// aborts the period.
    #[instrument(skip(self, input), fields(market = %self.config.name, bids = input.bids.len()))]
    pub fn run_period(&mut self, input: PeriodInput) -> Result<PeriodReport> {
        self.clear_bids();

        if let Some(price) = input.reference_price {
            self.set_reference_price(price)?;
        }
        if let Some(load) = input.reference_load {
            self.set_reference_load(load)?;
        }

        let mut rejected_bids = 0;
        for bid in input.bids {
            match self.collect_bid(bid) {
                Ok(()) => {}
                Err(e) if e.is_bid_rejection() => rejected_bids += 1,
                Err(e) => return Err(e),
            }
        }
        for (price, quantity) in input.supplier_bids {
            match self.supplier_bid(price, quantity) {
                Ok(()) => {}
                Err(e) if e.is_bid_rejection() => {
                    warn!(
                        "Rejected supplier bid ({}, {}) for market {}: {}",
                        price, quantity, self.config.name, e
                    );
                    track_bid_rejected(Role::Seller);
                    rejected_bids += 1;
                }
                Err(e) => return Err(e),
            }
        }
        if input.unresponsive_load > 0.0 {
            self.add_unresponsive_load(input.unresponsive_load)?;
        }

        self.aggregate_bids()?;
        self.clear_market()?;
        self.surplus()?;

        if rejected_bids > 0 {
            info!("Skipped {} invalid bids", rejected_bids);
        }

        Ok(PeriodReport {
            period: self.period.clone(),
            rejected_bids,
            market_condition: self.market_condition,
            buyer_aggregate: self.buyer_aggregate,
            seller_aggregate: self.seller_aggregate,
            outcome: self.outcome.clone(),
            surplus: self.surplus.clone(),
            record: self.accounting_record(),
            public_info: self.public_info(),
        })
    }
}
