use tracing::{debug, warn};

use crate::error::{AuctionError, Result};
use crate::observability::metrics::{track_bid_collected, track_bid_rejected};

use super::curve::BidCurve;
use super::types::{
    AggregateCurve, Bid, ClearingOutcome, CurveSide, MarketCondition, PeriodStatus, Role,
    RoleCounts, SurplusReport,
};
use super::SubstationAuction;

impl SubstationAuction {
    /// Discard the previous period and start collecting bids for the next one.
    ///
    /// The unresponsive buy estimate restarts at zero and the sell estimate at
    /// the configured backstop quantity the grid can always supply.
    pub fn clear_bids(&mut self) {
        if self.status != PeriodStatus::Pending {
            self.period = self.period.next();
        }
        self.reset_period_state();
    }

    pub(super) fn reset_period_state(&mut self) {
        self.curve_buyer = BidCurve::new(CurveSide::Buyer);
        self.curve_seller = BidCurve::new(CurveSide::Seller);
        self.bids.clear();
        self.role_counts = RoleCounts::default();
        self.unresponsive_buy = 0.0;
        self.unresponsive_sell = self.config.max_capacity_reference_bid_quantity;
        self.buyer_aggregate = AggregateCurve::default();
        self.seller_aggregate = AggregateCurve::default();
        self.market_condition = MarketCondition::default();
        self.outcome = ClearingOutcome::default();
        self.surplus = SurplusReport::default();
        self.status = PeriodStatus::Active;
        debug!(
            "Opened period {} for market {}",
            self.period.period_number, self.config.name
        );
    }

    /// Gather one bid into the period.
    ///
    /// Every valid bid is kept for role statistics; only positive price and
    /// quantity bids become curve steps. A seller bid pre-empts part of the
    /// backstop supply, and a buyer whose bid does not cover its baseline adds
    /// that baseline to the unresponsive load.
    pub fn collect_bid(&mut self, bid: Bid) -> Result<()> {
        self.ensure_status("collect bid", &[PeriodStatus::Active, PeriodStatus::Aggregated])?;

        if let Err(e) = validate_bid(&bid, self.config.price_cap) {
            warn!(
                "Rejected {} bid for market {}: {} ({})",
                bid.role.as_str(),
                self.config.name,
                e,
                e.code().message()
            );
            track_bid_rejected(bid.role);
            return Err(e);
        }

        let participates = bid.price > 0.0 && bid.quantity > 0.0;
        match bid.role {
            Role::Seller => {
                self.unresponsive_sell -= bid.quantity;
                if participates {
                    let price = self.step_price(&bid, CurveSide::Seller);
                    self.curve_seller.add_step(price, bid.quantity, true)?;
                }
            }
            Role::Buyer => {
                if !bid.base_covered {
                    self.unresponsive_buy += bid.unresponsive_load;
                }
                if participates {
                    let price = self.step_price(&bid, CurveSide::Buyer);
                    self.curve_buyer.add_step(price, bid.quantity, bid.on_state)?;
                }
            }
            Role::None => {}
        }

        track_bid_collected(bid.role, participates);
        self.role_counts.record(bid.role);
        self.bids.push(bid);
        // new bids invalidate any earlier aggregation
        self.status = PeriodStatus::Active;
        Ok(())
    }

    /// Enter a supplier step directly, e.g. a wholesale block that is not a participant
    pub fn supplier_bid(&mut self, price: f64, quantity: f64) -> Result<()> {
        self.ensure_status("add supplier bid", &[PeriodStatus::Active, PeriodStatus::Aggregated])?;
        check_price_band(price, self.config.price_cap)?;
        self.curve_seller.add_step(price, quantity, false)?;
        self.status = PeriodStatus::Active;
        Ok(())
    }

    /// Add must-serve load not represented by any bid (losses, non-bidding devices)
    pub fn add_unresponsive_load(&mut self, quantity: f64) -> Result<()> {
        self.ensure_status(
            "add unresponsive load",
            &[PeriodStatus::Active, PeriodStatus::Aggregated],
        )?;
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(AuctionError::InvalidQuantity(quantity));
        }
        self.unresponsive_buy += quantity;
        self.status = PeriodStatus::Active;
        Ok(())
    }

    fn step_price(&self, bid: &Bid, side: CurveSide) -> f64 {
        match (bid.is_price_capped, side) {
            (false, _) => bid.price,
            (true, CurveSide::Buyer) => self.config.price_cap,
            (true, CurveSide::Seller) => -self.config.price_cap,
        }
    }
}

fn validate_bid(bid: &Bid, price_cap: f64) -> Result<()> {
    if !bid.quantity.is_finite() || bid.quantity < 0.0 {
        return Err(AuctionError::InvalidQuantity(bid.quantity));
    }
    check_price_band(bid.price, price_cap)?;
    if !bid.unresponsive_load.is_finite() || bid.unresponsive_load < 0.0 {
        return Err(AuctionError::InvalidQuantity(bid.unresponsive_load));
    }
    Ok(())
}

/// Admissible prices lie in `[-price_cap, price_cap]`
fn check_price_band(price: f64, price_cap: f64) -> Result<()> {
    if !price.is_finite() || price.abs() > price_cap {
        return Err(AuctionError::InvalidPrice(price));
    }
    Ok(())
}
