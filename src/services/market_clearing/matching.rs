//! Stepwise intersection of the buyer and seller curves.

use std::borrow::Cow;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::MarketConfig;
use crate::error::{AuctionError, Result};
use crate::observability::metrics::{track_clearing_result, track_market_clearing};

use super::curve::BidCurve;
use super::types::{ClearingOutcome, ClearingType, PeriodStatus, SideBreakdown};
use super::SubstationAuction;

/// Numeric knobs of the clearing rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearingParams {
    pub price_cap: f64,
    /// Nudge used to break ties without entering the counterparty's accepted region
    pub bid_offset: f64,
    /// Interpolation weight between the best unmatched bids when nothing trades
    pub clearing_scalar: f64,
}

impl ClearingParams {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            price_cap: config.price_cap,
            bid_offset: config.bid_offset,
            clearing_scalar: config.clearing_scalar,
        }
    }
}

/// Where the next unconsumed step of one curve sits relative to its trial price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    Exhausted,
    AtTrial,
    Moved,
}

impl NextStep {
    fn of(curve: &BidCurve, cursor: usize, trial: f64) -> Self {
        if cursor >= curve.count() {
            NextStep::Exhausted
        } else if curve.price(cursor) == trial {
            NextStep::AtTrial
        } else {
            NextStep::Moved
        }
    }
}

/// State left by the matching walk
#[derive(Debug, Clone, Copy)]
struct Walk {
    buyer_cursor: usize,
    seller_cursor: usize,
    quantity: f64,
    /// Trial buyer price
    a: f64,
    /// Trial seller price
    b: f64,
    /// The last matched pair exhausted both steps at once
    split: bool,
    clearing_type: ClearingType,
}

pub struct MarketClearingEngine;

impl MarketClearingEngine {
    /// Clear one period from the buyer (descending) and seller (ascending) curves
    pub fn clear(buyers: &BidCurve, sellers: &BidCurve, params: &ClearingParams) -> ClearingOutcome {
        let buyers = matching_order(buyers);
        let sellers = matching_order(sellers);
        let cap = params.price_cap;

        let unresponsive_buy = buyers.capped_quantity(cap);
        let unresponsive_sell = sellers.capped_quantity(cap);

        let (clearing_type, price, quantity) = if buyers.is_empty() || sellers.is_empty() {
            Self::clear_one_sided(&buyers, &sellers, params, unresponsive_buy, unresponsive_sell)
        } else {
            let walk = Self::walk(&buyers, &sellers, cap);
            let (clearing_type, price) = Self::resolve(&walk, &buyers, &sellers, params);
            Self::sanity_check(
                clearing_type,
                price,
                walk.quantity,
                &buyers,
                &sellers,
                params,
                unresponsive_buy,
                unresponsive_sell,
            )
        };

        let clearing_price = price.clamp(-cap, cap);
        let (marginal_quantity, marginal_fraction) =
            Self::marginal(clearing_type, clearing_price, quantity, &buyers, &sellers);

        ClearingOutcome {
            clearing_type,
            clearing_price,
            clearing_quantity: quantity,
            marginal_quantity,
            marginal_fraction,
            buyers: SideBreakdown {
                count: buyers.count(),
                unresponsive: unresponsive_buy,
                responsive: buyers.total_quantity() - unresponsive_buy,
            },
            sellers: SideBreakdown {
                count: sellers.count(),
                unresponsive: unresponsive_sell,
                responsive: sellers.total_quantity() - unresponsive_sell,
            },
        }
    }

    fn clear_one_sided(
        buyers: &BidCurve,
        sellers: &BidCurve,
        params: &ClearingParams,
        unresponsive_buy: f64,
        unresponsive_sell: f64,
    ) -> (ClearingType, f64, f64) {
        let price = if !sellers.is_empty() {
            warn!("Market fails to clear due to missing buyers");
            sellers.price(0) - params.bid_offset
        } else if !buyers.is_empty() {
            warn!("Market fails to clear due to missing sellers");
            buyers.price(0) + params.bid_offset
        } else {
            0.0
        };

        if unresponsive_buy > 0.0 {
            (ClearingType::Failure, params.price_cap, 0.0)
        } else if unresponsive_sell > 0.0 {
            (ClearingType::Failure, -params.price_cap, 0.0)
        } else {
            (ClearingType::Null, price, 0.0)
        }
    }

    /// Advance both cursors while the best remaining buyer still accepts the best remaining seller
    fn walk(buyers: &BidCurve, sellers: &BidCurve, cap: f64) -> Walk {
        let mut walk = Walk {
            buyer_cursor: 0,
            seller_cursor: 0,
            quantity: 0.0,
            a: cap,
            b: -cap,
            split: false,
            clearing_type: ClearingType::Null,
        };
        let mut demand = 0.0;
        let mut supply = 0.0;

        while walk.buyer_cursor < buyers.count()
            && walk.seller_cursor < sellers.count()
            && buyers.price(walk.buyer_cursor) >= sellers.price(walk.seller_cursor)
        {
            let i = walk.buyer_cursor;
            let j = walk.seller_cursor;
            let buy_quantity = demand + buyers.quantity(i);
            let sell_quantity = supply + sellers.quantity(j);

            if buy_quantity > sell_quantity {
                supply = sell_quantity;
                walk.quantity = sell_quantity;
                walk.a = buyers.price(i);
                walk.b = walk.a;
                walk.seller_cursor += 1;
                walk.split = false;
                walk.clearing_type = ClearingType::Buyer;
            } else if buy_quantity < sell_quantity {
                demand = buy_quantity;
                walk.quantity = buy_quantity;
                walk.a = sellers.price(j);
                walk.b = walk.a;
                walk.buyer_cursor += 1;
                walk.split = false;
                walk.clearing_type = ClearingType::Seller;
            } else {
                demand = buy_quantity;
                supply = sell_quantity;
                walk.quantity = buy_quantity;
                walk.a = buyers.price(i);
                walk.b = sellers.price(j);
                walk.buyer_cursor += 1;
                walk.seller_cursor += 1;
                walk.split = true;
            }
        }
        walk
    }

    /// Classify the walk and pick the trial price
    fn resolve(
        walk: &Walk,
        buyers: &BidCurve,
        sellers: &BidCurve,
        params: &ClearingParams,
    ) -> (ClearingType, f64) {
        let (a, b) = (walk.a, walk.b);
        if !walk.split {
            let price = if a == b { a } else { 0.0 };
            return (walk.clearing_type, price);
        }

        let next_buyer = NextStep::of(buyers, walk.buyer_cursor, a);
        let next_seller = NextStep::of(sellers, walk.seller_cursor, b);
        let exact_or_price = if a == b {
            ClearingType::Exact
        } else {
            ClearingType::Price
        };

        use NextStep::*;
        let clearing_type = match (next_buyer, next_seller) {
            (Exhausted, Exhausted) => exact_or_price,
            (Exhausted, AtTrial) => ClearingType::Seller,
            (AtTrial, Exhausted) => ClearingType::Buyer,
            (Exhausted, Moved) | (Moved, Exhausted) => exact_or_price,
            (AtTrial, Moved) => ClearingType::Buyer,
            (Moved, AtTrial) => ClearingType::Seller,
            (AtTrial, AtTrial) => exact_or_price,
            (Moved, Moved) => exact_or_price,
        };

        let price = match clearing_type {
            ClearingType::Seller => b,
            ClearingType::Price => Self::price_between(walk, buyers, sellers, params),
            _ => a,
        };
        (clearing_type, price)
    }

    /// Price strictly inside the gap between the last matched buyer and seller
    /// that does not pull in the next unconsumed step of either curve
    fn price_between(
        walk: &Walk,
        buyers: &BidCurve,
        sellers: &BidCurve,
        params: &ClearingParams,
    ) -> f64 {
        let (a, b) = (walk.a, walk.b);
        let cap = params.price_cap;
        let offset = params.bid_offset;
        let next_buyer = (walk.buyer_cursor < buyers.count()).then(|| buyers.price(walk.buyer_cursor));
        let next_seller =
            (walk.seller_cursor < sellers.count()).then(|| sellers.price(walk.seller_cursor));

        let buyer_capped = a == cap;
        let seller_capped = b == -cap;

        match (buyer_capped, seller_capped) {
            (true, false) => match next_buyer {
                Some(p) if p > b => p + offset,
                _ => b,
            },
            (false, true) => match next_seller {
                Some(p) if p < a => p - offset,
                _ => a,
            },
            (true, true) => match (next_buyer, next_seller) {
                (None, None) => 0.0,
                (Some(p), None) => p + offset,
                (None, Some(p)) => p - offset,
                (Some(high), Some(low)) => (high + low) / 2.0,
            },
            (false, false) => {
                let avg = (a + b) / 2.0;
                if next_buyer == Some(a) {
                    a
                } else if next_seller == Some(b) {
                    b
                } else if let Some(p) = next_buyer.filter(|&p| avg < p) {
                    p + offset
                } else if let Some(p) = next_seller.filter(|&p| avg > p) {
                    p - offset
                } else {
                    avg
                }
            }
        }
    }

    /// Downgrade outcomes that traded nothing or left price-capped quantity unserved
    #[allow(clippy::too_many_arguments)]
    fn sanity_check(
        clearing_type: ClearingType,
        price: f64,
        quantity: f64,
        buyers: &BidCurve,
        sellers: &BidCurve,
        params: &ClearingParams,
        unresponsive_buy: f64,
        unresponsive_sell: f64,
    ) -> (ClearingType, f64, f64) {
        let cap = params.price_cap;
        if quantity == 0.0 {
            let best_buyer = buyers.price(0);
            let best_seller = sellers.price(0);
            let offset = params.bid_offset;
            let at_cap = |p: f64| p == cap || p == -cap;
            let price = match (at_cap(best_buyer), at_cap(best_seller)) {
                (false, true) if best_seller == cap => best_buyer + offset,
                (false, true) => best_seller - offset,
                (true, false) if best_buyer == -cap => best_seller - offset,
                (true, false) => best_buyer + offset,
                _ => best_seller + (best_buyer - best_seller) * params.clearing_scalar,
            };
            (ClearingType::Null, price, quantity)
        } else if quantity < unresponsive_buy {
            (ClearingType::Failure, cap, quantity)
        } else if quantity < unresponsive_sell {
            (ClearingType::Failure, -cap, quantity)
        } else if quantity == unresponsive_buy && quantity == unresponsive_sell {
            (ClearingType::Price, 0.0, quantity)
        } else {
            (clearing_type, price, quantity)
        }
    }

    /// Quantity and fraction accepted from the bids exactly at the clearing price
    fn marginal(
        clearing_type: ClearingType,
        price: f64,
        quantity: f64,
        buyers: &BidCurve,
        sellers: &BidCurve,
    ) -> (f64, f64) {
        let (inside, at_price) = match clearing_type {
            ClearingType::Buyer => split_at_price(buyers, |p| p > price, price),
            ClearingType::Seller => split_at_price(sellers, |p| p < price, price),
            _ => return (0.0, 0.0),
        };

        let marginal_quantity = (quantity - inside).clamp(0.0, quantity);
        let marginal_fraction = if at_price > 0.0 {
            (marginal_quantity / at_price).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (marginal_quantity, marginal_fraction)
    }
}

/// Sum of quantity strictly better than `price` and quantity exactly at it
fn split_at_price(curve: &BidCurve, better: impl Fn(f64) -> bool, price: f64) -> (f64, f64) {
    curve.steps().iter().fold((0.0, 0.0), |(inside, at), step| {
        if better(step.price) {
            (inside + step.quantity, at)
        } else if step.price == price {
            (inside, at + step.quantity)
        } else {
            (inside, at)
        }
    })
}

fn matching_order(curve: &BidCurve) -> Cow<'_, BidCurve> {
    debug_assert!(
        curve.is_sorted_for_matching(),
        "{}",
        AuctionError::InvalidOrderingPrecondition { side: curve.side() }
    );
    if curve.is_sorted_for_matching() {
        return Cow::Borrowed(curve);
    }
    warn!(
        "{}; re-sorting a copy before clearing",
        AuctionError::InvalidOrderingPrecondition { side: curve.side() }
    );
    let mut sorted = curve.clone();
    sorted.sort_for_matching();
    Cow::Owned(sorted)
}

impl SubstationAuction {
    /// Compute clearing price, quantity, type and marginal allocation for the period
    pub fn clear_market(&mut self) -> Result<&ClearingOutcome> {
        self.ensure_status(
            "clear market",
            &[
                PeriodStatus::Aggregated,
                PeriodStatus::Cleared,
                PeriodStatus::Settled,
            ],
        )?;

        let start_time = Instant::now();
        let params = ClearingParams::from_config(&self.config);
        let outcome = MarketClearingEngine::clear(&self.curve_buyer, &self.curve_seller, &params);
        track_market_clearing(outcome.clearing_quantity, start_time.elapsed().as_secs_f64());
        track_clearing_result(&outcome);

        debug!(
            "Market {} buyers: count {}, unresponsive {:.3}, responsive {:.3}",
            self.config.name,
            outcome.buyers.count,
            outcome.buyers.unresponsive,
            outcome.buyers.responsive
        );
        debug!(
            "Market {} sellers: count {}, unresponsive {:.3}, responsive {:.3}",
            self.config.name,
            outcome.sellers.count,
            outcome.sellers.unresponsive,
            outcome.sellers.responsive
        );
        info!(
            "Market {} period {} cleared {} at {:.6} $/kWh for {:.3} kW (marginal {:.3} kW, {:.4})",
            self.config.name,
            self.period.period_number,
            outcome.clearing_type,
            outcome.clearing_price,
            outcome.clearing_quantity,
            outcome.marginal_quantity,
            outcome.marginal_fraction
        );

        self.outcome = outcome;
        self.status = PeriodStatus::Cleared;
        Ok(&self.outcome)
    }
}
