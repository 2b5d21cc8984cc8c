use tracing::debug;

use crate::error::Result;

use super::types::{MarketCondition, PeriodStatus};
use super::SubstationAuction;

impl SubstationAuction {
    /// Fold the unresponsive estimates into the curves and sort both sides.
    ///
    /// Unresponsive demand enters the buyer curve at the price cap and the
    /// backstop supply enters the seller curve at the reference price. Steps
    /// injected by an earlier call are removed first so repeated calls without
    /// new bids leave the curves unchanged. Re-aggregating a cleared period
    /// requires clearing it again before the surplus can be computed.
    pub fn aggregate_bids(&mut self) -> Result<()> {
        self.ensure_status(
            "aggregate bids",
            &[
                PeriodStatus::Active,
                PeriodStatus::Aggregated,
                PeriodStatus::Cleared,
                PeriodStatus::Settled,
            ],
        )?;

        self.curve_buyer.remove_injected();
        self.curve_seller.remove_injected();

        if self.unresponsive_buy > 0.0 {
            self.curve_buyer
                .add_injected_step(self.config.price_cap, self.unresponsive_buy)?;
        }
        if self.unresponsive_sell > 0.0 {
            self.curve_seller
                .add_injected_step(self.reference_price, self.unresponsive_sell)?;
        }

        self.curve_buyer.sort_for_matching();
        self.curve_seller.sort_for_matching();

        self.buyer_aggregate = self.curve_buyer.aggregate(self.config.price_cap);
        self.seller_aggregate = self.curve_seller.aggregate(self.config.price_cap);
        self.market_condition = MarketCondition::from_counts(&self.role_counts);

        debug!(
            "$$ Unresp {:.3}, BuyCount {}, BuyTotal {:.3}, BuyOn {:.3}, BuyOff {:.3}",
            self.unresponsive_buy,
            self.curve_buyer.count(),
            self.curve_buyer.total_quantity(),
            self.curve_buyer.total_on(),
            self.curve_buyer.total_off()
        );
        debug!(
            "$$ Backstop {:.3}, SellCount {}, SellTotal {:.3}, SellOn {:.3}, SellOff {:.3}",
            self.unresponsive_sell,
            self.curve_seller.count(),
            self.curve_seller.total_quantity(),
            self.curve_seller.total_on(),
            self.curve_seller.total_off()
        );
        debug!(
            "Market {} period {} is {:?} with {} buyers, {} sellers, {} nonparticipants",
            self.config.name,
            self.period.period_number,
            self.market_condition,
            self.role_counts.num_buyers,
            self.role_counts.num_sellers,
            self.role_counts.num_nonparticipants
        );

        self.status = PeriodStatus::Aggregated;
        Ok(())
    }
}
