use tracing::{info, warn};

use crate::constants::reporting::INCONSISTENCY_EPSILON;
use crate::error::{AuctionError, Result};
use crate::observability::metrics::{track_data_inconsistency, track_surplus};

use super::curve::BidCurve;
use super::types::{ClearingOutcome, PeriodStatus, SurplusReport};
use super::SubstationAuction;

/// Apportion the surplus of a cleared period between buyers and sellers.
///
/// Buyers are granted in curve order up to the cleared quantity, price-capped
/// buyers first since they sort to the top. Sellers at or below the clearing
/// price then absorb the granted unresponsive demand before the responsive
/// demand, so one seller step may be split across both buckets.
pub fn apportion(
    outcome: &ClearingOutcome,
    buyers: &BidCurve,
    sellers: &BidCurve,
    price_cap: f64,
) -> SurplusReport {
    let price = outcome.clearing_price;
    let mut report = SurplusReport::default();

    let mut remaining = outcome.clearing_quantity;
    let mut granted_unresponsive = 0.0;
    let mut granted_responsive = 0.0;
    for step in buyers.steps() {
        let take = if step.price >= price {
            step.quantity.min(remaining).max(0.0)
        } else {
            0.0
        };
        report.declined_quantity += step.quantity - take;
        if take <= 0.0 {
            continue;
        }
        remaining -= take;

        if buyers.is_price_capped(step.price, price_cap) {
            granted_unresponsive += take;
            report.granted_unresponsive_buyers += 1;
        } else {
            granted_responsive += take;
            report.granted_responsive_buyers += 1;
            report.consumer_surplus += (step.price - price) * take;
        }
    }
    if report.granted_responsive_buyers > 0 {
        report.average_consumer_surplus =
            report.consumer_surplus / report.granted_responsive_buyers as f64;
    }

    for step in sellers.steps().iter().take_while(|s| s.price <= price) {
        if granted_unresponsive <= 0.0 && granted_responsive <= 0.0 {
            break;
        }
        let margin = price - step.price;

        let to_unresponsive = step.quantity.min(granted_unresponsive);
        granted_unresponsive -= to_unresponsive;
        report.unresponsive_supplier_surplus += margin * to_unresponsive;

        let to_responsive = (step.quantity - to_unresponsive).min(granted_responsive);
        granted_responsive -= to_responsive;
        report.supplier_surplus += margin * to_responsive;
    }

    let unabsorbed = granted_unresponsive + granted_responsive;
    if unabsorbed > INCONSISTENCY_EPSILON {
        report.unabsorbed_quantity = unabsorbed;
    }
    report
}

impl SubstationAuction {
    /// Compute consumer and supplier surplus for the cleared period.
    ///
    /// Granted demand that accepted supply cannot absorb is logged and counted
    /// but does not abort the accounting.
    pub fn surplus(&mut self) -> Result<&SurplusReport> {
        self.ensure_status("compute surplus", &[PeriodStatus::Cleared, PeriodStatus::Settled])?;

        let report = apportion(
            &self.outcome,
            &self.curve_buyer,
            &self.curve_seller,
            self.config.price_cap,
        );

        if !report.is_consistent() {
            let err = AuctionError::DataInconsistency(format!(
                "{:.6} kW of granted demand exceeds accepted supply in period {}",
                report.unabsorbed_quantity, self.period.period_number
            ));
            warn!("Market {}: {}", self.config.name, err);
            track_data_inconsistency();
        }

        track_surplus(&report);
        info!(
            "Market {} surplus: consumer {:.4} (avg {:.4} over {} buyers), supplier {:.4}, unresponsive supplier {:.4}",
            self.config.name,
            report.consumer_surplus,
            report.average_consumer_surplus,
            report.granted_responsive_buyers,
            report.supplier_surplus,
            report.unresponsive_supplier_surplus
        );

        self.surplus = report;
        self.status = PeriodStatus::Settled;
        Ok(&self.surplus)
    }
}
