use metrics::{counter, gauge, histogram};

use crate::services::market_clearing::types::{ClearingOutcome, Role, SurplusReport};

/// Track an accepted bid
pub fn track_bid_collected(role: Role, on_curve: bool) {
    counter!(
        "auction_bids_collected_total",
        "role" => role.as_str(),
        "on_curve" => on_curve.to_string()
    )
    .increment(1);
}

/// Track a bid rejected for invalid price or quantity
pub fn track_bid_rejected(role: Role) {
    counter!("auction_bids_rejected_total", "role" => role.as_str()).increment(1);
}

/// Track one market clearing run
pub fn track_market_clearing(quantity: f64, duration_secs: f64) {
    counter!("auction_clearings_total").increment(1);
    histogram!("auction_clearing_duration_seconds").record(duration_secs);
    histogram!("auction_clearing_quantity_kw").record(quantity);
}

/// Track the published outcome of a clearing
pub fn track_clearing_result(outcome: &ClearingOutcome) {
    counter!(
        "auction_clearing_type_total",
        "type" => outcome.clearing_type.as_str()
    )
    .increment(1);
    gauge!("auction_clearing_price").set(outcome.clearing_price);
    gauge!("auction_clearing_quantity").set(outcome.clearing_quantity);
    gauge!("auction_marginal_fraction").set(outcome.marginal_fraction);
}

pub fn track_surplus(report: &SurplusReport) {
    gauge!("auction_consumer_surplus").set(report.consumer_surplus);
    gauge!("auction_supplier_surplus").set(report.supplier_surplus);
    gauge!("auction_unresponsive_supplier_surplus").set(report.unresponsive_supplier_surplus);
}

/// Track granted demand that accepted supply could not absorb
pub fn track_data_inconsistency() {
    counter!("auction_data_inconsistencies_total").increment(1);
}
