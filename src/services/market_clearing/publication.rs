//! Read-only views published to collaborators after a period is cleared.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::reporting::{PRICE_DECIMALS, QUANTITY_DECIMALS, SURPLUS_DECIMALS};

use super::types::{ClearingType, MarketCondition, Role, RoleCounts, SideBreakdown};
use super::SubstationAuction;

/// Per-period accounting record persisted by the metrics collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountingRecord {
    pub market: String,
    pub period_number: i64,
    pub period_start: DateTime<Utc>,
    pub clearing_price: Decimal,
    pub clearing_type: ClearingType,
    pub clearing_type_code: u8,
    pub clearing_quantity: Decimal,
    pub marginal_quantity: Decimal,
    pub marginal_fraction: Decimal,
    pub consumer_surplus: Decimal,
    pub average_consumer_surplus: Decimal,
    pub supplier_surplus: Decimal,
    pub unresponsive_supplier_surplus: Decimal,
    pub diagnostics: ClearingDiagnostics,
}

/// Curve breakdown kept alongside the record for offline analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClearingDiagnostics {
    pub market_condition: MarketCondition,
    pub role_counts: RoleCounts,
    pub buyers: SideBreakdown,
    pub sellers: SideBreakdown,
    pub unabsorbed_quantity: Decimal,
}

/// Column legend for `AccountingRecord` consumers
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricMetadata {
    pub name: &'static str,
    pub index: usize,
    pub units: &'static str,
}

impl AccountingRecord {
    pub fn metadata() -> Vec<MetricMetadata> {
        const COLUMNS: [(&str, &str); 9] = [
            ("clearing_price", "USD/kWh"),
            ("clearing_type", "[0..5]=[Null,Fail,Price,Exact,Seller,Buyer]"),
            ("clearing_quantity", "kW"),
            ("marginal_quantity", "kW"),
            ("marginal_fraction", "[0..1]"),
            ("consumer_surplus", "USD"),
            ("average_consumer_surplus", "USD"),
            ("supplier_surplus", "USD"),
            ("unresponsive_supplier_surplus", "USD"),
        ];
        COLUMNS
            .iter()
            .enumerate()
            .map(|(index, &(name, units))| MetricMetadata { name, index, units })
            .collect()
    }
}

/// Market statistics broadcast to agents after each clear
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicMarketInfo {
    pub buyer_ratio: f64,
    pub seller_ratio: f64,
    pub nonparticipant_ratio: f64,
    pub total_seller_quantity: f64,
    /// Includes baseline load not covered by the bids
    pub total_buyer_quantity: f64,
    pub mean_seller_price: f64,
    pub std_dev_seller_price: f64,
    pub mean_buyer_price: f64,
    pub std_dev_buyer_price: f64,
    pub cleared_price: f64,
    pub cleared_quantity: f64,
    pub reference_price: f64,
    pub reference_price_std_dev: f64,
}

impl SubstationAuction {
    pub fn accounting_record(&self) -> AccountingRecord {
        let outcome = &self.outcome;
        let surplus = &self.surplus;
        AccountingRecord {
            market: self.config.name.clone(),
            period_number: self.period.period_number,
            period_start: self.period.start_time,
            clearing_price: round(outcome.clearing_price, PRICE_DECIMALS),
            clearing_type: outcome.clearing_type,
            clearing_type_code: outcome.clearing_type.code(),
            clearing_quantity: round(outcome.clearing_quantity, QUANTITY_DECIMALS),
            marginal_quantity: round(outcome.marginal_quantity, QUANTITY_DECIMALS),
            marginal_fraction: round(outcome.marginal_fraction, SURPLUS_DECIMALS),
            consumer_surplus: round(surplus.consumer_surplus, SURPLUS_DECIMALS),
            average_consumer_surplus: round(surplus.average_consumer_surplus, SURPLUS_DECIMALS),
            supplier_surplus: round(surplus.supplier_surplus, SURPLUS_DECIMALS),
            unresponsive_supplier_surplus: round(
                surplus.unresponsive_supplier_surplus,
                SURPLUS_DECIMALS,
            ),
            diagnostics: ClearingDiagnostics {
                market_condition: self.market_condition,
                role_counts: self.role_counts,
                buyers: outcome.buyers,
                sellers: outcome.sellers,
                unabsorbed_quantity: round(surplus.unabsorbed_quantity, QUANTITY_DECIMALS),
            },
        }
    }

    pub fn public_info(&self) -> PublicMarketInfo {
        let counts = &self.role_counts;
        let total = counts.total();
        let ratio = |n: usize| if total > 0 { n as f64 / total as f64 } else { 0.0 };

        let mut total_seller_quantity = 0.0;
        let mut total_buyer_quantity = 0.0;
        let mut seller_prices = Vec::new();
        let mut buyer_prices = Vec::new();
        for bid in &self.bids {
            match bid.role {
                Role::Seller => {
                    total_seller_quantity += bid.quantity;
                    if bid.price > 0.0 {
                        seller_prices.push(bid.price);
                    }
                }
                Role::Buyer => {
                    total_buyer_quantity += bid.quantity;
                    if !bid.base_covered {
                        total_buyer_quantity += bid.unresponsive_load;
                    }
                    if bid.price > 0.0 {
                        buyer_prices.push(bid.price);
                    }
                }
                Role::None => {}
            }
        }
        let (mean_seller_price, std_dev_seller_price) = mean_and_std_dev(&seller_prices);
        let (mean_buyer_price, std_dev_buyer_price) = mean_and_std_dev(&buyer_prices);

        PublicMarketInfo {
            buyer_ratio: ratio(counts.num_buyers),
            seller_ratio: ratio(counts.num_sellers),
            nonparticipant_ratio: ratio(counts.num_nonparticipants),
            total_seller_quantity,
            total_buyer_quantity,
            mean_seller_price,
            std_dev_seller_price,
            mean_buyer_price,
            std_dev_buyer_price,
            cleared_price: self.outcome.clearing_price,
            cleared_quantity: self.outcome.clearing_quantity,
            reference_price: self.reference_price,
            reference_price_std_dev: self.reference_price_std_dev,
        }
    }
}

fn round(value: f64, decimals: u32) -> Decimal {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(decimals))
        .unwrap_or_default()
}

/// Mean and population standard deviation; zeros for an empty sample
fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
