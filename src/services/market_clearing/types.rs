use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant role of a submitted bid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
    /// Submitted but not participating in this period
    None,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::None => "none",
        }
    }
}

/// One participant's offer for the current period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub price: f64,    // $/kWh
    pub quantity: f64, // kW
    pub role: Role,
    /// Device is currently running (HVAC needed / inverter online)
    #[serde(default = "default_true")]
    pub on_state: bool,
    /// Bidder is infinitely willing; its step is placed at the price cap
    #[serde(default)]
    pub is_price_capped: bool,
    /// Baseline (non-biddable) consumption of the bidder (kW)
    #[serde(default)]
    pub unresponsive_load: f64,
    /// Bid quantity already covers the baseline consumption
    #[serde(default = "default_true")]
    pub base_covered: bool,
}

fn default_true() -> bool {
    true
}

impl Bid {
    pub fn buyer(price: f64, quantity: f64) -> Self {
        Self::new(price, quantity, Role::Buyer)
    }

    pub fn seller(price: f64, quantity: f64) -> Self {
        Self::new(price, quantity, Role::Seller)
    }

    pub fn non_participant() -> Self {
        Self::new(0.0, 0.0, Role::None)
    }

    fn new(price: f64, quantity: f64, role: Role) -> Self {
        Self {
            price,
            quantity,
            role,
            on_state: true,
            is_price_capped: false,
            unresponsive_load: 0.0,
            base_covered: true,
        }
    }

    /// Attach an uncovered baseline load to this bid
    pub fn with_baseline(mut self, unresponsive_load: f64) -> Self {
        self.unresponsive_load = unresponsive_load;
        self.base_covered = false;
        self
    }

    pub fn with_on_state(mut self, on_state: bool) -> Self {
        self.on_state = on_state;
        self
    }

    pub fn price_capped(mut self) -> Self {
        self.is_price_capped = true;
        self
    }
}

/// Which side of the market a curve aggregates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CurveSide {
    Buyer,
    Seller,
}

impl CurveSide {
    /// Matching order for this side: sellers cheapest first, buyers highest first
    pub fn sort_order(&self) -> SortOrder {
        match self {
            CurveSide::Buyer => SortOrder::Descending,
            CurveSide::Seller => SortOrder::Ascending,
        }
    }
}

impl fmt::Display for CurveSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveSide::Buyer => write!(f, "buyer"),
            CurveSide::Seller => write!(f, "seller"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Solution type or boundary case of the latest market clearing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClearingType {
    /// No trade
    #[default]
    Null,
    /// Cleared quantity undercuts a price-capped requirement
    Failure,
    /// Quantities match but prices disagree
    Price,
    /// Both sides exhaust at one price
    Exact,
    /// Sellers are the marginal side
    Seller,
    /// Buyers are the marginal side
    Buyer,
}

impl ClearingType {
    /// Numeric code published in auction metrics: [0..5]=[Null,Fail,Price,Exact,Seller,Buyer]
    pub fn code(&self) -> u8 {
        match self {
            ClearingType::Null => 0,
            ClearingType::Failure => 1,
            ClearingType::Price => 2,
            ClearingType::Exact => 3,
            ClearingType::Seller => 4,
            ClearingType::Buyer => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClearingType::Null => "null",
            ClearingType::Failure => "failure",
            ClearingType::Price => "price",
            ClearingType::Exact => "exact",
            ClearingType::Seller => "seller",
            ClearingType::Buyer => "buyer",
        }
    }

    /// Whether a marginal bid is partially accepted under this outcome
    pub fn has_marginal_side(&self) -> bool {
        matches!(self, ClearingType::Buyer | ClearingType::Seller)
    }
}

impl fmt::Display for ClearingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall condition of the market for the current period
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MarketCondition {
    /// Sellers but no buyers
    FlexibleGeneration,
    /// Buyers but no sellers
    FlexibleLoad,
    #[default]
    DoubleAuction,
}

impl MarketCondition {
    pub fn from_counts(counts: &RoleCounts) -> Self {
        if counts.num_buyers == 0 && counts.num_sellers != 0 {
            MarketCondition::FlexibleGeneration
        } else if counts.num_sellers == 0 && counts.num_buyers != 0 {
            MarketCondition::FlexibleLoad
        } else {
            MarketCondition::DoubleAuction
        }
    }
}

/// Per-role participation counts over all submitted bids
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RoleCounts {
    pub num_buyers: usize,
    pub num_sellers: usize,
    pub num_nonparticipants: usize,
}

impl RoleCounts {
    pub fn record(&mut self, role: Role) {
        match role {
            Role::Buyer => self.num_buyers += 1,
            Role::Seller => self.num_sellers += 1,
            Role::None => self.num_nonparticipants += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.num_buyers + self.num_sellers + self.num_nonparticipants
    }
}

/// Simplified response function of one curve, forwarded to agents that
/// cannot consume the full step list: `price(q) ≈ c0 + c1·q + c2·q²`
/// over the cumulative responsive quantity `q`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct AggregateCurve {
    pub unresponsive_quantity: f64,
    pub responsive_max_quantity: f64,
    /// 0 (zero or one responsive step), 1 (two steps) or 2 (more)
    pub degree: u8,
    pub c2: f64,
    pub c1: f64,
    pub c0: f64,
}

impl AggregateCurve {
    /// Evaluate the fitted price at a cumulative responsive quantity
    pub fn price_at(&self, quantity: f64) -> f64 {
        self.c0 + self.c1 * quantity + self.c2 * quantity * quantity
    }
}

/// Price-capped versus responsive quantity on one side of the market
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct SideBreakdown {
    pub count: usize,
    pub unresponsive: f64,
    pub responsive: f64,
}

/// Output of one market clearing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClearingOutcome {
    pub clearing_type: ClearingType,
    pub clearing_price: f64,
    pub clearing_quantity: f64,
    pub marginal_quantity: f64,
    pub marginal_fraction: f64,
    pub buyers: SideBreakdown,
    pub sellers: SideBreakdown,
}

/// Economic surplus apportioned after a clear
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SurplusReport {
    pub consumer_surplus: f64,
    pub average_consumer_surplus: f64,
    pub supplier_surplus: f64,
    pub unresponsive_supplier_surplus: f64,
    pub granted_responsive_buyers: usize,
    pub granted_unresponsive_buyers: usize,
    pub declined_quantity: f64,
    /// Granted demand no accepted seller could absorb (kW); non-zero marks a data inconsistency
    pub unabsorbed_quantity: f64,
}

impl SurplusReport {
    pub fn is_consistent(&self) -> bool {
        self.unabsorbed_quantity == 0.0
    }
}

/// Lifecycle status of a market period
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Engine created, no period opened yet
    #[default]
    Pending,
    /// Collecting bids
    Active,
    /// Unresponsive quantities folded in and curves sorted
    Aggregated,
    /// Clearing outputs available
    Cleared,
    /// Surplus accounting done
    Settled,
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            PeriodStatus::Pending => "pending",
            PeriodStatus::Active => "active",
            PeriodStatus::Aggregated => "aggregated",
            PeriodStatus::Cleared => "cleared",
            PeriodStatus::Settled => "settled",
        };
        f.write_str(status)
    }
}
