//! Market constants and default configuration values.
//!
//! This module centralizes the numeric rules the clearing engine relies on
//! so the tie-break and reporting behaviour is easy to audit in one place.

/// Pricing constants
pub mod pricing {
    /// Nudge applied to a clearing price so it does not trigger the next unmatched bid ($/kWh)
    pub const BID_OFFSET: f64 = 1e-4;

    /// Interpolation weight between the best seller and best buyer price when nothing clears
    pub const CLEARING_SCALAR: f64 = 0.5;

    /// Default admissible price cap ($/kWh)
    pub const DEFAULT_PRICE_CAP: f64 = 1.0;

    /// Default historical mean price ($/kWh)
    pub const DEFAULT_INITIAL_PRICE: f64 = 0.02078;

    /// Default historical price standard deviation ($/kWh)
    pub const DEFAULT_INITIAL_STD_DEV: f64 = 0.01;
}

/// Market period constants
pub mod market {
    /// Default market name
    pub const DEFAULT_MARKET_NAME: &str = "Market_1";

    /// Default clearing period in seconds (5-minute market)
    pub const DEFAULT_PERIOD_SECS: u64 = 300;

    /// Shortest accepted clearing period in seconds
    pub const MIN_PERIOD_SECS: u64 = 1;

    /// Longest accepted clearing period in seconds (one day)
    pub const MAX_PERIOD_SECS: u64 = 86_400;

    /// Default backstop supply the grid can always sell (kW)
    pub const DEFAULT_MAX_CAPACITY_REFERENCE_BID_QUANTITY: f64 = 5000.0;
}

/// Accounting export constants
pub mod reporting {
    /// Decimal places kept for prices in accounting records
    pub const PRICE_DECIMALS: u32 = 6;

    /// Decimal places kept for quantities in accounting records
    pub const QUANTITY_DECIMALS: u32 = 3;

    /// Decimal places kept for surplus values in accounting records
    pub const SURPLUS_DECIMALS: u32 = 4;

    /// Granted quantity left unabsorbed below this threshold is rounding noise (kW)
    pub const INCONSISTENCY_EPSILON: f64 = 1e-9;
}

/// Logging constants
pub mod logging {
    /// Default tracing filter when `RUST_LOG` is not set
    pub const DEFAULT_FILTER: &str = "substation_auction=info";

    /// Default log level for the `substation_auction` target
    pub const DEFAULT_LEVEL: &str = "info";
}
