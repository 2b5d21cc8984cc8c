// Market services
// Substation double-auction clearing engine

pub mod market_clearing;

pub use market_clearing::{
    AccountingRecord, Bid, ClearingOutcome, ClearingType, MarketClearingEngine, PeriodInput,
    PeriodReport, PublicMarketInfo, SubstationAuction,
};
