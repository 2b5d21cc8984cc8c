// Period Lifecycle Integration Test
// Drives a market through several periods the way an external scheduler would

use anyhow::Result;
use chrono::{TimeZone, Utc};
use substation_auction::{
    AuctionError, Bid, ClearingType, MarketCondition, MarketConfig, PeriodInput, PeriodStatus,
    SubstationAuction,
};

/// Helper to create a market with a small backstop supply
fn create_test_market(backstop: f64) -> SubstationAuction {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let config = MarketConfig {
        name: "Feeder_Test".to_string(),
        max_capacity_reference_bid_quantity: backstop,
        ..MarketConfig::default()
    };
    SubstationAuction::new(config)
}

#[test]
fn test_full_period_sequence() -> Result<()> {
    let mut market = create_test_market(20.0);
    market.init_auction();
    assert_eq!(market.status(), PeriodStatus::Pending);
    assert_eq!(market.clearing_price(), market.config().initial_price);

    market.clear_bids();
    market.set_reference_price(0.08)?;
    market.set_reference_load(1250.0)?;

    market.collect_bid(Bid::buyer(0.30, 4.0).with_baseline(2.0))?;
    market.collect_bid(Bid::buyer(0.12, 6.0))?;
    market.collect_bid(Bid::seller(0.05, 5.0))?;
    market.collect_bid(Bid::non_participant())?;
    assert_eq!(market.status(), PeriodStatus::Active);

    market.aggregate_bids()?;
    assert_eq!(market.status(), PeriodStatus::Aggregated);
    assert_eq!(market.market_condition(), MarketCondition::DoubleAuction);
    // 20 kW backstop less the 5 kW seller bid, priced at the reference price
    assert_eq!(market.unresponsive_sell_estimate(), 15.0);

    let outcome = market.clear_market()?.clone();
    assert_eq!(market.status(), PeriodStatus::Cleared);
    assert!(outcome.clearing_quantity > 0.0);
    assert!(outcome.clearing_price.abs() <= market.config().price_cap);

    let surplus = market.surplus()?.clone();
    assert_eq!(market.status(), PeriodStatus::Settled);
    assert!(surplus.is_consistent());
    assert!(surplus.consumer_surplus >= 0.0);
    assert!(surplus.supplier_surplus >= 0.0);

    let record = market.accounting_record();
    assert_eq!(record.market, "Feeder_Test");
    assert_eq!(record.clearing_type, outcome.clearing_type);
    Ok(())
}

#[test]
fn test_out_of_order_calls_are_rejected() -> Result<()> {
    let mut market = create_test_market(0.0);
    market.clear_bids();
    market.collect_bid(Bid::buyer(0.2, 1.0))?;

    assert!(matches!(
        market.clear_market(),
        Err(AuctionError::OutOfOrder { .. })
    ));
    assert!(matches!(market.surplus(), Err(AuctionError::OutOfOrder { .. })));

    market.aggregate_bids()?;
    assert!(matches!(market.surplus(), Err(AuctionError::OutOfOrder { .. })));

    market.clear_market()?;
    assert!(matches!(
        market.collect_bid(Bid::buyer(0.2, 1.0)),
        Err(AuctionError::OutOfOrder { .. })
    ));
    Ok(())
}

#[test]
fn test_late_bid_requires_reaggregation() -> Result<()> {
    let mut market = create_test_market(0.0);
    market.clear_bids();
    market.collect_bid(Bid::buyer(0.2, 5.0))?;
    market.collect_bid(Bid::seller(0.1, 5.0))?;
    market.aggregate_bids()?;

    market.collect_bid(Bid::seller(0.05, 5.0))?;
    assert_eq!(market.status(), PeriodStatus::Active);
    assert!(market.clear_market().is_err());

    market.aggregate_bids()?;
    let outcome = market.clear_market()?;
    assert_eq!(outcome.clearing_quantity, 5.0);
    Ok(())
}

#[test]
fn test_periods_do_not_carry_state() -> Result<()> {
    let mut market = create_test_market(0.0);
    market.open_period(Utc.with_ymd_and_hms(2024, 1, 15, 8, 2, 0).unwrap());
    let first = market.period().clone();

    market.collect_bid(Bid::buyer(0.2, 5.0).with_baseline(1.0))?;
    market.collect_bid(Bid::seller(0.1, 10.0))?;
    market.aggregate_bids()?;
    market.clear_market()?;
    market.surplus()?;
    assert!(market.outcome().clearing_quantity > 0.0);

    market.clear_bids();
    assert_eq!(market.period().period_number, first.period_number + 1);
    assert_eq!(market.period().start_time, first.end_time);
    assert!(market.buyer_curve().is_empty());
    assert_eq!(market.unresponsive_buy_estimate(), 0.0);
    assert_eq!(market.outcome().clearing_type, ClearingType::Null);
    assert_eq!(market.surplus_report().consumer_surplus, 0.0);

    market.aggregate_bids()?;
    let outcome = market.clear_market()?;
    assert_eq!(outcome.clearing_type, ClearingType::Null);
    assert_eq!(outcome.clearing_quantity, 0.0);
    Ok(())
}

#[test]
fn test_run_period_matches_manual_sequence() -> Result<()> {
    let bids = vec![
        Bid::buyer(0.25, 3.0),
        Bid::buyer(0.18, 4.0).with_baseline(0.5),
        Bid::seller(0.09, 2.0),
        Bid::seller(0.15, 6.0),
    ];

    let mut manual = create_test_market(10.0);
    manual.clear_bids();
    manual.set_reference_price(0.11)?;
    for bid in bids.clone() {
        manual.collect_bid(bid)?;
    }
    manual.aggregate_bids()?;
    manual.clear_market()?;
    manual.surplus()?;

    let mut scheduled = create_test_market(10.0);
    let report = scheduled.run_period(PeriodInput {
        reference_price: Some(0.11),
        bids,
        ..PeriodInput::default()
    })?;

    assert_eq!(&report.outcome, manual.outcome());
    assert_eq!(&report.surplus, manual.surplus_report());
    assert_eq!(report.public_info, manual.public_info());
    assert_eq!(report.rejected_bids, 0);
    Ok(())
}
