// Clearing Scenarios Integration Test
// Runs reference market situations through the full collect/aggregate/clear/surplus sequence

use anyhow::Result;
use substation_auction::{Bid, ClearingType, MarketConfig, PeriodInput, SubstationAuction};

const OFFSET: f64 = 1e-4;

/// Helper to create a market; a zero backstop keeps the seller curve to submitted bids
fn create_market(backstop: f64) -> SubstationAuction {
    let config = MarketConfig {
        max_capacity_reference_bid_quantity: backstop,
        ..MarketConfig::default()
    };
    SubstationAuction::new(config)
}

fn run(market: &mut SubstationAuction, bids: Vec<Bid>) -> Result<()> {
    market.clear_bids();
    for bid in bids {
        market.collect_bid(bid)?;
    }
    market.aggregate_bids()?;
    market.clear_market()?;
    market.surplus()?;
    Ok(())
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_price_gap_after_equal_step() -> Result<()> {
    let mut market = create_market(0.0);
    run(
        &mut market,
        vec![
            Bid::buyer(0.20, 5.0),
            Bid::buyer(0.15, 5.0),
            Bid::seller(0.05, 5.0),
            Bid::seller(0.25, 5.0),
        ],
    )?;

    let outcome = market.outcome();
    assert_eq!(outcome.clearing_quantity, 5.0);
    assert_eq!(outcome.clearing_type, ClearingType::Price);
    // inside the gap, just above the next unmatched buyer
    assert_close(outcome.clearing_price, 0.15 + OFFSET);
    assert_eq!(outcome.marginal_quantity, 0.0);

    let surplus = market.surplus_report();
    assert_close(surplus.consumer_surplus, (0.20 - 0.1501) * 5.0);
    assert_close(surplus.supplier_surplus, (0.1501 - 0.05) * 5.0);
    assert!(surplus.is_consistent());
    Ok(())
}

#[test]
fn test_identical_single_steps_clear_exactly() -> Result<()> {
    let mut market = create_market(0.0);
    run(&mut market, vec![Bid::buyer(0.10, 10.0), Bid::seller(0.10, 10.0)])?;

    let outcome = market.outcome();
    assert_eq!(outcome.clearing_type, ClearingType::Exact);
    assert_eq!(outcome.clearing_price, 0.10);
    assert_eq!(outcome.clearing_quantity, 10.0);
    assert_eq!(outcome.marginal_quantity, 0.0);
    assert_eq!(market.surplus_report().consumer_surplus, 0.0);
    Ok(())
}

#[test]
fn test_unresponsive_demand_without_sellers_fails() -> Result<()> {
    let mut market = create_market(0.0);
    market.clear_bids();
    market.add_unresponsive_load(3.0)?;
    market.aggregate_bids()?;
    let outcome = market.clear_market()?;

    assert_eq!(outcome.clearing_type, ClearingType::Failure);
    assert_eq!(outcome.clearing_price, market_cap());
    Ok(())
}

#[test]
fn test_empty_market_clears_null() -> Result<()> {
    let mut market = create_market(0.0);
    run(&mut market, Vec::new())?;

    let outcome = market.outcome();
    assert_eq!(outcome.clearing_type, ClearingType::Null);
    assert_eq!(outcome.clearing_price, 0.0);
    assert_eq!(outcome.clearing_quantity, 0.0);
    Ok(())
}

#[test]
fn test_sellers_only_clear_below_best_offer() -> Result<()> {
    let mut market = create_market(0.0);
    run(
        &mut market,
        vec![Bid::seller(0.06, 3.0), Bid::seller(0.04, 2.0)],
    )?;

    let outcome = market.outcome();
    assert_eq!(outcome.clearing_type, ClearingType::Null);
    assert_eq!(outcome.clearing_quantity, 0.0);
    assert_close(outcome.clearing_price, 0.04 - OFFSET);
    Ok(())
}

#[test]
fn test_backstop_supply_sets_the_price() -> Result<()> {
    let mut market = create_market(5000.0);
    market.clear_bids();
    market.set_reference_price(0.03)?;
    market.collect_bid(Bid::buyer(0.2, 10.0))?;
    market.aggregate_bids()?;
    let outcome = market.clear_market()?.clone();

    assert_eq!(outcome.clearing_type, ClearingType::Seller);
    assert_eq!(outcome.clearing_price, 0.03);
    assert_eq!(outcome.clearing_quantity, 10.0);
    assert_close(outcome.marginal_quantity, 10.0);
    assert_close(outcome.marginal_fraction, 10.0 / 5000.0);
    Ok(())
}

#[test]
fn test_price_capped_demand_exceeding_supply_fails() -> Result<()> {
    let mut market = create_market(0.0);
    run(
        &mut market,
        vec![Bid::buyer(0.5, 8.0).price_capped(), Bid::seller(0.1, 3.0)],
    )?;

    let outcome = market.outcome();
    assert_eq!(outcome.clearing_type, ClearingType::Failure);
    assert_eq!(outcome.clearing_price, market_cap());
    assert_eq!(outcome.clearing_quantity, 3.0);
    assert_eq!(outcome.marginal_fraction, 0.0);
    Ok(())
}

#[test]
fn test_marginal_buyer_is_rationed() -> Result<()> {
    let mut market = create_market(0.0);
    let report = market.run_period(PeriodInput {
        bids: vec![
            Bid::buyer(0.4, 2.0),
            Bid::buyer(0.3, 10.0),
            Bid::seller(0.1, 6.0),
            Bid::seller(0.35, 5.0),
        ],
        ..PeriodInput::default()
    })?;

    assert_eq!(report.outcome.clearing_type, ClearingType::Buyer);
    assert_eq!(report.outcome.clearing_price, 0.3);
    assert_eq!(report.outcome.clearing_quantity, 6.0);
    assert_close(report.outcome.marginal_quantity, 4.0);
    assert_close(report.outcome.marginal_fraction, 0.4);
    assert!(report.surplus.is_consistent());
    assert_close(report.surplus.declined_quantity, 6.0);
    Ok(())
}

fn market_cap() -> f64 {
    MarketConfig::default().price_cap
}
