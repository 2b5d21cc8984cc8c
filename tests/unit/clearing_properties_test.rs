//! Property tests for the clearing rules
//!
//! Prices come from a coarse grid so that ties, shared price levels and
//! price-capped steps show up often.

use proptest::prelude::*;
use substation_auction::services::market_clearing::CurveSide;
use substation_auction::{
    Bid, BidCurve, ClearingParams, ClearingType, MarketClearingEngine, MarketConfig,
    SubstationAuction,
};

const CAP: f64 = 1.0;

fn params() -> ClearingParams {
    ClearingParams {
        price_cap: CAP,
        bid_offset: 1e-4,
        clearing_scalar: 0.5,
    }
}

fn price() -> impl Strategy<Value = f64> {
    // 1.0 is the cap, so some buyer steps are price-capped
    (1u32..=20).prop_map(|p| p as f64 * 0.05)
}

fn quantity() -> impl Strategy<Value = f64> {
    (1u32..=40).prop_map(|q| q as f64 * 0.5)
}

fn steps() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((price(), quantity()), 0..8)
}

fn sorted_curve(side: CurveSide, steps: &[(f64, f64)]) -> BidCurve {
    let mut curve = BidCurve::from_steps(side, steps).expect("generated steps are valid");
    curve.sort_for_matching();
    curve
}

fn mirrored(steps: &[(f64, f64)]) -> Vec<(f64, f64)> {
    steps.iter().map(|&(price, quantity)| (-price, quantity)).collect()
}

fn swapped(clearing_type: ClearingType) -> ClearingType {
    match clearing_type {
        ClearingType::Buyer => ClearingType::Seller,
        ClearingType::Seller => ClearingType::Buyer,
        other => other,
    }
}

fn bids() -> impl Strategy<Value = Vec<Bid>> {
    let bid = (price(), quantity(), 0u8..3, prop::option::of(quantity())).prop_map(
        |(price, quantity, role, baseline)| {
            let bid = match role {
                0 => Bid::buyer(price, quantity),
                1 => Bid::seller(price, quantity),
                _ => Bid::non_participant(),
            };
            match baseline {
                Some(load) if role == 0 => bid.with_baseline(load),
                _ => bid,
            }
        },
    );
    prop::collection::vec(bid, 0..12)
}

proptest! {
    #[test]
    fn clearing_price_stays_within_cap(buyers in steps(), sellers in steps()) {
        let buyers = sorted_curve(CurveSide::Buyer, &buyers);
        let sellers = sorted_curve(CurveSide::Seller, &sellers);
        let outcome = MarketClearingEngine::clear(&buyers, &sellers, &params());

        prop_assert!(outcome.clearing_price >= -CAP && outcome.clearing_price <= CAP);
        prop_assert!(outcome.clearing_price.is_finite());
    }

    #[test]
    fn marginal_allocation_is_bounded(buyers in steps(), sellers in steps()) {
        let buyers = sorted_curve(CurveSide::Buyer, &buyers);
        let sellers = sorted_curve(CurveSide::Seller, &sellers);
        let outcome = MarketClearingEngine::clear(&buyers, &sellers, &params());

        prop_assert!(outcome.marginal_quantity >= 0.0);
        prop_assert!(outcome.marginal_quantity <= outcome.clearing_quantity);
        prop_assert!(outcome.marginal_fraction >= 0.0 && outcome.marginal_fraction <= 1.0);
        if !outcome.clearing_type.has_marginal_side() {
            prop_assert_eq!(outcome.marginal_quantity, 0.0);
            prop_assert_eq!(outcome.marginal_fraction, 0.0);
        }
    }

    #[test]
    fn cleared_quantity_never_exceeds_either_side(buyers in steps(), sellers in steps()) {
        let buyers = sorted_curve(CurveSide::Buyer, &buyers);
        let sellers = sorted_curve(CurveSide::Seller, &sellers);
        let outcome = MarketClearingEngine::clear(&buyers, &sellers, &params());

        prop_assert!(outcome.clearing_quantity >= 0.0);
        prop_assert!(outcome.clearing_quantity <= buyers.total_quantity() + 1e-9);
        prop_assert!(outcome.clearing_quantity <= sellers.total_quantity() + 1e-9);
    }

    #[test]
    fn role_reversal_mirrors_the_price(buyers in steps(), sellers in steps()) {
        let outcome = MarketClearingEngine::clear(
            &sorted_curve(CurveSide::Buyer, &buyers),
            &sorted_curve(CurveSide::Seller, &sellers),
            &params(),
        );
        let reversed = MarketClearingEngine::clear(
            &sorted_curve(CurveSide::Buyer, &mirrored(&sellers)),
            &sorted_curve(CurveSide::Seller, &mirrored(&buyers)),
            &params(),
        );

        prop_assert_eq!(reversed.clearing_type, swapped(outcome.clearing_type));
        prop_assert!((reversed.clearing_quantity - outcome.clearing_quantity).abs() < 1e-9);
        prop_assert!(
            (reversed.clearing_price + outcome.clearing_price).abs() < 1e-9,
            "price {} vs reversed {}",
            outcome.clearing_price,
            reversed.clearing_price
        );
        prop_assert!((reversed.marginal_fraction - outcome.marginal_fraction).abs() < 1e-9);
    }

    #[test]
    fn aggregate_bids_is_idempotent(bids in bids(), backstop in 0u32..20, reference in price()) {
        let config = MarketConfig {
            max_capacity_reference_bid_quantity: backstop as f64,
            ..MarketConfig::default()
        };
        let mut market = SubstationAuction::new(config);
        market.clear_bids();
        market.set_reference_price(reference).expect("finite price");
        for bid in bids {
            market.collect_bid(bid).expect("generated bids are valid");
        }

        market.aggregate_bids().expect("aggregate");
        let buyers = market.buyer_curve().clone();
        let sellers = market.seller_curve().clone();
        let once = market.clear_market().expect("clear").clone();

        market.aggregate_bids().expect("aggregate again");
        prop_assert_eq!(market.buyer_curve(), &buyers);
        prop_assert_eq!(market.seller_curve(), &sellers);
        let twice = market.clear_market().expect("clear again").clone();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn surplus_is_never_negative(bids in bids(), backstop in 0u32..20) {
        let config = MarketConfig {
            max_capacity_reference_bid_quantity: backstop as f64,
            ..MarketConfig::default()
        };
        let mut market = SubstationAuction::new(config);
        market.clear_bids();
        for bid in bids {
            market.collect_bid(bid).expect("generated bids are valid");
        }
        market.aggregate_bids().expect("aggregate");
        market.clear_market().expect("clear");
        let report = market.surplus().expect("surplus");

        prop_assert!(report.consumer_surplus >= -1e-12);
        prop_assert!(report.supplier_surplus >= -1e-12);
        prop_assert!(report.unresponsive_supplier_surplus >= -1e-12);
        prop_assert!(report.unabsorbed_quantity >= 0.0);
    }
}
