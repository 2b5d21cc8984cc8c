//! Step-function bid curve for one side of the market.
//!
//! Steps are kept in an ordered `Vec` rather than a price map so that bids at
//! the same price from different submitters stay separate and keep their
//! submission order through a stable sort.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{AuctionError, Result};

use super::types::{AggregateCurve, CurveSide, SortOrder};

/// One `(price, quantity)` step of a curve
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CurveStep {
    pub price: f64,    // $/kWh
    pub quantity: f64, // kW
    pub on_state: bool,
    /// Added by the aggregator for unresponsive load/supply rather than by a bid
    pub injected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidCurve {
    side: CurveSide,
    steps: Vec<CurveStep>,
    total_quantity: f64,
    total_on: f64,
    total_off: f64,
    /// The last step is the most recent bid and may absorb an equal-priced one
    #[serde(skip)]
    last_appended: bool,
}

impl BidCurve {
    pub fn new(side: CurveSide) -> Self {
        Self {
            side,
            steps: Vec::new(),
            total_quantity: 0.0,
            total_on: 0.0,
            total_off: 0.0,
            last_appended: false,
        }
    }

    /// Build a curve from `(price, quantity)` pairs, all flagged on
    pub fn from_steps(side: CurveSide, steps: &[(f64, f64)]) -> Result<Self> {
        let mut curve = Self::new(side);
        for &(price, quantity) in steps {
            curve.add_step(price, quantity, true)?;
        }
        Ok(curve)
    }

    /// Append a bid step.
    ///
    /// A step at the same price as the step appended just before it is
    /// accumulated into it; equal prices that are not contiguous, or that are
    /// separated by a sort, stay separate steps. Zero quantity is accepted but
    /// adds nothing.
    pub fn add_step(&mut self, price: f64, quantity: f64, on_state: bool) -> Result<()> {
        self.push(price, quantity, on_state, false)
    }

    pub(crate) fn add_injected_step(&mut self, price: f64, quantity: f64) -> Result<()> {
        self.push(price, quantity, true, true)
    }

    fn push(&mut self, price: f64, quantity: f64, on_state: bool, injected: bool) -> Result<()> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(AuctionError::InvalidQuantity(quantity));
        }
        if !price.is_finite() {
            return Err(AuctionError::InvalidPrice(price));
        }
        if quantity == 0.0 {
            return Ok(());
        }

        self.total_quantity += quantity;
        if on_state {
            self.total_on += quantity;
        } else {
            self.total_off += quantity;
        }

        match self.steps.last_mut() {
            Some(last) if !injected && self.last_appended && last.price == price => {
                last.quantity += quantity;
                last.on_state |= on_state;
            }
            _ => self.steps.push(CurveStep {
                price,
                quantity,
                on_state,
                injected,
            }),
        }
        self.last_appended = !injected;
        Ok(())
    }

    /// Stable sort by price in the given direction
    pub fn set_order(&mut self, order: SortOrder) {
        self.steps.sort_by(|a, b| compare_prices(a.price, b.price, order));
        self.last_appended = false;
    }

    /// Sort into the matching order of this curve's side
    pub fn sort_for_matching(&mut self) {
        self.set_order(self.side.sort_order());
    }

    pub fn is_ordered(&self, order: SortOrder) -> bool {
        self.steps
            .windows(2)
            .all(|w| compare_prices(w[0].price, w[1].price, order) != Ordering::Greater)
    }

    pub fn is_sorted_for_matching(&self) -> bool {
        self.is_ordered(self.side.sort_order())
    }

    /// Drop steps added by the aggregator, keeping bid steps in their current order
    pub(crate) fn remove_injected(&mut self) {
        if !self.steps.iter().any(|s| s.injected) {
            return;
        }
        self.steps.retain(|s| !s.injected);
        self.last_appended = false;
        self.total_quantity = 0.0;
        self.total_on = 0.0;
        self.total_off = 0.0;
        for step in &self.steps {
            self.total_quantity += step.quantity;
            if step.on_state {
                self.total_on += step.quantity;
            } else {
                self.total_off += step.quantity;
            }
        }
    }

    /// Whether a step sits at this side's "infinitely willing" price
    pub fn is_price_capped(&self, price: f64, price_cap: f64) -> bool {
        match self.side {
            CurveSide::Buyer => price >= price_cap,
            CurveSide::Seller => price <= -price_cap,
        }
    }

    /// Total quantity bid at or beyond the price cap
    pub fn capped_quantity(&self, price_cap: f64) -> f64 {
        self.steps
            .iter()
            .filter(|s| self.is_price_capped(s.price, price_cap))
            .map(|s| s.quantity)
            .sum()
    }

    /// Simplified quadratic-or-lower approximation of the responsive portion.
    ///
    /// Coordinates are `(cumulative responsive quantity, price)` taken in curve
    /// order. Degree 1 interpolates the first and last responsive steps; degree 2
    /// also passes through the middle step.
    pub fn aggregate(&self, price_cap: f64) -> AggregateCurve {
        let mut unresponsive_quantity = 0.0;
        let mut points: Vec<(f64, f64)> = Vec::new();
        let mut cumulative = 0.0;
        for step in &self.steps {
            if self.is_price_capped(step.price, price_cap) {
                unresponsive_quantity += step.quantity;
            } else {
                cumulative += step.quantity;
                points.push((cumulative, step.price));
            }
        }

        let mut aggregate = AggregateCurve {
            unresponsive_quantity,
            responsive_max_quantity: cumulative,
            ..AggregateCurve::default()
        };

        match points.len() {
            0 => {}
            1 => {
                aggregate.c0 = points[0].1;
            }
            2 => {
                let (c0, c1) = fit_line(points[0], points[1]);
                aggregate.degree = 1;
                aggregate.c0 = c0;
                aggregate.c1 = c1;
            }
            n => {
                let (c0, c1, c2) = fit_quadratic(points[0], points[n / 2], points[n - 1]);
                aggregate.degree = 2;
                aggregate.c0 = c0;
                aggregate.c1 = c1;
                aggregate.c2 = c2;
            }
        }
        aggregate
    }

    pub fn side(&self) -> CurveSide {
        self.side
    }

    pub fn steps(&self) -> &[CurveStep] {
        &self.steps
    }

    pub fn count(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn price(&self, index: usize) -> f64 {
        self.steps[index].price
    }

    pub fn quantity(&self, index: usize) -> f64 {
        self.steps[index].quantity
    }

    pub fn total_quantity(&self) -> f64 {
        self.total_quantity
    }

    pub fn total_on(&self) -> f64 {
        self.total_on
    }

    pub fn total_off(&self) -> f64 {
        self.total_off
    }
}

fn compare_prices(a: f64, b: f64, order: SortOrder) -> Ordering {
    let ordering = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

/// Line through two points, returned as `(c0, c1)`
fn fit_line((x0, y0): (f64, f64), (x1, y1): (f64, f64)) -> (f64, f64) {
    if x1 == x0 {
        return (y0, 0.0);
    }
    let c1 = (y1 - y0) / (x1 - x0);
    (y0 - c1 * x0, c1)
}

/// Parabola through three points, returned as `(c0, c1, c2)`.
/// Falls back to the end-point line when the middle abscissa coincides with an end.
fn fit_quadratic(
    (x0, y0): (f64, f64),
    (x1, y1): (f64, f64),
    (x2, y2): (f64, f64),
) -> (f64, f64, f64) {
    if x1 == x0 || x1 == x2 || x2 == x0 {
        let (c0, c1) = fit_line((x0, y0), (x2, y2));
        return (c0, c1, 0.0);
    }
    // Newton divided differences
    let d01 = (y1 - y0) / (x1 - x0);
    let d12 = (y2 - y1) / (x2 - x1);
    let c2 = (d12 - d01) / (x2 - x0);
    let c1 = d01 - c2 * (x0 + x1);
    let c0 = y0 - c1 * x0 - c2 * x0 * x0;
    (c0, c1, c2)
}
