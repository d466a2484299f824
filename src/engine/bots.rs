//! Bot Flow Merger - replays exogenous bot orders against the market book
//! and the strategy's resting orders.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::core::{Fill, FillSource, Price, PriceLevel, Product, Qty, Side};
use crate::orderbook::{MarketBooks, RestingOrders};
use crate::portfolio::{Portfolio, PositionLimits};

/// A product's bot interest for one tick: at most one order per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotOrders {
    pub buy: Option<PriceLevel>,
    pub sell: Option<PriceLevel>,
}

impl BotOrders {
    pub fn side(&self, side: Side) -> Option<PriceLevel> {
        match side {
            Side::Buy => self.buy,
            Side::Sell => self.sell,
        }
    }
}

/// Bot orders for every product in a tick.
pub type BotFlow = BTreeMap<Product, BotOrders>;

#[derive(Debug, Clone, Default)]
pub struct BotFlowReport {
    /// Strategy fills from bots hitting resting orders.
    pub fills: Vec<Fill>,
    /// Bot quantity absorbed by plain market liquidity.
    pub market_volume: Qty,
}

/// Let every bot order take liquidity, then prune exhausted levels.
///
/// At each price the market level is tested before the strategy's resting
/// order. Bot remainders are discarded: bots never rest.
pub fn apply_bot_flow(
    flow: &BotFlow,
    books: &mut MarketBooks,
    resting: &mut RestingOrders,
    portfolio: &mut Portfolio,
    limits: &PositionLimits,
) -> BotFlowReport {
    let mut report = BotFlowReport::default();

    for (product, orders) in flow {
        for bot_side in [Side::Buy, Side::Sell] {
            if let Some(order) = orders.side(bot_side) {
                take_liquidity(product, bot_side, order, books, resting, portfolio, limits, &mut report);
            }
        }
    }

    for book in books.values_mut() {
        book.prune();
    }
    resting.prune();

    report
}

#[allow(clippy::too_many_arguments)]
fn take_liquidity(
    product: &Product,
    bot_side: Side,
    order: PriceLevel,
    books: &mut MarketBooks,
    resting: &mut RestingOrders,
    portfolio: &mut Portfolio,
    limits: &PositionLimits,
    report: &mut BotFlowReport,
) {
    if order.price <= 0 || order.quantity <= 0 {
        return;
    }
    let contra = bot_side.opposite();
    let mut remaining = order.quantity;

    for price in eligible_prices(product, contra, order.price, books, resting) {
        if remaining == 0 {
            break;
        }

        if let Some(book) = books.get_mut(product) {
            let taken = book.side_mut(contra).take(price, remaining);
            remaining -= taken;
            report.market_volume += taken;
        }

        if remaining == 0 {
            break;
        }

        if let Some(book) = resting.book_mut(product) {
            // the strategy trades on the resting order's side
            let available = book.side(contra).quantity_at(price);
            let headroom = portfolio.headroom(product, contra, limits);
            let fillable = remaining.min(available).min(headroom);
            if fillable > 0 {
                book.side_mut(contra).take(price, fillable);
                remaining -= fillable;

                let fill = Fill {
                    product: product.clone(),
                    side: contra,
                    price,
                    quantity: fillable,
                    source: FillSource::Bot,
                };
                portfolio.apply_fill(&fill);
                debug!(%product, side = %contra, price, qty = fillable, "bot hit resting order");
                report.fills.push(fill);
            }
        }
    }
}

/// Union of market and resting prices on `contra` that cross `limit`,
/// best first.
fn eligible_prices(
    product: &Product,
    contra: Side,
    limit: Price,
    books: &MarketBooks,
    resting: &RestingOrders,
) -> Vec<Price> {
    let mut prices = BTreeSet::new();
    if let Some(book) = books.get(product) {
        prices.extend(book.side(contra).prices_within(limit));
    }
    if let Some(book) = resting.book(product) {
        prices.extend(book.side(contra).prices_within(limit));
    }
    match contra {
        Side::Sell => prices.into_iter().collect(),
        Side::Buy => prices.into_iter().rev().collect(),
    }
}
