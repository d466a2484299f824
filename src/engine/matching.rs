//! Matching Engine - fills strategy intents against the tick's market book.

use tracing::{debug, warn};

use crate::core::{Fill, FillSource, OrderIntent, Qty, Side};
use crate::orderbook::{BookSide, MarketBooks, RestingOrders};
use crate::portfolio::{Portfolio, PositionLimits};

/// Outcome of one matching pass.
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    /// Unfilled remainders at each intent's own limit price.
    pub resting: RestingOrders,
    /// Fills in execution order.
    pub fills: Vec<Fill>,
    /// Intents refused by validation.
    pub rejected: usize,
}

/// Match `intents` in the order given.
///
/// Each fill is `min(outstanding, level quantity, headroom)`, so no fill can
/// push a position past its limit. Whatever is left rests on the intent's
/// own side at its limit price.
pub fn match_intents(
    intents: &[OrderIntent],
    books: &mut MarketBooks,
    portfolio: &mut Portfolio,
    limits: &PositionLimits,
) -> MatchReport {
    let mut report = MatchReport::default();

    for intent in intents {
        if let Err(e) = intent.validate(limits) {
            warn!(%intent, reason = %e, "intent rejected");
            report.rejected += 1;
            continue;
        }

        let side = intent.side();
        let mut outstanding = intent.quantity.abs();

        if let Some(book) = books.get_mut(&intent.product) {
            // buys lift the asks, sells hit the bids
            outstanding = sweep(
                intent,
                side,
                outstanding,
                book.side_mut(side.opposite()),
                portfolio,
                limits,
                &mut report.fills,
            );
        }

        if outstanding > 0 {
            report.resting.add(&intent.product, side, intent.price, outstanding);
        }
    }

    for book in books.values_mut() {
        book.prune();
    }

    report
}

fn sweep(
    intent: &OrderIntent,
    side: Side,
    mut outstanding: Qty,
    contra: &mut BookSide,
    portfolio: &mut Portfolio,
    limits: &PositionLimits,
    fills: &mut Vec<Fill>,
) -> Qty {
    for price in contra.prices_within(intent.price) {
        if outstanding == 0 {
            break;
        }
        let available = contra.quantity_at(price);
        let headroom = portfolio.headroom(&intent.product, side, limits);
        let fillable = outstanding.min(available).min(headroom);
        if fillable <= 0 {
            continue;
        }

        contra.take(price, fillable);
        outstanding -= fillable;

        let fill = Fill {
            product: intent.product.clone(),
            side,
            price,
            quantity: fillable,
            source: FillSource::Market,
        };
        portfolio.apply_fill(&fill);
        debug!(product = %fill.product, %side, price, qty = fillable, "filled against market");
        fills.push(fill);
    }
    outstanding
}
