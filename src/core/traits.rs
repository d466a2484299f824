//! Core traits - the replaceable collaborators around the engine

use crate::core::{OrderIntent, Product, Result};
use crate::engine::{BotFlow, StateView};
use crate::orderbook::MarketBooks;

/// Trading strategy
///
/// Invoked once per tick with a read-only snapshot. The strategy never
/// touches the live book; it only expresses intents. It may keep its own
/// history across ticks.
pub trait Strategy {
    /// Strategy name
    fn name(&self) -> &str;

    /// Decide this tick's order intents
    fn decide(&mut self, view: &StateView) -> Result<Vec<OrderIntent>>;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn decide(&mut self, view: &StateView) -> Result<Vec<OrderIntent>> {
        (**self).decide(view)
    }
}

/// Historical market data feed, addressed by timestamp
pub trait MarketFeed {
    /// Feed name for logging
    fn name(&self) -> &str;

    /// Every product the feed carries
    fn products(&self) -> Vec<Product>;

    /// Latest timestamp with market data
    fn last_timestamp(&self) -> Option<u64>;

    /// Fresh copy of the market books at `timestamp`; empty when missing
    fn books(&self, timestamp: u64) -> MarketBooks;

    /// Bot orders at `timestamp`; empty when missing
    fn bot_flow(&self, timestamp: u64) -> BotFlow;
}
