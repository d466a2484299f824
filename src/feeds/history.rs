//! In-memory replay histories, keyed by feed timestamp

use std::collections::{BTreeMap, BTreeSet};

use crate::core::{MarketFeed, PriceLevel, Product};
use crate::engine::{BotFlow, BotOrders};
use crate::orderbook::{MarketBooks, OrderBook};

/// Market snapshots per timestamp.
#[derive(Debug, Clone, Default)]
pub struct MarketHistory {
    snapshots: BTreeMap<u64, MarketBooks>,
    products: BTreeSet<Product>,
}

impl MarketHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a product's book. A later insert for the same slot replaces it.
    pub fn insert(&mut self, timestamp: u64, product: Product, book: OrderBook) {
        self.products.insert(product.clone());
        self.snapshots.entry(timestamp).or_default().insert(product, book);
    }

    pub fn snapshot(&self, timestamp: u64) -> MarketBooks {
        self.snapshots.get(&timestamp).cloned().unwrap_or_default()
    }

    pub fn book(&self, timestamp: u64, product: &Product) -> Option<&OrderBook> {
        self.snapshots.get(&timestamp)?.get(product)
    }

    /// Raw best bid and best ask before any matching.
    pub fn quote(&self, timestamp: u64, product: &Product) -> (Option<PriceLevel>, Option<PriceLevel>) {
        match self.book(timestamp, product) {
            Some(book) => (book.best_bid(), book.best_ask()),
            None => (None, None),
        }
    }

    pub fn products(&self) -> Vec<Product> {
        self.products.iter().cloned().collect()
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.snapshots.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Bot orders per timestamp.
#[derive(Debug, Clone, Default)]
pub struct BotHistory {
    flows: BTreeMap<u64, BotFlow>,
}

impl BotHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp: u64, product: Product, orders: BotOrders) {
        self.flows.entry(timestamp).or_default().insert(product, orders);
    }

    pub fn flow(&self, timestamp: u64) -> BotFlow {
        self.flows.get(&timestamp).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// Market and bot histories replayed together.
#[derive(Debug, Clone)]
pub struct CsvReplay {
    name: String,
    pub market: MarketHistory,
    pub bots: BotHistory,
}

impl CsvReplay {
    pub fn new(name: impl Into<String>, market: MarketHistory, bots: BotHistory) -> Self {
        Self { name: name.into(), market, bots }
    }
}

impl MarketFeed for CsvReplay {
    fn name(&self) -> &str {
        &self.name
    }

    fn products(&self) -> Vec<Product> {
        self.market.products()
    }

    fn last_timestamp(&self) -> Option<u64> {
        self.market.last_timestamp()
    }

    fn books(&self, timestamp: u64) -> MarketBooks {
        self.market.snapshot(timestamp)
    }

    fn bot_flow(&self, timestamp: u64) -> BotFlow {
        self.bots.flow(timestamp)
    }
}
