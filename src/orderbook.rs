use crate::core::{Price, PriceLevel, Product, Qty, Side};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// One side of a price-level book: price → resting quantity.
///
/// Best price is the highest key on the buy side and the lowest on the sell
/// side. Levels may sit at zero between a fill and the next `prune`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Price, Qty>,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self { side, levels: BTreeMap::new() }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Set a level. Non-positive price or quantity is ignored.
    pub fn insert(&mut self, price: Price, qty: Qty) {
        if price > 0 && qty > 0 {
            self.levels.insert(price, qty);
        }
    }

    /// Add quantity to a level, creating it if needed.
    pub fn add(&mut self, price: Price, qty: Qty) {
        if price > 0 && qty > 0 {
            *self.levels.entry(price).or_insert(0) += qty;
        }
    }

    pub fn quantity_at(&self, price: Price) -> Qty {
        self.levels.get(&price).copied().unwrap_or(0)
    }

    /// Remove up to `qty` from a level and return what was removed.
    pub fn take(&mut self, price: Price, qty: Qty) -> Qty {
        match self.levels.get_mut(&price) {
            Some(level) => {
                let taken = qty.min(*level).max(0);
                *level -= taken;
                taken
            }
            None => 0,
        }
    }

    pub fn best(&self) -> Option<PriceLevel> {
        let entry = match self.side {
            Side::Buy => self.levels.iter().rev().find(|(_, q)| **q > 0),
            Side::Sell => self.levels.iter().find(|(_, q)| **q > 0),
        };
        entry.map(|(p, q)| PriceLevel::new(*p, *q))
    }

    pub fn best_price(&self) -> Option<Price> {
        self.best().map(|l| l.price)
    }

    /// Prices in priority order: descending for bids, ascending for asks.
    pub fn prices_best_first(&self) -> Vec<Price> {
        match self.side {
            Side::Buy => self.levels.keys().rev().copied().collect(),
            Side::Sell => self.levels.keys().copied().collect(),
        }
    }

    /// Prices an aggressor limited at `limit` may trade against, best first.
    pub fn prices_within(&self, limit: Price) -> Vec<Price> {
        match self.side {
            Side::Buy => self.levels.range(limit..).rev().map(|(p, _)| *p).collect(),
            Side::Sell => self.levels.range(..=limit).map(|(p, _)| *p).collect(),
        }
    }

    /// Drop levels whose quantity has reached zero.
    pub fn prune(&mut self) {
        self.levels.retain(|_, q| *q > 0);
    }

    pub fn total_quantity(&self) -> Qty {
        self.levels.values().sum()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.levels.iter().map(|(p, q)| PriceLevel::new(*p, *q))
    }
}

/// Price-level book for a single product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBook {
    pub bids: BookSide,
    pub asks: BookSide,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self { bids: BookSide::new(Side::Buy), asks: BookSide::new(Side::Sell) }
    }

    pub fn from_levels(bids: &[PriceLevel], asks: &[PriceLevel]) -> Self {
        let mut book = Self::new();
        for l in bids {
            book.bids.insert(l.price, l.quantity);
        }
        for l in asks {
            book.asks.insert(l.price, l.quantity);
        }
        book
    }

    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best()
    }

    /// Average of best bid and best ask; undefined if either side is empty.
    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        Some((Decimal::from(bid) + Decimal::from(ask)) / Decimal::TWO)
    }

    pub fn spread(&self) -> Option<Price> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    pub fn prune(&mut self) {
        self.bids.prune();
        self.asks.prune();
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// One tick's market liquidity. A missing product has no liquidity.
pub type MarketBooks = BTreeMap<Product, OrderBook>;

/// Unfilled strategy remainders for the current tick, per product and side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestingOrders {
    books: BTreeMap<Product, OrderBook>,
}

impl RestingOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rest `qty` at `price`, aggregating with any existing order there.
    pub fn add(&mut self, product: &Product, side: Side, price: Price, qty: Qty) {
        self.books.entry(product.clone()).or_default().side_mut(side).add(price, qty);
    }

    pub fn book(&self, product: &Product) -> Option<&OrderBook> {
        self.books.get(product)
    }

    pub fn book_mut(&mut self, product: &Product) -> Option<&mut OrderBook> {
        self.books.get_mut(product)
    }

    pub fn quantity_at(&self, product: &Product, side: Side, price: Price) -> Qty {
        self.book(product).map(|b| b.side(side).quantity_at(price)).unwrap_or(0)
    }

    pub fn total_quantity(&self, side: Side) -> Qty {
        self.books.values().map(|b| b.side(side).total_quantity()).sum()
    }

    pub fn prune(&mut self) {
        for book in self.books.values_mut() {
            book.prune();
        }
        self.books.retain(|_, b| !b.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.books.values().all(|b| b.bids.total_quantity() == 0 && b.asks.total_quantity() == 0)
    }

    pub fn clear(&mut self) {
        self.books.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Product, &OrderBook)> {
        self.books.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> OrderBook {
        OrderBook::from_levels(
            &[PriceLevel::new(99, 4), PriceLevel::new(98, 7), PriceLevel::new(97, 0)],
            &[PriceLevel::new(102, 3), PriceLevel::new(101, 5)],
        )
    }

    #[test]
    fn test_best_prices_are_structural() {
        let book = book();
        assert_eq!(book.best_bid(), Some(PriceLevel::new(99, 4)));
        assert_eq!(book.best_ask(), Some(PriceLevel::new(101, 5)));
        assert_eq!(book.spread(), Some(2));
        assert_eq!(book.mid(), Some(Decimal::from(100)));
        assert_eq!(book.asks.prices_best_first(), vec![101, 102]);
        assert_eq!(book.bids.prices_best_first(), vec![99, 98]);
    }

    #[test]
    fn test_zero_levels_never_loaded() {
        let book = book();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.bids.quantity_at(97), 0);
    }

    #[test]
    fn test_prices_within_limit() {
        let book = book();
        assert_eq!(book.asks.prices_within(101), vec![101]);
        assert_eq!(book.asks.prices_within(100), Vec::<Price>::new());
        assert_eq!(book.bids.prices_within(98), vec![99, 98]);
    }

    #[test]
    fn test_take_then_prune() {
        let mut book = book();
        assert_eq!(book.asks.take(101, 9), 5);
        // exhausted level is skipped for best price before pruning
        assert_eq!(book.best_ask(), Some(PriceLevel::new(102, 3)));
        assert_eq!(book.asks.len(), 2);
        book.prune();
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.asks.quantity_at(101), 0);
    }

    #[test]
    fn test_half_tick_mid() {
        let book = OrderBook::from_levels(&[PriceLevel::new(100, 1)], &[PriceLevel::new(101, 1)]);
        assert_eq!(book.mid(), Some(Decimal::new(1005, 1)));
        assert_eq!(OrderBook::from_levels(&[PriceLevel::new(100, 1)], &[]).mid(), None);
    }

    #[test]
    fn test_resting_orders_aggregate() {
        let product = Product::new("Call");
        let mut resting = RestingOrders::new();
        resting.add(&product, Side::Buy, 100, 2);
        resting.add(&product, Side::Buy, 100, 3);
        resting.add(&product, Side::Sell, 105, 1);
        assert_eq!(resting.quantity_at(&product, Side::Buy, 100), 5);
        assert_eq!(resting.total_quantity(Side::Sell), 1);

        resting.book_mut(&product).unwrap().asks.take(105, 1);
        resting.prune();
        assert_eq!(resting.book(&product).unwrap().asks.len(), 0);
        assert!(!resting.is_empty());
    }
}
