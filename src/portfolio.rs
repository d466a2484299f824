//! Portfolio - strategy inventory, cash and mark-to-market PnL.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{Fill, Product, Qty, Side};

/// Absolute per-product position limits.
///
/// A product without a limit is not part of the trading universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionLimits {
    limits: BTreeMap<Product, Qty>,
}

impl PositionLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same limit for every product.
    pub fn uniform(products: impl IntoIterator<Item = Product>, limit: Qty) -> Self {
        Self { limits: products.into_iter().map(|p| (p, limit.abs())).collect() }
    }

    pub fn set(&mut self, product: Product, limit: Qty) {
        self.limits.insert(product, limit.abs());
    }

    pub fn get(&self, product: &Product) -> Option<Qty> {
        self.limits.get(product).copied()
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.limits.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Product, Qty)> {
        self.limits.iter().map(|(p, l)| (p, *l))
    }
}

/// Strategy-owned inventory and cash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub positions: BTreeMap<Product, Qty>,
    /// Last settled PnL; `None` while a held product has no mid.
    pub pnl: Option<Decimal>,
}

impl Portfolio {
    /// Flat portfolio over the given products.
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            cash: Decimal::ZERO,
            positions: products.into_iter().map(|p| (p, 0)).collect(),
            pnl: Some(Decimal::ZERO),
        }
    }

    pub fn position(&self, product: &Product) -> Qty {
        self.positions.get(product).copied().unwrap_or(0)
    }

    /// Units that can still be bought before hitting the long limit.
    pub fn buy_headroom(&self, product: &Product, limits: &PositionLimits) -> Qty {
        limits
            .get(product)
            .map_or(0, |limit| limit.saturating_sub(self.position(product)).max(0))
    }

    /// Units that can still be sold before hitting the short limit.
    pub fn sell_headroom(&self, product: &Product, limits: &PositionLimits) -> Qty {
        limits
            .get(product)
            .map_or(0, |limit| limit.saturating_add(self.position(product)).max(0))
    }

    pub fn headroom(&self, product: &Product, side: Side, limits: &PositionLimits) -> Qty {
        match side {
            Side::Buy => self.buy_headroom(product, limits),
            Side::Sell => self.sell_headroom(product, limits),
        }
    }

    /// Book a strategy fill: move inventory and pay or receive cash.
    pub fn apply_fill(&mut self, fill: &Fill) {
        *self.positions.entry(fill.product.clone()).or_insert(0) += fill.signed_quantity();
        let value = fill.notional();
        match fill.side {
            Side::Buy => self.cash -= value,
            Side::Sell => self.cash += value,
        }
    }

    /// Cash plus inventory valued at `mids`.
    ///
    /// Undefined when a non-flat product has no mid.
    pub fn mark_to_market(&self, mids: &BTreeMap<Product, Option<Decimal>>) -> Option<Decimal> {
        let mut pnl = self.cash;
        for (product, qty) in &self.positions {
            if *qty == 0 {
                continue;
            }
            let mid = mids.get(product).copied().flatten()?;
            pnl += Decimal::from(*qty) * mid;
        }
        Some(pnl)
    }

    /// True when every position sits within its limit. A product without a
    /// limit is within it only while flat.
    pub fn within_limits(&self, limits: &PositionLimits) -> bool {
        self.positions
            .iter()
            .all(|(p, q)| q.abs() <= limits.get(p).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FillSource;

    fn product() -> Product {
        Product::new("Underlying")
    }

    #[test]
    fn test_headroom_saturates() {
        let limits = PositionLimits::uniform([product()], 20);
        let mut pf = Portfolio::new([product()]);
        pf.positions.insert(product(), -20);
        assert_eq!(pf.sell_headroom(&product(), &limits), 0);
        assert_eq!(pf.buy_headroom(&product(), &limits), 40);

        // positions beyond the limit never yield negative headroom
        pf.positions.insert(product(), -25);
        assert_eq!(pf.sell_headroom(&product(), &limits), 0);
    }

    #[test]
    fn test_unknown_product_has_no_headroom() {
        let pf = Portfolio::new([product()]);
        assert_eq!(pf.buy_headroom(&Product::new("Other"), &PositionLimits::new()), 0);
    }

    #[test]
    fn test_flat_product_without_limit_is_within_limits() {
        let mut pf = Portfolio::new([product(), Product::new("Call")]);
        let limits = PositionLimits::uniform([product()], 20);
        assert!(pf.within_limits(&limits));

        pf.positions.insert(Product::new("Call"), 1);
        assert!(!pf.within_limits(&limits));
    }

    #[test]
    fn test_apply_fill_and_mark() {
        let mut pf = Portfolio::new([product()]);
        pf.apply_fill(&Fill {
            product: product(),
            side: Side::Buy,
            price: 101,
            quantity: 5,
            source: FillSource::Market,
        });
        pf.apply_fill(&Fill {
            product: product(),
            side: Side::Sell,
            price: 103,
            quantity: 2,
            source: FillSource::Bot,
        });
        assert_eq!(pf.position(&product()), 3);
        assert_eq!(pf.cash, Decimal::from(-505 + 206));

        let mids = BTreeMap::from([(product(), Some(Decimal::new(1025, 1)))]);
        // -299 + 3 × 102.5
        assert_eq!(pf.mark_to_market(&mids), Some(Decimal::new(85, 1)));

        let missing = BTreeMap::from([(product(), None)]);
        assert_eq!(pf.mark_to_market(&missing), None);
    }
}
