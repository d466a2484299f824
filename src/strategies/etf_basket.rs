//! ETF vs. bond basket mispricing
//!
//! Fair ETF value is the sum of the bond mids. Trades the ETF against the
//! whole basket when the spread-adjusted mispricing is strong enough, and
//! unwinds stretched bond inventory when the signal fades.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{OrderIntent, Price, Qty, Result, Strategy};
use crate::engine::StateView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtfBasketConfig {
    pub etf: String,
    pub bonds: Vec<String>,
    /// Trade quality needed to enter
    pub threshold: f64,
    pub entry_margin: f64,
    /// Share of the ETF spread charged against the mispricing
    pub spread_weight: f64,
    /// Bonds moving within this band boost the signal
    pub tight_band: f64,
    pub tight_boost: f64,
    pub size_exponent: f64,
    pub size_scale: f64,
    pub max_size: Qty,
    /// Halve size past these inventories
    pub etf_soft_limit: Qty,
    pub bond_soft_limit: Qty,
    pub unwind_long_above: Qty,
    pub unwind_long_size: Qty,
    pub unwind_short_below: Qty,
    pub unwind_short_size: Qty,
    pub unwind_max_spread: Price,
    /// Unwind only while |quality| is below this
    pub unwind_quality: f64,
}

impl Default for EtfBasketConfig {
    fn default() -> Self {
        Self {
            etf: "ETF1".to_string(),
            bonds: vec!["bond1".to_string(), "bond2".to_string(), "bond3".to_string()],
            threshold: 1.25,
            entry_margin: 0.05,
            spread_weight: 0.7,
            tight_band: 1.2,
            tight_boost: 1.28,
            size_exponent: 1.07,
            size_scale: 3.7,
            max_size: 11,
            etf_soft_limit: 32,
            bond_soft_limit: 28,
            unwind_long_above: 28,
            unwind_long_size: 3,
            unwind_short_below: -30,
            unwind_short_size: 2,
            unwind_max_spread: 3,
            unwind_quality: 0.8,
        }
    }
}

pub struct EtfBasketStrategy {
    config: EtfBasketConfig,
}

struct Leg<'a> {
    name: &'a str,
    bid: Price,
    ask: Price,
    mid: f64,
}

impl EtfBasketStrategy {
    pub fn new(config: EtfBasketConfig) -> Self {
        Self { config }
    }

    fn leg<'a>(view: &StateView, name: &'a str) -> Option<Leg<'a>> {
        let (bid, ask, mid) = view.quote(name)?;
        Some(Leg { name, bid, ask, mid })
    }

    fn trade_quality(&self, etf: &Leg, bonds: &[Leg]) -> f64 {
        let c = &self.config;
        let fair: f64 = bonds.iter().map(|b| b.mid).sum();
        let etf_spread = (etf.ask - etf.bid) as f64;
        let effective = etf.mid - fair - etf_spread * c.spread_weight;

        let tight = bonds.windows(2).all(|w| (w[0].mid - w[1].mid).abs() < c.tight_band);
        let boost = if tight { c.tight_boost } else { 1.0 };

        effective / (etf_spread + 0.5).max(1.0) * boost
    }

    fn size(&self, view: &StateView, quality: f64) -> Qty {
        let c = &self.config;
        let raw = quality.abs().powf(c.size_exponent) * c.size_scale;
        let mut size = (raw as Qty).min(c.max_size).max(1);
        if view.position(&c.etf).abs() > c.etf_soft_limit {
            size = (size / 2).max(1);
        }
        if c.bonds.iter().any(|b| view.position(b).abs() > c.bond_soft_limit) {
            size = (size / 2).max(1);
        }
        size
    }
}

fn can_trade(view: &StateView, product: &str, delta: Qty) -> bool {
    (view.position(product) + delta).abs() <= view.limit(product)
}

impl Strategy for EtfBasketStrategy {
    fn name(&self) -> &str {
        "etf_basket"
    }

    fn decide(&mut self, view: &StateView) -> Result<Vec<OrderIntent>> {
        let c = &self.config;
        let Some(etf) = Self::leg(view, &c.etf) else {
            return Ok(Vec::new());
        };
        let Some(bonds) = c.bonds.iter().map(|b| Self::leg(view, b)).collect::<Option<Vec<_>>>() else {
            return Ok(Vec::new());
        };

        let quality = self.trade_quality(&etf, &bonds);
        let size = self.size(view, quality);
        let mut orders = Vec::new();

        if quality > c.threshold + c.entry_margin
            && can_trade(view, etf.name, -size)
            && bonds.iter().all(|b| can_trade(view, b.name, size))
        {
            debug!(quality, size, "ETF rich: selling ETF, buying basket");
            orders.push(OrderIntent::sell(etf.name, etf.bid, size));
            orders.extend(bonds.iter().map(|b| OrderIntent::buy(b.name, b.ask, size)));
        }

        if quality < -c.threshold - c.entry_margin
            && can_trade(view, etf.name, size)
            && bonds.iter().all(|b| can_trade(view, b.name, -size))
        {
            debug!(quality, size, "ETF cheap: buying ETF, selling basket");
            orders.push(OrderIntent::buy(etf.name, etf.ask, size));
            orders.extend(bonds.iter().map(|b| OrderIntent::sell(b.name, b.bid, size)));
        }

        for bond in &bonds {
            let position = view.position(bond.name);
            let calm = bond.ask - bond.bid <= c.unwind_max_spread && quality.abs() < c.unwind_quality;
            if !calm {
                continue;
            }
            if position > c.unwind_long_above && can_trade(view, bond.name, -c.unwind_long_size) {
                orders.push(OrderIntent::sell(bond.name, bond.bid, c.unwind_long_size));
            }
            if position < c.unwind_short_below && can_trade(view, bond.name, c.unwind_short_size) {
                orders.push(OrderIntent::buy(bond.name, bond.ask, c.unwind_short_size));
            }
        }

        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PriceLevel, Product};
    use crate::orderbook::{MarketBooks, OrderBook};
    use crate::portfolio::PositionLimits;

    fn view(etf: (i64, i64), bond: (i64, i64), positions: &[(&str, i64)]) -> StateView {
        let book = |(bid, ask): (i64, i64)| {
            OrderBook::from_levels(&[PriceLevel::new(bid, 20)], &[PriceLevel::new(ask, 20)])
        };
        let products: Vec<Product> = ["ETF1", "bond1", "bond2", "bond3"].map(Product::from).to_vec();
        let mut books = MarketBooks::new();
        books.insert(Product::new("ETF1"), book(etf));
        for b in ["bond1", "bond2", "bond3"] {
            books.insert(Product::new(b), book(bond));
        }
        StateView {
            tick: 7,
            books,
            positions: positions.iter().map(|(p, q)| (Product::new(*p), *q)).collect(),
            limits: PositionLimits::uniform(products.iter().cloned(), 50),
            products,
        }
    }

    #[test]
    fn test_rich_etf_sells_against_basket() {
        // fair 300, etf mid 310, spread 2 → (10 - 1.4) / 2.5 * 1.28 ≈ 4.4
        let mut s = EtfBasketStrategy::new(EtfBasketConfig::default());
        let orders = s.decide(&view((309, 311), (99, 101), &[])).unwrap();

        assert_eq!(orders.len(), 4);
        assert_eq!(orders[0].product, Product::new("ETF1"));
        assert_eq!(orders[0].price, 309);
        assert!(orders[0].quantity < 0);
        assert!(orders[1..].iter().all(|o| o.quantity == -orders[0].quantity && o.price == 101));
    }

    #[test]
    fn test_cheap_etf_buys_against_basket() {
        let mut s = EtfBasketStrategy::new(EtfBasketConfig::default());
        let orders = s.decide(&view((289, 291), (99, 101), &[])).unwrap();
        assert_eq!(orders[0], OrderIntent::buy("ETF1", 291, orders[0].quantity));
        assert!(orders[0].quantity > 0);
        assert!(orders[1..].iter().all(|o| o.quantity < 0 && o.price == 99));
    }

    #[test]
    fn test_fair_value_unwinds_long_bond() {
        // 301 - 300 - 1.4 leaves quality near zero
        let mut s = EtfBasketStrategy::new(EtfBasketConfig::default());
        let orders = s.decide(&view((300, 302), (99, 101), &[("bond2", 30)])).unwrap();
        assert_eq!(orders, vec![OrderIntent::sell("bond2", 99, 3)]);
    }

    #[test]
    fn test_limit_blocks_entry() {
        let mut s = EtfBasketStrategy::new(EtfBasketConfig::default());
        let orders = s.decide(&view((309, 311), (99, 101), &[("bond1", 50)])).unwrap();
        assert!(orders.iter().all(|o| o.product != Product::new("ETF1")));
    }

    #[test]
    fn test_missing_bond_skips_tick() {
        let mut s = EtfBasketStrategy::new(EtfBasketConfig::default());
        let mut v = view((309, 311), (99, 101), &[]);
        v.books.remove(&Product::new("bond3"));
        assert!(s.decide(&v).unwrap().is_empty());
    }
}
