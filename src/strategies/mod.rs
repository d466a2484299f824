//! Trading strategies and their config-driven construction

pub mod etf_basket;
pub mod pair_momentum;
pub mod parity;

use serde::{Deserialize, Serialize};

use crate::engine::BoxedStrategy;

pub use etf_basket::{EtfBasketConfig, EtfBasketStrategy};
pub use pair_momentum::{PairMomentumConfig, PairMomentumStrategy};
pub use parity::{ParityArbStrategy, ParityConfig};

/// One `[[strategy]]` table, selected by its `kind` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    Parity(ParityConfig),
    EtfBasket(EtfBasketConfig),
    PairMomentum(PairMomentumConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Parity(ParityConfig::default())
    }
}

impl StrategyConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parity(_) => "parity",
            Self::EtfBasket(_) => "etf_basket",
            Self::PairMomentum(_) => "pair_momentum",
        }
    }

    /// Products the strategy quotes or trades.
    pub fn products(&self) -> Vec<&str> {
        match self {
            Self::Parity(c) => vec![c.call.as_str(), c.put.as_str(), c.underlying.as_str()],
            Self::EtfBasket(c) => {
                std::iter::once(c.etf.as_str()).chain(c.bonds.iter().map(String::as_str)).collect()
            }
            Self::PairMomentum(c) => vec![c.lead.as_str(), c.hedge.as_str()],
        }
    }
}

pub fn build_strategy(config: &StrategyConfig) -> BoxedStrategy {
    match config {
        StrategyConfig::Parity(c) => Box::new(ParityArbStrategy::new(c.clone())),
        StrategyConfig::EtfBasket(c) => Box::new(EtfBasketStrategy::new(c.clone())),
        StrategyConfig::PairMomentum(c) => Box::new(PairMomentumStrategy::new(c.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_from_config() {
        let parity = build_strategy(&StrategyConfig::default());
        assert_eq!(parity.name(), "parity");

        let etf = build_strategy(&StrategyConfig::EtfBasket(EtfBasketConfig::default()));
        assert_eq!(etf.name(), "etf_basket");

        let pair = build_strategy(&StrategyConfig::PairMomentum(PairMomentumConfig::default()));
        assert_eq!(pair.name(), "pair_momentum");
    }

    #[test]
    fn test_pair_momentum_from_toml() {
        let config: StrategyConfig = toml::from_str("kind = \"pair_momentum\"\nlookback = 5\n").unwrap();
        match config {
            StrategyConfig::PairMomentum(c) => {
                assert_eq!(c.lookback, 5);
                assert_eq!(c.max_pos, 30);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_products() {
        let etf = StrategyConfig::EtfBasket(EtfBasketConfig::default());
        assert_eq!(etf.products(), vec!["ETF1", "bond1", "bond2", "bond3"]);
        assert_eq!(etf.kind(), "etf_basket");
    }
}
