//! Configuration - Type-safe, validated config
//!
//! Loaded from TOML. Every section has defaults so an empty file (or no
//! file at all) describes the stock 50-lot, 1000-tick replay.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::{Error, MAX_QTY, Product, Qty, Result};
use crate::engine::RunSettings;
use crate::portfolio::PositionLimits;
use crate::strategies::StrategyConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,

    /// Input files
    pub data: DataConfig,

    /// Replay settings
    pub simulation: SimulationConfig,

    /// Strategies to run; more than one runs a parallel batch
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Log filter used when RUST_LOG is unset
    pub log_level: String,

    /// Where series CSVs and summaries are written
    pub output_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { log_level: "info,tickreplay=debug".to_string(), output_dir: None }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Market snapshot CSV
    pub market_csv: Option<PathBuf>,

    /// Bot order CSV; derived from `market_csv` when unset
    pub bots_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Absolute position limit for every product
    pub position_limit: Qty,

    /// Per-product overrides of `position_limit`
    pub limits: BTreeMap<String, Qty>,

    /// First tick to replay
    pub start_tick: u64,

    /// Stop before this tick
    pub max_ticks: u64,

    /// Feed timestamp of tick `t` is `t * timestamp_step`
    pub timestamp_step: u64,

    /// Log progress every N ticks (0 disables)
    pub progress_every: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            position_limit: 50,
            limits: BTreeMap::new(),
            start_tick: 1,
            max_ticks: 1000,
            timestamp_step: 100,
            progress_every: 100,
        }
    }
}

impl SimulationConfig {
    /// Limits for the feed's product universe.
    pub fn position_limits(&self, products: &[Product]) -> PositionLimits {
        let mut limits = PositionLimits::uniform(products.iter().cloned(), self.position_limit);
        for (name, limit) in &self.limits {
            let product = Product::new(name.as_str());
            if products.contains(&product) {
                limits.set(product, *limit);
            } else {
                tracing::warn!(product = %name, "limit override for product not in feed");
            }
        }
        limits
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            start_tick: self.start_tick,
            max_ticks: self.max_ticks,
            timestamp_step: self.timestamp_step,
            progress_every: self.progress_every,
        }
    }
}

impl Config {
    /// Load from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if !(0..=MAX_QTY).contains(&sim.position_limit) {
            return Err(Error::Config(format!("position_limit must be within 0..={}", MAX_QTY)));
        }
        if let Some((name, _)) = sim.limits.iter().find(|(_, l)| !(0..=MAX_QTY).contains(*l)) {
            return Err(Error::Config(format!("limit for {} must be within 0..={}", name, MAX_QTY)));
        }
        if sim.timestamp_step == 0 {
            return Err(Error::Config("timestamp_step must be positive".into()));
        }
        if sim.start_tick >= sim.max_ticks {
            return Err(Error::Config(format!(
                "start_tick {} must be below max_ticks {}",
                sim.start_tick, sim.max_ticks
            )));
        }
        Ok(())
    }

    /// Strategies to run, falling back to the default strategy.
    pub fn strategies(&self) -> Vec<StrategyConfig> {
        if self.strategies.is_empty() {
            vec![StrategyConfig::default()]
        } else {
            self.strategies.clone()
        }
    }
}
