//! Tick Driver - sequences one replay tick at a time
//!
//! SNAPSHOT → STRATEGY_DECIDE → MATCH → BOT_FLOW → SETTLE. Each tick starts
//! from the feed's fresh book; only cash and positions carry over.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

use crate::core::{Error, MarketFeed, Price, PriceLevel, Product, Qty, Result, Strategy};
use crate::engine::bots::{BotFlow, apply_bot_flow};
use crate::engine::matching::match_intents;
use crate::orderbook::{MarketBooks, OrderBook};
use crate::portfolio::{Portfolio, PositionLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Snapshot,
    StrategyDecide,
    Match,
    BotFlow,
    Settle,
}

/// Read-only copy of the market and the strategy's inventory.
#[derive(Debug, Clone)]
pub struct StateView {
    pub tick: u64,
    pub books: MarketBooks,
    pub positions: BTreeMap<Product, Qty>,
    pub limits: PositionLimits,
    pub products: Vec<Product>,
}

impl StateView {
    pub fn book(&self, product: &str) -> Option<&OrderBook> {
        self.books.get(&Product::new(product))
    }

    pub fn best_bid(&self, product: &str) -> Option<PriceLevel> {
        self.book(product)?.best_bid()
    }

    pub fn best_ask(&self, product: &str) -> Option<PriceLevel> {
        self.book(product)?.best_ask()
    }

    /// Best bid, best ask and mid, if both sides are quoted.
    pub fn quote(&self, product: &str) -> Option<(Price, Price, f64)> {
        let bid = self.best_bid(product)?.price;
        let ask = self.best_ask(product)?.price;
        Some((bid, ask, (bid + ask) as f64 / 2.0))
    }

    pub fn mid(&self, product: &str) -> Option<Decimal> {
        self.book(product)?.mid()
    }

    pub fn position(&self, product: &str) -> Qty {
        self.positions.get(&Product::new(product)).copied().unwrap_or(0)
    }

    pub fn limit(&self, product: &str) -> Qty {
        self.limits.get(&Product::new(product)).unwrap_or(0)
    }
}

/// Settled state at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    pub tick: u64,
    pub cash: Decimal,
    pub pnl: Option<Decimal>,
    pub positions: BTreeMap<Product, Qty>,
    pub mids: BTreeMap<Product, Option<Decimal>>,
}

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub start_tick: u64,
    /// Exclusive upper bound
    pub max_ticks: u64,
    pub timestamp_step: u64,
    pub progress_every: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { start_tick: 1, max_ticks: 1000, timestamp_step: 100, progress_every: 100 }
    }
}

impl RunSettings {
    pub fn timestamp(&self, tick: u64) -> u64 {
        tick * self.timestamp_step
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub ticks: u64,
    pub market_fills: usize,
    pub bot_fills: usize,
    pub rejected_intents: usize,
    pub bot_market_volume: Qty,
}

/// Stops a run after the tick in progress.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub strategy: String,
    pub records: Vec<TickRecord>,
    pub portfolio: Portfolio,
    pub stats: RunStats,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Owns the portfolio for a run and drives ticks strictly in order.
pub struct TickDriver {
    products: Vec<Product>,
    limits: PositionLimits,
    portfolio: Portfolio,
    stats: RunStats,
}

impl TickDriver {
    pub fn new(products: Vec<Product>, limits: PositionLimits) -> Self {
        let portfolio = Portfolio::new(products.iter().cloned());
        Self { products, limits, portfolio, stats: RunStats::default() }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Run one tick against `books`, this tick's fresh market snapshot.
    pub fn process_tick<S: Strategy + ?Sized>(
        &mut self,
        tick: u64,
        mut books: MarketBooks,
        bots: &BotFlow,
        strategy: &mut S,
    ) -> Result<TickRecord> {
        trace!(tick, phase = ?TickPhase::Snapshot, "tick phase");
        let view = StateView {
            tick,
            books: books.clone(),
            positions: self.portfolio.positions.clone(),
            limits: self.limits.clone(),
            products: self.products.clone(),
        };

        trace!(tick, phase = ?TickPhase::StrategyDecide, "tick phase");
        let intents = strategy
            .decide(&view)
            .map_err(|e| Error::Strategy(format!("{} failed at tick {}: {}", strategy.name(), tick, e)))?;

        trace!(tick, phase = ?TickPhase::Match, intents = intents.len(), "tick phase");
        let mut report = match_intents(&intents, &mut books, &mut self.portfolio, &self.limits);
        self.check_limits(tick)?;

        trace!(tick, phase = ?TickPhase::BotFlow, "tick phase");
        let bot_report =
            apply_bot_flow(bots, &mut books, &mut report.resting, &mut self.portfolio, &self.limits);
        self.check_limits(tick)?;

        trace!(tick, phase = ?TickPhase::Settle, "tick phase");
        let mids: BTreeMap<Product, Option<Decimal>> = self
            .products
            .iter()
            .map(|p| (p.clone(), books.get(p).and_then(OrderBook::mid)))
            .collect();
        let pnl = self.portfolio.mark_to_market(&mids);
        if pnl.is_none() {
            debug!(tick, "PnL undefined: held product without a mid");
        }
        self.portfolio.pnl = pnl;

        self.stats.ticks += 1;
        self.stats.market_fills += report.fills.len();
        self.stats.bot_fills += bot_report.fills.len();
        self.stats.rejected_intents += report.rejected;
        self.stats.bot_market_volume += bot_report.market_volume;

        Ok(TickRecord {
            tick,
            cash: self.portfolio.cash,
            pnl,
            positions: self.portfolio.positions.clone(),
            mids,
        })
    }

    fn check_limits(&self, tick: u64) -> Result<()> {
        if self.portfolio.within_limits(&self.limits) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "position limit breached at tick {}: {:?}",
                tick, self.portfolio.positions
            )))
        }
    }

    /// Replay `feed` from `settings.start_tick` until `max_ticks`, the end of
    /// the feed, or cancellation.
    pub fn run<F, S>(
        mut self,
        feed: &F,
        strategy: &mut S,
        settings: &RunSettings,
        cancel: &CancelToken,
    ) -> Result<RunOutcome>
    where
        F: MarketFeed + ?Sized,
        S: Strategy + ?Sized,
    {
        if settings.timestamp_step == 0 {
            return Err(Error::Config("timestamp_step must be positive".into()));
        }
        let started_at = Utc::now();
        let end = match feed.last_timestamp() {
            Some(last) => settings.max_ticks.min(last / settings.timestamp_step + 1),
            None => {
                warn!(feed = feed.name(), "feed has no market data");
                settings.start_tick
            }
        };
        info!(
            strategy = strategy.name(),
            feed = feed.name(),
            products = self.products.len(),
            from = settings.start_tick,
            to = end,
            "replay starting"
        );

        let mut records = Vec::new();
        let mut cancelled = false;
        for tick in settings.start_tick..end {
            if cancel.is_cancelled() {
                info!(tick, "replay cancelled");
                cancelled = true;
                break;
            }
            let ts = settings.timestamp(tick);
            let books = feed.books(ts);
            if books.is_empty() {
                debug!(tick, ts, "no market data for tick");
            }
            let record = self.process_tick(tick, books, &feed.bot_flow(ts), strategy)?;
            if settings.progress_every > 0 && tick % settings.progress_every == 0 {
                info!(tick, cash = %record.cash, pnl = ?record.pnl, "progress");
            }
            records.push(record);
        }

        let finished_at = Utc::now();
        info!(
            strategy = strategy.name(),
            ticks = self.stats.ticks,
            cash = %self.portfolio.cash,
            pnl = ?self.portfolio.pnl,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "replay finished"
        );

        Ok(RunOutcome {
            strategy: strategy.name().to_string(),
            records,
            portfolio: self.portfolio,
            stats: self.stats,
            cancelled,
            started_at,
            finished_at,
        })
    }
}
