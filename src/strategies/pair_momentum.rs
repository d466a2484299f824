//! Two-leg momentum pair
//!
//! Follows the lookback return of the lead leg: a rally (in an up regime)
//! walks the lead long and the hedge leg short, a slide (in a down regime)
//! the reverse. Moves are step-limited and rate-limited by a cooldown, and
//! each leg has its own take-profit and stop-loss exit.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{OrderIntent, Price, Qty, Result, Strategy};
use crate::engine::StateView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairMomentumConfig {
    /// Signal leg
    pub lead: String,
    pub hedge: String,
    /// Ticks between the mids compared for the short return
    pub lookback: usize,
    /// Short return needed to move toward a target
    pub threshold: f64,
    /// Return since the first mid at or above which the regime is long
    pub min_long_ret: f64,
    /// Ticks to wait after a lead-leg trade
    pub cooldown: u64,
    /// Largest position change per tick
    pub step: Qty,
    pub max_pos: Qty,
    pub take_profit: f64,
    pub stop_loss: f64,
}

impl Default for PairMomentumConfig {
    fn default() -> Self {
        Self {
            lead: "CUTHS_STOCKS".to_string(),
            hedge: "CASTLE_STOCKS".to_string(),
            lookback: 10,
            threshold: 0.005,
            min_long_ret: 0.0,
            cooldown: 3,
            step: 1,
            max_pos: 30,
            take_profit: 0.1,
            stop_loss: 0.05,
        }
    }
}

/// Per-leg bookkeeping kept across ticks.
#[derive(Debug, Clone, Default)]
struct LegState {
    initial_mid: Option<f64>,
    entry: Option<f64>,
}

pub struct PairMomentumStrategy {
    config: PairMomentumConfig,
    lead_mids: VecDeque<f64>,
    lead: LegState,
    hedge: LegState,
    last_lead_trade: Option<u64>,
}

fn ret(from: f64, to: f64) -> f64 {
    (to - from) / (from + 1e-9)
}

impl PairMomentumStrategy {
    pub fn new(config: PairMomentumConfig) -> Self {
        Self {
            config,
            lead_mids: VecDeque::new(),
            lead: LegState::default(),
            hedge: LegState::default(),
            last_lead_trade: None,
        }
    }

    /// Flatten a leg whose return since entry hit take-profit or stop-loss.
    /// Returns the position the leg is expected to hold afterwards.
    fn exit(
        config: &PairMomentumConfig,
        leg: &mut LegState,
        name: &str,
        position: Qty,
        (bid, ask, mid): (Price, Price, f64),
        out: &mut Vec<OrderIntent>,
    ) -> Qty {
        let Some(entry) = leg.entry else { return position };
        let pnl_ret = if position > 0 { ret(entry, mid) } else { -ret(entry, mid) };
        if pnl_ret < config.take_profit && pnl_ret > -config.stop_loss {
            return position;
        }
        debug!(leg = name, position, entry, mid, pnl_ret, "pair leg exit");
        if position > 0 {
            out.push(OrderIntent::sell(name, bid, position));
        } else {
            out.push(OrderIntent::buy(name, ask, position));
        }
        leg.entry = None;
        0
    }

    /// Step `position` toward `target`, recording the entry when opening.
    fn step_toward(
        &self,
        leg: &mut LegState,
        name: &str,
        position: Qty,
        target: Qty,
        (bid, ask, _): (Price, Price, f64),
        out: &mut Vec<OrderIntent>,
    ) -> bool {
        let change = (target - position).clamp(-self.config.step, self.config.step);
        if change == 0 {
            return false;
        }
        let price = if change > 0 { ask } else { bid };
        if position == 0 {
            leg.entry = Some(price as f64);
        }
        out.push(OrderIntent::new(name, price, change));
        true
    }
}

impl Strategy for PairMomentumStrategy {
    fn name(&self) -> &str {
        "pair_momentum"
    }

    fn decide(&mut self, view: &StateView) -> Result<Vec<OrderIntent>> {
        let config = self.config.clone();
        let lead_quote = view.quote(&config.lead);
        let hedge_quote = view.quote(&config.hedge);

        if let Some((_, _, mid)) = lead_quote {
            self.lead.initial_mid.get_or_insert(mid);
        }
        if let Some((_, _, mid)) = hedge_quote {
            self.hedge.initial_mid.get_or_insert(mid);
        }
        let (Some(lead_quote), Some(hedge_quote)) = (lead_quote, hedge_quote) else {
            return Ok(Vec::new());
        };

        // an unfilled opening order leaves the leg flat: forget its entry
        let mut lead_pos = view.position(&config.lead);
        let mut hedge_pos = view.position(&config.hedge);
        if lead_pos == 0 {
            self.lead.entry = None;
        }
        if hedge_pos == 0 {
            self.hedge.entry = None;
        }

        let lead_mid = lead_quote.2;
        self.lead_mids.push_back(lead_mid);
        if self.lead_mids.len() > config.lookback + 1 {
            self.lead_mids.pop_front();
        }
        if self.lead_mids.len() <= config.lookback {
            return Ok(Vec::new());
        }
        let short_ret = ret(self.lead_mids[0], lead_mid);
        let long_regime = self.lead.initial_mid.is_some_and(|first| ret(first, lead_mid) >= config.min_long_ret);

        let mut orders = Vec::new();
        if lead_pos != 0 {
            lead_pos = Self::exit(&config, &mut self.lead, &config.lead, lead_pos, lead_quote, &mut orders);
        }
        if hedge_pos != 0 {
            hedge_pos = Self::exit(&config, &mut self.hedge, &config.hedge, hedge_pos, hedge_quote, &mut orders);
        }

        if self.last_lead_trade.is_some_and(|last| view.tick < last + config.cooldown) {
            return Ok(orders);
        }

        let (lead_target, hedge_target) = if long_regime && short_ret >= config.threshold {
            (config.max_pos, -config.max_pos)
        } else if !long_regime && short_ret <= -config.threshold {
            (-config.max_pos, config.max_pos)
        } else {
            return Ok(orders);
        };
        debug!(short_ret, long_regime, lead_target, "pair momentum signal");

        let mut lead = std::mem::take(&mut self.lead);
        if self.step_toward(&mut lead, &config.lead, lead_pos, lead_target, lead_quote, &mut orders) {
            self.last_lead_trade = Some(view.tick);
        }
        self.lead = lead;

        let mut hedge = std::mem::take(&mut self.hedge);
        self.step_toward(&mut hedge, &config.hedge, hedge_pos, hedge_target, hedge_quote, &mut orders);
        self.hedge = hedge;

        Ok(orders)
    }
}
