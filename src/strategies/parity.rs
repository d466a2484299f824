//! Put-call parity arbitrage with delta hedging

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{OrderIntent, Price, Qty, Result, Strategy};
use crate::engine::StateView;

/// Best bid, best ask, mid
type Quote = (Price, Price, f64);

/// Parity strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParityConfig {
    pub call: String,
    pub put: String,
    pub underlying: String,
    /// Strike-equivalent constant in `C - P - S + K`
    pub parity_const: f64,
    /// Parity error needed to trade
    pub threshold: f64,
    pub arb_size: Qty,
    /// Arb size once any position exceeds `soft_limit`
    pub reduced_arb_size: Qty,
    pub delta_call: f64,
    pub delta_put: f64,
    /// Net delta that triggers a hedge
    pub hedge_threshold: f64,
    pub hedge_unit: Qty,
    pub soft_limit: Qty,
    /// Never trade a leg past this inventory
    pub hard_limit: Qty,
}

impl Default for ParityConfig {
    fn default() -> Self {
        Self {
            call: "Call".to_string(),
            put: "Put".to_string(),
            underlying: "Underlying".to_string(),
            parity_const: 10_000.0,
            threshold: 3.9,
            arb_size: 2,
            reduced_arb_size: 1,
            delta_call: 0.46,
            delta_put: -0.54,
            hedge_threshold: 5.0,
            hedge_unit: 2,
            soft_limit: 35,
            hard_limit: 48,
        }
    }
}

pub struct ParityArbStrategy {
    config: ParityConfig,
}

impl ParityArbStrategy {
    pub fn new(config: ParityConfig) -> Self {
        Self { config }
    }

    fn arb_orders(&self, view: &StateView, quotes: [Quote; 3], error: f64, out: &mut Vec<OrderIntent>) {
        let c = &self.config;
        let (call, put, under) = (view.position(&c.call), view.position(&c.put), view.position(&c.underlying));
        let stretched = [call, put, under].iter().any(|p| p.abs() > c.soft_limit);
        let size = if stretched { c.reduced_arb_size } else { c.arb_size };

        let [(call_bid, call_ask, _), (put_bid, put_ask, _), (under_bid, under_ask, _)] = quotes;

        if error > c.threshold {
            if call - size >= -c.hard_limit && put + size <= c.hard_limit && under + size <= c.hard_limit {
                debug!(error, size, "parity rich: selling call");
                out.push(OrderIntent::sell(c.call.as_str(), call_bid, size));
                out.push(OrderIntent::buy(c.put.as_str(), put_ask, size));
                out.push(OrderIntent::buy(c.underlying.as_str(), under_ask, size));
            }
        } else if error < -c.threshold
            && call + size <= c.hard_limit
            && put - size >= -c.hard_limit
            && under - size >= -c.hard_limit
        {
            debug!(error, size, "parity cheap: buying call");
            out.push(OrderIntent::buy(c.call.as_str(), call_ask, size));
            out.push(OrderIntent::sell(c.put.as_str(), put_bid, size));
            out.push(OrderIntent::sell(c.underlying.as_str(), under_bid, size));
        }
    }

    fn hedge_order(&self, view: &StateView) -> Option<OrderIntent> {
        let c = &self.config;
        let under = view.position(&c.underlying);
        let option_delta =
            view.position(&c.call) as f64 * c.delta_call + view.position(&c.put) as f64 * c.delta_put;
        let net_delta = option_delta - under as f64;
        let (bid, ask, _) = view.quote(&c.underlying)?;

        if net_delta > c.hedge_threshold {
            let size = c.hedge_unit.min(c.hard_limit + under);
            (size > 0).then(|| OrderIntent::sell(c.underlying.as_str(), bid, size))
        } else if net_delta < -c.hedge_threshold {
            let size = c.hedge_unit.min(c.hard_limit - under);
            (size > 0).then(|| OrderIntent::buy(c.underlying.as_str(), ask, size))
        } else {
            None
        }
    }
}

impl Strategy for ParityArbStrategy {
    fn name(&self) -> &str {
        "parity"
    }

    fn decide(&mut self, view: &StateView) -> Result<Vec<OrderIntent>> {
        let c = &self.config;
        let (Some(call), Some(put), Some(under)) =
            (view.quote(&c.call), view.quote(&c.put), view.quote(&c.underlying))
        else {
            return Ok(Vec::new());
        };

        let parity_error = call.2 - put.2 - under.2 + c.parity_const;
        let mut orders = Vec::new();
        self.arb_orders(view, [call, put, under], parity_error, &mut orders);
        orders.extend(self.hedge_order(view));
        Ok(orders)
    }
}
