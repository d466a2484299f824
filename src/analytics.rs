//! Run reporting: per-tick series export and an end-of-run summary

use std::io::Write;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{PriceLevel, Product, Result};
use crate::engine::{RunOutcome, TickRecord};

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write one row per tick. `quotes` gives the raw best bid and offer of a
/// product at a tick, and the mid column is that quote's mid. Undefined
/// values become empty cells.
pub fn write_series_csv<W, Q>(writer: W, records: &[TickRecord], products: &[Product], quotes: Q) -> Result<()>
where
    W: Write,
    Q: Fn(u64, &Product) -> (Option<PriceLevel>, Option<PriceLevel>),
{
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["tick".to_string(), "cash".to_string(), "pnl".to_string()];
    header.extend(products.iter().map(|p| format!("{}_quantity", p)));
    for p in products {
        header.push(format!("{}_mid", p));
        header.push(format!("{}_bid", p));
        header.push(format!("{}_offer", p));
    }
    wtr.write_record(&header)?;

    for record in records {
        let mut row = vec![record.tick.to_string(), record.cash.to_string(), cell(record.pnl)];
        row.extend(products.iter().map(|p| record.positions.get(p).copied().unwrap_or(0).to_string()));
        for p in products {
            let (bid, offer) = quotes(record.tick, p);
            let mid = match (bid, offer) {
                (Some(b), Some(o)) => Some(Decimal::from(b.price + o.price) / Decimal::TWO),
                _ => None,
            };
            row.push(cell(mid));
            row.push(cell(bid.map(|l| l.price)));
            row.push(cell(offer.map(|l| l.price)));
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Largest peak-to-trough decline over ticks with a defined PnL.
pub fn max_drawdown(records: &[TickRecord]) -> Decimal {
    let mut peak: Option<Decimal> = None;
    let mut worst = Decimal::ZERO;
    for pnl in records.iter().filter_map(|r| r.pnl) {
        let top = *peak.get_or_insert(pnl);
        if pnl > top {
            peak = Some(pnl);
        } else {
            worst = worst.max(top - pnl);
        }
    }
    worst
}

pub fn peak_pnl(records: &[TickRecord]) -> Option<Decimal> {
    records.iter().filter_map(|r| r.pnl).max()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub strategy: String,
    pub ticks: u64,
    pub final_cash: Decimal,
    pub final_pnl: Option<Decimal>,
    pub peak_pnl: Option<Decimal>,
    pub max_drawdown: Decimal,
    pub fills: usize,
    pub rejected_intents: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            strategy: outcome.strategy.clone(),
            ticks: outcome.stats.ticks,
            final_cash: outcome.portfolio.cash,
            final_pnl: outcome.records.last().and_then(|r| r.pnl),
            peak_pnl: peak_pnl(&outcome.records),
            max_drawdown: max_drawdown(&outcome.records),
            fills: outcome.stats.market_fills + outcome.stats.bot_fills,
            rejected_intents: outcome.stats.rejected_intents,
            started_at: outcome.started_at,
            elapsed_ms: (outcome.finished_at - outcome.started_at).num_milliseconds(),
            cancelled: outcome.cancelled,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunStats;
    use crate::portfolio::Portfolio;
    use std::collections::BTreeMap;

    fn record(tick: u64, pnl: Option<i64>, position: i64, mid: Option<Decimal>) -> TickRecord {
        let call = Product::new("Call");
        TickRecord {
            tick,
            cash: Decimal::from(-100 * position),
            pnl: pnl.map(Decimal::from),
            positions: BTreeMap::from([(call.clone(), position)]),
            mids: BTreeMap::from([(call, mid)]),
        }
    }

    #[test]
    fn test_series_csv_blank_cells() {
        // settle mid after trading differs from the raw quote's mid
        let records = vec![
            record(1, Some(0), 1, Some(Decimal::from(105))),
            record(2, None, 1, None),
        ];
        let products = vec![Product::new("Call")];
        let mut out = Vec::new();
        write_series_csv(&mut out, &records, &products, |tick, _| {
            if tick == 1 {
                (Some(PriceLevel::new(100, 1)), Some(PriceLevel::new(101, 1)))
            } else {
                (None, None)
            }
        })
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "tick,cash,pnl,Call_quantity,Call_mid,Call_bid,Call_offer");
        assert_eq!(lines[1], "1,-100,0,1,100.5,100,101");
        assert_eq!(lines[2], "2,-100,,1,,,");
    }

    #[test]
    fn test_drawdown_skips_undefined() {
        let records: Vec<TickRecord> = [Some(0), Some(10), None, Some(4), Some(12), Some(9)]
            .into_iter()
            .enumerate()
            .map(|(i, pnl)| record(i as u64 + 1, pnl, 0, None))
            .collect();
        assert_eq!(max_drawdown(&records), Decimal::from(6));
        assert_eq!(peak_pnl(&records), Some(Decimal::from(12)));
        assert_eq!(max_drawdown(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_summary_json() {
        let now = Utc::now();
        let outcome = RunOutcome {
            strategy: "parity".to_string(),
            records: vec![record(1, Some(5), 0, None)],
            portfolio: Portfolio::new([Product::new("Call")]),
            stats: RunStats { ticks: 1, market_fills: 2, bot_fills: 1, ..RunStats::default() },
            cancelled: false,
            started_at: now,
            finished_at: now,
        };
        let summary = RunSummary::from_outcome(&outcome);
        assert_eq!(summary.fills, 3);
        assert_eq!(summary.final_pnl, Some(Decimal::from(5)));

        let parsed: RunSummary = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(parsed, summary);
    }
}
