//! CSV ingestion for market snapshots and bot orders.
//!
//! Both files share one schema: `timestamp`, `product`, then
//! `bid_price_i`, `bid_volume_i`, `ask_price_i`, `ask_volume_i` for as many
//! levels as the header declares. Bot files only use level 1.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{StringRecord, Trim};
use tracing::info;

use crate::core::{Error, MAX_PRICE, MAX_QTY, PriceLevel, Product, Result};
use crate::engine::BotOrders;
use crate::feeds::history::{BotHistory, MarketHistory};
use crate::orderbook::OrderBook;

#[derive(Debug, Clone, Copy)]
struct LevelColumns {
    bid_price: Option<usize>,
    bid_volume: Option<usize>,
    ask_price: Option<usize>,
    ask_volume: Option<usize>,
}

#[derive(Debug, Clone)]
struct Columns {
    timestamp: usize,
    product: usize,
    levels: Vec<LevelColumns>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let timestamp =
            find("timestamp").ok_or_else(|| Error::Data("missing column `timestamp`".into()))?;
        let product = find("product").ok_or_else(|| Error::Data("missing column `product`".into()))?;

        let mut levels = Vec::new();
        for i in 1.. {
            let level = LevelColumns {
                bid_price: find(&format!("bid_price_{}", i)),
                bid_volume: find(&format!("bid_volume_{}", i)),
                ask_price: find(&format!("ask_price_{}", i)),
                ask_volume: find(&format!("ask_volume_{}", i)),
            };
            let has_bid = level.bid_price.is_some() && level.bid_volume.is_some();
            let has_ask = level.ask_price.is_some() && level.ask_volume.is_some();
            if !has_bid && !has_ask {
                break;
            }
            levels.push(level);
        }
        if levels.is_empty() {
            return Err(Error::Data("no bid/ask level columns".into()));
        }
        Ok(Self { timestamp, product, levels })
    }
}

/// Row-scoped cell parser that names its location on error.
struct Row<'a> {
    record: &'a StringRecord,
    headers: &'a StringRecord,
    line: u64,
}

impl Row<'_> {
    fn text(&self, idx: usize) -> &str {
        self.record.get(idx).unwrap_or("")
    }

    fn column(&self, idx: usize) -> &str {
        self.headers.get(idx).unwrap_or("?")
    }

    /// Integer cell; accepts integral floats such as `101.0`. Empty is `None`.
    fn int(&self, idx: Option<usize>) -> Result<Option<i64>> {
        let Some(idx) = idx else { return Ok(None) };
        let raw = self.text(idx);
        if raw.is_empty() {
            return Ok(None);
        }
        if let Ok(v) = raw.parse::<i64>() {
            return Ok(Some(v));
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => Ok(Some(v as i64)),
            _ => Err(Error::Data(format!(
                "line {}: column `{}` is not an integer: {:?}",
                self.line,
                self.column(idx),
                raw
            ))),
        }
    }

    /// Bounded cell; values past `max` are malformed data.
    fn bounded(&self, idx: Option<usize>, max: i64) -> Result<Option<i64>> {
        match (self.int(idx)?, idx) {
            (Some(v), Some(idx)) if v > max => Err(Error::Data(format!(
                "line {}: column `{}` out of range: {}",
                self.line,
                self.column(idx),
                v
            ))),
            (v, _) => Ok(v),
        }
    }

    fn level(&self, price: Option<usize>, volume: Option<usize>) -> Result<Option<PriceLevel>> {
        match (self.bounded(price, MAX_PRICE)?, self.bounded(volume, MAX_QTY)?) {
            (Some(p), Some(q)) if p > 0 && q > 0 => Ok(Some(PriceLevel::new(p, q))),
            _ => Ok(None),
        }
    }

    fn timestamp(&self, idx: usize) -> Result<u64> {
        match self.int(Some(idx))? {
            Some(ts) if ts >= 0 => Ok(ts as u64),
            _ => Err(Error::Data(format!("line {}: missing or negative timestamp", self.line))),
        }
    }

    fn product(&self, idx: usize) -> Result<Product> {
        let product = Product::new(self.text(idx));
        if product.is_empty() {
            return Err(Error::Data(format!("line {}: empty product", self.line)));
        }
        Ok(product)
    }
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().trim(Trim::All).flexible(true).from_reader(source)
}

/// Parse market snapshots from any CSV source.
pub fn read_market<R: Read>(source: R) -> Result<MarketHistory> {
    let mut rdr = reader(source);
    let headers = rdr.headers()?.clone();
    let columns = Columns::from_headers(&headers)?;
    let mut history = MarketHistory::new();

    for record in rdr.records() {
        let record = record?;
        let row = Row {
            record: &record,
            headers: &headers,
            line: record.position().map_or(0, |p| p.line()),
        };
        let timestamp = row.timestamp(columns.timestamp)?;
        let product = row.product(columns.product)?;

        let mut bids = Vec::with_capacity(columns.levels.len());
        let mut asks = Vec::with_capacity(columns.levels.len());
        for level in &columns.levels {
            bids.extend(row.level(level.bid_price, level.bid_volume)?);
            asks.extend(row.level(level.ask_price, level.ask_volume)?);
        }
        history.insert(timestamp, product, OrderBook::from_levels(&bids, &asks));
    }
    Ok(history)
}

/// Parse bot orders from any CSV source. Non-positive volumes are dropped.
pub fn read_bots<R: Read>(source: R) -> Result<BotHistory> {
    let mut rdr = reader(source);
    let headers = rdr.headers()?.clone();
    let columns = Columns::from_headers(&headers)?;
    let top = columns.levels[0];
    let mut history = BotHistory::new();

    for record in rdr.records() {
        let record = record?;
        let row = Row {
            record: &record,
            headers: &headers,
            line: record.position().map_or(0, |p| p.line()),
        };
        let timestamp = row.timestamp(columns.timestamp)?;
        let product = row.product(columns.product)?;
        let orders = BotOrders {
            buy: row.level(top.bid_price, top.bid_volume)?,
            sell: row.level(top.ask_price, top.ask_volume)?,
        };
        if orders.buy.is_some() || orders.sell.is_some() {
            history.insert(timestamp, product, orders);
        }
    }
    Ok(history)
}

pub fn load_market(path: &Path) -> Result<MarketHistory> {
    let history = read_market(open(path)?)?;
    info!(
        path = %path.display(),
        snapshots = history.len(),
        products = history.products().len(),
        "loaded market data"
    );
    Ok(history)
}

pub fn load_bots(path: &Path) -> Result<BotHistory> {
    let history = read_bots(open(path)?)?;
    info!(path = %path.display(), ticks = history.len(), "loaded bot orders");
    Ok(history)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::Data(format!("cannot open {}: {}", path.display(), e)))
}

/// `Round_3.csv` → `Round_3_bots.csv`
pub fn default_bots_path(market: &Path) -> PathBuf {
    let stem = market.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match market.extension() {
        Some(ext) => format!("{}_bots.{}", stem, ext.to_string_lossy()),
        None => format!("{}_bots", stem),
    };
    market.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET: &str = "\
timestamp,product,bid_price_1,bid_volume_1,bid_price_2,bid_volume_2,bid_price_3,bid_volume_3,ask_price_1,ask_volume_1,ask_price_2,ask_volume_2,ask_price_3,ask_volume_3
100,Call,99,5,98,7,97,2,101,4,102,6,103,1
100,Put,50.0,3,49,0,,,52,8,53,2,54,1
200,Call,100,1,99,1,98,1,102,3,103,3,104,3
";

    #[test]
    fn test_read_market_levels() {
        let history = read_market(MARKET.as_bytes()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.products(), vec![Product::new("Call"), Product::new("Put")]);
        assert_eq!(history.last_timestamp(), Some(200));

        let call = history.book(100, &Product::new("Call")).unwrap();
        assert_eq!(call.bids.len(), 3);
        assert_eq!(call.best_ask(), Some(PriceLevel::new(101, 4)));

        // zero volume and empty cells are not levels
        let put = history.book(100, &Product::new("Put")).unwrap();
        assert_eq!(put.bids.len(), 1);
        assert_eq!(put.best_bid(), Some(PriceLevel::new(50, 3)));

        assert!(history.book(200, &Product::new("Put")).is_none());
    }

    #[test]
    fn test_read_bots_top_level_only() {
        let bots = "\
timestamp,product,bid_price_1,bid_volume_1,ask_price_1,ask_volume_1
100,Call,100,3,103,0
100,Put,51,0,52,0
";
        let history = read_bots(bots.as_bytes()).unwrap();
        let flow = history.flow(100);
        assert_eq!(flow[&Product::new("Call")].buy, Some(PriceLevel::new(100, 3)));
        assert_eq!(flow[&Product::new("Call")].sell, None);
        assert!(!flow.contains_key(&Product::new("Put")));
        assert!(history.flow(200).is_empty());
    }

    #[test]
    fn test_bad_cell_is_fatal() {
        let bad = "timestamp,product,bid_price_1,bid_volume_1\n100,Call,99.5,1\n";
        match read_market(bad.as_bytes()) {
            Err(Error::Data(msg)) => assert!(msg.contains("bid_price_1")),
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_cell_is_fatal() {
        let huge = "timestamp,product,bid_price_1,bid_volume_1\n100,Call,1e20,1\n";
        match read_market(huge.as_bytes()) {
            Err(Error::Data(msg)) => assert!(msg.contains("bid_price_1")),
            other => panic!("expected data error, got {:?}", other),
        }

        let deep = format!("timestamp,product,ask_price_1,ask_volume_1\n100,Call,101,{}\n", MAX_QTY + 1);
        match read_market(deep.as_bytes()) {
            Err(Error::Data(msg)) => assert!(msg.contains("out of range")),
            other => panic!("expected data error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_columns() {
        assert!(matches!(read_market("product,bid_price_1\n".as_bytes()), Err(Error::Data(_))));
        assert!(matches!(read_market("timestamp,product\n".as_bytes()), Err(Error::Data(_))));
    }

    #[test]
    fn test_default_bots_path() {
        assert_eq!(
            default_bots_path(Path::new("data/Round_3.csv")),
            PathBuf::from("data/Round_3_bots.csv")
        );
    }
}
