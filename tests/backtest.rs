use rust_decimal::Decimal;

use tickreplay::analytics::{RunSummary, write_series_csv};
use tickreplay::core::{MarketFeed, Product};
use tickreplay::engine::{CancelToken, RunSettings, TickDriver, run_batch};
use tickreplay::feeds::{CsvReplay, read_bots, read_market};
use tickreplay::strategies::{EtfBasketConfig, ParityConfig, StrategyConfig, build_strategy};
use tickreplay::Config;

const HEADER: &str = "timestamp,product,bid_price_1,bid_volume_1,bid_price_2,bid_volume_2,ask_price_1,ask_volume_1,ask_price_2,ask_volume_2";

fn parity_round() -> CsvReplay {
    let mut market = String::from(HEADER);
    market.push('\n');
    for ts in [100, 200] {
        market.push_str(&format!("{ts},Call,509,10,508,5,511,10,512,5\n"));
        market.push_str(&format!("{ts},Put,399,10,398,5,401,10,402,5\n"));
        market.push_str(&format!("{ts},Underlying,10099,10,10098,5,10101,10,10102,5\n"));
    }
    let bots = "timestamp,product,bid_price_1,bid_volume_1,ask_price_1,ask_volume_1\n300,Call,510,4,,\n";

    CsvReplay::new(
        "parity-round",
        read_market(market.as_bytes()).unwrap(),
        read_bots(bots.as_bytes()).unwrap(),
    )
}

#[test]
fn parity_round_end_to_end() {
    let feed = parity_round();
    let products = feed.products();
    let config = Config::parse("[simulation]\nposition_limit = 50\n").unwrap();
    let limits = config.simulation.position_limits(&products);

    let mut strategy = build_strategy(&StrategyConfig::Parity(ParityConfig::default()));
    let outcome = TickDriver::new(products.clone(), limits)
        .run(&feed, &mut strategy, &RunSettings::default(), &CancelToken::new())
        .unwrap();

    // last timestamp 200 ends the run after tick 2
    assert_eq!(outcome.records.len(), 2);
    let call = Product::new("Call");
    let put = Product::new("Put");
    let under = Product::new("Underlying");
    assert_eq!(outcome.portfolio.position(&call), -4);
    assert_eq!(outcome.portfolio.position(&put), 4);
    assert_eq!(outcome.portfolio.position(&under), 4);
    assert_eq!(outcome.portfolio.cash, Decimal::from(2 * (1018 - 802 - 20202)));

    // three legs crossing a two-wide spread, twice
    assert_eq!(outcome.records[1].pnl, Some(Decimal::from(-12)));

    let summary = RunSummary::from_outcome(&outcome);
    assert_eq!(summary.fills, 6);
    assert_eq!(summary.max_drawdown, Decimal::from(6));

    let mut csv = Vec::new();
    write_series_csv(&mut csv, &outcome.records, &products, |tick, p| feed.market.quote(tick * 100, p)).unwrap();
    let text = String::from_utf8(csv).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("tick,cash,pnl,Call_quantity,Put_quantity,Underlying_quantity,Call_mid"));
}

#[test]
fn batch_respects_limits_for_every_strategy() {
    let feed = parity_round();
    let products = feed.products();
    let config = Config::parse("[simulation]\nposition_limit = 3\n").unwrap();
    let limits = config.simulation.position_limits(&products);

    let jobs = vec![
        build_strategy(&StrategyConfig::Parity(ParityConfig::default())),
        build_strategy(&StrategyConfig::EtfBasket(EtfBasketConfig::default())),
    ];
    let results = run_batch(&feed, &limits, jobs, &RunSettings::default(), &CancelToken::new());

    assert_eq!(results.len(), 2);
    let parity = results[0].as_ref().unwrap();
    assert_eq!(parity.strategy, "parity");
    for record in &parity.records {
        assert!(record.positions.values().all(|q| q.abs() <= 3));
    }
    // second tick can only add one more lot per leg
    assert_eq!(parity.portfolio.position(&Product::new("Call")), -3);

    // no ETF products in this round: the basket strategy stays flat
    let etf = results[1].as_ref().unwrap();
    assert_eq!(etf.stats.market_fills, 0);
    assert_eq!(etf.portfolio.cash, Decimal::ZERO);
}
