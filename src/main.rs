use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use tickreplay::analytics::{RunSummary, write_series_csv};
use tickreplay::core::{Config, MarketFeed};
use tickreplay::engine::{CancelToken, RunOutcome, TickDriver, run_batch};
use tickreplay::feeds::{BotHistory, CsvReplay, default_bots_path, load_bots, load_market};
use tickreplay::strategies::build_strategy;

#[derive(Parser)]
#[command(name = "tickreplay")]
#[command(version, about = "Replay a recorded order book round against one or more strategies")]
struct Cli {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Market snapshot CSV (overrides [data].market_csv)
    #[arg(short, long)]
    round: Option<PathBuf>,

    /// Bot order CSV; defaults to <round>_bots.csv
    #[arg(short, long)]
    bots: Option<PathBuf>,

    /// Stop before this tick
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Directory for series CSVs and summaries
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print run summaries as JSON on stdout
    #[arg(long)]
    summary: bool,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.app.log_level.as_str()));
    fmt().with_env_filter(filter).with_target(true).with_thread_ids(false).with_level(true).init();

    if let Some(max_ticks) = cli.max_ticks {
        config.simulation.max_ticks = max_ticks;
        config.validate()?;
    }
    let settings = config.simulation.run_settings();

    let Some(market_path) = cli.round.clone().or_else(|| config.data.market_csv.clone()) else {
        bail!("no market data: pass --round or set [data].market_csv");
    };
    let bots_path = cli
        .bots
        .clone()
        .or_else(|| config.data.bots_csv.clone())
        .unwrap_or_else(|| default_bots_path(&market_path));

    let market = load_market(&market_path)?;
    let bots = if bots_path.exists() {
        load_bots(&bots_path)?
    } else {
        tracing::warn!(path = %bots_path.display(), "bot file not found, replaying without bot flow");
        BotHistory::new()
    };
    let feed = CsvReplay::new(market_path.display().to_string(), market, bots);

    let products = feed.products();
    let limits = config.simulation.position_limits(&products);
    let strategies = config.strategies();
    for strategy in &strategies {
        let missing: Vec<&str> = strategy
            .products()
            .into_iter()
            .filter(|p| !products.iter().any(|known| known.as_str() == *p))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(kind = strategy.kind(), ?missing, "strategy trades products absent from feed");
        }
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("interrupted, stopping after the current tick");
        on_interrupt.cancel();
    }) {
        tracing::warn!("failed to install Ctrl-C handler: {}", e);
    }

    let outcomes: Vec<RunOutcome> = if strategies.len() == 1 {
        let mut strategy = build_strategy(&strategies[0]);
        vec![TickDriver::new(products.clone(), limits).run(&feed, &mut strategy, &settings, &cancel)?]
    } else {
        let jobs = strategies.iter().map(build_strategy).collect();
        run_batch(&feed, &limits, jobs, &settings, &cancel)
            .into_iter()
            .collect::<Result<_, _>>()?
    };

    let output_dir = cli.output.clone().or_else(|| config.app.output_dir.clone());
    if let Some(dir) = &output_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    for (i, outcome) in outcomes.iter().enumerate() {
        let summary = RunSummary::from_outcome(outcome);
        tracing::info!(
            strategy = %summary.strategy,
            ticks = summary.ticks,
            cash = %summary.final_cash,
            pnl = ?summary.final_pnl,
            max_drawdown = %summary.max_drawdown,
            fills = summary.fills,
            "run complete"
        );

        if let Some(dir) = &output_dir {
            let stem = format!("{:02}_{}", i, outcome.strategy);
            let series_path = dir.join(format!("{}_series.csv", stem));
            let file = File::create(&series_path)
                .with_context(|| format!("creating {}", series_path.display()))?;
            write_series_csv(file, &outcome.records, &products, |tick, product| {
                feed.market.quote(settings.timestamp(tick), product)
            })?;
            fs::write(dir.join(format!("{}_summary.json", stem)), summary.to_json()?)?;
            tracing::info!(path = %series_path.display(), "series written");
        }

        if cli.summary {
            println!("{}", summary.to_json()?);
        }
    }

    Ok(())
}
