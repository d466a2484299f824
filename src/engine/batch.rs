//! Parallel replays of independent strategies over one shared feed.
//!
//! Every job gets its own driver and portfolio; only the feed is shared,
//! read-only.

use tracing::{error, info};

use crate::core::{Error, MarketFeed, Result, Strategy};
use crate::engine::driver::{CancelToken, RunOutcome, RunSettings, TickDriver};
use crate::portfolio::PositionLimits;

pub type BoxedStrategy = Box<dyn Strategy + Send>;

/// Run each strategy on its own scoped thread. Results keep job order.
pub fn run_batch<F>(
    feed: &F,
    limits: &PositionLimits,
    jobs: Vec<BoxedStrategy>,
    settings: &RunSettings,
    cancel: &CancelToken,
) -> Vec<Result<RunOutcome>>
where
    F: MarketFeed + Sync + ?Sized,
{
    let count = jobs.len();
    let products = feed.products();
    info!(jobs = count, feed = feed.name(), "starting replay batch");

    let joined = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|mut strategy| {
                let driver = TickDriver::new(products.clone(), limits.clone());
                scope.spawn(move |_| driver.run(feed, &mut strategy, settings, cancel))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    error!("replay thread panicked");
                    Err(Error::InvalidState("replay thread panicked".into()))
                })
            })
            .collect::<Vec<_>>()
    });

    joined.unwrap_or_else(|_| {
        (0..count)
            .map(|_| Err(Error::InvalidState("replay batch aborted".into())))
            .collect()
    })
}
