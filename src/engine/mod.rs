//! Replay engine
//! Matching, bot flow and the per-tick driver that sequences them

pub mod matching;
pub mod bots;
pub mod driver;
pub mod batch;

pub use matching::{MatchReport, match_intents};
pub use bots::{BotFlow, BotFlowReport, BotOrders, apply_bot_flow};
pub use driver::{CancelToken, RunOutcome, RunSettings, RunStats, StateView, TickDriver, TickPhase, TickRecord};
pub use batch::{BoxedStrategy, run_batch};
