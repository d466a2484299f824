//! Market data feeds - historical snapshots replayed tick by tick

pub mod csv_loader;
pub mod history;

pub use csv_loader::{default_bots_path, load_bots, load_market, read_bots, read_market};
pub use history::{BotHistory, CsvReplay, MarketHistory};
