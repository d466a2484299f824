//! tickreplay - Core Library
//! Tick-by-tick order book replay and strategy backtesting

// Public modules
pub mod core;
pub mod orderbook;
pub mod portfolio;
pub mod engine;
pub mod feeds;
pub mod strategies;
pub mod analytics;

// Re-exports
pub use core::{Config, Error, Result};
