//! Strategy engine for the round-based options vault.
//!
//! Gates candidate strikes on delta, time-averaged volatility and time to
//! expiry, throttles per-strike trade frequency, and keeps the per-strike
//! position ledger for the active round.

pub mod admission;
pub mod engine;
pub mod ledger;

pub use engine::StrategyEngine;
pub use ledger::PositionLedger;
