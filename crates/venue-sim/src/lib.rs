//! Simulated options venue, cash ledger, and clock for exercising the
//! vault end to end without a live market.

pub mod clock;
pub mod ledger;
pub mod math;
pub mod venue;

pub use clock::ManualClock;
pub use ledger::SimCashLedger;
pub use venue::{BoardSpec, SimVenue, StrikeSpec};
