pub mod config;
pub mod config_loader;
pub mod errors;
pub mod traits;
pub mod types;

pub use config::VaultConfig;
pub use config_loader::ConfigLoader;
pub use errors::VaultError;
pub use traits::{CashLedger, Clock, SystemClock, Venue};
pub use types::{
    ActiveStrikePosition, BoardId, BoardView, DepositorAccount, PositionId, PositionSettlement,
    StrategyDetail, StrikeId, StrikeView, TradeReceipt, VaultParams, VaultState, VenueFill,
    VenueOrder,
};
