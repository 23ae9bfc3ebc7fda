//! Domain types shared across the vault crates.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::VaultError;

/// Identifier of a single option contract on a board.
pub type StrikeId = u64;
/// Identifier of a market epoch (a set of strikes sharing an expiry).
pub type BoardId = u64;
/// Venue-assigned identifier of an open position.
pub type PositionId = u64;

/// Aggregate vault ledger state for the current round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultState {
    /// Monotonically increasing round counter. Round 0 is "never started".
    pub round: u64,
    /// Deposits not yet admitted into an active round.
    pub total_pending: Decimal,
    /// Capital committed at round start.
    pub locked_amount: Decimal,
    /// Capital still available for new trades this round.
    pub locked_amount_left: Decimal,
    /// Shares queued for redemption at the next round close.
    pub total_queued_withdraw_shares: Decimal,
    pub round_started_at: Option<DateTime<Utc>>,
    /// Expiry of the board this round trades against.
    pub round_expiry: Option<DateTime<Utc>>,
    pub round_in_progress: bool,
}

impl VaultState {
    /// Checks the structural invariants that must hold after every commit.
    pub fn check_invariants(&self) -> Result<(), VaultError> {
        if self.locked_amount_left > self.locked_amount {
            return Err(VaultError::Ledger(format!(
                "locked_amount_left {} exceeds locked_amount {}",
                self.locked_amount_left, self.locked_amount
            )));
        }
        if !self.round_in_progress
            && (!self.locked_amount.is_zero() || !self.locked_amount_left.is_zero())
        {
            return Err(VaultError::Ledger(
                "locked capital must be zero outside an active round".to_string(),
            ));
        }
        if self.total_pending < Decimal::ZERO
            || self.locked_amount < Decimal::ZERO
            || self.locked_amount_left < Decimal::ZERO
            || self.total_queued_withdraw_shares < Decimal::ZERO
        {
            return Err(VaultError::Ledger("negative ledger balance".to_string()));
        }
        Ok(())
    }
}

/// Strategy configuration, replaceable only between rounds.
///
/// Durations are configured in integer seconds to keep the struct directly
/// deserializable from TOML/env.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDetail {
    /// Minimum time to expiry for a tradeable strike (seconds).
    pub min_time_to_expiry_secs: u64,
    /// Maximum time to expiry for a tradeable strike (seconds).
    pub max_time_to_expiry_secs: u64,
    /// Delta the strategy hunts for.
    pub target_delta: f64,
    /// Acceptable band is `[target_delta - max_delta_gap, target_delta + max_delta_gap]`.
    pub max_delta_gap: f64,
    /// Minimum implied vol to trade.
    pub min_vol: f64,
    /// Maximum implied vol to trade; the worst-case vol for a premium
    /// buyer, so also the vol the max-premium bound is quoted at.
    pub max_vol: f64,
    /// Maximum gap between the time-averaged and instantaneous vol; a
    /// wider gap means the reading is too unstable to trade on.
    pub max_vol_variance: f64,
    /// Standard trade size per strike (contracts).
    pub size: Decimal,
    /// Minimum spacing between trades on the same strike (seconds).
    pub min_trade_interval_secs: u64,
    /// Look-back window for volatility averaging (seconds).
    pub gwav_period_secs: u64,
}

impl Default for StrategyDetail {
    fn default() -> Self {
        Self {
            min_time_to_expiry_secs: 86_400,      // 1 day
            max_time_to_expiry_secs: 14 * 86_400, // 2 weeks
            target_delta: 0.15,
            max_delta_gap: 0.05,
            min_vol: 0.6,
            max_vol: 0.9,
            max_vol_variance: 0.1,
            size: Decimal::TEN,
            min_trade_interval_secs: 600,
            gwav_period_secs: 600,
        }
    }
}

impl StrategyDetail {
    /// Rejects internally inconsistent configurations before they are installed.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.size <= Decimal::ZERO {
            return Err(VaultError::InvalidStrategy("size must be positive".into()));
        }
        if self.min_time_to_expiry_secs > self.max_time_to_expiry_secs {
            return Err(VaultError::InvalidStrategy(
                "min_time_to_expiry exceeds max_time_to_expiry".into(),
            ));
        }
        if self.min_vol <= 0.0 || self.min_vol > self.max_vol {
            return Err(VaultError::InvalidStrategy(
                "vol band must satisfy 0 < min_vol <= max_vol".into(),
            ));
        }
        if self.target_delta <= 0.0 || self.max_delta_gap < 0.0 {
            return Err(VaultError::InvalidStrategy(
                "target_delta must be positive and max_delta_gap non-negative".into(),
            ));
        }
        if self.max_vol_variance < 0.0 {
            return Err(VaultError::InvalidStrategy(
                "max_vol_variance must be non-negative".into(),
            ));
        }
        Ok(())
    }

    pub fn min_time_to_expiry(&self) -> Duration {
        Duration::seconds(self.min_time_to_expiry_secs as i64)
    }

    pub fn max_time_to_expiry(&self) -> Duration {
        Duration::seconds(self.max_time_to_expiry_secs as i64)
    }

    pub fn min_trade_interval(&self) -> Duration {
        Duration::seconds(self.min_trade_interval_secs as i64)
    }

    pub fn gwav_period(&self) -> Duration {
        Duration::seconds(self.gwav_period_secs as i64)
    }
}

/// The vault's open position on one strike for the lifetime of a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveStrikePosition {
    pub strike_id: StrikeId,
    pub position_id: PositionId,
    pub last_trade_at: DateTime<Utc>,
    /// Total contracts held on this strike.
    pub size: Decimal,
    /// Collateral locked at the venue for this position.
    pub collateral: Decimal,
    /// Cumulative premium spent on this strike this round.
    pub premium_paid: Decimal,
}

/// Per-depositor share accounting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositorAccount {
    /// Deposited but not yet converted to shares.
    pub pending_deposit: Decimal,
    pub shares: Decimal,
    /// Shares queued for redemption at the next round close.
    pub queued_withdraw_shares: Decimal,
}

/// Hard limits on vault capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultParams {
    /// Maximum total value (NAV + pending) the vault accepts.
    pub cap: Decimal,
    /// Decimal places of the quote asset, used for payout rounding.
    pub decimals: u32,
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            cap: Decimal::from(5_000_000),
            decimals: 18,
        }
    }
}

/// A live board as reported by the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub board_id: BoardId,
    pub expiry: DateTime<Utc>,
    pub strike_ids: Vec<StrikeId>,
}

/// Snapshot of one strike's greeks as reported by the venue.
///
/// `vol` is the instantaneous implied volatility, `gwav_vol` the vol
/// time-averaged over the strategy's configured look-back window;
/// `delta` is the instantaneous call delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeView {
    pub strike_id: StrikeId,
    pub board_id: BoardId,
    pub strike_price: Decimal,
    pub delta: f64,
    pub vol: f64,
    pub gwav_vol: f64,
    pub expiry: DateTime<Utc>,
}

impl StrikeView {
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expiry - now
    }
}

/// An order submitted to the venue.
#[derive(Debug, Clone)]
pub struct VenueOrder {
    pub strike_id: StrikeId,
    pub size: Decimal,
    /// The venue must reject the order rather than charge more than this.
    pub max_cost: Decimal,
}

/// A confirmed fill from the venue.
#[derive(Debug, Clone)]
pub struct VenueFill {
    pub position_id: PositionId,
    /// Premium actually charged (pulled from the payer's cash account).
    pub premium: Decimal,
    /// Collateral requirement locked at the venue, if any.
    pub collateral: Decimal,
}

/// Settlement status of a venue position.
#[derive(Debug, Clone, Copy)]
pub struct PositionSettlement {
    pub settled: bool,
    /// Proceeds owed to the position holder once settled.
    pub proceeds: Decimal,
}

/// Outcome of a successful trade, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub strike_id: StrikeId,
    pub position_id: PositionId,
    pub premium: Decimal,
    pub collateral: Decimal,
    pub size: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_strategy_detail_is_valid() {
        assert!(StrategyDetail::default().validate().is_ok());
    }

    #[test]
    fn strategy_detail_rejects_inverted_vol_band() {
        let detail = StrategyDetail {
            min_vol: 1.2,
            max_vol: 0.9,
            ..StrategyDetail::default()
        };
        assert!(matches!(
            detail.validate(),
            Err(VaultError::InvalidStrategy(_))
        ));
    }

    #[test]
    fn strategy_detail_rejects_zero_size() {
        let detail = StrategyDetail {
            size: Decimal::ZERO,
            ..StrategyDetail::default()
        };
        assert!(detail.validate().is_err());
    }

    #[test]
    fn invariants_hold_for_fresh_state() {
        assert!(VaultState::default().check_invariants().is_ok());
    }

    #[test]
    fn invariants_catch_overdrawn_budget() {
        let state = VaultState {
            round: 1,
            locked_amount: dec!(100),
            locked_amount_left: dec!(150),
            round_in_progress: true,
            ..VaultState::default()
        };
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn invariants_catch_locked_capital_outside_round() {
        let state = VaultState {
            locked_amount: dec!(10),
            locked_amount_left: dec!(10),
            round_in_progress: false,
            ..VaultState::default()
        };
        assert!(state.check_invariants().is_err());
    }
}
