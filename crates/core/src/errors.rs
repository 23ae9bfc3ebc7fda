//! Error taxonomy for vault operations.
//!
//! Every public operation either succeeds in full or returns one of these
//! with no state change. Admission rejections are expected and retryable;
//! everything else is surfaced to the caller as-is.

use thiserror::Error;

/// Errors surfaced by vault operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VaultError {
    /// Amount or size argument was zero or negative.
    #[error("amount must be positive")]
    InvalidAmount,

    /// Deposit would push the vault over its capacity cap.
    #[error("vault cap exceeded")]
    CapExceeded,

    /// The referenced board has already expired.
    #[error("board timestamp expired")]
    ExpiredBoard,

    /// Operation requires no round in progress.
    #[error("round is active")]
    RoundActive,

    /// Operation requires an active round.
    #[error("round is not active")]
    RoundNotActive,

    /// Round close attempted before the venue settled every open position.
    #[error("positions not yet settled at the venue")]
    PositionsNotSettled,

    /// Caller is not the vault manager.
    #[error("caller is not the manager")]
    Unauthorized,

    /// Strike does not belong to the round's board.
    #[error("strike {0} is not on the round's board")]
    UnknownStrike(u64),

    /// Strike delta is outside the configured band.
    #[error("strike delta {delta} outside target {target} ± {gap}")]
    StrikeOutOfDeltaRange { delta: f64, target: f64, gap: f64 },

    /// Time-averaged vol is outside the configured band.
    #[error("volatility {vol} outside [{min}, {max}]")]
    VolatilityOutOfRange { vol: f64, min: f64, max: f64 },

    /// Time-averaged and instantaneous vol disagree too much to trade on.
    #[error("vol variance {variance} exceeds maximum {max}")]
    VolVarianceTooHigh { variance: f64, max: f64 },

    /// Strike expiry is outside the configured window.
    #[error("time to expiry {tte_secs}s outside [{min_secs}s, {max_secs}s]")]
    ExpiryOutOfRange {
        tte_secs: i64,
        min_secs: i64,
        max_secs: i64,
    },

    /// Same-strike trade submitted before the minimum interval elapsed.
    #[error("trade on strike too soon after the previous one")]
    TradeTooSoon,

    /// Executed premium would exceed the max-vol premium bound.
    #[error("premium exceeds the max premium quoted at the vol cap")]
    PremiumExceedsCapital,

    /// Premium would exceed the round's remaining locked capital.
    #[error("insufficient locked capital left for this trade")]
    InsufficientCapital,

    /// Withdrawal request for more shares than the caller holds.
    #[error("insufficient shares")]
    InsufficientShares,

    /// Unlocked capital cannot cover the whole withdrawal queue.
    #[error("insufficient liquidity to settle queued withdrawals")]
    InsufficientLiquidity,

    /// Strategy detail failed validation.
    #[error("invalid strategy detail: {0}")]
    InvalidStrategy(String),

    /// The venue reported a failure.
    #[error("venue error: {0}")]
    Venue(String),

    /// Internal ledger inconsistency; the operation was rolled back.
    #[error("ledger error: {0}")]
    Ledger(String),
}

impl VaultError {
    /// True for admission rejections the caller may simply retry with
    /// different parameters (or after waiting).
    pub fn is_admission_rejection(&self) -> bool {
        matches!(
            self,
            Self::StrikeOutOfDeltaRange { .. }
                | Self::VolatilityOutOfRange { .. }
                | Self::VolVarianceTooHigh { .. }
                | Self::ExpiryOutOfRange { .. }
                | Self::TradeTooSoon
        )
    }
}
