//! Trait seams for the vault's external collaborators.
//!
//! The options venue and the quote-asset ledger are injected capabilities;
//! the core never assumes their internals, only these contracts.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::errors::VaultError;
use crate::types::{
    BoardId, BoardView, PositionId, PositionSettlement, StrikeId, StrikeView, VenueFill, VenueOrder,
};

/// The external options market the vault trades against.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Board metadata: expiry and member strikes.
    async fn board(&self, board_id: BoardId) -> Result<BoardView, VaultError>;

    /// Current delta and vol (time-averaged over `gwav_period`) for a strike.
    async fn strike_view(
        &self,
        strike_id: StrikeId,
        gwav_period: Duration,
    ) -> Result<StrikeView, VaultError>;

    /// The venue's fee-free pricing function evaluated at an explicit
    /// volatility. Used for the conservative max-premium bound at the edge
    /// of the admitted vol band; quoting fee-free means venue fee changes
    /// tighten execution against the bound instead of widening it.
    async fn quote_premium(
        &self,
        strike_id: StrikeId,
        size: Decimal,
        vol: f64,
    ) -> Result<Decimal, VaultError>;

    /// Open or extend a long position, pulling the premium from `payer`'s
    /// cash account atomically. Must fail without side effects if the
    /// premium would exceed `order.max_cost` or the payer's balance.
    async fn open_position(&self, payer: &str, order: VenueOrder)
        -> Result<VenueFill, VaultError>;

    /// Settlement status and proceeds of a position after board expiry.
    /// A settling venue credits the proceeds directly to the holder's cash
    /// account; this call only reports what was credited.
    async fn settlement(&self, position_id: PositionId) -> Result<PositionSettlement, VaultError>;
}

/// The quote-asset balance ledger (standard fungible token semantics).
#[async_trait]
pub trait CashLedger: Send + Sync {
    async fn balance_of(&self, account: &str) -> Result<Decimal, VaultError>;

    /// Moves `amount` between accounts; fails with no effect if `from`
    /// holds less than `amount`.
    async fn transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<(), VaultError>;
}

/// Time source, injected so tests can control the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// Shared-ownership delegation so a venue/ledger can be handed to the vault
// and still be driven from the outside (tests, settlement crons).

#[async_trait]
impl<T: Venue + ?Sized> Venue for std::sync::Arc<T> {
    async fn board(&self, board_id: BoardId) -> Result<BoardView, VaultError> {
        (**self).board(board_id).await
    }

    async fn strike_view(
        &self,
        strike_id: StrikeId,
        gwav_period: Duration,
    ) -> Result<StrikeView, VaultError> {
        (**self).strike_view(strike_id, gwav_period).await
    }

    async fn quote_premium(
        &self,
        strike_id: StrikeId,
        size: Decimal,
        vol: f64,
    ) -> Result<Decimal, VaultError> {
        (**self).quote_premium(strike_id, size, vol).await
    }

    async fn open_position(
        &self,
        payer: &str,
        order: VenueOrder,
    ) -> Result<VenueFill, VaultError> {
        (**self).open_position(payer, order).await
    }

    async fn settlement(&self, position_id: PositionId) -> Result<PositionSettlement, VaultError> {
        (**self).settlement(position_id).await
    }
}

#[async_trait]
impl<T: CashLedger + ?Sized> CashLedger for std::sync::Arc<T> {
    async fn balance_of(&self, account: &str) -> Result<Decimal, VaultError> {
        (**self).balance_of(account).await
    }

    async fn transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<(), VaultError> {
        (**self).transfer(from, to, amount).await
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
