//! Strategy engine: gates candidate strikes and executes admitted trades.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use delta_vault_core::errors::VaultError;
use delta_vault_core::traits::Venue;
use delta_vault_core::types::{BoardView, StrategyDetail, StrikeId, TradeReceipt, VenueOrder};

use crate::admission;
use crate::ledger::PositionLedger;

/// Evaluates candidate strikes against the configured bounds and, when a
/// strike is admitted, executes the trade at the venue and records it.
pub struct StrategyEngine {
    detail: StrategyDetail,
    ledger: PositionLedger,
}

impl StrategyEngine {
    /// Creates an engine with a validated strategy detail.
    pub fn new(detail: StrategyDetail) -> Result<Self, VaultError> {
        detail.validate()?;
        Ok(Self {
            detail,
            ledger: PositionLedger::new(),
        })
    }

    #[must_use]
    pub fn detail(&self) -> &StrategyDetail {
        &self.detail
    }

    #[must_use]
    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    /// Installs a new strategy detail. The round-inactivity gate is the
    /// round controller's responsibility; this only validates the detail.
    pub fn replace_detail(&mut self, detail: StrategyDetail) -> Result<(), VaultError> {
        detail.validate()?;
        self.detail = detail;
        Ok(())
    }

    /// Drops all per-round state at round close.
    pub fn clear_round(&mut self) {
        self.ledger.clear();
    }

    /// Evaluates a candidate strike and, if admitted, buys `size` contracts
    /// (capped at the configured standard size) within `budget`.
    ///
    /// The maximum acceptable premium is the venue's fee-free pricing
    /// function evaluated at the worst acceptable volatility for a buyer,
    /// the top of the admitted vol band. The order carries
    /// `max_cost = min(bound, budget)` so the venue enforces both the bound
    /// and the capital limit atomically with the cash transfer.
    pub async fn evaluate_and_trade(
        &mut self,
        venue: &dyn Venue,
        payer: &str,
        board: &BoardView,
        strike_id: StrikeId,
        size: Decimal,
        budget: Decimal,
        now: DateTime<Utc>,
    ) -> Result<TradeReceipt, VaultError> {
        if size <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount);
        }
        if !board.strike_ids.contains(&strike_id) {
            return Err(VaultError::UnknownStrike(strike_id));
        }

        let size = size.min(self.detail.size);

        let view = venue.strike_view(strike_id, self.detail.gwav_period()).await?;
        admission::admit(&self.detail, &view, self.ledger.last_trade_at(strike_id), now)?;

        let bound = venue
            .quote_premium(strike_id, size, self.detail.max_vol)
            .await?;
        if budget <= Decimal::ZERO {
            return Err(VaultError::InsufficientCapital);
        }
        let max_cost = bound.min(budget);
        debug!(strike_id, %bound, %budget, %max_cost, "Strike admitted, placing order");

        let order = VenueOrder {
            strike_id,
            size,
            max_cost,
        };
        let fill = match venue.open_position(payer, order).await {
            Ok(fill) => fill,
            // The venue rejects on max_cost without saying which limit bit;
            // report the tighter one.
            Err(VaultError::PremiumExceedsCapital) if budget < bound => {
                return Err(VaultError::InsufficientCapital)
            }
            Err(e) => return Err(e),
        };

        self.ledger.record_fill(strike_id, size, &fill, now);

        info!(
            strike_id,
            position_id = fill.position_id,
            premium = %fill.premium,
            collateral = %fill.collateral,
            %size,
            "Trade executed"
        );

        Ok(TradeReceipt {
            strike_id,
            position_id: fill.position_id,
            premium: fill.premium,
            collateral: fill.collateral,
            size,
        })
    }
}
