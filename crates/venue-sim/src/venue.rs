//! Deterministic simulated options venue.
//!
//! Seeds boards from a spot price, per-strike skews and a base IV, prices
//! long calls with Black-Scholes plus a spot-proportional trade fee, and
//! settles positions at an explicit expiry price. Just enough venue to
//! exercise the vault; margin and partial settlement are out of scope.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use delta_vault_core::errors::VaultError;
use delta_vault_core::traits::{CashLedger, Clock, Venue};
use delta_vault_core::types::{
    BoardId, BoardView, PositionId, PositionSettlement, StrikeId, StrikeView, VenueFill,
    VenueOrder,
};

use crate::clock::ManualClock;
use crate::ledger::SimCashLedger;
use crate::math;

/// One strike to seed: listing price and IV skew applied to the board's base IV.
#[derive(Debug, Clone)]
pub struct StrikeSpec {
    pub strike_price: Decimal,
    pub skew: f64,
}

/// A board to seed on the sim venue.
#[derive(Debug, Clone)]
pub struct BoardSpec {
    pub expires_in: Duration,
    pub base_iv: f64,
    pub strikes: Vec<StrikeSpec>,
}

#[derive(Debug)]
struct SimStrike {
    board_id: BoardId,
    strike_price: Decimal,
    vol: f64,
}

#[derive(Debug)]
struct SimBoard {
    expiry: DateTime<Utc>,
    strike_ids: Vec<StrikeId>,
}

#[derive(Debug)]
struct SimPosition {
    strike_id: StrikeId,
    holder: String,
    size: Decimal,
    settled: bool,
    proceeds: Decimal,
}

#[derive(Debug, Default)]
struct Inner {
    spot: Decimal,
    /// Per-contract trade fee is `spot * fee_coefficient`.
    fee_coefficient: Decimal,
    boards: HashMap<BoardId, SimBoard>,
    strikes: HashMap<StrikeId, SimStrike>,
    /// Time-averaged vol readings diverging from the listed vol.
    gwav_overrides: HashMap<StrikeId, f64>,
    positions: HashMap<PositionId, SimPosition>,
    strike_positions: HashMap<StrikeId, PositionId>,
    next_board_id: BoardId,
    next_strike_id: StrikeId,
    next_position_id: PositionId,
}

pub struct SimVenue {
    clock: ManualClock,
    cash: Arc<SimCashLedger>,
    account: String,
    inner: Mutex<Inner>,
}

impl SimVenue {
    #[must_use]
    pub fn new(clock: ManualClock, cash: Arc<SimCashLedger>, spot: Decimal) -> Self {
        Self {
            clock,
            cash,
            account: "venue".to_string(),
            inner: Mutex::new(Inner {
                spot,
                fee_coefficient: Decimal::new(1, 3), // 0.1% of spot per contract
                next_board_id: 1,
                next_strike_id: 1,
                next_position_id: 1,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("venue lock poisoned")
    }

    /// Lists a board and its strikes; returns the assigned ids.
    pub fn seed_board(&self, spec: &BoardSpec) -> BoardView {
        let mut inner = self.lock();
        let board_id = inner.next_board_id;
        inner.next_board_id += 1;

        let expiry = self.clock.now() + spec.expires_in;
        let mut strike_ids = Vec::with_capacity(spec.strikes.len());
        for strike in &spec.strikes {
            let strike_id = inner.next_strike_id;
            inner.next_strike_id += 1;
            inner.strikes.insert(
                strike_id,
                SimStrike {
                    board_id,
                    strike_price: strike.strike_price,
                    vol: spec.base_iv * strike.skew,
                },
            );
            strike_ids.push(strike_id);
        }
        inner.boards.insert(
            board_id,
            SimBoard {
                expiry,
                strike_ids: strike_ids.clone(),
            },
        );

        info!(board_id, %expiry, strikes = strike_ids.len(), "Board listed");
        BoardView {
            board_id,
            expiry,
            strike_ids,
        }
    }

    pub fn set_spot(&self, spot: Decimal) {
        self.lock().spot = spot;
    }

    /// Spot-proportional trade fee knob (per contract).
    pub fn set_fee_coefficient(&self, coefficient: Decimal) {
        self.lock().fee_coefficient = coefficient;
    }

    /// Makes the time-averaged vol reading for a strike diverge from its
    /// listed vol, as it would after a sharp market move.
    pub fn set_gwav_vol(&self, strike_id: StrikeId, vol: f64) {
        self.lock().gwav_overrides.insert(strike_id, vol);
    }

    /// Settles every open position on a board at `settlement_spot`,
    /// crediting long-call intrinsic proceeds to each holder.
    pub fn expire_board(&self, board_id: BoardId, settlement_spot: Decimal) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut settlements = Vec::new();
        for position in inner.positions.values_mut() {
            if position.settled {
                continue;
            }
            let Some(strike) = inner.strikes.get(&position.strike_id) else {
                continue;
            };
            if strike.board_id != board_id {
                continue;
            }
            let intrinsic = (settlement_spot - strike.strike_price).max(Decimal::ZERO);
            position.proceeds = intrinsic * position.size;
            position.settled = true;
            settlements.push((position.holder.clone(), position.proceeds));
        }
        drop(guard);

        for (holder, proceeds) in settlements {
            if !proceeds.is_zero() {
                self.cash.mint(&holder, proceeds);
            }
            info!(board_id, holder, %proceeds, "Position settled");
        }
    }

    fn to_f64(value: Decimal) -> Result<f64, VaultError> {
        value
            .to_f64()
            .ok_or_else(|| VaultError::Venue("decimal out of f64 range".to_string()))
    }

    fn to_decimal(value: f64) -> Result<Decimal, VaultError> {
        Decimal::from_f64_retain(value)
            .map(|d| d.round_dp(6))
            .ok_or_else(|| VaultError::Venue("premium not representable".to_string()))
    }

    fn years_to_expiry(expiry: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        (expiry - now).num_seconds() as f64 / (365.0 * 86_400.0)
    }
}

#[async_trait]
impl Venue for SimVenue {
    async fn board(&self, board_id: BoardId) -> Result<BoardView, VaultError> {
        let inner = self.lock();
        let board = inner
            .boards
            .get(&board_id)
            .ok_or_else(|| VaultError::Venue(format!("unknown board {board_id}")))?;
        Ok(BoardView {
            board_id,
            expiry: board.expiry,
            strike_ids: board.strike_ids.clone(),
        })
    }

    async fn strike_view(
        &self,
        strike_id: StrikeId,
        _gwav_period: Duration,
    ) -> Result<StrikeView, VaultError> {
        let now = self.clock.now();
        let inner = self.lock();
        let strike = inner
            .strikes
            .get(&strike_id)
            .ok_or_else(|| VaultError::Venue(format!("unknown strike {strike_id}")))?;
        let board = inner
            .boards
            .get(&strike.board_id)
            .ok_or_else(|| VaultError::Venue("strike without board".to_string()))?;

        let spot = Self::to_f64(inner.spot)?;
        let strike_price = Self::to_f64(strike.strike_price)?;
        let t = Self::years_to_expiry(board.expiry, now);

        Ok(StrikeView {
            strike_id,
            board_id: strike.board_id,
            strike_price: strike.strike_price,
            delta: math::call_delta(spot, strike_price, strike.vol, t),
            vol: strike.vol,
            // Sim vols are constant, so the time-average over any window
            // equals the instantaneous vol unless an override is staged.
            gwav_vol: inner
                .gwav_overrides
                .get(&strike_id)
                .copied()
                .unwrap_or(strike.vol),
            expiry: board.expiry,
        })
    }

    async fn quote_premium(
        &self,
        strike_id: StrikeId,
        size: Decimal,
        vol: f64,
    ) -> Result<Decimal, VaultError> {
        let now = self.clock.now();
        let inner = self.lock();
        let strike = inner
            .strikes
            .get(&strike_id)
            .ok_or_else(|| VaultError::Venue(format!("unknown strike {strike_id}")))?;
        let board = inner
            .boards
            .get(&strike.board_id)
            .ok_or_else(|| VaultError::Venue("strike without board".to_string()))?;

        let spot = Self::to_f64(inner.spot)?;
        let strike_price = Self::to_f64(strike.strike_price)?;
        let t = Self::years_to_expiry(board.expiry, now);

        let per_contract = Self::to_decimal(math::call_price(spot, strike_price, vol, t))?;
        Ok(per_contract * size)
    }

    async fn open_position(
        &self,
        payer: &str,
        order: VenueOrder,
    ) -> Result<VenueFill, VaultError> {
        let now = self.clock.now();
        let premium = {
            let inner = self.lock();
            let strike = inner
                .strikes
                .get(&order.strike_id)
                .ok_or_else(|| VaultError::Venue(format!("unknown strike {}", order.strike_id)))?;
            let board = inner
                .boards
                .get(&strike.board_id)
                .ok_or_else(|| VaultError::Venue("strike without board".to_string()))?;
            if board.expiry <= now {
                return Err(VaultError::Venue("board expired".to_string()));
            }

            let spot = Self::to_f64(inner.spot)?;
            let strike_price = Self::to_f64(strike.strike_price)?;
            let t = Self::years_to_expiry(board.expiry, now);

            let per_contract = Self::to_decimal(math::call_price(spot, strike_price, strike.vol, t))?;
            let fee = inner.spot * inner.fee_coefficient;
            let premium = (per_contract + fee) * order.size;
            debug!(strike_id = order.strike_id, %premium, max_cost = %order.max_cost, "Quoted execution");

            if premium > order.max_cost {
                return Err(VaultError::PremiumExceedsCapital);
            }
            premium
        };

        // Capital transfer and position opening stand or fall together:
        // nothing below the transfer can fail.
        self.cash
            .transfer(payer, &self.account, premium)
            .await
            .map_err(|_| VaultError::InsufficientCapital)?;

        let mut inner = self.lock();
        let position_id = match inner.strike_positions.get(&order.strike_id).copied() {
            Some(existing) => {
                if let Some(position) = inner.positions.get_mut(&existing) {
                    position.size += order.size;
                }
                existing
            }
            None => {
                let position_id = inner.next_position_id;
                inner.next_position_id += 1;
                inner.positions.insert(
                    position_id,
                    SimPosition {
                        strike_id: order.strike_id,
                        holder: payer.to_string(),
                        size: order.size,
                        settled: false,
                        proceeds: Decimal::ZERO,
                    },
                );
                inner.strike_positions.insert(order.strike_id, position_id);
                position_id
            }
        };

        Ok(VenueFill {
            position_id,
            premium,
            collateral: Decimal::ZERO,
        })
    }

    async fn settlement(&self, position_id: PositionId) -> Result<PositionSettlement, VaultError> {
        let inner = self.lock();
        let position = inner
            .positions
            .get(&position_id)
            .ok_or_else(|| VaultError::Venue(format!("unknown position {position_id}")))?;
        Ok(PositionSettlement {
            settled: position.settled,
            proceeds: position.proceeds,
        })
    }
}
