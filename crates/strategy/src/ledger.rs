//! Per-strike position ledger.
//!
//! Tracks the vault's open position and locked collateral per strike for the
//! lifetime of a round. One strike maps to exactly one venue position id;
//! repeat trades on a strike extend that position.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use delta_vault_core::types::{ActiveStrikePosition, PositionId, StrikeId, VenueFill};

#[derive(Debug, Default)]
pub struct PositionLedger {
    positions: HashMap<StrikeId, ActiveStrikePosition>,
}

impl PositionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    /// Records a fill, opening a new strike entry or extending an existing one.
    pub fn record_fill(
        &mut self,
        strike_id: StrikeId,
        size: Decimal,
        fill: &VenueFill,
        now: DateTime<Utc>,
    ) {
        self.positions
            .entry(strike_id)
            .and_modify(|pos| {
                pos.size += size;
                pos.premium_paid += fill.premium;
                pos.collateral = fill.collateral;
                pos.last_trade_at = now;
            })
            .or_insert(ActiveStrikePosition {
                strike_id,
                position_id: fill.position_id,
                last_trade_at: now,
                size,
                collateral: fill.collateral,
                premium_paid: fill.premium,
            });
    }

    /// Timestamp of the most recent trade on a strike, if any this round.
    #[must_use]
    pub fn last_trade_at(&self, strike_id: StrikeId) -> Option<DateTime<Utc>> {
        self.positions.get(&strike_id).map(|p| p.last_trade_at)
    }

    #[must_use]
    pub fn get(&self, strike_id: StrikeId) -> Option<&ActiveStrikePosition> {
        self.positions.get(&strike_id)
    }

    #[must_use]
    pub fn position_ids(&self) -> Vec<PositionId> {
        self.positions.values().map(|p| p.position_id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveStrikePosition> {
        self.positions.values()
    }

    #[must_use]
    pub fn total_collateral(&self) -> Decimal {
        self.positions.values().map(|p| p.collateral).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Drops all positions at round close.
    pub fn clear(&mut self) {
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill(position_id: PositionId, premium: Decimal) -> VenueFill {
        VenueFill {
            position_id,
            premium,
            collateral: Decimal::ZERO,
        }
    }

    #[test]
    fn first_fill_opens_a_position() {
        let mut ledger = PositionLedger::new();
        let now = Utc::now();
        ledger.record_fill(7, dec!(10), &fill(42, dec!(1500)), now);

        let pos = ledger.get(7).expect("position recorded");
        assert_eq!(pos.position_id, 42);
        assert_eq!(pos.size, dec!(10));
        assert_eq!(pos.premium_paid, dec!(1500));
        assert_eq!(ledger.last_trade_at(7), Some(now));
    }

    #[test]
    fn repeat_fill_extends_same_position() {
        let mut ledger = PositionLedger::new();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(700);
        ledger.record_fill(7, dec!(10), &fill(42, dec!(1500)), t0);
        ledger.record_fill(7, dec!(5), &fill(42, dec!(800)), t1);

        let pos = ledger.get(7).expect("position kept");
        assert_eq!(pos.position_id, 42);
        assert_eq!(pos.size, dec!(15));
        assert_eq!(pos.premium_paid, dec!(2300));
        assert_eq!(pos.last_trade_at, t1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn clear_empties_the_round() {
        let mut ledger = PositionLedger::new();
        ledger.record_fill(7, dec!(10), &fill(42, dec!(1500)), Utc::now());
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.last_trade_at(7), None);
    }
}
