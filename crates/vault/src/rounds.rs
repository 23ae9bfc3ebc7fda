//! Round controller: the vault's epoch state machine.
//!
//! `Idle -> Active` on `start_next_round`, `Active -> Idle` on
//! `close_round`. Deposits queue while idle or active; trades are only
//! admitted while active; strategy detail only changes while idle.
//!
//! Every operation validates first, then stages its ledger mutations
//! against a draft `VaultState`, re-checks the invariants and commits only
//! on full success. A failing operation leaves all state unchanged.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use delta_vault_core::config::VaultConfig;
use delta_vault_core::errors::VaultError;
use delta_vault_core::traits::{CashLedger, Venue};
use delta_vault_core::types::{
    ActiveStrikePosition, BoardId, BoardView, DepositorAccount, StrategyDetail, StrikeId,
    TradeReceipt, VaultParams, VaultState,
};
use delta_vault_strategy::StrategyEngine;

use crate::accounting::{self, DepositorBook};

/// Result of a completed round close.
#[derive(Debug, Clone)]
pub struct RoundClose {
    pub round: u64,
    /// Realized net asset value at close, pending deposits excluded.
    pub nav: Decimal,
    pub final_share_price: Decimal,
    /// Total paid to queued withdrawals; zero when deferred.
    pub withdrawals_paid: Decimal,
    /// True when the queue could not be covered and was carried over.
    pub withdrawals_deferred: bool,
}

/// The round-based custodial vault.
///
/// Owns the venue and cash-ledger capabilities, the strategy engine, the
/// depositor book and the round state. All mutation goes through the
/// operations below; callers are identified by their cash-ledger account.
pub struct Vault<V: Venue, L: CashLedger> {
    venue: V,
    cash: L,
    vault_account: String,
    manager: String,
    params: VaultParams,
    state: VaultState,
    engine: StrategyEngine,
    book: DepositorBook,
    board: Option<BoardView>,
}

impl<V: Venue, L: CashLedger> Vault<V, L> {
    pub fn new(config: VaultConfig, venue: V, cash: L) -> Result<Self, VaultError> {
        let engine = StrategyEngine::new(config.strategy)?;
        Ok(Self {
            venue,
            cash,
            vault_account: config.vault_account,
            manager: config.manager_account,
            params: config.params,
            state: VaultState::default(),
            engine,
            book: DepositorBook::new(),
            board: None,
        })
    }

    // ---- read-only views ----

    #[must_use]
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    #[must_use]
    pub fn strategy_detail(&self) -> &StrategyDetail {
        self.engine.detail()
    }

    #[must_use]
    pub fn active_positions(&self) -> Vec<ActiveStrikePosition> {
        self.engine.ledger().iter().cloned().collect()
    }

    #[must_use]
    pub fn depositor(&self, account: &str) -> Option<DepositorAccount> {
        self.book.account(account).cloned()
    }

    #[must_use]
    pub fn total_shares(&self) -> Decimal {
        self.book.total_shares()
    }

    fn require_manager(&self, caller: &str) -> Result<(), VaultError> {
        if caller != self.manager {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }

    // ---- operations ----

    /// Pulls `amount` from the caller's cash account into the vault and
    /// queues it for the next round start.
    pub async fn deposit(&mut self, caller: &str, amount: Decimal) -> Result<(), VaultError> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount);
        }
        // Mid-round the cash balance understates vault value by the premium
        // already spent, so measure committed capital instead.
        let committed = if self.state.round_in_progress {
            self.state.locked_amount + self.state.total_pending
        } else {
            self.cash.balance_of(&self.vault_account).await?
        };
        if committed + amount > self.params.cap {
            return Err(VaultError::CapExceeded);
        }

        self.cash
            .transfer(caller, &self.vault_account, amount)
            .await?;

        let mut next = self.state.clone();
        next.total_pending += amount;
        next.check_invariants()?;
        self.book.add_pending(caller, amount);
        self.state = next;

        info!(depositor = caller, %amount, total_pending = %self.state.total_pending, "Deposit received");
        Ok(())
    }

    /// Queues shares for redemption at the next round close.
    pub async fn request_withdraw(
        &mut self,
        caller: &str,
        shares: Decimal,
    ) -> Result<(), VaultError> {
        let mut next = self.state.clone();
        next.total_queued_withdraw_shares += shares;
        self.book.request_withdraw(caller, shares)?;
        next.check_invariants()?;
        self.state = next;

        info!(depositor = caller, %shares, "Withdrawal queued");
        Ok(())
    }

    /// Replaces the strategy configuration. Manager-only, idle-only.
    pub fn set_strategy_detail(
        &mut self,
        caller: &str,
        detail: StrategyDetail,
    ) -> Result<(), VaultError> {
        self.require_manager(caller)?;
        if self.state.round_in_progress {
            return Err(VaultError::RoundActive);
        }
        self.engine.replace_detail(detail)?;
        info!("Strategy detail replaced");
        Ok(())
    }

    /// Starts the next round against `board_id`: mints shares for pending
    /// deposits at the current share price and locks the vault's capital.
    pub async fn start_next_round(
        &mut self,
        caller: &str,
        board_id: BoardId,
        now: DateTime<Utc>,
    ) -> Result<u64, VaultError> {
        self.require_manager(caller)?;
        if self.state.round_in_progress {
            return Err(VaultError::RoundActive);
        }

        let board = self.venue.board(board_id).await?;
        if board.expiry <= now {
            return Err(VaultError::ExpiredBoard);
        }

        let balance = self.cash.balance_of(&self.vault_account).await?;
        let nav = balance - self.state.total_pending;
        // A wiped-out prior round leaves shares with no claim; write them
        // off so fresh deposits are not minted against a zero price.
        let wiped = nav.is_zero() && !self.book.total_shares().is_zero();
        let price = if wiped {
            Decimal::ONE
        } else {
            accounting::share_price(nav, self.book.total_shares())
        };

        let mut next = self.state.clone();
        next.round += 1;
        next.total_pending = Decimal::ZERO;
        next.locked_amount = balance;
        next.locked_amount_left = balance;
        next.round_started_at = Some(now);
        next.round_expiry = Some(board.expiry);
        next.round_in_progress = true;
        if wiped {
            next.total_queued_withdraw_shares = Decimal::ZERO;
        }
        next.check_invariants()?;

        if wiped {
            let written_off = self.book.write_off();
            warn!(%written_off, "Vault value is zero; outstanding shares written off");
        }
        let minted = self.book.mint_pending(price);
        self.state = next;
        self.board = Some(board);

        info!(
            round = self.state.round,
            board_id,
            share_price = %price,
            shares_minted = %minted,
            locked = %self.state.locked_amount,
            "Round started"
        );
        Ok(self.state.round)
    }

    /// Evaluates a strike against the strategy and trades it from the
    /// round's remaining locked capital. Open to any caller.
    pub async fn trade(
        &mut self,
        strike_id: StrikeId,
        size: Decimal,
        now: DateTime<Utc>,
    ) -> Result<TradeReceipt, VaultError> {
        if !self.state.round_in_progress {
            return Err(VaultError::RoundNotActive);
        }
        let board = self
            .board
            .clone()
            .ok_or_else(|| VaultError::Ledger("active round without a board".to_string()))?;
        let budget = self.state.locked_amount_left;

        let receipt = self
            .engine
            .evaluate_and_trade(
                &self.venue,
                &self.vault_account,
                &board,
                strike_id,
                size,
                budget,
                now,
            )
            .await?;

        let mut next = self.state.clone();
        next.locked_amount_left -= receipt.premium;
        next.check_invariants()?;
        self.state = next;

        info!(
            strike_id,
            premium = %receipt.premium,
            locked_left = %self.state.locked_amount_left,
            "Trade committed"
        );
        Ok(receipt)
    }

    /// Closes the round once the venue has settled every open position.
    /// Realizes the round's share price and settles queued withdrawals
    /// all-or-nothing; an uncovered queue is carried to the next close.
    pub async fn close_round(
        &mut self,
        caller: &str,
        _now: DateTime<Utc>,
    ) -> Result<RoundClose, VaultError> {
        self.require_manager(caller)?;
        if !self.state.round_in_progress {
            return Err(VaultError::RoundNotActive);
        }

        for position_id in self.engine.ledger().position_ids() {
            let settlement = self.venue.settlement(position_id).await?;
            if !settlement.settled {
                return Err(VaultError::PositionsNotSettled);
            }
        }

        let balance = self.cash.balance_of(&self.vault_account).await?;
        let nav = balance - self.state.total_pending;
        let final_price = accounting::share_price(nav, self.book.total_shares());

        let mut next = self.state.clone();
        next.locked_amount = Decimal::ZERO;
        next.locked_amount_left = Decimal::ZERO;
        next.round_in_progress = false;
        next.round_started_at = None;
        next.round_expiry = None;

        let (paid, deferred) = match self.settle_queued_withdrawals(final_price, nav).await {
            Ok(paid) => {
                next.total_queued_withdraw_shares = Decimal::ZERO;
                (paid, false)
            }
            Err(VaultError::InsufficientLiquidity) => {
                warn!(
                    queued_shares = %self.state.total_queued_withdraw_shares,
                    %nav,
                    "Withdrawal queue exceeds available capital; deferred to next close"
                );
                (Decimal::ZERO, true)
            }
            Err(e) => return Err(e),
        };

        next.check_invariants()?;
        self.state = next;
        self.engine.clear_round();
        self.board = None;

        let close = RoundClose {
            round: self.state.round,
            nav,
            final_share_price: final_price,
            withdrawals_paid: paid,
            withdrawals_deferred: deferred,
        };
        info!(
            round = close.round,
            nav = %close.nav,
            final_share_price = %close.final_share_price,
            withdrawals_paid = %close.withdrawals_paid,
            deferred = close.withdrawals_deferred,
            "Round closed"
        );
        Ok(close)
    }

    /// Pays the whole withdrawal queue at `price` from `available` capital,
    /// or pays nothing at all.
    async fn settle_queued_withdrawals(
        &mut self,
        price: Decimal,
        available: Decimal,
    ) -> Result<Decimal, VaultError> {
        let (total, payouts) = self.book.queued_payouts(price, self.params.decimals);
        if payouts.is_empty() {
            return Ok(Decimal::ZERO);
        }
        if total > available {
            return Err(VaultError::InsufficientLiquidity);
        }
        for (depositor, amount) in &payouts {
            self.cash
                .transfer(&self.vault_account, depositor, *amount)
                .await?;
        }
        self.book.apply_settlement();
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use delta_vault_core::types::{
        PositionId, PositionSettlement, StrikeView, VenueFill, VenueOrder,
    };

    /// Venue stub: one board, one in-band strike, fixed premium pulled from
    /// the payer's cash account.
    struct StubVenue {
        expiry: DateTime<Utc>,
        premium: Decimal,
        settled: bool,
        cash: Arc<StubLedger>,
    }

    #[async_trait]
    impl Venue for StubVenue {
        async fn board(&self, board_id: BoardId) -> Result<BoardView, VaultError> {
            Ok(BoardView {
                board_id,
                expiry: self.expiry,
                strike_ids: vec![1],
            })
        }

        async fn strike_view(
            &self,
            strike_id: StrikeId,
            _gwav_period: chrono::Duration,
        ) -> Result<StrikeView, VaultError> {
            Ok(StrikeView {
                strike_id,
                board_id: 1,
                strike_price: dec!(3350),
                delta: 0.15,
                vol: 0.8,
                gwav_vol: 0.8,
                expiry: self.expiry,
            })
        }

        async fn quote_premium(
            &self,
            _strike_id: StrikeId,
            _size: Decimal,
            _vol: f64,
        ) -> Result<Decimal, VaultError> {
            Ok(self.premium * dec!(2))
        }

        async fn open_position(
            &self,
            payer: &str,
            order: VenueOrder,
        ) -> Result<VenueFill, VaultError> {
            if self.premium > order.max_cost {
                return Err(VaultError::PremiumExceedsCapital);
            }
            self.cash.transfer(payer, "venue", self.premium).await?;
            Ok(VenueFill {
                position_id: 11,
                premium: self.premium,
                collateral: Decimal::ZERO,
            })
        }

        async fn settlement(
            &self,
            _position_id: PositionId,
        ) -> Result<PositionSettlement, VaultError> {
            Ok(PositionSettlement {
                settled: self.settled,
                proceeds: Decimal::ZERO,
            })
        }
    }

    /// Minimal in-memory cash ledger for controller tests.
    #[derive(Default)]
    struct StubLedger {
        balances: Mutex<HashMap<String, Decimal>>,
    }

    impl StubLedger {
        fn with(accounts: &[(&str, Decimal)]) -> Self {
            let ledger = Self::default();
            {
                let mut balances = ledger.balances.lock().unwrap();
                for (account, amount) in accounts {
                    balances.insert((*account).to_string(), *amount);
                }
            }
            ledger
        }
    }

    #[async_trait]
    impl CashLedger for StubLedger {
        async fn balance_of(&self, account: &str) -> Result<Decimal, VaultError> {
            Ok(self
                .balances
                .lock()
                .unwrap()
                .get(account)
                .copied()
                .unwrap_or_default())
        }

        async fn transfer(
            &self,
            from: &str,
            to: &str,
            amount: Decimal,
        ) -> Result<(), VaultError> {
            let mut balances = self.balances.lock().unwrap();
            let from_balance = balances.get(from).copied().unwrap_or_default();
            if from_balance < amount {
                return Err(VaultError::InsufficientCapital);
            }
            *balances.entry(from.to_string()).or_default() -= amount;
            *balances.entry(to.to_string()).or_default() += amount;
            Ok(())
        }
    }

    fn vault(
        premium: Decimal,
        settled: bool,
    ) -> (Vault<StubVenue, Arc<StubLedger>>, DateTime<Utc>) {
        let now = Utc::now();
        let cash = Arc::new(StubLedger::with(&[
            ("alice", dec!(100000)),
            ("bob", dec!(100000)),
        ]));
        let venue = StubVenue {
            expiry: now + chrono::Duration::days(7),
            premium,
            settled,
            cash: Arc::clone(&cash),
        };
        let vault = Vault::new(VaultConfig::default(), venue, cash).unwrap();
        (vault, now)
    }

    #[tokio::test]
    async fn deposit_rejects_non_positive_amounts() {
        let (mut vault, _) = vault(dec!(300), false);
        assert_eq!(
            vault.deposit("alice", dec!(0)).await,
            Err(VaultError::InvalidAmount)
        );
        assert_eq!(
            vault.deposit("alice", dec!(-5)).await,
            Err(VaultError::InvalidAmount)
        );
        assert!(vault.state().total_pending.is_zero());
    }

    #[tokio::test]
    async fn deposit_over_cap_is_rejected() {
        let (mut vault, _) = vault(dec!(300), false);
        vault.params.cap = dec!(1000);
        assert_eq!(
            vault.deposit("alice", dec!(1001)).await,
            Err(VaultError::CapExceeded)
        );
    }

    #[tokio::test]
    async fn only_manager_starts_and_closes_rounds() {
        let (mut vault, now) = vault(dec!(300), false);
        vault.deposit("alice", dec!(1000)).await.unwrap();

        assert_eq!(
            vault.start_next_round("alice", 1, now).await,
            Err(VaultError::Unauthorized)
        );
        vault.start_next_round("manager", 1, now).await.unwrap();
        assert_eq!(
            vault.close_round("alice", now).await.map(|_| ()),
            Err(VaultError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn expired_board_cannot_start_a_round() {
        let (mut vault, now) = vault(dec!(300), false);
        let late = now + chrono::Duration::days(8);
        assert_eq!(
            vault.start_next_round("manager", 1, late).await,
            Err(VaultError::ExpiredBoard)
        );
        assert!(!vault.state().round_in_progress);
    }

    #[tokio::test]
    async fn round_start_locks_pending_and_mints_shares() {
        let (mut vault, now) = vault(dec!(300), false);
        vault.deposit("alice", dec!(50000)).await.unwrap();
        vault.deposit("bob", dec!(50000)).await.unwrap();
        assert_eq!(vault.state().total_pending, dec!(100000));

        let round = vault.start_next_round("manager", 1, now).await.unwrap();
        assert_eq!(round, 1);
        let state = vault.state();
        assert!(state.round_in_progress);
        assert_eq!(state.total_pending, dec!(0));
        assert_eq!(state.locked_amount, dec!(100000));
        assert_eq!(state.locked_amount_left, dec!(100000));
        assert_eq!(vault.total_shares(), dec!(100000));
        assert_eq!(vault.depositor("alice").unwrap().shares, dec!(50000));
    }

    #[tokio::test]
    async fn no_second_round_while_active() {
        let (mut vault, now) = vault(dec!(300), false);
        vault.deposit("alice", dec!(1000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();
        assert_eq!(
            vault.start_next_round("manager", 1, now).await,
            Err(VaultError::RoundActive)
        );
    }

    #[tokio::test]
    async fn strategy_detail_is_frozen_mid_round() {
        let (mut vault, now) = vault(dec!(300), true);
        vault.deposit("alice", dec!(1000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();

        assert_eq!(
            vault.set_strategy_detail("manager", StrategyDetail::default()),
            Err(VaultError::RoundActive)
        );
        assert_eq!(
            vault.set_strategy_detail("alice", StrategyDetail::default()),
            Err(VaultError::Unauthorized)
        );

        vault.close_round("manager", now).await.unwrap();
        assert!(vault
            .set_strategy_detail("manager", StrategyDetail::default())
            .is_ok());
    }

    #[tokio::test]
    async fn trade_requires_an_active_round() {
        let (mut vault, now) = vault(dec!(300), false);
        assert_eq!(
            vault.trade(1, dec!(10), now).await.map(|_| ()),
            Err(VaultError::RoundNotActive)
        );
    }

    #[tokio::test]
    async fn trade_decrements_locked_amount_left_by_exact_premium() {
        let (mut vault, now) = vault(dec!(300), false);
        vault.deposit("alice", dec!(50000)).await.unwrap();
        vault.deposit("bob", dec!(50000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();

        let receipt = vault.trade(1, dec!(10), now).await.unwrap();
        assert_eq!(receipt.premium, dec!(300));
        assert_eq!(vault.state().locked_amount_left, dec!(99700));
        assert_eq!(vault.state().locked_amount, dec!(100000));
        assert_eq!(vault.active_positions().len(), 1);
        vault.state().check_invariants().unwrap();
    }

    #[tokio::test]
    async fn close_requires_settled_positions() {
        let (mut vault, now) = vault(dec!(300), false);
        vault.deposit("alice", dec!(1000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();
        vault.trade(1, dec!(10), now).await.unwrap();

        assert_eq!(
            vault.close_round("manager", now).await.map(|_| ()),
            Err(VaultError::PositionsNotSettled)
        );
        assert!(vault.state().round_in_progress);
    }

    #[tokio::test]
    async fn double_close_fails_cleanly() {
        let (mut vault, now) = vault(dec!(300), true);
        vault.deposit("alice", dec!(1000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();
        vault.close_round("manager", now).await.unwrap();

        assert_eq!(
            vault.close_round("manager", now).await.map(|_| ()),
            Err(VaultError::RoundNotActive)
        );
        vault.state().check_invariants().unwrap();
    }

    #[tokio::test]
    async fn close_round_pays_queued_withdrawals_once() {
        let (mut vault, now) = vault(dec!(300), true);
        vault.deposit("alice", dec!(1000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();
        vault.request_withdraw("alice", dec!(400)).await.unwrap();

        let close = vault.close_round("manager", now).await.unwrap();
        assert!(!close.withdrawals_deferred);
        assert_eq!(close.withdrawals_paid, dec!(400));
        assert_eq!(vault.state().total_queued_withdraw_shares, dec!(0));
        assert_eq!(vault.total_shares(), dec!(600));
        assert_eq!(
            vault.cash.balance_of("alice").await.unwrap(),
            dec!(100000) - dec!(1000) + dec!(400)
        );
    }

    #[tokio::test]
    async fn uncovered_withdrawal_queue_is_deferred_whole() {
        let (mut vault, now) = vault(dec!(300), true);
        vault.deposit("alice", dec!(1000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();
        vault.request_withdraw("alice", dec!(400)).await.unwrap();

        // Less capital on offer than the queue needs: nothing is paid.
        let err = vault
            .settle_queued_withdrawals(Decimal::ONE, dec!(100))
            .await
            .unwrap_err();
        assert_eq!(err, VaultError::InsufficientLiquidity);

        let alice = vault.depositor("alice").unwrap();
        assert_eq!(alice.queued_withdraw_shares, dec!(400));
        assert_eq!(vault.total_shares(), dec!(1000));
        assert_eq!(
            vault.cash.balance_of("alice").await.unwrap(),
            dec!(100000) - dec!(1000)
        );
    }

    #[tokio::test]
    async fn wiped_out_round_writes_off_shares_before_the_next_round() {
        let (mut vault, now) = vault(dec!(1000), true);
        vault.deposit("alice", dec!(1000)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();
        // The whole round budget goes to premium; the position expires worthless.
        vault.trade(1, dec!(10), now).await.unwrap();
        vault.request_withdraw("alice", dec!(400)).await.unwrap();

        let close = vault.close_round("manager", now).await.unwrap();
        assert_eq!(close.nav, dec!(0));
        assert_eq!(close.final_share_price, dec!(0));
        assert_eq!(close.withdrawals_paid, dec!(0));
        assert!(!close.withdrawals_deferred);

        // Fresh capital arrives; dead shares must not dilute it.
        vault.deposit("bob", dec!(500)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();

        assert_eq!(vault.depositor("alice").unwrap().shares, dec!(0));
        assert_eq!(vault.depositor("bob").unwrap().shares, dec!(500));
        assert_eq!(vault.total_shares(), dec!(500));
        vault.state().check_invariants().unwrap();
    }

    #[tokio::test]
    async fn mid_round_deposits_count_spent_premium_against_the_cap() {
        let (mut vault, now) = vault(dec!(300), false);
        vault.params.cap = dec!(1000);
        vault.deposit("alice", dec!(600)).await.unwrap();
        vault.start_next_round("manager", 1, now).await.unwrap();
        vault.trade(1, dec!(10), now).await.unwrap();

        // Cash on hand is 300, but the round still commits 600 of capital.
        assert_eq!(
            vault.deposit("bob", dec!(500)).await,
            Err(VaultError::CapExceeded)
        );
        vault.deposit("bob", dec!(400)).await.unwrap();
    }
}
