//! Serialized async facade over the vault.
//!
//! Concurrent callers are totally ordered by a single `tokio::sync::Mutex`
//! held for the whole of each operation, which is what makes every
//! operation an atomic transaction against the shared ledger state.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;

use delta_vault_core::errors::VaultError;
use delta_vault_core::traits::{CashLedger, Clock, SystemClock, Venue};
use delta_vault_core::types::{
    ActiveStrikePosition, BoardId, DepositorAccount, StrategyDetail, StrikeId, TradeReceipt,
    VaultState,
};

use crate::rounds::{RoundClose, Vault};

pub struct VaultService<V: Venue, L: CashLedger, C: Clock = SystemClock> {
    vault: Arc<Mutex<Vault<V, L>>>,
    clock: C,
}

impl<V: Venue, L: CashLedger, C: Clock> VaultService<V, L, C> {
    pub fn new(vault: Vault<V, L>, clock: C) -> Self {
        Self {
            vault: Arc::new(Mutex::new(vault)),
            clock,
        }
    }

    pub async fn deposit(&self, caller: &str, amount: Decimal) -> Result<(), VaultError> {
        self.vault.lock().await.deposit(caller, amount).await
    }

    pub async fn request_withdraw(&self, caller: &str, shares: Decimal) -> Result<(), VaultError> {
        self.vault.lock().await.request_withdraw(caller, shares).await
    }

    pub async fn set_strategy_detail(
        &self,
        caller: &str,
        detail: StrategyDetail,
    ) -> Result<(), VaultError> {
        self.vault.lock().await.set_strategy_detail(caller, detail)
    }

    pub async fn start_next_round(
        &self,
        caller: &str,
        board_id: BoardId,
    ) -> Result<u64, VaultError> {
        let now = self.clock.now();
        self.vault
            .lock()
            .await
            .start_next_round(caller, board_id, now)
            .await
    }

    /// Trade initiation is open to any caller; the strategy engine is the gate.
    pub async fn trade(&self, strike_id: StrikeId, size: Decimal) -> Result<TradeReceipt, VaultError> {
        let now = self.clock.now();
        self.vault.lock().await.trade(strike_id, size, now).await
    }

    pub async fn close_round(&self, caller: &str) -> Result<RoundClose, VaultError> {
        let now = self.clock.now();
        self.vault.lock().await.close_round(caller, now).await
    }

    // ---- read-only views ----

    pub async fn vault_state(&self) -> VaultState {
        self.vault.lock().await.state().clone()
    }

    pub async fn strategy_detail(&self) -> StrategyDetail {
        self.vault.lock().await.strategy_detail().clone()
    }

    pub async fn active_positions(&self) -> Vec<ActiveStrikePosition> {
        self.vault.lock().await.active_positions()
    }

    pub async fn depositor(&self, account: &str) -> Option<DepositorAccount> {
        self.vault.lock().await.depositor(account)
    }

    pub async fn total_shares(&self) -> Decimal {
        self.vault.lock().await.total_shares()
    }
}

impl<V: Venue, L: CashLedger, C: Clock + Clone> Clone for VaultService<V, L, C> {
    fn clone(&self) -> Self {
        Self {
            vault: Arc::clone(&self.vault),
            clock: self.clock.clone(),
        }
    }
}
