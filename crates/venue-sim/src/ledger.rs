//! In-memory quote-asset ledger with fungible-token semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use delta_vault_core::errors::VaultError;
use delta_vault_core::traits::CashLedger;

/// Multi-account balance map. Transfers are atomic: a short balance fails
/// the whole transfer with no effect.
#[derive(Debug, Default)]
pub struct SimCashLedger {
    balances: Mutex<HashMap<String, Decimal>>,
}

impl SimCashLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits freshly created funds to an account (test seeding and
    /// settlement proceeds).
    pub fn mint(&self, account: &str, amount: Decimal) {
        let mut balances = self.balances.lock().expect("ledger lock poisoned");
        *balances.entry(account.to_string()).or_default() += amount;
        debug!(account, %amount, "Minted");
    }
}

#[async_trait]
impl CashLedger for SimCashLedger {
    async fn balance_of(&self, account: &str) -> Result<Decimal, VaultError> {
        let balances = self.balances.lock().expect("ledger lock poisoned");
        Ok(balances.get(account).copied().unwrap_or_default())
    }

    async fn transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<(), VaultError> {
        if amount < Decimal::ZERO {
            return Err(VaultError::InvalidAmount);
        }
        let mut balances = self.balances.lock().expect("ledger lock poisoned");
        let from_balance = balances.get(from).copied().unwrap_or_default();
        if from_balance < amount {
            return Err(VaultError::Ledger(format!(
                "transfer amount exceeds balance of {from}"
            )));
        }
        *balances.entry(from.to_string()).or_default() -= amount;
        *balances.entry(to.to_string()).or_default() += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn transfer_moves_funds() {
        let ledger = SimCashLedger::new();
        ledger.mint("alice", dec!(100));
        ledger.transfer("alice", "bob", dec!(40)).await.unwrap();
        assert_eq!(ledger.balance_of("alice").await.unwrap(), dec!(60));
        assert_eq!(ledger.balance_of("bob").await.unwrap(), dec!(40));
    }

    #[tokio::test]
    async fn short_balance_fails_without_effect() {
        let ledger = SimCashLedger::new();
        ledger.mint("alice", dec!(100));
        assert!(ledger.transfer("alice", "bob", dec!(101)).await.is_err());
        assert_eq!(ledger.balance_of("alice").await.unwrap(), dec!(100));
        assert_eq!(ledger.balance_of("bob").await.unwrap(), dec!(0));
    }
}
