//! Share accounting: deposit/share conversion and the withdrawal queue.
//!
//! Share price is vault net asset value over total shares outstanding, with
//! the degenerate empty-vault case defined as price 1. Queued withdrawals
//! settle all-or-nothing at the round's realized price.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};

use delta_vault_core::errors::VaultError;
use delta_vault_core::types::DepositorAccount;

/// NAV per share; 1 when no shares are outstanding.
#[must_use]
pub fn share_price(nav: Decimal, total_shares: Decimal) -> Decimal {
    if total_shares.is_zero() {
        Decimal::ONE
    } else {
        nav / total_shares
    }
}

/// Shares minted for a deposit at the given price.
#[must_use]
pub fn shares_for_deposit(amount: Decimal, price: Decimal) -> Decimal {
    amount / price
}

/// Asset value of a share amount at the given price.
#[must_use]
pub fn assets_for_shares(shares: Decimal, price: Decimal) -> Decimal {
    shares * price
}

/// Per-depositor accounts plus total shares outstanding.
#[derive(Debug, Default)]
pub struct DepositorBook {
    accounts: HashMap<String, DepositorAccount>,
    total_shares: Decimal,
}

impl DepositorBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn account(&self, depositor: &str) -> Option<&DepositorAccount> {
        self.accounts.get(depositor)
    }

    #[must_use]
    pub fn total_shares(&self) -> Decimal {
        self.total_shares
    }

    /// Credits a deposit that waits for the next round start.
    pub fn add_pending(&mut self, depositor: &str, amount: Decimal) {
        self.accounts
            .entry(depositor.to_string())
            .or_default()
            .pending_deposit += amount;
    }

    /// Converts every pending deposit into shares at `price`.
    /// Returns the total shares minted.
    pub fn mint_pending(&mut self, price: Decimal) -> Decimal {
        let mut minted = Decimal::ZERO;
        for (depositor, account) in &mut self.accounts {
            if account.pending_deposit.is_zero() {
                continue;
            }
            let shares = shares_for_deposit(account.pending_deposit, price);
            debug!(depositor, pending = %account.pending_deposit, %shares, "Minting shares");
            account.shares += shares;
            account.pending_deposit = Decimal::ZERO;
            minted += shares;
        }
        self.total_shares += minted;
        minted
    }

    /// Queues shares for redemption at the next round close.
    pub fn request_withdraw(&mut self, depositor: &str, shares: Decimal) -> Result<(), VaultError> {
        if shares <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount);
        }
        let account = self
            .accounts
            .get_mut(depositor)
            .ok_or(VaultError::InsufficientShares)?;
        if account.shares < shares {
            return Err(VaultError::InsufficientShares);
        }
        account.shares -= shares;
        account.queued_withdraw_shares += shares;
        Ok(())
    }

    /// Payouts owed to the queue at `price`, rounded down to `decimals`
    /// places so the full queue can never round above available capital.
    /// Pure: does not mutate the book.
    #[must_use]
    pub fn queued_payouts(&self, price: Decimal, decimals: u32) -> (Decimal, Vec<(String, Decimal)>) {
        let mut total = Decimal::ZERO;
        let mut payouts = Vec::new();
        for (depositor, account) in &self.accounts {
            if account.queued_withdraw_shares.is_zero() {
                continue;
            }
            let amount = assets_for_shares(account.queued_withdraw_shares, price)
                .round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
            total += amount;
            payouts.push((depositor.clone(), amount));
        }
        (total, payouts)
    }

    /// Writes off every share and queued share as worthless after a round
    /// that realized zero value. Returns the shares written off.
    pub fn write_off(&mut self) -> Decimal {
        let mut burned = Decimal::ZERO;
        for account in self.accounts.values_mut() {
            burned += account.shares + account.queued_withdraw_shares;
            account.shares = Decimal::ZERO;
            account.queued_withdraw_shares = Decimal::ZERO;
        }
        self.total_shares = Decimal::ZERO;
        burned
    }

    /// Burns every queued share after the corresponding payouts were made.
    /// Returns the shares burned.
    pub fn apply_settlement(&mut self) -> Decimal {
        let mut burned = Decimal::ZERO;
        for account in self.accounts.values_mut() {
            burned += account.queued_withdraw_shares;
            account.queued_withdraw_shares = Decimal::ZERO;
        }
        self.total_shares -= burned;
        if !burned.is_zero() {
            info!(%burned, remaining = %self.total_shares, "Withdrawal queue settled");
        }
        burned
    }
}
