//! Vault configuration structs.

use serde::{Deserialize, Serialize};

use crate::types::{StrategyDetail, VaultParams};

/// Full vault configuration as loaded from file/env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Cash-ledger account name the vault holds funds under.
    pub vault_account: String,
    /// Account allowed to start/close rounds and replace the strategy.
    pub manager_account: String,
    pub params: VaultParams,
    pub strategy: StrategyDetail,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            vault_account: "vault".to_string(),
            manager_account: "manager".to_string(),
            params: VaultParams::default(),
            strategy: StrategyDetail::default(),
        }
    }
}
