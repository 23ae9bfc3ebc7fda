use crate::config::VaultConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads vault configuration by merging defaults, TOML, and environment
    /// variables (highest precedence).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<VaultConfig> {
        let config: VaultConfig = Figment::from(Serialized::defaults(VaultConfig::default()))
            .merge(Toml::file("config/Vault.toml"))
            .merge(Env::prefixed("VAULT_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Loads vault configuration with a specific profile file layered on top.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<VaultConfig> {
        let config: VaultConfig = Figment::from(Serialized::defaults(VaultConfig::default()))
            .merge(Toml::file("config/Vault.toml"))
            .merge(Toml::file(format!("config/Vault.{profile}.toml")))
            .merge(Env::prefixed("VAULT_").split("__"))
            .extract()?;

        Ok(config)
    }
}
