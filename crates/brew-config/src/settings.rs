//! Typed view of the merged config. Every key has a default so an empty
//! config (or no config file at all) yields a runnable local setup.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use brew_schemas::parse_decimal_micros;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrewConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub nlu: NluConfig,
    pub db: DbConfig,
    pub pricing: PricingConfig,
    pub accounts: AccountsConfig,
}

impl BrewConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        serde_json::from_value(v.clone()).context("config does not match BrewConfig schema")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
            static_dir: "static".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Upper bound for every ledger/order-store call.
    pub timeout_ms: u64,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            timeout_ms: 5_000,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    pub base_url: String,
    pub project_id: String,
    pub session_id: String,
    pub language_code: String,
    pub timeout_ms: u64,
    /// NAME of the env var holding the OAuth access token.
    pub access_token_env: String,
}

impl NluConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dialogflow.googleapis.com".to_string(),
            project_id: "test1-61c87".to_string(),
            session_id: "24e636f5-c721-5517-3538-fcf612ca9b33".to_string(),
            language_code: "en".to_string(),
            timeout_ms: 5_000,
            access_token_env: "BREW_NLU_ACCESS_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// NAME of the env var holding the Postgres connection URL.
    pub url_env: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url_env: "BREW_DATABASE_URL".to_string(),
        }
    }
}

/// Product catalogue as decimal strings. A layer that supplies
/// `pricing.products` replaces the whole catalogue from earlier layers
/// (and the built-in default) rather than merging into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub products: BTreeMap<String, String>,
}

impl PricingConfig {
    pub fn products_micros(&self) -> Result<BTreeMap<String, i64>> {
        decimal_map_to_micros(&self.products, "pricing.products")
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let products = [("latte", "3.50"), ("espresso", "3.00"), ("long black", "3.50")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { products }
    }
}

/// Opening balances for the in-memory backend. Ignored by Postgres, where
/// accounts are provisioned with `brew account open`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub seed: BTreeMap<String, String>,
}

impl AccountsConfig {
    pub fn seed_micros(&self) -> Result<BTreeMap<String, i64>> {
        decimal_map_to_micros(&self.seed, "accounts.seed")
    }
}

fn decimal_map_to_micros(
    raw: &BTreeMap<String, String>,
    section: &str,
) -> Result<BTreeMap<String, i64>> {
    raw.iter()
        .map(|(k, v)| {
            let micros =
                parse_decimal_micros(v).with_context(|| format!("{section}.{k}: bad amount"))?;
            Ok((k.clone(), micros))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = BrewConfig::from_json(&json!({})).unwrap();
        assert_eq!(cfg, BrewConfig::default());
        assert_eq!(cfg.store.backend, StoreBackend::Postgres);
        assert_eq!(cfg.store.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.nlu.language_code, "en");

        let prices = cfg.pricing.products_micros().unwrap();
        assert_eq!(prices["espresso"], 3_000_000);
        assert_eq!(prices["latte"], 3_500_000);
        assert_eq!(prices["long black"], 3_500_000);
    }

    #[test]
    fn products_override_replaces_catalogue() {
        let cfg = BrewConfig::from_json(&json!({
            "pricing": { "products": { "flat white": "4.20" } }
        }))
        .unwrap();
        let prices = cfg.pricing.products_micros().unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["flat white"], 4_200_000);
    }

    #[test]
    fn bad_seed_amount_is_reported_with_key() {
        let cfg = BrewConfig::from_json(&json!({
            "accounts": { "seed": { "emp1": "ten" } }
        }))
        .unwrap();
        let err = cfg.accounts.seed_micros().unwrap_err();
        assert!(format!("{err:#}").contains("accounts.seed.emp1"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(BrewConfig::from_json(&json!({"store": {"backend": "redis"}})).is_err());
    }
}
