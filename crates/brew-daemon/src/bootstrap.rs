//! Startup wiring: config → price table, stores, workflow, NLU handle.

use std::sync::Arc;

use anyhow::{Context, Result};
use brew_config::secrets::ResolvedSecrets;
use brew_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, BrewConfig,
    LoadedConfig, NluConfig, StoreBackend, UnusedKeyPolicy,
};
use brew_nlu::{DialogflowSettings, NluHandle};
use brew_order::{AccountLedger, InMemoryLedger, InMemoryOrderStore, OrderStore, OrderWorkflow, PriceTable};
use tracing::{info, warn};

/// Everything a request needs, built once per process.
pub struct Services {
    pub workflow: Arc<OrderWorkflow>,
    pub nlu: Arc<NluHandle>,
    pub backend: StoreBackend,
}

/// Load and merge YAML layers (none = all defaults), warn on unused keys.
pub fn load_config(paths: &[String]) -> Result<(LoadedConfig, BrewConfig)> {
    let loaded = if paths.is_empty() {
        load_layered_yaml_from_strings(&[])?
    } else {
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        load_layered_yaml(&refs)?
    };

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        warn!(pointer = %p, "unused config key");
    }

    let cfg = loaded.typed()?;
    info!(config_hash = %loaded.config_hash, backend = cfg.store.backend.as_str(), "config loaded");
    Ok((loaded, cfg))
}

pub fn price_table(cfg: &BrewConfig) -> Result<PriceTable> {
    let prices = cfg.pricing.products_micros()?;
    if prices.is_empty() {
        warn!("pricing.products is empty; every order will fail as unknown product");
    }
    Ok(PriceTable::new(prices))
}

pub fn nlu_settings(cfg: &NluConfig, access_token: Option<String>) -> DialogflowSettings {
    DialogflowSettings {
        base_url: cfg.base_url.clone(),
        project_id: cfg.project_id.clone(),
        session_id: cfg.session_id.clone(),
        language_code: cfg.language_code.clone(),
        timeout: cfg.timeout(),
        access_token,
    }
}

/// Build stores for the configured backend. Postgres connects and migrates.
pub async fn build_stores(
    cfg: &BrewConfig,
    secrets: &ResolvedSecrets,
) -> Result<(Arc<dyn AccountLedger>, Arc<dyn OrderStore>)> {
    match cfg.store.backend {
        StoreBackend::Memory => {
            let seed = cfg.accounts.seed_micros()?;
            info!(accounts = seed.len(), "using in-memory stores");
            Ok((
                Arc::new(InMemoryLedger::with_accounts(seed)),
                Arc::new(InMemoryOrderStore::new()),
            ))
        }
        StoreBackend::Postgres => {
            if !cfg.accounts.seed.is_empty() {
                warn!("accounts.seed is ignored by the postgres backend; use `brew account open`");
            }
            let url = secrets
                .database_url
                .as_deref()
                .with_context(|| format!("missing env var {}", cfg.db.url_env))?;
            let pool = brew_db::connect(url, cfg.store.max_connections, cfg.store.timeout()).await?;
            brew_db::migrate(&pool).await?;
            info!("using postgres stores");
            Ok((
                Arc::new(brew_db::PgLedger::new(pool.clone())),
                Arc::new(brew_db::PgOrderStore::new(pool)),
            ))
        }
    }
}

pub async fn build_services(cfg: &BrewConfig, secrets: &ResolvedSecrets) -> Result<Services> {
    let prices = Arc::new(price_table(cfg)?);
    let (ledger, store) = build_stores(cfg, secrets).await?;

    let workflow = OrderWorkflow::new(prices, ledger, store).with_store_timeout(cfg.store.timeout());
    let nlu = NluHandle::dialogflow(nlu_settings(&cfg.nlu, secrets.nlu_access_token.clone()));

    Ok(Services {
        workflow: Arc::new(workflow),
        nlu: Arc::new(nlu),
        backend: cfg.store.backend,
    })
}
