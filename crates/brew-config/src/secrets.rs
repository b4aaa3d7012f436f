//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"BREW_NLU_ACCESS_TOKEN"`).
//! - At startup, callers invoke [`resolve_secrets`] once and pass the result
//!   into constructors; no other module reads these env vars.
//! - `Debug` output redacts values; errors name the variable, never the value.
//!
//! # Backend-aware enforcement
//! - `postgres`: the database URL is **required**.
//! - `memory`:   nothing is required.
//!
//! The NLU access token is always optional here: the NLU handle is built
//! lazily on the first order and reports a gateway error if it is missing.

use anyhow::{bail, Result};

use crate::settings::{BrewConfig, StoreBackend};

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Postgres connection URL. `None` if the named env var was absent or empty.
    pub database_url: Option<String>,
    /// OAuth bearer token for the NLU service.
    pub nlu_access_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "nlu_access_token",
                &self.nlu_access_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Resolve a named environment variable. Blank counts as unset.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve all secrets named by `cfg` from the process environment.
pub fn resolve_secrets(cfg: &BrewConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_with(cfg, resolve_env)
}

/// Same as [`resolve_secrets`] with an injectable lookup (tests, embedding).
pub fn resolve_secrets_with<F>(cfg: &BrewConfig, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let database_url = lookup(&cfg.db.url_env);
    let nlu_access_token = lookup(&cfg.nlu.access_token_env);

    if cfg.store.backend == StoreBackend::Postgres && database_url.is_none() {
        bail!(
            "SECRETS_MISSING backend=postgres: required env var '{}' \
             (database url) is not set or empty",
            cfg.db.url_env,
        );
    }

    Ok(ResolvedSecrets {
        database_url,
        nlu_access_token,
    })
}
