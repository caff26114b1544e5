//! Environment configuration for the demo server.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use anyhow::{Context, bail};

use turnstile_auth::{AuthorizerConfig, CookieSettings};
use turnstile_infra::BackendSpec;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_ROLES: &str = "user=40,admin=80";
const DEV_SIGNING_KEY: &str = "dev-signing-key";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub signing_key: String,
    pub backend: BackendSpec,
    pub authorizer: AuthorizerConfig,
    /// When set, an `admin` user is registered at startup with this password.
    pub admin_password: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source (the process environment in `main`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("TURNSTILE_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("TURNSTILE_BIND_ADDR must be host:port")?;

        let signing_key = lookup("TURNSTILE_SIGNING_KEY")
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!("TURNSTILE_SIGNING_KEY not set; using insecure dev default");
                DEV_SIGNING_KEY.to_string()
            });

        let backend = lookup("TURNSTILE_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .parse::<BackendSpec>()
            .context("invalid TURNSTILE_BACKEND")?;

        let roles = parse_roles(
            &lookup("TURNSTILE_ROLES").unwrap_or_else(|| DEFAULT_ROLES.to_string()),
        )?;
        let default_role = lookup("TURNSTILE_DEFAULT_ROLE").unwrap_or_else(|| "user".to_string());

        let cookie = CookieSettings {
            secure: lookup("TURNSTILE_COOKIE_SECURE")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            ..CookieSettings::default()
        };

        Ok(Self {
            bind_addr,
            signing_key,
            backend,
            authorizer: AuthorizerConfig {
                default_role,
                roles,
                cookie,
            },
            admin_password: lookup("TURNSTILE_ADMIN_PASSWORD").filter(|p| !p.is_empty()),
        })
    }
}

/// Parse `name=rank` pairs separated by commas, e.g. `user=40,admin=80`.
pub fn parse_roles(raw: &str) -> anyhow::Result<BTreeMap<String, u32>> {
    let mut roles = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((name, rank)) = entry.split_once('=') else {
            bail!("role entry '{entry}' must look like name=rank");
        };
        let rank: u32 = rank
            .trim()
            .parse()
            .with_context(|| format!("rank of role '{}' must be a number", name.trim()))?;
        roles.insert(name.trim().to_string(), rank);
    }
    if roles.is_empty() {
        bail!("at least one role must be configured");
    }
    Ok(roles)
}
