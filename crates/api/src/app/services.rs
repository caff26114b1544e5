use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderMap, Response};
use tracing::info;

use turnstile_auth::{AuthError, Authorizer, IncomingRequest};
use turnstile_core::UserRecord;

use crate::config::ApiConfig;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_ROLE: &str = "admin";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authorizer>,
}

impl AppState {
    pub fn new(auth: Authorizer) -> Self {
        Self {
            auth: Arc::new(auth),
        }
    }
}

/// Open the configured store and build the authorizer over it.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppState> {
    let store = config
        .backend
        .open()
        .await
        .with_context(|| format!("failed to open {} user store", config.backend))?;

    let auth = Authorizer::from_config(store, config.signing_key.as_bytes(), &config.authorizer)
        .context("invalid authorizer configuration")?;

    if let Some(password) = &config.admin_password {
        bootstrap_admin(&auth, password).await?;
    }

    Ok(AppState::new(auth))
}

/// Make sure an `admin` account exists. An existing account is left as is.
pub async fn bootstrap_admin(auth: &Authorizer, password: &str) -> anyhow::Result<()> {
    let headers = HeaderMap::new();
    let mut scratch = Response::new(());
    let admin = UserRecord::new(ADMIN_USERNAME, "admin@localhost").with_role(ADMIN_ROLE);

    match auth
        .register(IncomingRequest::new(&headers, "/"), &mut scratch, admin, password)
        .await
    {
        Ok(()) => {
            info!(username = ADMIN_USERNAME, "bootstrap admin created");
            Ok(())
        }
        Err(AuthError::UserAlreadyExists) => {
            info!(username = ADMIN_USERNAME, "bootstrap admin already present");
            Ok(())
        }
        Err(err) => Err(anyhow::Error::new(err).context("failed to create bootstrap admin")),
    }
}
