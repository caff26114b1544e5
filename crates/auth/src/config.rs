use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::roles::RoleTable;

/// Thirty days.
pub const DEFAULT_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(value: SameSitePolicy) -> Self {
        match value {
            SameSitePolicy::Strict => cookie::SameSite::Strict,
            SameSitePolicy::Lax => cookie::SameSite::Lax,
            SameSitePolicy::None => cookie::SameSite::None,
        }
    }
}

/// Attributes applied to every session cookie the authorizer writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    pub path: String,
    pub domain: Option<String>,
    pub max_age_secs: i64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSitePolicy,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            http_only: true,
            secure: false,
            same_site: SameSitePolicy::Lax,
        }
    }
}

/// Serializable authorizer settings. The signing key is deliberately not part
/// of this struct; callers supply it separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizerConfig {
    pub default_role: String,
    pub roles: BTreeMap<String, u32>,
    #[serde(default)]
    pub cookie: CookieSettings,
}

impl AuthorizerConfig {
    pub fn role_table(&self) -> Result<RoleTable, ConfigError> {
        RoleTable::new(self.roles.iter().map(|(name, rank)| (name.clone(), *rank)))
    }
}
