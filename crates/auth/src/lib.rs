//! `turnstile-auth`: cookie-session authentication and role authorization.
//!
//! HTTP-framework agnostic: operations read request headers through
//! [`IncomingRequest`] and write `Set-Cookie`/redirects onto an
//! `http::Response`. Storage sits behind [`turnstile_core::UserStore`].

pub mod authorizer;
pub mod config;
pub mod error;
pub mod password;
pub mod request;
pub mod roles;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use authorizer::{AuthenticatedUser, Authorizer};
pub use config::{AuthorizerConfig, CookieSettings, SameSitePolicy};
pub use error::{AuthError, AuthResult, ConfigError};
pub use password::{Argon2Hasher, HashingError, PasswordHasher};
pub use request::IncomingRequest;
pub use roles::{Role, RoleTable};
pub use session::{SessionCodec, SessionGuard, SessionJar};
