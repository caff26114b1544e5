//! Signed cookie sessions.
//!
//! Three independent sessions ride on every request, each in its own cookie:
//! `auth` (the logged-in username), `messages` (flash messages for the user)
//! and `redirects` (paths to return to after login). Values are JSON,
//! base64url-encoded, then HMAC-signed so the client can read but not forge
//! them.

use std::ops::{Deref, DerefMut};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use cookie::time::Duration;
use cookie::{Cookie, CookieJar, Key};
use http::{HeaderMap, HeaderValue, Response, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::config::CookieSettings;
use crate::error::{AuthError, ConfigError};

pub const AUTH_COOKIE: &str = "auth";
pub const MESSAGES_COOKIE: &str = "messages";
pub const REDIRECTS_COOKIE: &str = "redirects";

/// Upper bound on queued messages and redirects per client.
pub const MAX_QUEUED: usize = 32;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AuthPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
}

/// Signing key plus cookie attributes, shared across requests.
#[derive(Clone)]
pub struct SessionCodec {
    key: Key,
    settings: CookieSettings,
}

impl core::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("key", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}

enum Loaded<T> {
    Absent,
    Valid(T),
    Invalid,
}

impl SessionCodec {
    /// The operator key may be any non-empty byte string; it is stretched to
    /// the 64 bytes the signer needs with SHA-512.
    pub fn new(signing_key: &[u8], settings: CookieSettings) -> Result<Self, ConfigError> {
        if signing_key.is_empty() {
            return Err(ConfigError::EmptySigningKey);
        }
        let master = Sha512::digest(signing_key);
        Ok(Self {
            key: Key::from(master.as_slice()),
            settings,
        })
    }

    /// Decode the sessions carried by a request's `Cookie` headers.
    ///
    /// Never fails: a tampered or stale `auth` cookie is remembered as
    /// unavailable, while broken `messages`/`redirects` cookies start empty.
    pub fn open(&self, headers: &HeaderMap) -> SessionJar {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse_encoded(value.to_owned()).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }

        let auth = match self.read::<AuthPayload>(&jar, AUTH_COOKIE) {
            Loaded::Absent => AuthState::New,
            Loaded::Valid(payload) => AuthState::Active(payload),
            Loaded::Invalid => AuthState::Unavailable,
        };
        let (messages, had_messages) = self.read_queue(&jar, MESSAGES_COOKIE);
        let (redirects, had_redirects) = self.read_queue(&jar, REDIRECTS_COOKIE);

        SessionJar {
            codec: self.clone(),
            auth,
            messages,
            redirects,
            auth_write: None,
            messages_dirty: false,
            redirects_dirty: false,
            had_messages,
            had_redirects,
        }
    }

    fn read<T: DeserializeOwned>(&self, jar: &CookieJar, name: &str) -> Loaded<T> {
        if jar.get(name).is_none() {
            return Loaded::Absent;
        }
        let Some(verified) = jar.signed(&self.key).get(name) else {
            return Loaded::Invalid;
        };
        match decode(verified.value()) {
            Some(value) => Loaded::Valid(value),
            None => Loaded::Invalid,
        }
    }

    fn read_queue(&self, jar: &CookieJar, name: &str) -> (Vec<String>, bool) {
        match self.read::<Vec<String>>(jar, name) {
            Loaded::Absent => (Vec::new(), false),
            Loaded::Valid(mut queue) => {
                queue.truncate(MAX_QUEUED);
                (queue, true)
            }
            Loaded::Invalid => {
                tracing::debug!(cookie = name, "discarding unverifiable session cookie");
                (Vec::new(), true)
            }
        }
    }

    fn attributes(&self, name: &'static str, value: String) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .path(self.settings.path.clone())
            .http_only(self.settings.http_only)
            .secure(self.settings.secure)
            .same_site(self.settings.same_site.into())
            .max_age(Duration::seconds(self.settings.max_age_secs));
        if let Some(domain) = &self.settings.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    fn sealed<T: Serialize>(&self, name: &'static str, value: &T) -> Option<Cookie<'static>> {
        let encoded = match serde_json::to_vec(value) {
            Ok(json) => URL_SAFE_NO_PAD.encode(json),
            Err(err) => {
                tracing::error!(cookie = name, error = %err, "failed to encode session");
                return None;
            }
        };
        let mut scratch = CookieJar::new();
        scratch.signed_mut(&self.key).add(self.attributes(name, encoded));
        scratch.get(name).cloned()
    }

    fn removal(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.attributes(name, String::new());
        cookie.make_removal();
        cookie
    }
}

fn decode<T: DeserializeOwned>(value: &str) -> Option<T> {
    let json = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&json).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthState {
    New,
    Active(AuthPayload),
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthWrite {
    Store,
    Expire,
}

/// The decoded sessions of one request, plus the changes pending for the
/// response.
#[derive(Debug)]
pub struct SessionJar {
    codec: SessionCodec,
    auth: AuthState,
    messages: Vec<String>,
    redirects: Vec<String>,
    auth_write: Option<AuthWrite>,
    messages_dirty: bool,
    redirects_dirty: bool,
    had_messages: bool,
    had_redirects: bool,
}

impl SessionJar {
    /// No `auth` cookie arrived with the request.
    pub fn is_new(&self) -> bool {
        self.auth == AuthState::New
    }

    /// The authenticated username, if the session carries one.
    pub fn username(&self) -> Result<Option<&str>, AuthError> {
        match &self.auth {
            AuthState::New => Ok(None),
            AuthState::Active(payload) => Ok(payload.username.as_deref()),
            AuthState::Unavailable => Err(AuthError::SessionUnavailable),
        }
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.auth = AuthState::Active(AuthPayload {
            username: Some(username.into()),
        });
        self.auth_write = Some(AuthWrite::Store);
    }

    /// Forget the username and expire the `auth` cookie.
    pub fn clear_username(&mut self) {
        self.auth = AuthState::New;
        self.auth_write = Some(AuthWrite::Expire);
    }

    /// Queue a flash message; the oldest is dropped once the queue is full.
    pub fn push_message(&mut self, message: impl Into<String>) {
        if self.messages.len() >= MAX_QUEUED {
            self.messages.remove(0);
        }
        self.messages.push(message.into());
        self.messages_dirty = true;
    }

    /// Take every queued message, oldest first.
    pub fn drain_messages(&mut self) -> Vec<String> {
        if !self.messages.is_empty() || self.had_messages {
            self.messages_dirty = true;
        }
        std::mem::take(&mut self.messages)
    }

    /// Remember a path to return to after login. Once the queue is full,
    /// further paths are ignored so the earliest destination survives.
    pub fn push_redirect(&mut self, path: impl Into<String>) {
        if self.redirects.len() >= MAX_QUEUED {
            return;
        }
        self.redirects.push(path.into());
        self.redirects_dirty = true;
    }

    /// Return the oldest recorded redirect and discard the rest of the queue.
    pub fn pop_oldest_redirect(&mut self) -> Option<String> {
        if self.redirects.is_empty() {
            if self.had_redirects {
                self.redirects_dirty = true;
            }
            return None;
        }
        self.redirects_dirty = true;
        std::mem::take(&mut self.redirects).into_iter().next()
    }

    pub fn pending_redirects(&self) -> &[String] {
        &self.redirects
    }

    /// Append a `Set-Cookie` header for every session changed since the jar
    /// was opened or last persisted.
    pub fn persist(&mut self, headers: &mut HeaderMap) {
        let mut out = Vec::new();

        match self.auth_write.take() {
            Some(AuthWrite::Store) => {
                if let AuthState::Active(payload) = &self.auth {
                    out.extend(self.codec.sealed(AUTH_COOKIE, payload));
                }
            }
            Some(AuthWrite::Expire) => out.push(self.codec.removal(AUTH_COOKIE)),
            None => {}
        }
        if std::mem::take(&mut self.messages_dirty) {
            out.push(self.queue_cookie(MESSAGES_COOKIE, &self.messages));
        }
        if std::mem::take(&mut self.redirects_dirty) {
            out.push(self.queue_cookie(REDIRECTS_COOKIE, &self.redirects));
        }

        for cookie in out {
            match HeaderValue::from_str(&cookie.encoded().to_string()) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(err) => {
                    tracing::error!(cookie = cookie.name(), error = %err, "unrepresentable cookie");
                }
            }
        }
    }

    fn queue_cookie(&self, name: &'static str, queue: &[String]) -> Cookie<'static> {
        if queue.is_empty() {
            return self.codec.removal(name);
        }
        self.codec
            .sealed(name, &queue)
            .unwrap_or_else(|| self.codec.removal(name))
    }
}

/// Sessions bound to the response they will be written to.
///
/// Whatever path an operation exits through, dropping the guard persists the
/// changed sessions onto the response exactly once.
pub struct SessionGuard<'r, B> {
    jar: SessionJar,
    response: &'r mut Response<B>,
}

impl<'r, B> SessionGuard<'r, B> {
    pub fn new(jar: SessionJar, response: &'r mut Response<B>) -> Self {
        Self { jar, response }
    }

    pub fn response_mut(&mut self) -> &mut Response<B> {
        self.response
    }
}

impl<B> Deref for SessionGuard<'_, B> {
    type Target = SessionJar;

    fn deref(&self) -> &SessionJar {
        &self.jar
    }
}

impl<B> DerefMut for SessionGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut SessionJar {
        &mut self.jar
    }
}

impl<B> Drop for SessionGuard<'_, B> {
    fn drop(&mut self) {
        self.jar.persist(self.response.headers_mut());
    }
}
