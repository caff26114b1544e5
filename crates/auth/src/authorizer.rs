//! The authorizer: registration, login, and per-request authorization on top
//! of a [`UserStore`] and signed cookie sessions.

use std::sync::Arc;

use http::{HeaderValue, Response, StatusCode, header};
use tracing::{debug, info, warn};

use turnstile_core::{UserRecord, UserStore, UserStoreError};

use crate::config::{AuthorizerConfig, CookieSettings};
use crate::error::{AuthError, AuthResult, ConfigError};
use crate::password::{Argon2Hasher, DECOY_HASH, PasswordHasher};
use crate::request::IncomingRequest;
use crate::roles::RoleTable;
use crate::session::{SessionCodec, SessionGuard, SessionJar};

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid username or password.";
pub const MSG_USERNAME_TAKEN: &str = "Username has been taken.";
pub const MSG_LOGIN_REQUIRED: &str = "Log in to do that.";
pub const MSG_INSUFFICIENT_ROLE: &str = "You don't have sufficient privileges.";
pub const MSG_USER_MISSING: &str = "User doesn't exist.";
pub const MSG_LOGGED_OUT: &str = "Logged out.";

/// Proof that a request carried a valid session for an existing user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    username: String,
}

impl AuthenticatedUser {
    fn new(username: String) -> Self {
        Self { username }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn into_username(self) -> String {
        self.username
    }
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: SessionCodec,
    roles: Arc<RoleTable>,
    default_role: String,
}

impl core::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Authorizer")
            .field("codec", &self.codec)
            .field("roles", &self.roles)
            .field("default_role", &self.default_role)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Build an authorizer with default cookie attributes and Argon2id
    /// hashing. `default_role` must be present in `roles`.
    pub fn new(
        store: Arc<dyn UserStore>,
        signing_key: &[u8],
        default_role: impl Into<String>,
        roles: RoleTable,
    ) -> Result<Self, ConfigError> {
        Self::with_settings(store, signing_key, default_role, roles, CookieSettings::default())
    }

    pub fn from_config(
        store: Arc<dyn UserStore>,
        signing_key: &[u8],
        config: &AuthorizerConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_settings(
            store,
            signing_key,
            config.default_role.clone(),
            config.role_table()?,
            config.cookie.clone(),
        )
    }

    pub fn with_settings(
        store: Arc<dyn UserStore>,
        signing_key: &[u8],
        default_role: impl Into<String>,
        roles: RoleTable,
        cookie: CookieSettings,
    ) -> Result<Self, ConfigError> {
        let default_role = default_role.into();
        if !roles.contains(&default_role) {
            return Err(ConfigError::UnknownDefaultRole(default_role));
        }
        Ok(Self {
            store,
            hasher: Arc::new(Argon2Hasher::default()),
            codec: SessionCodec::new(signing_key, cookie)?,
            roles: Arc::new(roles),
            default_role,
        })
    }

    /// Replace the password hasher (e.g. cheaper Argon2 parameters in tests).
    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    fn sessions<'r, B>(
        &self,
        req: IncomingRequest<'_>,
        res: &'r mut Response<B>,
    ) -> SessionGuard<'r, B> {
        SessionGuard::new(self.codec.open(req.headers()), res)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Account management
    // ─────────────────────────────────────────────────────────────────────

    /// Create a new user with `password`.
    ///
    /// `user.password_hash` must be empty; an empty `user.role` means the
    /// default role. Registering does not log the user in.
    pub async fn register<B: Send>(
        &self,
        req: IncomingRequest<'_>,
        res: &mut Response<B>,
        mut user: UserRecord,
        password: &str,
    ) -> AuthResult<()> {
        if user.username.is_empty() {
            return Err(AuthError::InvalidRegistration("username is required"));
        }
        if user.email.is_empty() {
            return Err(AuthError::InvalidRegistration("email is required"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidRegistration("password is required"));
        }
        if user.has_password() {
            return Err(AuthError::InvalidRegistration(
                "password hash must not be supplied",
            ));
        }

        let mut sessions = self.sessions(req, res);

        match self.store.get(&user.username).await {
            Ok(_) => {
                sessions.push_message(MSG_USERNAME_TAKEN);
                warn!(username = %user.username, "registration for existing username");
                return Err(AuthError::UserAlreadyExists);
            }
            Err(UserStoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        user.role = self.resolve_role(&user.role)?;
        user.password_hash = self.hasher.hash(&user.username, password)?;

        let username = user.username.clone();
        let role = user.role.clone();
        if let Err(err) = self.store.save(user).await {
            sessions.push_message(err.to_string());
            return Err(AuthError::Store(err.to_string()));
        }
        info!(%username, %role, "user registered");
        Ok(())
    }

    /// Check credentials and, on success, mark the session authenticated and
    /// answer with a 303 to the oldest captured redirect or `destination`.
    pub async fn login<B: Send>(
        &self,
        req: IncomingRequest<'_>,
        res: &mut Response<B>,
        username: &str,
        password: &str,
        destination: &str,
    ) -> AuthResult<()> {
        let mut sessions = self.sessions(req, res);

        if let Ok(Some(current)) = sessions.username() {
            if current == username {
                return Err(AuthError::AlreadyAuthenticated);
            }
        }

        let user = match self.store.get(username).await {
            Ok(user) => user,
            Err(UserStoreError::NotFound(_)) => {
                // Spend the same KDF time as a real mismatch.
                let _ = self.hasher.verify(DECOY_HASH, username, password);
                sessions.push_message(MSG_INVALID_CREDENTIALS);
                warn!(%username, "login for unknown user");
                return Err(AuthError::UserNotFound);
            }
            Err(err) => return Err(err.into()),
        };

        if !self.hasher.verify(&user.password_hash, username, password) {
            sessions.push_message(MSG_INVALID_CREDENTIALS);
            warn!(%username, "login with wrong password");
            return Err(AuthError::PasswordMismatch);
        }

        sessions.set_username(username);
        let target = sessions
            .pop_oldest_redirect()
            .unwrap_or_else(|| destination.to_string());
        let location = HeaderValue::from_str(&target).unwrap_or_else(|_| {
            warn!(%target, "unusable redirect target, sending to /");
            HeaderValue::from_static("/")
        });

        let response = sessions.response_mut();
        *response.status_mut() = StatusCode::SEE_OTHER;
        response.headers_mut().insert(header::LOCATION, location);

        info!(%username, %target, "user logged in");
        Ok(())
    }

    /// Change the password and/or email of `username`, or of the session's
    /// user when `username` is empty. Empty `password`/`email` leave those
    /// fields as they are.
    pub async fn update<B: Send>(
        &self,
        req: IncomingRequest<'_>,
        res: &mut Response<B>,
        username: &str,
        password: &str,
        email: &str,
    ) -> AuthResult<()> {
        let mut sessions = self.sessions(req, res);

        let from_session = username.is_empty();
        let username = if from_session {
            match sessions.username()? {
                Some(current) => current.to_string(),
                None => return Err(AuthError::NotLoggedIn),
            }
        } else {
            username.to_string()
        };

        let mut user = match self.store.get(&username).await {
            Ok(user) => user,
            Err(UserStoreError::NotFound(_)) => {
                if from_session {
                    sessions.clear_username();
                    debug!(%username, "cleared stale session during update");
                }
                sessions.push_message(MSG_USER_MISSING);
                return Err(AuthError::UserNotFound);
            }
            Err(err) => return Err(err.into()),
        };

        if !password.is_empty() {
            user.password_hash = self.hasher.hash(&username, password)?;
        }
        if !email.is_empty() {
            user.email = email.to_string();
        }

        if let Err(err) = self.store.save(user).await {
            sessions.push_message(err.to_string());
            return Err(AuthError::Store(err.to_string()));
        }
        info!(%username, password_changed = !password.is_empty(), "user updated");
        Ok(())
    }

    /// Remove a user. Sessions already naming them fail on their next
    /// authorization.
    pub async fn delete_user(&self, username: &str) -> AuthResult<()> {
        self.store.delete(username).await?;
        info!(%username, "user deleted");
        Ok(())
    }

    pub async fn users(&self) -> AuthResult<Vec<UserRecord>> {
        Ok(self.store.list().await?)
    }

    /// Release the backing store.
    pub async fn close(&self) {
        self.store.close().await;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Per-request checks
    // ─────────────────────────────────────────────────────────────────────

    /// Verify the request belongs to a logged-in, still-existing user.
    ///
    /// With `capture_redirect`, a failed check remembers the request path so
    /// a later login can send the user back to it.
    pub async fn authorize<B: Send>(
        &self,
        req: IncomingRequest<'_>,
        res: &mut Response<B>,
        capture_redirect: bool,
    ) -> AuthResult<AuthenticatedUser> {
        let mut sessions = self.sessions(req, res);
        self.check_session(&mut sessions, req.path(), capture_redirect)
            .await
    }

    /// [`Self::authorize`], then require the user's role to rank at least as
    /// high as `required_role`.
    pub async fn authorize_role<B: Send>(
        &self,
        req: IncomingRequest<'_>,
        res: &mut Response<B>,
        required_role: &str,
        capture_redirect: bool,
    ) -> AuthResult<AuthenticatedUser> {
        self.roles.rank(required_role)?;

        let mut sessions = self.sessions(req, res);
        let identity = self
            .check_session(&mut sessions, req.path(), capture_redirect)
            .await?;
        let user = self.store.get(identity.username()).await?;

        if self.roles.satisfies(&user.role, required_role)? {
            Ok(identity)
        } else {
            sessions.push_message(MSG_INSUFFICIENT_ROLE);
            warn!(
                username = %user.username,
                role = %user.role,
                required = required_role,
                "insufficient role"
            );
            Err(AuthError::InsufficientRole {
                required: required_role.to_string(),
            })
        }
    }

    /// The full record of the session's user.
    pub async fn current_user<B: Send>(
        &self,
        req: IncomingRequest<'_>,
        res: &mut Response<B>,
    ) -> AuthResult<UserRecord> {
        let mut sessions = self.sessions(req, res);
        let identity = self.check_session(&mut sessions, req.path(), false).await?;
        Ok(self.store.get(identity.username()).await?)
    }

    /// Expire the auth session and leave a "Logged out." message. Safe to call
    /// without a session.
    pub fn logout<B>(&self, req: IncomingRequest<'_>, res: &mut Response<B>) {
        let mut sessions = self.sessions(req, res);
        if let Ok(Some(username)) = sessions.username() {
            info!(%username, "user logged out");
        }
        sessions.clear_username();
        sessions.push_message(MSG_LOGGED_OUT);
    }

    /// Take and clear every pending flash message, oldest first.
    pub fn messages<B>(&self, req: IncomingRequest<'_>, res: &mut Response<B>) -> Vec<String> {
        self.sessions(req, res).drain_messages()
    }

    async fn check_session(
        &self,
        sessions: &mut SessionJar,
        path: &str,
        capture_redirect: bool,
    ) -> AuthResult<AuthenticatedUser> {
        let claimed = sessions.username().map(|name| name.map(str::to_owned));
        let username = match claimed {
            Err(err) => {
                // No message: the user did nothing wrong.
                if capture_redirect {
                    sessions.push_redirect(path);
                }
                debug!(%path, "unverifiable auth session");
                return Err(err);
            }
            Ok(None) => {
                if capture_redirect {
                    sessions.push_redirect(path);
                    sessions.push_message(MSG_LOGIN_REQUIRED);
                }
                return Err(AuthError::NotLoggedIn);
            }
            Ok(Some(username)) => username,
        };

        match self.store.get(&username).await {
            Ok(_) => Ok(AuthenticatedUser::new(username)),
            Err(UserStoreError::NotFound(_)) => {
                warn!(%username, "session names a deleted user");
                sessions.clear_username();
                if capture_redirect {
                    sessions.push_redirect(path);
                    sessions.push_message(MSG_LOGIN_REQUIRED);
                }
                Err(AuthError::UserNotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn resolve_role(&self, requested: &str) -> AuthResult<String> {
        if requested.is_empty() {
            return Ok(self.default_role.clone());
        }
        self.roles.rank(requested)?;
        Ok(requested.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::HashingError;
    use crate::session::{AUTH_COOKIE, REDIRECTS_COOKIE};
    use crate::testing::Browser;
    use turnstile_core::StoreResult;
    use turnstile_infra::InMemoryUserStore;

    /// Run one authorizer call as a request from `browser` to `path`, then
    /// let the browser keep whatever cookies the response set.
    macro_rules! step {
        ($browser:expr, $path:expr, |$req:ident, $res:ident| $call:expr) => {{
            let headers = $browser.headers();
            let mut response = Response::new(());
            let $req = IncomingRequest::new(&headers, $path);
            let $res = &mut response;
            let out = $call;
            $browser.absorb(&response);
            (out, response)
        }};
    }

    fn cheap_hasher() -> Arc<dyn PasswordHasher> {
        Arc::new(Argon2Hasher::with_cost(1024, 1, 1).unwrap())
    }

    fn setup() -> (Authorizer, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        let roles = RoleTable::new([("user", 40), ("admin", 80)]).unwrap();
        let auth = Authorizer::new(store.clone(), b"test-key", "user", roles)
            .unwrap()
            .with_hasher(cheap_hasher());
        (auth, store)
    }

    fn alice() -> UserRecord {
        UserRecord::new("alice", "alice@x.com")
    }

    async fn registered(auth: &Authorizer, user: UserRecord, password: &str) {
        let mut browser = Browser::default();
        let (out, _) = step!(browser, "/register", |req, res| auth
            .register(req, res, user, password)
            .await);
        out.unwrap();
    }

    async fn logged_in(auth: &Authorizer, username: &str, password: &str) -> Browser {
        let mut browser = Browser::default();
        let (out, _) = step!(browser, "/login", |req, res| auth
            .login(req, res, username, password, "/")
            .await);
        out.unwrap();
        browser
    }

    fn drain(auth: &Authorizer, browser: &mut Browser) -> Vec<String> {
        step!(browser, "/", |req, res| auth.messages(req, res)).0
    }

    #[test]
    fn construction_validates_configuration() {
        let store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let roles = || RoleTable::new([("user", 40)]).unwrap();
        assert_eq!(
            Authorizer::new(store.clone(), b"k", "admin", roles()).unwrap_err(),
            ConfigError::UnknownDefaultRole("admin".into())
        );
        assert_eq!(
            Authorizer::new(store, b"", "user", roles()).unwrap_err(),
            ConfigError::EmptySigningKey
        );
    }

    #[tokio::test]
    async fn register_stores_a_verifiable_hash() {
        let (auth, store) = setup();
        let mut browser = Browser::default();
        let (out, res) = step!(browser, "/register", |req, res| auth
            .register(req, res, alice(), "pw123")
            .await);
        out.unwrap();
        assert!(res.headers().get(header::SET_COOKIE).is_none());

        let stored = store.get("alice").await.unwrap();
        assert_eq!(stored.role, "user");
        assert_eq!(stored.email, "alice@x.com");
        let hasher = Argon2Hasher::default();
        assert!(hasher.verify(&stored.password_hash, "alice", "pw123"));
        assert!(!hasher.verify(&stored.password_hash, "alice", "pw124"));
    }

    #[tokio::test]
    async fn register_twice_keeps_the_first_record() {
        let (auth, store) = setup();
        registered(&auth, alice().with_role("admin"), "pw123").await;

        let mut browser = Browser::default();
        let (out, _) = step!(browser, "/register", |req, res| auth
            .register(req, res, UserRecord::new("alice", "other@x.com"), "zzz")
            .await);
        assert_eq!(out, Err(AuthError::UserAlreadyExists));
        assert_eq!(drain(&auth, &mut browser), [MSG_USERNAME_TAKEN]);

        let stored = store.get("alice").await.unwrap();
        assert_eq!(stored.role, "admin");
        assert_eq!(stored.email, "alice@x.com");
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let (auth, store) = setup();
        let mut browser = Browser::default();

        let mut hashed = alice();
        hashed.password_hash = b"precomputed".to_vec();
        let cases = [
            (UserRecord::new("", "a@x.com"), "pw"),
            (UserRecord::new("alice", ""), "pw"),
            (alice(), ""),
            (hashed, "pw"),
        ];
        for (user, password) in cases {
            let (out, _) = step!(browser, "/register", |req, res| auth
                .register(req, res, user, password)
                .await);
            assert!(matches!(out, Err(AuthError::InvalidRegistration(_))));
        }

        let (out, _) = step!(browser, "/register", |req, res| auth
            .register(req, res, alice().with_role("root"), "pw")
            .await);
        assert_eq!(out, Err(AuthError::UnknownRole("root".into())));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_surfaces_store_failures_as_messages() {
        struct ReadOnly;

        #[async_trait::async_trait]
        impl UserStore for ReadOnly {
            async fn get(&self, username: &str) -> StoreResult<UserRecord> {
                Err(UserStoreError::NotFound(username.to_string()))
            }
            async fn save(&self, _user: UserRecord) -> StoreResult<()> {
                Err(UserStoreError::storage("read-only"))
            }
            async fn list(&self) -> StoreResult<Vec<UserRecord>> {
                Ok(Vec::new())
            }
            async fn delete(&self, username: &str) -> StoreResult<()> {
                Err(UserStoreError::DeleteOfMissing(username.to_string()))
            }
            async fn close(&self) {}
        }

        let roles = RoleTable::new([("user", 40)]).unwrap();
        let auth = Authorizer::new(Arc::new(ReadOnly), b"k", "user", roles)
            .unwrap()
            .with_hasher(cheap_hasher());
        let mut browser = Browser::default();
        let (out, _) = step!(browser, "/register", |req, res| auth
            .register(req, res, alice(), "pw")
            .await);
        assert!(matches!(out, Err(AuthError::Store(_))));
        assert_eq!(drain(&auth, &mut browser), ["storage error: read-only"]);
    }

    #[tokio::test]
    async fn login_redirects_and_authenticates() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;

        let mut browser = Browser::default();
        let (out, res) = step!(browser, "/login", |req, res| auth
            .login(req, res, "alice", "pw123", "/home")
            .await);
        out.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/home");
        assert!(browser.has(AUTH_COOKIE));

        let (who, _) = step!(browser, "/", |req, res| auth
            .authorize(req, res, true)
            .await);
        assert_eq!(who.unwrap().username(), "alice");
    }

    #[tokio::test]
    async fn bad_credentials_share_one_message_and_leave_auth_alone() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;

        let mut browser = Browser::default();
        let (out, res) = step!(browser, "/login", |req, res| auth
            .login(req, res, "alice", "wrong", "/")
            .await);
        assert_eq!(out, Err(AuthError::PasswordMismatch));
        assert_ne!(res.status(), StatusCode::SEE_OTHER);
        assert!(!browser.has(AUTH_COOKIE));
        assert_eq!(drain(&auth, &mut browser), [MSG_INVALID_CREDENTIALS]);

        let (out, _) = step!(browser, "/login", |req, res| auth
            .login(req, res, "mallory", "pw123", "/")
            .await);
        assert_eq!(out, Err(AuthError::UserNotFound));
        assert!(!browser.has(AUTH_COOKIE));
        assert_eq!(drain(&auth, &mut browser), [MSG_INVALID_CREDENTIALS]);
    }

    #[tokio::test]
    async fn unknown_usernames_still_cost_a_verify() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counting {
            inner: Argon2Hasher,
            verifies: AtomicUsize,
        }

        impl PasswordHasher for Counting {
            fn hash(&self, username: &str, password: &str) -> Result<Vec<u8>, HashingError> {
                self.inner.hash(username, password)
            }
            fn verify(&self, stored: &[u8], username: &str, password: &str) -> bool {
                self.verifies.fetch_add(1, Ordering::SeqCst);
                self.inner.verify(stored, username, password)
            }
        }

        let hasher = Arc::new(Counting {
            inner: Argon2Hasher::with_cost(1024, 1, 1).unwrap(),
            verifies: AtomicUsize::new(0),
        });
        let (auth, _) = setup();
        let auth = auth.with_hasher(hasher.clone());

        let mut browser = Browser::default();
        let (out, _) = step!(browser, "/login", |req, res| auth
            .login(req, res, "mallory", "pw123", "/")
            .await);
        assert_eq!(out, Err(AuthError::UserNotFound));
        assert_eq!(hasher.verifies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn login_returns_to_the_first_blocked_page() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;
        let mut browser = Browser::default();

        let (out, _) = step!(browser, "/secret", |req, res| auth
            .authorize(req, res, true)
            .await);
        assert_eq!(out, Err(AuthError::NotLoggedIn));
        assert!(browser.has(REDIRECTS_COOKIE));
        let (out, _) = step!(browser, "/other", |req, res| auth
            .authorize(req, res, true)
            .await);
        assert_eq!(out, Err(AuthError::NotLoggedIn));

        let (out, res) = step!(browser, "/login", |req, res| auth
            .login(req, res, "alice", "pw123", "/")
            .await);
        out.unwrap();
        assert_eq!(res.headers()[header::LOCATION], "/secret");
        assert!(!browser.has(REDIRECTS_COOKIE));
        assert_eq!(
            drain(&auth, &mut browser),
            [MSG_LOGIN_REQUIRED, MSG_LOGIN_REQUIRED]
        );

        step!(browser, "/logout", |req, res| auth.logout(req, res));
        let (out, res) = step!(browser, "/login", |req, res| auth
            .login(req, res, "alice", "pw123", "/")
            .await);
        out.unwrap();
        assert_eq!(res.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn login_as_the_current_user_is_rejected() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;
        registered(&auth, UserRecord::new("bob", "bob@x.com"), "pw").await;
        let mut browser = logged_in(&auth, "alice", "pw123").await;

        let (out, _) = step!(browser, "/login", |req, res| auth
            .login(req, res, "alice", "pw123", "/")
            .await);
        assert_eq!(out, Err(AuthError::AlreadyAuthenticated));

        let (out, _) = step!(browser, "/login", |req, res| auth
            .login(req, res, "bob", "pw", "/")
            .await);
        out.unwrap();
        let (who, _) = step!(browser, "/", |req, res| auth
            .authorize(req, res, false)
            .await);
        assert_eq!(who.unwrap().username(), "bob");
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;
        let mut browser = logged_in(&auth, "alice", "pw123").await;

        step!(browser, "/logout", |req, res| auth.logout(req, res));
        assert!(!browser.has(AUTH_COOKIE));
        step!(browser, "/logout", |req, res| auth.logout(req, res));
        assert!(!browser.has(AUTH_COOKIE));

        let (out, _) = step!(browser, "/", |req, res| auth
            .authorize(req, res, false)
            .await);
        assert_eq!(out, Err(AuthError::NotLoggedIn));
        assert_eq!(drain(&auth, &mut browser), [MSG_LOGGED_OUT, MSG_LOGGED_OUT]);
        assert!(drain(&auth, &mut browser).is_empty());
    }

    #[tokio::test]
    async fn stale_sessions_heal_themselves() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;
        let mut browser = logged_in(&auth, "alice", "pw123").await;

        auth.delete_user("alice").await.unwrap();
        let (out, _) = step!(browser, "/secret", |req, res| auth
            .authorize(req, res, true)
            .await);
        assert_eq!(out, Err(AuthError::UserNotFound));
        assert!(!browser.has(AUTH_COOKIE));

        let (out, _) = step!(browser, "/secret", |req, res| auth
            .authorize(req, res, true)
            .await);
        assert_eq!(out, Err(AuthError::NotLoggedIn));
    }

    #[tokio::test]
    async fn forged_session_captures_redirect_without_message() {
        let (auth, _) = setup();
        let mut browser = Browser::default();
        browser.set_raw(AUTH_COOKIE, "eyJ1c2VybmFtZSI6ImFkbWluIn0");

        let (out, _) = step!(browser, "/admin", |req, res| auth
            .authorize(req, res, true)
            .await);
        assert_eq!(out, Err(AuthError::SessionUnavailable));
        assert!(browser.has(REDIRECTS_COOKIE));
        assert!(drain(&auth, &mut browser).is_empty());
    }

    #[tokio::test]
    async fn unknown_role_is_checked_before_the_session() {
        let (auth, _) = setup();
        let mut browser = Browser::default();
        let (out, res) = step!(browser, "/admin", |req, res| auth
            .authorize_role(req, res, "root", true)
            .await);
        assert_eq!(out, Err(AuthError::UnknownRole("root".into())));
        assert!(res.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn roles_gate_by_rank() {
        let (auth, store) = setup();
        registered(&auth, alice(), "pw123").await;
        registered(&auth, UserRecord::new("root", "r@x.com").with_role("admin"), "pw").await;

        let mut user = logged_in(&auth, "alice", "pw123").await;
        let (out, _) = step!(user, "/admin", |req, res| auth
            .authorize_role(req, res, "admin", true)
            .await);
        assert_eq!(
            out,
            Err(AuthError::InsufficientRole {
                required: "admin".into()
            })
        );
        assert_eq!(drain(&auth, &mut user), [MSG_INSUFFICIENT_ROLE]);
        let (out, _) = step!(user, "/", |req, res| auth
            .authorize_role(req, res, "user", true)
            .await);
        assert_eq!(out.unwrap().username(), "alice");

        let mut admin = logged_in(&auth, "root", "pw").await;
        for role in ["user", "admin"] {
            let (out, _) = step!(admin, "/admin", |req, res| auth
                .authorize_role(req, res, role, true)
                .await);
            assert_eq!(out.unwrap().username(), "root");
        }

        // A role dropped from the table no longer grants anything.
        let mut demoted = store.get("alice").await.unwrap();
        demoted.role = "retired".into();
        store.save(demoted).await.unwrap();
        let (out, _) = step!(user, "/", |req, res| auth
            .authorize_role(req, res, "user", false)
            .await);
        assert!(matches!(out, Err(AuthError::InsufficientRole { .. })));
    }

    #[tokio::test]
    async fn update_changes_only_what_is_given() {
        let (auth, store) = setup();
        registered(&auth, alice(), "pw123").await;
        let original = store.get("alice").await.unwrap();
        let mut browser = Browser::default();

        let (out, _) = step!(browser, "/change", |req, res| auth
            .update(req, res, "alice", "", "new@x.com")
            .await);
        out.unwrap();
        let updated = store.get("alice").await.unwrap();
        assert_eq!(updated.email, "new@x.com");
        assert_eq!(updated.password_hash, original.password_hash);

        let (out, _) = step!(browser, "/change", |req, res| auth
            .update(req, res, "alice", "fresh", "")
            .await);
        out.unwrap();
        let updated = store.get("alice").await.unwrap();
        assert_eq!(updated.email, "new@x.com");
        let hasher = Argon2Hasher::default();
        assert!(hasher.verify(&updated.password_hash, "alice", "fresh"));
        assert!(!hasher.verify(&updated.password_hash, "alice", "pw123"));
    }

    #[tokio::test]
    async fn update_without_username_targets_the_session_user() {
        let (auth, store) = setup();
        registered(&auth, alice(), "pw123").await;

        let mut anonymous = Browser::default();
        let (out, _) = step!(anonymous, "/change", |req, res| auth
            .update(req, res, "", "", "x@x.com")
            .await);
        assert_eq!(out, Err(AuthError::NotLoggedIn));

        let mut browser = logged_in(&auth, "alice", "pw123").await;
        let (out, _) = step!(browser, "/change", |req, res| auth
            .update(req, res, "", "", "me@x.com")
            .await);
        out.unwrap();
        assert_eq!(store.get("alice").await.unwrap().email, "me@x.com");

        let (out, _) = step!(browser, "/change", |req, res| auth
            .update(req, res, "ghost", "pw", "")
            .await);
        assert_eq!(out, Err(AuthError::UserNotFound));
        assert_eq!(drain(&auth, &mut browser), [MSG_USER_MISSING]);
    }

    #[tokio::test]
    async fn self_service_update_clears_a_stale_session() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;
        let mut browser = logged_in(&auth, "alice", "pw123").await;
        auth.delete_user("alice").await.unwrap();

        let (out, _) = step!(browser, "/change", |req, res| auth
            .update(req, res, "", "", "new@x.com")
            .await);
        assert_eq!(out, Err(AuthError::UserNotFound));
        assert!(!browser.has(AUTH_COOKIE));
        assert_eq!(drain(&auth, &mut browser), [MSG_USER_MISSING]);

        let (out, _) = step!(browser, "/change", |req, res| auth
            .update(req, res, "", "", "new@x.com")
            .await);
        assert_eq!(out, Err(AuthError::NotLoggedIn));
    }

    #[tokio::test]
    async fn delete_reports_missing_users() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;
        auth.delete_user("alice").await.unwrap();
        assert_eq!(
            auth.delete_user("alice").await,
            Err(AuthError::DeleteOfMissingUser)
        );
        assert!(auth.users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn current_user_returns_the_full_record() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;

        let mut anonymous = Browser::default();
        let (out, _) = step!(anonymous, "/", |req, res| auth
            .current_user(req, res)
            .await);
        assert_eq!(out, Err(AuthError::NotLoggedIn));

        let mut browser = logged_in(&auth, "alice", "pw123").await;
        let (out, _) = step!(browser, "/", |req, res| auth
            .current_user(req, res)
            .await);
        let user = out.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@x.com");
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_authorizer() {
        let (auth, _) = setup();
        registered(&auth, alice(), "pw123").await;
        registered(&auth, UserRecord::new("bob", "bob@x.com"), "pw").await;

        let tasks = ["alice", "bob", "alice", "bob"].map(|name| {
            let auth = auth.clone();
            tokio::spawn(async move {
                let password = if name == "alice" { "pw123" } else { "pw" };
                let mut browser = logged_in(&auth, name, password).await;
                let (who, _) = step!(browser, "/", |req, res| auth
                    .authorize(req, res, false)
                    .await);
                (name, who.unwrap().into_username())
            })
        });
        for task in tasks {
            let (expected, actual) = task.await.unwrap();
            assert_eq!(expected, actual);
        }
    }
}
