//! Login, registration and logout.

use axum::{
    Form,
    extract::State,
    http::{HeaderMap, Uri},
    response::Response,
};
use tracing::debug;

use turnstile_auth::AuthError;
use turnstile_core::UserRecord;

use crate::app::AppState;
use crate::app::dto::{LoginForm, LoginPage, RegisterForm};
use crate::app::routes::common::{blank, incoming, render, see_other};

/// Pending flash messages; rendering them clears them.
pub async fn login_page(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let mut res = blank();
    let messages = state.auth.messages(incoming(&headers, &uri), &mut res);
    render(res, &LoginPage { messages })
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Response {
    let mut res = blank();
    match state
        .auth
        .login(incoming(&headers, &uri), &mut res, &form.username, &form.password, "/")
        .await
    {
        // The authorizer has already set the 303.
        Ok(()) => res,
        Err(AuthError::AlreadyAuthenticated) => see_other(res, "/"),
        Err(err) => {
            debug!(username = %form.username, error = %err, "login refused");
            see_other(res, "/login")
        }
    }
}

/// Self-service sign-up; a successful registration logs the new user in.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<RegisterForm>,
) -> Response {
    let req = incoming(&headers, &uri);
    let mut res = blank();

    let user = UserRecord::new(form.username.clone(), form.email);
    if let Err(err) = state.auth.register(req, &mut res, user, &form.password).await {
        debug!(username = %form.username, error = %err, "registration refused");
        return see_other(res, "/login");
    }

    match state
        .auth
        .login(req, &mut res, &form.username, &form.password, "/")
        .await
    {
        Ok(()) => res,
        Err(_) => see_other(res, "/login"),
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let mut res = blank();
    state.auth.logout(incoming(&headers, &uri), &mut res);
    see_other(res, "/")
}
