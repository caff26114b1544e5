//! Pages for any logged-in user.

use axum::{
    Extension, Form,
    extract::State,
    http::{HeaderMap, Uri},
    response::Response,
};
use tracing::debug;

use turnstile_auth::AuthenticatedUser;

use crate::app::AppState;
use crate::app::dto::{ChangeForm, HomePage};
use crate::app::routes::common::{blank, incoming, render, see_other};

pub async fn home(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let req = incoming(&headers, &uri);
    let mut res = blank();

    let user = match state.auth.current_user(req, &mut res).await {
        Ok(user) => user,
        Err(err) => {
            debug!(error = %err, "session ended before the page rendered");
            return see_other(res, "/login");
        }
    };
    let messages = state.auth.messages(req, &mut res);

    render(
        res,
        &HomePage {
            user: user.into(),
            messages,
        },
    )
}

/// Change the caller's own email and/or password. The target comes from the
/// session cookie, not from the form.
pub async fn change(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<ChangeForm>,
) -> Response {
    let mut res = blank();
    if let Err(err) = state
        .auth
        .update(
            incoming(&headers, &uri),
            &mut res,
            "",
            &form.new_password,
            &form.new_email,
        )
        .await
    {
        debug!(username = user.username(), error = %err, "account update failed");
    }
    see_other(res, "/")
}
