//! User administration. Every route here sits behind the admin role check.

use axum::{
    Form,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use turnstile_core::UserRecord;

use crate::app::AppState;
use crate::app::dto::{AddUserForm, AdminPage, RoleView, UserView};
use crate::app::errors;
use crate::app::routes::common::{blank, incoming, render, see_other};

pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Response {
    let req = incoming(&headers, &uri);
    let mut res = blank();

    let me = match state.auth.current_user(req, &mut res).await {
        Ok(user) => user,
        Err(err) => {
            debug!(error = %err, "session ended before the page rendered");
            return see_other(res, "/login");
        }
    };
    let mut users = match state.auth.users().await {
        Ok(users) => users,
        Err(err) => return errors::auth_error_to_response(&err),
    };
    users.sort_by(|a, b| a.username.cmp(&b.username));

    let roles = state
        .auth
        .roles()
        .iter()
        .map(|(name, rank)| RoleView {
            name: name.to_string(),
            rank,
        })
        .collect();
    let messages = state.auth.messages(req, &mut res);

    render(
        res,
        &AdminPage {
            user: me.into(),
            users: users.into_iter().map(UserView::from).collect(),
            roles,
            messages,
        },
    )
}

/// Register a user with an explicit role. Failures show up as messages on the
/// dashboard.
pub async fn add_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Form(form): Form<AddUserForm>,
) -> Response {
    let mut res = blank();
    let user = UserRecord::new(form.username, form.email).with_role(form.role);
    let username = user.username.clone();

    match state
        .auth
        .register(incoming(&headers, &uri), &mut res, user, &form.password)
        .await
    {
        Ok(()) => info!(%username, "user added by admin"),
        Err(err) => debug!(%username, error = %err, "admin could not add user"),
    }
    see_other(res, "/admin")
}

pub async fn delete_user(State(state): State<AppState>, Path(username): Path<String>) -> Response {
    match state.auth.delete_user(&username).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => errors::auth_error_to_response(&err),
    }
}
