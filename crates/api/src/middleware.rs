//! Session checks in front of protected routes.
//!
//! On success the [`AuthenticatedUser`] is placed in request extensions for
//! handlers. On an authentication failure the client is sent to `/login`; the
//! cookies written during the check (captured redirect, flash message, expired
//! session) are kept on whatever response goes out.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use turnstile_auth::{AuthError, AuthResult, AuthenticatedUser, IncomingRequest};

use crate::app::AppState;
use crate::app::errors;
use crate::app::routes::common::see_other;
use crate::app::services::ADMIN_ROLE;

pub async fn require_login(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut gate = Response::new(Body::empty());
    let outcome = state
        .auth
        .authorize(
            IncomingRequest::new(req.headers(), req.uri().path()),
            &mut gate,
            true,
        )
        .await;
    admit(outcome, req, gate, next).await
}

pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut gate = Response::new(Body::empty());
    let outcome = state
        .auth
        .authorize_role(
            IncomingRequest::new(req.headers(), req.uri().path()),
            &mut gate,
            ADMIN_ROLE,
            true,
        )
        .await;
    admit(outcome, req, gate, next).await
}

async fn admit(
    outcome: AuthResult<AuthenticatedUser>,
    mut req: Request,
    gate: Response,
    next: Next,
) -> Response {
    match outcome {
        Ok(user) => {
            req.extensions_mut().insert(user);
            let mut res = next.run(req).await;
            carry_cookies(&gate, &mut res);
            res
        }
        Err(
            err @ (AuthError::NotLoggedIn
            | AuthError::SessionUnavailable
            | AuthError::UserNotFound
            | AuthError::InsufficientRole { .. }),
        ) => {
            debug!(path = %req.uri().path(), error = %err, "request refused");
            see_other(gate, "/login")
        }
        Err(err) => {
            error!(path = %req.uri().path(), error = %err, "authorization check failed");
            let mut res = errors::auth_error_to_response(&err);
            carry_cookies(&gate, &mut res);
            res
        }
    }
}

fn carry_cookies(from: &Response, to: &mut Response) {
    for value in from.headers().get_all(header::SET_COOKIE) {
        to.headers_mut().append(header::SET_COOKIE, value.clone());
    }
}
