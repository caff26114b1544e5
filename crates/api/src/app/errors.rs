use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use turnstile_auth::AuthError;

pub fn auth_error_to_response(err: &AuthError) -> axum::response::Response {
    match err {
        AuthError::NotLoggedIn | AuthError::SessionUnavailable | AuthError::PasswordMismatch => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string())
        }
        AuthError::InsufficientRole { .. } => {
            json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
        }
        AuthError::UserNotFound | AuthError::DeleteOfMissingUser => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        AuthError::UserAlreadyExists | AuthError::AlreadyAuthenticated => {
            json_error(StatusCode::CONFLICT, "conflict", err.to_string())
        }
        AuthError::InvalidRegistration(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        AuthError::UnknownRole(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "misconfigured_role",
            err.to_string(),
        ),
        AuthError::Store(_) | AuthError::Hashing(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
