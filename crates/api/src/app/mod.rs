//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/authorizer construction and the admin bootstrap
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: form inputs and JSON page views
//! - `errors.rs`: consistent error responses

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppState;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    // Any logged-in user.
    let account = Router::new()
        .route("/", get(routes::account::home))
        .route("/change", post(routes::account::change))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_login));

    // Admin role only.
    let admin = Router::new()
        .route("/admin", get(routes::admin::dashboard))
        .route("/admin/users", post(routes::admin::add_user))
        .route("/admin/users/:username", delete(routes::admin::delete_user))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_admin));

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/login",
            get(routes::session::login_page).post(routes::session::login),
        )
        .route("/register", post(routes::session::register))
        .route(
            "/logout",
            get(routes::session::logout).post(routes::session::logout),
        )
        .merge(account)
        .merge(admin)
        .with_state(state)
}
