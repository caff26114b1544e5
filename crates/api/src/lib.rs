//! HTTP API: a small demo server putting the authorizer behind Axum routes.

pub mod app;
pub mod config;
pub mod middleware;
