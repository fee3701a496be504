//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET  /status` - Liveness probe
/// - `POST /login` - Email/password login
/// - `POST /register` - Email/password registration
/// - `POST /google-login` - Google ID token login
/// - `GET  /user` - Session-backed identity fetch
pub fn auth_routes() -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/login", post(handlers::login))
        .route("/register", post(handlers::register))
        .route("/google-login", post(handlers::google_login))
        .route("/user", get(handlers::current_user))
}
