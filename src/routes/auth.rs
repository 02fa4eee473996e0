use crate::{AppState, handlers::auth};
use axum::{Router, routing::post};

/// Auth Router Module
///
/// Mounted under `/auth`. The edge guard sends signed-in visitors to their
/// dashboard before any of these handlers run.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/login?redirectTo=...
        .route("/login", post(auth::login))
        // POST /auth/register
        // New accounts always start with the `user` role.
        .route("/register", post(auth::register))
        .route("/forgot-password", post(auth::forgot_password))
        // POST /auth/update-password
        // Second half of recovery; the body carries the emailed link's tokens.
        .route("/update-password", post(auth::update_password))
        // POST /auth/confirm
        // Exchanges an emailed signup/recovery link for a session.
        .route("/confirm", post(auth::confirm))
}
