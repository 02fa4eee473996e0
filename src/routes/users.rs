use crate::{AppState, handlers::users};
use axum::{
    Router,
    routing::{get, put},
};

/// Users Router Module
///
/// Mounted under `/users`. Admins are redirected to their own dashboard by the
/// edge guard; handlers take the `Member` extractor.
pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(users::user_dashboard))
        .route("/profile", put(users::update_profile))
}
