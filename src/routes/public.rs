use crate::{AppState, handlers::public};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Readable by anyone. The two write endpoints differ in who may call them: an
/// inquiry accepts anonymous senders, a review needs a session and answers 401
/// without one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(public::health))
        // GET /treks?difficulty=...&region=...&season=...
        .route("/treks", get(public::list_treks))
        // GET /treks/featured
        // Home page carousel, at most 10 treks.
        .route("/treks/featured", get(public::featured_treks))
        // GET /treks/{id}
        .route("/treks/{id}", get(public::get_trek))
        .route("/treks/{id}/inquiries", post(public::create_inquiry))
        .route("/treks/{id}/reviews", post(public::create_review))
        // GET /blog, /blog/{slug}
        // Published posts only.
        .route("/blog", get(public::list_posts))
        .route("/blog/{slug}", get(public::get_post))
        // GET /profile
        // Guarded at the page tier: signed-out visitors are sent to the login page.
        .route("/profile", get(public::get_profile))
        // POST /logout
        // Lives outside /auth so signed-in users can reach it.
        .route("/logout", post(public::logout))
}
