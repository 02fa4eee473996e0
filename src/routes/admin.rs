use crate::{AppState, handlers::admin};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Mounted under `/admin`. Two checks stand in front of every handler: the edge
/// guard redirects non-admins to `/users/dashboard`, and the `Admin` extractor
/// each handler takes redirects anything that slips past to `/profile`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/dashboard
        // Exact counts of treks, users, inquiries and reviews.
        .route("/dashboard", get(admin::admin_dashboard))
        // --- Trek catalogue ---
        .route("/treks", get(admin::list_treks).post(admin::create_trek))
        .route(
            "/treks/{id}",
            put(admin::update_trek).delete(admin::delete_trek),
        )
        // POST /admin/uploads/presigned
        // Signed PUT URL for a trek image, valid for 10 minutes.
        .route("/uploads/presigned", post(admin::presigned_upload))
        // --- Oversight ---
        .route("/users", get(admin::list_users))
        .route("/inquiries", get(admin::list_inquiries))
        .route("/inquiries/{id}/status", put(admin::update_inquiry_status))
        // DELETE /admin/reviews/{id}
        // Moderation of any user's review.
        .route("/reviews", get(admin::list_reviews))
        .route("/reviews/{id}", axum::routing::delete(admin::delete_review))
}
