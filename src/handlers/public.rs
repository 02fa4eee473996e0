use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, MaybeSession, Member},
    error::AppError,
    models::{
        AuthResponse, BlogPost, Inquiry, InquiryForm, Profile, Review, ReviewForm, SessionUser,
        Trek, TrekDetails, TrekFilter,
    },
    validation,
};

/// Number of treks on the home page carousel.
const FEATURED_LIMIT: i64 = 10;

/// health
///
/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// list_treks
///
/// [Public Route] The whole catalogue, narrowed by exact-match filters. Filtering
/// runs over the fetched list, so an unknown filter value simply yields nothing.
#[utoipa::path(
    get,
    path = "/treks",
    params(TrekFilter),
    responses((status = 200, description = "Matching treks", body = [Trek]))
)]
pub async fn list_treks(
    State(state): State<AppState>,
    Query(filter): Query<TrekFilter>,
) -> Json<Vec<Trek>> {
    let treks = state.repo.list_treks().await;
    Json(filter.apply(treks))
}

/// featured_treks
#[utoipa::path(
    get,
    path = "/treks/featured",
    responses((status = 200, description = "Featured treks", body = [Trek]))
)]
pub async fn featured_treks(State(state): State<AppState>) -> Json<Vec<Trek>> {
    Json(state.repo.featured_treks(FEATURED_LIMIT).await)
}

/// get_trek
///
/// [Public Route] Trek page: the trek and its reviews, newest first. Both reads
/// are issued together.
#[utoipa::path(
    get,
    path = "/treks/{id}",
    params(("id" = Uuid, Path, description = "Trek ID")),
    responses(
        (status = 200, description = "Found", body = TrekDetails),
        (status = 404, description = "No such trek")
    )
)]
pub async fn get_trek(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrekDetails>, AppError> {
    let (trek, reviews) = tokio::join!(state.repo.get_trek(id), state.repo.reviews_for_trek(id));
    let trek = trek.ok_or(AppError::NotFound)?;
    Ok(Json(TrekDetails { trek, reviews }))
}

/// list_posts
#[utoipa::path(
    get,
    path = "/blog",
    responses((status = 200, description = "Published posts, newest first", body = [BlogPost]))
)]
pub async fn list_posts(State(state): State<AppState>) -> Json<Vec<BlogPost>> {
    Json(state.repo.published_posts().await)
}

/// get_post
///
/// Unpublished posts are indistinguishable from missing ones.
#[utoipa::path(
    get,
    path = "/blog/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Found", body = BlogPost),
        (status = 404, description = "No such published post")
    )
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPost>, AppError> {
    state
        .repo
        .published_post(&slug)
        .await
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// create_inquiry
///
/// [Public Route] Booking request from a trek's contact form. Anyone may send
/// one; a signed-in sender is linked through `user_id`. Nothing is written unless
/// every field passes validation.
#[utoipa::path(
    post,
    path = "/treks/{id}/inquiries",
    params(("id" = Uuid, Path, description = "Trek ID")),
    request_body = InquiryForm,
    responses(
        (status = 201, description = "Inquiry recorded", body = Inquiry),
        (status = 404, description = "No such trek"),
        (status = 422, description = "Form errors")
    )
)]
pub async fn create_inquiry(
    MaybeSession(session): MaybeSession,
    State(state): State<AppState>,
    Path(trek_id): Path<Uuid>,
    Json(form): Json<InquiryForm>,
) -> Result<(StatusCode, Json<Inquiry>), AppError> {
    let user_id = session.map(|user| user.id);
    let inquiry = validation::validate_inquiry(trek_id, user_id, &form)?;

    if state.repo.get_trek(trek_id).await.is_none() {
        return Err(AppError::NotFound);
    }

    let created = state.repo.create_inquiry(inquiry).await?;
    tracing::info!(inquiry_id = %created.id, trek_id = %trek_id, "inquiry received");
    Ok((StatusCode::CREATED, Json(created)))
}

/// create_review
///
/// [Authenticated Route] Rejected with 401 when signed out; a missing star rating
/// is a form error.
#[utoipa::path(
    post,
    path = "/treks/{id}/reviews",
    params(("id" = Uuid, Path, description = "Trek ID")),
    request_body = ReviewForm,
    responses(
        (status = 201, description = "Review posted", body = Review),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such trek"),
        (status = 422, description = "Form errors")
    )
)]
pub async fn create_review(
    user: SessionUser,
    State(state): State<AppState>,
    Path(trek_id): Path<Uuid>,
    Json(form): Json<ReviewForm>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review = validation::validate_review(trek_id, &user, &form)?;

    if state.repo.get_trek(trek_id).await.is_none() {
        return Err(AppError::NotFound);
    }

    let created = state.repo.create_review(review).await?;
    tracing::info!(review_id = %created.id, trek_id = %trek_id, user_id = %user.id, "review posted");
    Ok((StatusCode::CREATED, Json(created)))
}

/// get_profile
///
/// [Member Page] The caller's own profile row.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 307, description = "Not signed in, sent to login"),
        (status = 404, description = "Profile row missing")
    )
)]
pub async fn get_profile(
    Member(user): Member,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    state
        .repo
        .get_profile(user.id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// logout
///
/// Revokes the session at the auth service when one is presented and always
/// clears the session cookies.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Signed out", body = AuthResponse))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = auth::access_token(&headers) {
        if let Err(e) = state.auth.sign_out(token).await {
            tracing::warn!(error = %e, "sign out at auth service failed");
        }
    }

    let [access, refresh] = auth::cleared_cookies();
    (
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        Json(AuthResponse {
            redirect_to: "/".to_string(),
            user: None,
            message: None,
        }),
    )
}
