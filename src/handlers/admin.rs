//! Back-office handlers.
//!
//! Every handler takes the `Admin` extractor, which is the only role check they
//! rely on; the edge guard has already turned non-admins away from `/admin`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::Admin,
    error::{AppError, ValidationError},
    models::{
        DashboardStats, Inquiry, InquiryStatusUpdate, PresignedUrlRequest, PresignedUrlResponse,
        Profile, Review, Trek, TrekInput, TrekUpdate,
    },
    storage, validation,
};

/// admin_dashboard
///
/// [Admin Page] Exact row counts of the four collections.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    responses(
        (status = 200, description = "Counts", body = DashboardStats),
        (status = 307, description = "Not an admin, redirected")
    )
)]
pub async fn admin_dashboard(_: Admin, State(state): State<AppState>) -> Json<DashboardStats> {
    Json(state.repo.get_stats().await)
}

/// list_treks
#[utoipa::path(
    get,
    path = "/admin/treks",
    responses((status = 200, description = "All treks", body = [Trek]))
)]
pub async fn list_treks(_: Admin, State(state): State<AppState>) -> Json<Vec<Trek>> {
    Json(state.repo.list_treks().await)
}

/// create_trek
#[utoipa::path(
    post,
    path = "/admin/treks",
    request_body = TrekInput,
    responses(
        (status = 201, description = "Created", body = Trek),
        (status = 422, description = "Form errors")
    )
)]
pub async fn create_trek(
    Admin(admin): Admin,
    State(state): State<AppState>,
    Json(input): Json<TrekInput>,
) -> Result<(StatusCode, Json<Trek>), AppError> {
    validation::validate_trek(&input)?;
    let trek = state.repo.create_trek(input).await?;
    tracing::info!(admin_id = %admin.id, trek_id = %trek.id, "trek created");
    Ok((StatusCode::CREATED, Json(trek)))
}

/// update_trek
///
/// [Admin Page] Partial update; omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/admin/treks/{id}",
    params(("id" = Uuid, Path, description = "Trek ID")),
    request_body = TrekUpdate,
    responses(
        (status = 200, description = "Updated", body = Trek),
        (status = 404, description = "No such trek"),
        (status = 422, description = "Form errors")
    )
)]
pub async fn update_trek(
    Admin(admin): Admin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<TrekUpdate>,
) -> Result<Json<Trek>, AppError> {
    validation::validate_trek_update(&update)?;
    let trek = state
        .repo
        .update_trek(id, update)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(admin_id = %admin.id, trek_id = %id, "trek updated");
    Ok(Json(trek))
}

/// delete_trek
#[utoipa::path(
    delete,
    path = "/admin/treks/{id}",
    params(("id" = Uuid, Path, description = "Trek ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such trek")
    )
)]
pub async fn delete_trek(
    Admin(admin): Admin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.repo.delete_trek(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(admin_id = %admin.id, trek_id = %id, "trek deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// list_users
#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "All profiles", body = [Profile]))
)]
pub async fn list_users(_: Admin, State(state): State<AppState>) -> Json<Vec<Profile>> {
    Json(state.repo.list_profiles().await)
}

/// list_inquiries
#[utoipa::path(
    get,
    path = "/admin/inquiries",
    responses((status = 200, description = "All inquiries, newest first", body = [Inquiry]))
)]
pub async fn list_inquiries(_: Admin, State(state): State<AppState>) -> Json<Vec<Inquiry>> {
    Json(state.repo.list_inquiries().await)
}

/// update_inquiry_status
///
/// [Admin Page] Moves an inquiry through its workflow (`pending`, `contacted`,
/// `confirmed`, ...). The status is free text, stored lowercase.
#[utoipa::path(
    put,
    path = "/admin/inquiries/{id}/status",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    request_body = InquiryStatusUpdate,
    responses(
        (status = 200, description = "Updated", body = Inquiry),
        (status = 404, description = "No such inquiry"),
        (status = 422, description = "Empty status")
    )
)]
pub async fn update_inquiry_status(
    Admin(admin): Admin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<InquiryStatusUpdate>,
) -> Result<Json<Inquiry>, AppError> {
    let status = validation::validate_inquiry_status(&update.status)?;
    let inquiry = state
        .repo
        .set_inquiry_status(id, status)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(admin_id = %admin.id, inquiry_id = %id, status = %inquiry.status, "inquiry status changed");
    Ok(Json(inquiry))
}

/// list_reviews
#[utoipa::path(
    get,
    path = "/admin/reviews",
    responses((status = 200, description = "All reviews, newest first", body = [Review]))
)]
pub async fn list_reviews(_: Admin, State(state): State<AppState>) -> Json<Vec<Review>> {
    Json(state.repo.list_reviews().await)
}

/// delete_review
///
/// [Admin Page] Moderation: removes any review.
#[utoipa::path(
    delete,
    path = "/admin/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such review")
    )
)]
pub async fn delete_review(
    Admin(admin): Admin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.repo.delete_review(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(admin_id = %admin.id, review_id = %id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// presigned_upload
///
/// [Admin Page] Short-lived URL for uploading a trek image straight to object
/// storage. The returned key goes into the trek's `images` list afterwards.
#[utoipa::path(
    post,
    path = "/admin/uploads/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "Upload URL", body = PresignedUrlResponse),
        (status = 422, description = "Not an image type"),
        (status = 500, description = "Storage unavailable")
    )
)]
pub async fn presigned_upload(
    Admin(admin): Admin,
    State(state): State<AppState>,
    Json(request): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    if !storage::is_image_type(&request.file_type) {
        return Err(ValidationError::single("file_type", "Only image uploads are allowed").into());
    }

    let key = storage::trek_image_key(&request.filename, &request.file_type);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&key, &request.file_type)
        .await?;
    tracing::debug!(admin_id = %admin.id, key = %key, "upload url issued");

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: key,
    }))
}
