use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::Member,
    error::AppError,
    models::{Profile, ProfileUpdate, UserDashboard},
    validation,
};

/// user_dashboard
///
/// [Member Page] The caller's profile with their own reviews and inquiries. The
/// three reads are independent and run together; a failed read shows up as an
/// empty section.
#[utoipa::path(
    get,
    path = "/users/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = UserDashboard),
        (status = 307, description = "Signed out or admin, redirected")
    )
)]
pub async fn user_dashboard(Member(user): Member, State(state): State<AppState>) -> Json<UserDashboard> {
    let (profile, reviews, inquiries) = tokio::join!(
        state.repo.get_profile(user.id),
        state.repo.list_user_reviews(user.id),
        state.repo.list_user_inquiries(user.id),
    );
    Json(UserDashboard {
        profile,
        reviews,
        inquiries,
    })
}

/// update_profile
///
/// [Member Page] Edits the caller's display name and phone. Blank values clear
/// the field.
#[utoipa::path(
    put,
    path = "/users/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated", body = Profile),
        (status = 404, description = "Profile row missing"),
        (status = 422, description = "Invalid phone number")
    )
)]
pub async fn update_profile(
    Member(user): Member,
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    validation::validate_profile_update(&update)?;

    let trimmed = ProfileUpdate {
        full_name: update.full_name.map(|name| name.trim().to_string()),
        phone: update.phone.map(|phone| phone.trim().to_string()),
    };
    let profile = state
        .repo
        .update_profile(user.id, trimmed)
        .await?
        .ok_or(AppError::NotFound)?;

    tracing::info!(user_id = %user.id, "profile updated");
    Ok(Json(profile))
}
