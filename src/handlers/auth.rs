//! Sign-in, registration and password recovery.
//!
//! The edge guard only lets signed-out visitors reach these routes. Every flow
//! answers with an [`AuthResponse`] telling the front end where to go next.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    AppState,
    auth::{cleared_cookies, session_cookies},
    error::{AppError, AuthError},
    guard::{self, LOGIN_PATH},
    models::{
        AuthResponse, ConfirmForm, ForgotPasswordForm, LoginForm, RegisterForm, Session,
        SessionUser, UpdatePasswordForm,
    },
    repository::RepositoryState,
    validation,
};

const UPDATE_PASSWORD_PATH: &str = "/auth/update-password";
const RECOVERY_LINK: &str = "recovery";

/// LoginQuery
///
/// Where to return after signing in; set by the edge guard's login redirect.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

/// Brings the cached profile role in line with the auth metadata. Failures are
/// logged and never block the sign-in.
async fn sync_role_cache(repo: &RepositoryState, user: &SessionUser) {
    let Some(profile) = repo.get_profile(user.id).await else {
        tracing::warn!(user_id = %user.id, "signed-in user has no profile row");
        return;
    };
    if profile.role() == user.role {
        return;
    }
    tracing::warn!(
        user_id = %user.id,
        cached = %profile.role,
        metadata = user.role.as_str(),
        "profile role out of date, syncing"
    );
    if let Err(e) = repo.sync_profile_role(user.id, user.role).await {
        tracing::error!(error = %e, "failed to sync profile role");
    }
}

/// JSON body plus the cookies that carry `session`.
fn signed_in(state: &AppState, session: &Session, body: AuthResponse) -> Response {
    let [access, refresh] = session_cookies(session, &state.config);
    (
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        Json(body),
    )
        .into_response()
}

/// login
///
/// [Auth Route] Password sign-in. A local `redirectTo` is honoured; anything else
/// falls back to the role's dashboard.
#[utoipa::path(
    post,
    path = "/auth/login",
    params(LoginQuery),
    request_body = LoginForm,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 422, description = "Missing fields")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    Json(form): Json<LoginForm>,
) -> Result<Response, AppError> {
    validation::validate_login(&form)?;

    let session = state
        .auth
        .sign_in_with_password(form.email.trim(), &form.password)
        .await?;
    let user = session.user.clone();
    sync_role_cache(&state.repo, &user).await;

    let redirect_to = guard::safe_redirect_target(query.redirect_to.as_deref())
        .unwrap_or(user.role.dashboard())
        .to_string();
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "signed in");

    Ok(signed_in(
        &state,
        &session,
        AuthResponse {
            redirect_to,
            user: Some(user),
            message: None,
        },
    ))
}

/// register
///
/// [Auth Route] Creates an account with the `user` role. The auth service emails
/// a confirmation link; nobody is signed in yet.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterForm,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Refused by the auth service"),
        (status = 422, description = "Form errors")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    validation::validate_registration(&form)?;

    state
        .auth
        .sign_up(form.email.trim(), &form.password, form.full_name.trim())
        .await?;
    tracing::info!("account registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            redirect_to: LOGIN_PATH.to_string(),
            user: None,
            message: Some("Check your email to confirm your account.".to_string()),
        }),
    ))
}

/// forgot_password
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordForm,
    responses(
        (status = 200, description = "Reset link sent", body = AuthResponse),
        (status = 422, description = "Missing or malformed email")
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(form): Json<ForgotPasswordForm>,
) -> Result<Json<AuthResponse>, AppError> {
    validation::validate_email_only(&form.email)?;

    state
        .auth
        .reset_password_for_email(form.email.trim(), &state.config.password_reset_redirect())
        .await?;

    Ok(Json(AuthResponse {
        redirect_to: LOGIN_PATH.to_string(),
        user: None,
        message: Some("Password reset link sent. Check your email.".to_string()),
    }))
}

/// update_password
///
/// [Auth Route] Final step of recovery. The link tokens are adopted as a session,
/// the password is changed and that session is ended again.
#[utoipa::path(
    post,
    path = "/auth/update-password",
    request_body = UpdatePasswordForm,
    responses(
        (status = 200, description = "Password changed", body = AuthResponse),
        (status = 401, description = "Link missing, invalid or expired"),
        (status = 422, description = "Form errors")
    )
)]
pub async fn update_password(
    State(state): State<AppState>,
    Json(form): Json<UpdatePasswordForm>,
) -> Result<Response, AppError> {
    if form.access_token.is_empty() || form.refresh_token.is_empty() {
        return Err(AuthError::InvalidLink.into());
    }
    validation::validate_new_password(&form)?;

    let session = state
        .auth
        .set_session(&form.access_token, &form.refresh_token)
        .await
        .map_err(|e| match e {
            AuthError::Transport(t) => AuthError::Transport(t),
            _ => AuthError::SessionExpired,
        })?;

    state
        .auth
        .update_user(&session.access_token, &form.password)
        .await?;
    tracing::info!(user_id = %session.user.id, "password updated");

    if let Err(e) = state.auth.sign_out(&session.access_token).await {
        tracing::warn!(error = %e, "could not end recovery session");
    }

    let [access, refresh] = cleared_cookies();
    Ok((
        AppendHeaders([(SET_COOKIE, access), (SET_COOKIE, refresh)]),
        Json(AuthResponse {
            redirect_to: LOGIN_PATH.to_string(),
            user: None,
            message: Some("Password updated. Please sign in.".to_string()),
        }),
    )
        .into_response())
}

/// confirm
///
/// [Auth Route] Landing point of emailed links. Signup and invite links sign the
/// user in. Recovery links are checked but set no cookies, so the update-password
/// step stays reachable for a signed-out visitor carrying the link tokens.
#[utoipa::path(
    post,
    path = "/auth/confirm",
    request_body = ConfirmForm,
    responses(
        (status = 200, description = "Link accepted", body = AuthResponse),
        (status = 401, description = "Link missing, invalid or expired")
    )
)]
pub async fn confirm(
    State(state): State<AppState>,
    Json(form): Json<ConfirmForm>,
) -> Result<Response, AppError> {
    if form.access_token.is_empty() || form.refresh_token.is_empty() {
        return Err(AuthError::InvalidLink.into());
    }

    let session = state
        .auth
        .set_session(&form.access_token, &form.refresh_token)
        .await?;
    let user = session.user.clone();

    if form.link_type == RECOVERY_LINK {
        tracing::info!(user_id = %user.id, "recovery link accepted");
        return Ok(Json(AuthResponse {
            redirect_to: UPDATE_PASSWORD_PATH.to_string(),
            user: Some(user),
            message: None,
        })
        .into_response());
    }

    sync_role_cache(&state.repo, &user).await;
    tracing::info!(user_id = %user.id, link = %form.link_type, "email link confirmed");

    Ok(signed_in(
        &state,
        &session,
        AuthResponse {
            redirect_to: "/".to_string(),
            user: Some(user),
            message: None,
        },
    ))
}
