use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    response::Redirect,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, AuthError},
    guard::{self, Decision},
    models::{Role, Session, SessionUser},
    repository::RepositoryState,
};

/// Audience Supabase stamps on access tokens of signed-in users.
pub const AUDIENCE: &str = "authenticated";
pub const ACCESS_COOKIE: &str = "sb-access-token";
pub const REFRESH_COOKIE: &str = "sb-refresh-token";
/// Local development only: resolves the session from a profile id.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of a Supabase access token. The role lives in `app_metadata`, which
/// only the service role can write, so it is trusted as the authorization signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The auth user id; also the primary key of `profiles`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl Claims {
    pub fn into_user(self) -> SessionUser {
        SessionUser {
            id: self.sub,
            email: self.email,
            role: Role::from_metadata(self.app_metadata.role.as_deref()),
            full_name: self.user_metadata.full_name,
        }
    }
}

/// Verifies an access token's signature, expiry and audience.
pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_audience(&[AUDIENCE]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::SessionExpired,
            _ => AuthError::MissingSession,
        })
}

/// Access token from `Authorization: Bearer ...`, falling back to the session cookie.
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .or_else(|| cookie_value(headers, ACCESS_COOKIE))
}

/// Value of the named cookie across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// resolve_session
///
/// Request-scoped session resolution used by the edge guard and the extractors.
/// Never fails: anything short of a valid token means "signed out".
///
/// In `Env::Local` a profile id in `x-user-id` is accepted first, provided the
/// profile exists; production ignores the header entirely.
pub async fn resolve_session(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Option<SessionUser> {
    if config.env == Env::Local {
        let dev_id = headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok());
        if let Some(id) = dev_id {
            if let Some(profile) = repo.get_profile(id).await {
                tracing::debug!(user_id = %id, "session resolved through local bypass");
                return Some(SessionUser {
                    id: profile.id,
                    email: profile.email.clone(),
                    role: profile.role(),
                    full_name: profile.full_name.clone(),
                });
            }
        }
    }

    let token = access_token(headers)?;
    match decode_access_token(token, &config.jwt_secret) {
        Ok(claims) => Some(claims.into_user()),
        Err(e) => {
            tracing::debug!(reason = %e, "access token rejected");
            None
        }
    }
}

/// `Set-Cookie` values that store a freshly issued session.
pub fn session_cookies(session: &Session, config: &AppConfig) -> [HeaderValue; 2] {
    let max_age = (session.expires_at - chrono::Utc::now().timestamp()).max(0);
    let secure = if config.env == Env::Production { "; Secure" } else { "" };

    let access = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        ACCESS_COOKIE, session.access_token, max_age, secure
    );
    // The refresh token outlives the access token; the browser keeps it for the session.
    let refresh = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax{}",
        REFRESH_COOKIE, session.refresh_token, secure
    );

    [cookie_header(access), cookie_header(refresh)]
}

/// `Set-Cookie` values that drop the session.
pub fn cleared_cookies() -> [HeaderValue; 2] {
    [
        cookie_header(format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", ACCESS_COOKIE)),
        cookie_header(format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", REFRESH_COOKIE)),
    ]
}

fn cookie_header(value: String) -> HeaderValue {
    // Tokens are base64url/JWT text, always valid header bytes.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""))
}

// --- Extractors ---

/// SessionUser Extractor
///
/// For form submissions and API calls that need a signed-in caller. Rejects with
/// 401 rather than redirecting.
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_session(&parts.headers, &repo, &config)
            .await
            .ok_or(AppError::Auth(AuthError::MissingSession))
    }
}

/// MaybeSession
///
/// The caller's identity when signed in, `None` otherwise. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        Ok(MaybeSession(resolve_session(&parts.headers, &repo, &config).await))
    }
}

/// Member
///
/// Page-tier guard for pages that need any signed-in user. Signed-out visitors
/// are redirected to the login page.
#[derive(Debug, Clone)]
pub struct Member(pub SessionUser);

/// Admin
///
/// Page-tier guard for back-office pages. This is the only role check admin
/// handlers rely on; non-admins are redirected to their profile.
#[derive(Debug, Clone)]
pub struct Admin(pub SessionUser);

async fn page_guard<S>(parts: &Parts, state: &S, required: Option<Role>) -> Result<SessionUser, Redirect>
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    let repo = RepositoryState::from_ref(state);
    let config = AppConfig::from_ref(state);
    let session = resolve_session(&parts.headers, &repo, &config).await;
    let role = session.as_ref().map(|user| user.role);

    match (guard::require(required, session.as_ref(), role), session) {
        (Decision::Allow, Some(user)) => Ok(user),
        (Decision::Redirect(target), _) => Err(Redirect::temporary(&target)),
        // `require` never allows a missing session.
        (Decision::Allow, None) => Err(Redirect::temporary(guard::LOGIN_PATH)),
    }
}

impl<S> FromRequestParts<S> for Member
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        page_guard(parts, state, None).await.map(Member)
    }
}

impl<S> FromRequestParts<S> for Admin
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        page_guard(parts, state, Some(Role::Admin)).await.map(Admin)
    }
}
