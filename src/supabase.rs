use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{AppMetadata, UserMetadata},
    error::AuthError,
    models::{Role, Session, SessionUser},
};

/// AuthApi
///
/// Credential lifecycle operations of the hosted auth service (Supabase GoTrue).
/// Stateless: every call carries the tokens it acts on, so one instance serves
/// all requests. `SupabaseAuth` talks to the real service; tests substitute mocks.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Creates the account with `{full_name, role: "user"}` as user metadata. The
    /// service emails a confirmation link.
    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<(), AuthError>;

    /// Revokes the refresh tokens of the session that issued `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Emails a recovery link that lands on `redirect_to`.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError>;

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError>;

    /// Adopts the tokens of an emailed link as a session.
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError>;

    async fn update_user(&self, access_token: &str, password: &str) -> Result<(), AuthError>;
}

/// AuthState
///
/// Shared handle to the auth service, injected through `AppState`.
pub type AuthState = Arc<dyn AuthApi>;

/// GoTrue `user` object.
#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
    #[serde(default)]
    user_metadata: UserMetadata,
}

impl From<GoTrueUser> for SessionUser {
    fn from(user: GoTrueUser) -> Self {
        SessionUser {
            id: user.id,
            email: user.email,
            role: Role::from_metadata(user.app_metadata.role.as_deref()),
            full_name: user.user_metadata.full_name,
        }
    }
}

/// Body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp() + token.expires_in);
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user.into(),
        }
    }
}

/// GoTrue reports errors in a few shapes depending on the endpoint and version.
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GoTrueError {
    fn message(self) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| "Request rejected by the auth service".to_string())
    }
}

/// SupabaseAuth
///
/// `AuthApi` over the GoTrue REST endpoints under `<SUPABASE_URL>/auth/v1`.
#[derive(Clone)]
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AuthError> {
        let response = self
            .request(reqwest::Method::POST, "/token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json::<TokenResponse>().await?.into())
    }
}

/// Passes successful responses through and turns failures into `AuthError`.
async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<GoTrueError>().await.unwrap_or_default();
    tracing::debug!(%status, error = ?body, "auth service rejected request");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::SessionExpired),
        _ => Err(AuthError::Rejected(body.message())),
    }
}

#[async_trait]
impl AuthApi for SupabaseAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
            .map_err(|e| match e {
                // GoTrue answers bad credentials with 400 invalid_grant.
                AuthError::Rejected(_) | AuthError::SessionExpired => AuthError::InvalidCredentials,
                other => other,
            })
    }

    async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<(), AuthError> {
        let response = self
            .request(reqwest::Method::POST, "/signup")
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name, "role": Role::User.as_str() },
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .request(reqwest::Method::POST, "/logout")
            .bearer_auth(access_token)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        let response = self
            .request(reqwest::Method::POST, "/recover")
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AuthError> {
        let response = self
            .request(reqwest::Method::GET, "/user")
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json::<GoTrueUser>().await?.into())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    /// The link's access token must still identify a user; the refresh token is
    /// then exchanged for a session of that same user.
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> Result<Session, AuthError> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(AuthError::InvalidLink);
        }
        let to_expired = |e: AuthError| match e {
            AuthError::Transport(t) => AuthError::Transport(t),
            _ => AuthError::SessionExpired,
        };

        let user = self.get_user(access_token).await.map_err(to_expired)?;
        let session = self.refresh(refresh_token).await.map_err(to_expired)?;
        if session.user.id != user.id {
            tracing::warn!(link_user = %user.id, refreshed_user = %session.user.id, "link tokens belong to different users");
            return Err(AuthError::InvalidLink);
        }
        Ok(session)
    }

    async fn update_user(&self, access_token: &str, password: &str) -> Result<(), AuthError> {
        let response = self
            .request(reqwest::Method::PUT, "/user")
            .bearer_auth(access_token)
            .json(&json!({ "password": password }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
