//! Route guard.
//!
//! A single policy decides, from `(path, session, role)` alone, whether a page
//! may be shown or where the visitor must be sent instead. It is enforced at the
//! edge by [`enforce`] (middleware over every request) and at the page tier by
//! [`require`] (the `Member`/`Admin` extractors and `SessionProvider::navigate`).

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use url::form_urlencoded;

use crate::{
    AppState, auth,
    models::{Role, SessionUser},
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const PROFILE_PATH: &str = "/profile";

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// True when `path` is `prefix` itself or lies below it (`/admin`, `/admin/x`, not `/administrator`).
pub fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Paths the edge guard has an opinion about.
pub fn is_guarded(path: &str) -> bool {
    is_under(path, "/admin") || is_under(path, "/users") || is_under(path, "/auth")
}

/// evaluate
///
/// Edge policy, first match wins:
///
/// | condition | decision |
/// |---|---|
/// | `/admin` or `/users`, no session | login, carrying `redirectTo=<path>` |
/// | `/admin`, role is not admin | `/users/dashboard` |
/// | `/users`, role is admin | `/admin/dashboard` |
/// | `/auth`, signed in | the role's dashboard |
/// | anything else | allow |
///
/// `session` is whatever identity the caller resolved; `role` is passed
/// separately because the client tier may hold a session whose role is not yet
/// (or could not be) resolved.
pub fn evaluate(path: &str, session: Option<&SessionUser>, role: Option<Role>) -> Decision {
    let admin_area = is_under(path, "/admin");
    let user_area = is_under(path, "/users");

    if session.is_none() {
        if admin_area || user_area {
            return Decision::Redirect(login_redirect(path));
        }
        return Decision::Allow;
    }

    if admin_area && role != Some(Role::Admin) {
        return Decision::Redirect(Role::User.dashboard().to_string());
    }
    if user_area && role == Some(Role::Admin) {
        return Decision::Redirect(Role::Admin.dashboard().to_string());
    }
    if is_under(path, "/auth") {
        return Decision::Redirect(role.unwrap_or_default().dashboard().to_string());
    }

    Decision::Allow
}

/// require
///
/// Page-tier wrapper: a page that needs a signed-in visitor, optionally with a
/// given role. Signed-out visitors go to the login page, wrong-role visitors to
/// their profile.
pub fn require(
    required: Option<Role>,
    session: Option<&SessionUser>,
    role: Option<Role>,
) -> Decision {
    if session.is_none() {
        return Decision::Redirect(LOGIN_PATH.to_string());
    }
    match required {
        Some(needed) if role != Some(needed) => Decision::Redirect(PROFILE_PATH.to_string()),
        _ => Decision::Allow,
    }
}

/// Login URL that brings the visitor back to `path` afterwards.
pub fn login_redirect(path: &str) -> String {
    format!("{}?redirectTo={}", LOGIN_PATH, encode_query_value(path))
}

/// Form-encodes a query value, leaving `/` readable.
fn encode_query_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace("%2F", "/")
}

/// Accepts a post-login target only when it stays on this site.
pub fn safe_redirect_target(target: Option<&str>) -> Option<&str> {
    target.filter(|t| t.starts_with('/') && !t.starts_with("//") && !t.contains('\\'))
}

/// enforce
///
/// Edge middleware. Every request under `/admin`, `/users` or `/auth` has its
/// session resolved from the request alone and is checked against [`evaluate`]
/// before any handler runs.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if !is_guarded(&path) {
        return next.run(request).await;
    }

    let session = auth::resolve_session(request.headers(), &state.repo, &state.config).await;
    let role = session.as_ref().map(|user| user.role);

    match evaluate(&path, session.as_ref(), role) {
        Decision::Allow => next.run(request).await,
        Decision::Redirect(target) => {
            tracing::info!(
                path = %path,
                target = %target,
                signed_in = session.is_some(),
                "edge guard redirect"
            );
            Redirect::temporary(&target).into_response()
        }
    }
}
