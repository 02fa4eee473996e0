use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session resolution and access policy.
pub mod auth;
pub mod guard;
pub mod session;
pub mod supabase;

// Data access and domain types.
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod storage;
pub mod validation;

// HTTP surface.
pub mod handlers;
pub mod routes;
use routes::{admin, auth as auth_routes, public, users};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};
pub use supabase::{AuthState, SupabaseAuth};

/// ApiDoc
///
/// OpenAPI document for every handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::public::health, handlers::public::list_treks, handlers::public::featured_treks,
        handlers::public::get_trek, handlers::public::list_posts, handlers::public::get_post,
        handlers::public::create_inquiry, handlers::public::create_review,
        handlers::public::get_profile, handlers::public::logout,
        handlers::auth::login, handlers::auth::register, handlers::auth::forgot_password,
        handlers::auth::update_password, handlers::auth::confirm,
        handlers::users::user_dashboard, handlers::users::update_profile,
        handlers::admin::admin_dashboard, handlers::admin::list_treks, handlers::admin::create_trek,
        handlers::admin::update_trek, handlers::admin::delete_trek, handlers::admin::list_users,
        handlers::admin::list_inquiries, handlers::admin::update_inquiry_status,
        handlers::admin::list_reviews, handlers::admin::delete_review,
        handlers::admin::presigned_upload
    ),
    components(
        schemas(
            models::Role, models::SessionUser, models::Profile, models::Trek, models::ItineraryDay,
            models::TrekDetails, models::Inquiry, models::Review, models::BlogPost,
            models::InquiryForm, models::ReviewForm, models::TrekInput, models::TrekUpdate,
            models::ProfileUpdate, models::InquiryStatusUpdate, models::LoginForm,
            models::RegisterForm, models::ForgotPasswordForm, models::UpdatePasswordForm,
            models::ConfirmForm, models::PresignedUrlRequest, models::PresignedUrlResponse,
            models::AuthResponse, models::DashboardStats, models::UserDashboard,
            error::ErrorBody, error::FieldError,
        )
    ),
    tags(
        (name = "trektrail", description = "TrekTrail travel site API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Everything a request may need, cloned per request. All members are shared
/// handles or immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    /// Hosted auth service (GoTrue).
    pub auth: AuthState,
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routers, puts the edge guard in front of all of them and wraps
/// the result in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/auth", auth_routes::auth_routes())
        .nest("/users", users::users_routes())
        .nest("/admin", admin::admin_routes())
        // Edge guard: sees every request, including unmatched paths under the
        // guarded prefixes, before any handler.
        .layer(middleware::from_fn_with_state(state.clone(), guard::enforce))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Request span carrying the `x-request-id`, so every log line of one request
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
