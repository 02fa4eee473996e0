use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Failures of credential and session operations against the auth service.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Not signed in")]
    MissingSession,

    #[error("Invalid or expired link. Please request a new one.")]
    InvalidLink,

    #[error("Session expired. Please request a new link.")]
    SessionExpired,

    /// The auth service understood the request and refused it (weak password,
    /// address already registered, ...). Carries the service's own message.
    #[error("{0}")]
    Rejected(String),

    #[error("Auth service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A read or write against one of the backend collections failed.
#[derive(Error, Debug)]
#[error("query against {collection} failed: {source}")]
pub struct QueryError {
    pub collection: &'static str,
    #[source]
    pub source: sqlx::Error,
}

impl QueryError {
    pub fn new(collection: &'static str, source: sqlx::Error) -> Self {
        Self { collection, source }
    }
}

/// The object store could not sign an upload.
#[derive(Error, Debug)]
#[error("storage request failed: {0}")]
pub struct StorageError(pub String);

/// One rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Form checks that failed before any write was attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("{}", first_message(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

fn first_message(fields: &[FieldError]) -> &'static str {
    fields.first().map(|f| f.message).unwrap_or("Invalid input")
}

impl ValidationError {
    pub fn single(field: &'static str, message: &'static str) -> Self {
        Self {
            fields: vec![FieldError { field, message }],
        }
    }

    pub fn push(&mut self, field: &'static str, message: &'static str) {
        self.fields.push(FieldError { field, message });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Ok when nothing was pushed, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn message_for(&self, field: &str) -> Option<&'static str> {
        self.fields.iter().find(|f| f.field == field).map(|f| f.message)
    }
}

/// Error type returned by every fallible handler.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Not found")]
    NotFound,
}

/// ErrorBody
///
/// JSON shape of every error response, rendered by the front end as an inline alert.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Auth(AuthError::Rejected(_)) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::Transport(_)) => StatusCode::BAD_GATEWAY,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Query(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(ValidationError { fields }) => ErrorBody {
                error: first_message(&fields).to_string(),
                fields,
            },
            AppError::Query(e) => {
                // Backend details stay in the logs.
                tracing::error!(collection = e.collection, error = ?e.source, "query failed");
                ErrorBody {
                    error: "Something went wrong. Please try again.".to_string(),
                    fields: vec![],
                }
            }
            AppError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                ErrorBody {
                    error: "Upload could not be prepared".to_string(),
                    fields: vec![],
                }
            }
            AppError::Auth(AuthError::Transport(e)) => {
                tracing::error!(error = %e, "auth service transport failure");
                ErrorBody {
                    error: "Authentication service unavailable".to_string(),
                    fields: vec![],
                }
            }
            other => ErrorBody {
                error: other.to_string(),
                fields: vec![],
            },
        };

        (status, Json(body)).into_response()
    }
}
