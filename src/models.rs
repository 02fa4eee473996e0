use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity ---

/// Role
///
/// Authorization tier. The auth-provider metadata is the source of truth; the
/// `profiles.role` column mirrors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Anything other than `admin` (including a missing value) is a regular user.
    pub fn from_metadata(value: Option<&str>) -> Self {
        match value {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Landing page for a signed-in user of this role.
    pub fn dashboard(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::User => "/users/dashboard",
        }
    }
}

/// SessionUser
///
/// The identity carried by a verified session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub full_name: Option<String>,
}

/// Session
///
/// An authenticated login as issued by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which the access token is rejected.
    pub expires_at: i64,
    pub user: SessionUser,
}

/// Profile
///
/// Row of the `profiles` table, keyed by the auth user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    /// Cached copy of the auth metadata role, stored as text.
    pub role: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn role(&self) -> Role {
        Role::from_metadata(Some(self.role.as_str()))
    }
}

// --- Catalogue ---

/// One day of a trek itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ItineraryDay {
    pub day: i32,
    pub title: String,
    pub description: String,
}

/// Trek
///
/// Row of the `treks` table. The itinerary is stored as a JSONB array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Trek {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub region: String,
    pub difficulty: String,
    pub season: String,
    pub duration_days: i32,
    pub max_elevation_m: Option<i32>,
    pub price: Option<f64>,
    #[ts(as = "Vec<ItineraryDay>")]
    #[schema(value_type = Vec<ItineraryDay>)]
    pub itinerary: Json<Vec<ItineraryDay>>,
    pub images: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub featured: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// TrekFilter
///
/// Query parameters of `GET /treks`. Filtering happens in memory over the
/// already-fetched list; an empty or missing field matches everything.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrekFilter {
    pub difficulty: Option<String>,
    pub region: Option<String>,
    pub season: Option<String>,
}

impl TrekFilter {
    pub fn matches(&self, trek: &Trek) -> bool {
        fn field_matches(wanted: &Option<String>, actual: &str) -> bool {
            match wanted.as_deref() {
                None | Some("") => true,
                Some(w) => w == actual,
            }
        }

        field_matches(&self.difficulty, &trek.difficulty)
            && field_matches(&self.region, &trek.region)
            && field_matches(&self.season, &trek.season)
    }

    pub fn apply(&self, treks: Vec<Trek>) -> Vec<Trek> {
        treks.into_iter().filter(|t| self.matches(t)).collect()
    }
}

/// TrekDetails
///
/// Trek page payload: the trek plus its reviews, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TrekDetails {
    pub trek: Trek,
    pub reviews: Vec<Review>,
}

// --- Engagement ---

pub const INQUIRY_PENDING: &str = "pending";

/// Inquiry
///
/// A booking request sent through a trek's contact form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Inquiry {
    pub id: Uuid,
    pub trek_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub status: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub id: Uuid,
    pub trek_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub rating: i16,
    pub comment: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// BlogPost
///
/// `content` is stored and served as raw HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub author: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// InquiryForm
///
/// Contact form body (POST /treks/{id}/inquiries).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InquiryForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub message: String,
}

/// Validated inquiry, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInquiry {
    pub trek_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
}

/// ReviewForm
///
/// Review body (POST /treks/{id}/reviews). `rating` stays optional so a missing
/// star rating is reported as a form error rather than a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReviewForm {
    #[ts(type = "number | null")]
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub trek_id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub rating: i16,
    pub comment: String,
}

/// TrekInput
///
/// Admin create payload (POST /admin/treks).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TrekInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub region: String,
    pub difficulty: String,
    pub season: String,
    pub duration_days: i32,
    pub max_elevation_m: Option<i32>,
    pub price: Option<f64>,
    #[serde(default)]
    pub itinerary: Vec<ItineraryDay>,
    #[serde(default)]
    pub images: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub featured: bool,
}

/// TrekUpdate
///
/// Partial update (PUT /admin/treks/{id}); only provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TrekUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_elevation_m: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Vec<ItineraryDay>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

/// ProfileUpdate
///
/// Self-service profile edit (PUT /users/profile).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// InquiryStatusUpdate
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct InquiryStatusUpdate {
    pub status: String,
}

/// LoginForm
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// RegisterForm
///
/// The password only passes through to the auth service; it is never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub full_name: String,
}

/// ForgotPasswordForm
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// UpdatePasswordForm
///
/// Tokens come from the recovery link the auth service emailed to the user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePasswordForm {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub password: String,
    pub confirm_password: String,
}

/// ConfirmForm
///
/// Payload of an email confirmation or recovery link.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ConfirmForm {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// `signup`, `recovery`, `invite`, ...
    #[serde(rename = "type", default)]
    pub link_type: String,
}

/// PresignedUrlRequest
///
/// Request for a short-lived upload URL for a trek image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "annapurna.jpg")]
    pub filename: String,
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

/// PresignedUrlResponse
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    /// Object key to store in the trek's `images` list once the upload completes.
    pub resource_key: String,
}

// --- Responses ---

/// AuthResponse
///
/// Result of a successful auth flow: who is signed in (if anyone) and where the
/// front end should navigate next.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub redirect_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// DashboardStats
///
/// Exact row counts for the admin dashboard (GET /admin/dashboard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub treks: i64,
    pub users: i64,
    pub inquiries: i64,
    pub reviews: i64,
}

/// UserDashboard
///
/// GET /users/dashboard: the caller's profile and their own activity.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserDashboard {
    pub profile: Option<Profile>,
    pub reviews: Vec<Review>,
    pub inquiries: Vec<Inquiry>,
}
