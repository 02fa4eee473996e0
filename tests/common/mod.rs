//! Shared fixtures: an in-memory `Repository`, a scripted `AuthApi`, token
//! minting and a one-shot request helper for the router.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use sqlx::types::Json;
use tokio::sync::Notify;
use tower::ServiceExt;
use trektrail::{
    AppState,
    auth::{AUDIENCE, AppMetadata, Claims, UserMetadata},
    config::{AppConfig, Env},
    error::{AuthError, QueryError},
    models::{
        BlogPost, DashboardStats, INQUIRY_PENDING, Inquiry, NewInquiry, NewReview, Profile,
        ProfileUpdate, Review, Role, Session, SessionUser, Trek, TrekInput, TrekUpdate,
    },
    repository::Repository,
    storage::MockStorageService,
    supabase::AuthApi,
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

// --- Identities ---

pub fn member() -> SessionUser {
    SessionUser {
        id: Uuid::from_u128(1),
        email: Some("hiker@trektrail.com".to_string()),
        role: Role::User,
        full_name: Some("Pema Sherpa".to_string()),
    }
}

pub fn admin() -> SessionUser {
    SessionUser {
        id: Uuid::from_u128(2),
        email: Some("admin@trektrail.com".to_string()),
        role: Role::Admin,
        full_name: Some("Site Admin".to_string()),
    }
}

pub fn profile_for(user: &SessionUser) -> Profile {
    Profile {
        id: user.id,
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        phone: None,
        role: user.role.as_str().to_string(),
        created_at: Utc::now(),
    }
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

/// A Supabase-shaped access token for `user`, signed with `secret`.
pub fn mint_token(user: &SessionUser, secret: &str, ttl_secs: i64) -> String {
    let iat = now();
    let claims = Claims {
        sub: user.id,
        iat,
        exp: (iat as i64 + ttl_secs).max(0) as usize,
        aud: Some(AUDIENCE.to_string()),
        email: user.email.clone(),
        app_metadata: AppMetadata {
            role: Some(user.role.as_str().to_string()),
        },
        user_metadata: UserMetadata {
            full_name: user.full_name.clone(),
        },
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn session_for(user: &SessionUser) -> Session {
    Session {
        access_token: mint_token(user, TEST_JWT_SECRET, 3600),
        refresh_token: format!("refresh-{}", user.id),
        expires_at: Utc::now().timestamp() + 3600,
        user: user.clone(),
    }
}

pub fn bearer(user: &SessionUser) -> String {
    format!("Bearer {}", mint_token(user, TEST_JWT_SECRET, 3600))
}

// --- Catalogue fixtures ---

pub fn trek(title: &str, region: &str, difficulty: &str, season: &str) -> Trek {
    Trek {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: format!("{} trek", title),
        region: region.to_string(),
        difficulty: difficulty.to_string(),
        season: season.to_string(),
        duration_days: 12,
        itinerary: Json(vec![]),
        created_at: Utc::now(),
        ..Trek::default()
    }
}

pub fn post(slug: &str, published: bool) -> BlogPost {
    BlogPost {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        title: slug.replace('-', " "),
        author: "TrekTrail".to_string(),
        content: "<p>Notes from the trail</p>".to_string(),
        published,
        created_at: Utc::now(),
        ..BlogPost::default()
    }
}

// --- In-memory repository ---

/// Keeps every collection in memory and counts writes, so tests can check
/// that rejected forms never reached the backend.
#[derive(Default)]
pub struct MockRepo {
    pub treks: Mutex<Vec<Trek>>,
    pub profiles: Mutex<Vec<Profile>>,
    pub inquiries: Mutex<Vec<Inquiry>>,
    pub reviews: Mutex<Vec<Review>>,
    pub posts: Mutex<Vec<BlogPost>>,
    pub writes: Mutex<Vec<&'static str>>,
    /// `get_profile` for these ids waits until the gate is notified.
    pub profile_gates: Mutex<HashMap<Uuid, Arc<Notify>>>,
    /// Every write fails when set.
    pub fail_writes: bool,
}

impl MockRepo {
    pub fn with_profiles(profiles: Vec<Profile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
            ..Self::default()
        }
    }

    pub fn add_trek(&self, trek: Trek) -> Uuid {
        let id = trek.id;
        self.treks.lock().unwrap().push(trek);
        id
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn gate_profile(&self, id: Uuid) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.profile_gates.lock().unwrap().insert(id, gate.clone());
        gate
    }

    fn record(&self, what: &'static str) -> Result<(), QueryError> {
        if self.fail_writes {
            return Err(QueryError::new(what, sqlx::Error::PoolTimedOut));
        }
        self.writes.lock().unwrap().push(what);
        Ok(())
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn list_treks(&self) -> Vec<Trek> {
        self.treks.lock().unwrap().clone()
    }
    async fn featured_treks(&self, limit: i64) -> Vec<Trek> {
        self.treks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.featured)
            .take(limit as usize)
            .cloned()
            .collect()
    }
    async fn get_trek(&self, id: Uuid) -> Option<Trek> {
        self.treks.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }
    async fn create_trek(&self, input: TrekInput) -> Result<Trek, QueryError> {
        self.record("treks")?;
        let trek = Trek {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            region: input.region,
            difficulty: input.difficulty,
            season: input.season,
            duration_days: input.duration_days,
            max_elevation_m: input.max_elevation_m,
            price: input.price,
            itinerary: Json(input.itinerary),
            images: input.images,
            latitude: input.latitude,
            longitude: input.longitude,
            featured: input.featured,
            created_at: Utc::now(),
        };
        self.treks.lock().unwrap().push(trek.clone());
        Ok(trek)
    }
    async fn update_trek(&self, id: Uuid, update: TrekUpdate) -> Result<Option<Trek>, QueryError> {
        self.record("treks")?;
        let mut treks = self.treks.lock().unwrap();
        let Some(trek) = treks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            trek.title = title;
        }
        if let Some(region) = update.region {
            trek.region = region;
        }
        if let Some(featured) = update.featured {
            trek.featured = featured;
        }
        if let Some(days) = update.duration_days {
            trek.duration_days = days;
        }
        Ok(Some(trek.clone()))
    }
    async fn delete_trek(&self, id: Uuid) -> Result<bool, QueryError> {
        self.record("treks")?;
        let mut treks = self.treks.lock().unwrap();
        let before = treks.len();
        treks.retain(|t| t.id != id);
        Ok(treks.len() < before)
    }

    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        let gate = self.profile_gates.lock().unwrap().get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.profiles.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }
    async fn list_profiles(&self) -> Vec<Profile> {
        self.profiles.lock().unwrap().clone()
    }
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<Profile>, QueryError> {
        self.record("profiles")?;
        let mut profiles = self.profiles.lock().unwrap();
        let Some(profile) = profiles.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = update.full_name {
            profile.full_name = (!name.is_empty()).then_some(name);
        }
        if let Some(phone) = update.phone {
            profile.phone = (!phone.is_empty()).then_some(phone);
        }
        Ok(Some(profile.clone()))
    }
    async fn sync_profile_role(&self, id: Uuid, role: Role) -> Result<bool, QueryError> {
        self.record("profiles")?;
        let mut profiles = self.profiles.lock().unwrap();
        match profiles.iter_mut().find(|p| p.id == id) {
            Some(profile) if profile.role != role.as_str() => {
                profile.role = role.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry, QueryError> {
        self.record("inquiries")?;
        let created = Inquiry {
            id: Uuid::new_v4(),
            trek_id: inquiry.trek_id,
            user_id: inquiry.user_id,
            name: inquiry.name,
            email: inquiry.email,
            phone: inquiry.phone,
            message: inquiry.message,
            status: INQUIRY_PENDING.to_string(),
            created_at: Utc::now(),
        };
        self.inquiries.lock().unwrap().push(created.clone());
        Ok(created)
    }
    async fn list_inquiries(&self) -> Vec<Inquiry> {
        self.inquiries.lock().unwrap().clone()
    }
    async fn list_user_inquiries(&self, user_id: Uuid) -> Vec<Inquiry> {
        self.inquiries
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.user_id == Some(user_id))
            .cloned()
            .collect()
    }
    async fn set_inquiry_status(&self, id: Uuid, status: String) -> Result<Option<Inquiry>, QueryError> {
        self.record("inquiries")?;
        let mut inquiries = self.inquiries.lock().unwrap();
        Ok(inquiries.iter_mut().find(|i| i.id == id).map(|inquiry| {
            inquiry.status = status;
            inquiry.clone()
        }))
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, QueryError> {
        self.record("reviews")?;
        let created = Review {
            id: Uuid::new_v4(),
            trek_id: review.trek_id,
            user_id: review.user_id,
            full_name: review.full_name,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };
        self.reviews.lock().unwrap().push(created.clone());
        Ok(created)
    }
    async fn reviews_for_trek(&self, trek_id: Uuid) -> Vec<Review> {
        self.reviews
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.trek_id == trek_id)
            .cloned()
            .collect()
    }
    async fn list_reviews(&self) -> Vec<Review> {
        self.reviews.lock().unwrap().clone()
    }
    async fn list_user_reviews(&self, user_id: Uuid) -> Vec<Review> {
        self.reviews
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }
    async fn delete_review(&self, id: Uuid) -> Result<bool, QueryError> {
        self.record("reviews")?;
        let mut reviews = self.reviews.lock().unwrap();
        let before = reviews.len();
        reviews.retain(|r| r.id != id);
        Ok(reviews.len() < before)
    }

    async fn published_posts(&self) -> Vec<BlogPost> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.published)
            .cloned()
            .collect()
    }
    async fn published_post(&self, slug: &str) -> Option<BlogPost> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.published && p.slug == slug)
            .cloned()
    }
    async fn get_stats(&self) -> DashboardStats {
        DashboardStats {
            treks: self.treks.lock().unwrap().len() as i64,
            users: self.profiles.lock().unwrap().len() as i64,
            inquiries: self.inquiries.lock().unwrap().len() as i64,
            reviews: self.reviews.lock().unwrap().len() as i64,
        }
    }
}

// --- Scripted auth service ---

/// Knows a fixed set of accounts and records every call it receives.
#[derive(Default)]
pub struct MockAuth {
    /// email -> (password, user)
    pub accounts: Mutex<HashMap<String, (String, SessionUser)>>,
    /// Session handed out by `set_session`; `None` makes it fail.
    pub link_session: Mutex<Option<Session>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockAuth {
    pub fn with_account(email: &str, password: &str, user: SessionUser) -> Self {
        let auth = Self::default();
        auth.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user));
        auth
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl AuthApi for MockAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.call("sign_in_with_password");
        match self.accounts.lock().unwrap().get(email) {
            Some((expected, user)) if expected == password => Ok(session_for(user)),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
    async fn sign_up(&self, email: &str, _password: &str, full_name: &str) -> Result<(), AuthError> {
        self.call("sign_up");
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(AuthError::Rejected("User already registered".to_string()));
        }
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            role: Role::User,
            full_name: Some(full_name.to_string()),
        };
        accounts.insert(email.to_string(), (String::new(), user));
        Ok(())
    }
    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        self.call("sign_out");
        Ok(())
    }
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> Result<(), AuthError> {
        self.call(&format!("reset_password_for_email:{}:{}", email, redirect_to));
        Ok(())
    }
    async fn get_user(&self, _access_token: &str) -> Result<SessionUser, AuthError> {
        self.call("get_user");
        self.link_session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(AuthError::SessionExpired)
    }
    async fn refresh(&self, _refresh_token: &str) -> Result<Session, AuthError> {
        self.call("refresh");
        self.link_session.lock().unwrap().clone().ok_or(AuthError::SessionExpired)
    }
    async fn set_session(&self, _access_token: &str, _refresh_token: &str) -> Result<Session, AuthError> {
        self.call("set_session");
        self.link_session.lock().unwrap().clone().ok_or(AuthError::SessionExpired)
    }
    async fn update_user(&self, _access_token: &str, _password: &str) -> Result<(), AuthError> {
        self.call("update_user");
        Ok(())
    }
}

// --- State and requests ---

pub fn test_config(env: Env) -> AppConfig {
    AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

pub fn test_state(repo: Arc<MockRepo>, auth: Arc<MockAuth>) -> AppState {
    AppState {
        repo,
        auth,
        storage: Arc::new(MockStorageService::new()),
        config: test_config(Env::Production),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get("location")
            .and_then(|value| value.to_str().ok())
    }
}

/// Sends one request through the router; non-JSON bodies come back as `Null`.
pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str, auth_header: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = auth_header {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(
    method: &str,
    uri: &str,
    auth_header: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(value) = auth_header {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
