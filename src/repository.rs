use crate::{
    error::QueryError,
    models::{
        BlogPost, DashboardStats, INQUIRY_PENDING, Inquiry, NewInquiry, NewReview, Profile,
        ProfileUpdate, Review, Role, Trek, TrekInput, TrekUpdate,
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, types::Json};
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Every read and write the views issue against the backend collections
/// (`treks`, `profiles`, `inquiries`, `reviews`, `blog_posts`).
///
/// Reads return plain values: a failed read is logged and degrades to an empty
/// result, which the pages render the same way as "no data". Writes report
/// failures as `QueryError` so the form can show an inline error.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Treks ---
    async fn list_treks(&self) -> Vec<Trek>;
    async fn featured_treks(&self, limit: i64) -> Vec<Trek>;
    async fn get_trek(&self, id: Uuid) -> Option<Trek>;
    async fn create_trek(&self, input: TrekInput) -> Result<Trek, QueryError>;
    async fn update_trek(&self, id: Uuid, update: TrekUpdate) -> Result<Option<Trek>, QueryError>;
    async fn delete_trek(&self, id: Uuid) -> Result<bool, QueryError>;

    // --- Profiles ---
    async fn get_profile(&self, id: Uuid) -> Option<Profile>;
    async fn list_profiles(&self) -> Vec<Profile>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<Profile>, QueryError>;
    /// Writes the authoritative (auth metadata) role into the profile cache.
    /// Returns true when a row changed.
    async fn sync_profile_role(&self, id: Uuid, role: Role) -> Result<bool, QueryError>;

    // --- Inquiries ---
    async fn create_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry, QueryError>;
    /// Newest first.
    async fn list_inquiries(&self) -> Vec<Inquiry>;
    async fn list_user_inquiries(&self, user_id: Uuid) -> Vec<Inquiry>;
    async fn set_inquiry_status(&self, id: Uuid, status: String) -> Result<Option<Inquiry>, QueryError>;

    // --- Reviews ---
    async fn create_review(&self, review: NewReview) -> Result<Review, QueryError>;
    /// Newest first.
    async fn reviews_for_trek(&self, trek_id: Uuid) -> Vec<Review>;
    /// Newest first.
    async fn list_reviews(&self) -> Vec<Review>;
    async fn list_user_reviews(&self, user_id: Uuid) -> Vec<Review>;
    async fn delete_review(&self, id: Uuid) -> Result<bool, QueryError>;

    // --- Blog ---
    /// Published posts, newest first.
    async fn published_posts(&self) -> Vec<BlogPost>;
    async fn published_post(&self, slug: &str) -> Option<BlogPost>;

    // --- Back-office ---
    async fn get_stats(&self) -> DashboardStats;
}

/// RepositoryState
///
/// Shared handle to the persistence layer, injected through `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

const TREK_COLUMNS: &str = "id, title, description, region, difficulty, season, duration_days, \
     max_elevation_m, price, itinerary, images, latitude, longitude, featured, created_at";
const PROFILE_COLUMNS: &str = "id, email, full_name, phone, role, created_at";
const INQUIRY_COLUMNS: &str =
    "id, trek_id, user_id, name, email, phone, message, status, created_at";
const REVIEW_COLUMNS: &str = "id, trek_id, user_id, full_name, rating, comment, created_at";
const POST_COLUMNS: &str =
    "id, slug, title, author, excerpt, content, cover_image, published, created_at";

/// PostgresRepository
///
/// `Repository` backed by the Supabase Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, table: &'static str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(table, error = ?e, "count failed");
                0
            })
    }
}

/// Logs a failed read and substitutes the empty value.
fn or_empty<T: Default>(result: Result<T, sqlx::Error>, what: &'static str) -> T {
    result.unwrap_or_else(|e| {
        tracing::error!(query = what, error = ?e, "read failed");
        T::default()
    })
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_treks(&self) -> Vec<Trek> {
        let sql = format!("SELECT {} FROM treks ORDER BY created_at DESC", TREK_COLUMNS);
        or_empty(
            sqlx::query_as::<_, Trek>(&sql).fetch_all(&self.pool).await,
            "list_treks",
        )
    }

    async fn featured_treks(&self, limit: i64) -> Vec<Trek> {
        let sql = format!(
            "SELECT {} FROM treks WHERE featured = true ORDER BY created_at DESC LIMIT $1",
            TREK_COLUMNS
        );
        or_empty(
            sqlx::query_as::<_, Trek>(&sql)
                .bind(limit)
                .fetch_all(&self.pool)
                .await,
            "featured_treks",
        )
    }

    async fn get_trek(&self, id: Uuid) -> Option<Trek> {
        let sql = format!("SELECT {} FROM treks WHERE id = $1", TREK_COLUMNS);
        or_empty(
            sqlx::query_as::<_, Trek>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await,
            "get_trek",
        )
    }

    async fn create_trek(&self, input: TrekInput) -> Result<Trek, QueryError> {
        let sql = format!(
            r#"
            INSERT INTO treks (id, title, description, region, difficulty, season, duration_days,
                               max_elevation_m, price, itinerary, images, latitude, longitude,
                               featured, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW())
            RETURNING {}
            "#,
            TREK_COLUMNS
        );
        sqlx::query_as::<_, Trek>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.title)
            .bind(input.description)
            .bind(input.region)
            .bind(input.difficulty)
            .bind(input.season)
            .bind(input.duration_days)
            .bind(input.max_elevation_m)
            .bind(input.price)
            .bind(Json(input.itinerary))
            .bind(input.images)
            .bind(input.latitude)
            .bind(input.longitude)
            .bind(input.featured)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| QueryError::new("treks", e))
    }

    /// Partial update: `COALESCE` keeps the stored value for every absent field.
    async fn update_trek(&self, id: Uuid, update: TrekUpdate) -> Result<Option<Trek>, QueryError> {
        let sql = format!(
            r#"
            UPDATE treks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                region = COALESCE($4, region),
                difficulty = COALESCE($5, difficulty),
                season = COALESCE($6, season),
                duration_days = COALESCE($7, duration_days),
                max_elevation_m = COALESCE($8, max_elevation_m),
                price = COALESCE($9, price),
                itinerary = COALESCE($10, itinerary),
                images = COALESCE($11, images),
                featured = COALESCE($12, featured)
            WHERE id = $1
            RETURNING {}
            "#,
            TREK_COLUMNS
        );
        sqlx::query_as::<_, Trek>(&sql)
            .bind(id)
            .bind(update.title)
            .bind(update.description)
            .bind(update.region)
            .bind(update.difficulty)
            .bind(update.season)
            .bind(update.duration_days)
            .bind(update.max_elevation_m)
            .bind(update.price)
            .bind(update.itinerary.map(Json))
            .bind(update.images)
            .bind(update.featured)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| QueryError::new("treks", e))
    }

    async fn delete_trek(&self, id: Uuid) -> Result<bool, QueryError> {
        sqlx::query("DELETE FROM treks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| QueryError::new("treks", e))
    }

    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        or_empty(
            sqlx::query_as::<_, Profile>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await,
            "get_profile",
        )
    }

    async fn list_profiles(&self) -> Vec<Profile> {
        let sql = format!("SELECT {} FROM profiles ORDER BY created_at DESC", PROFILE_COLUMNS);
        or_empty(
            sqlx::query_as::<_, Profile>(&sql).fetch_all(&self.pool).await,
            "list_profiles",
        )
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<Profile>, QueryError> {
        let sql = format!(
            r#"
            UPDATE profiles
            SET full_name = NULLIF(COALESCE($2, full_name), ''),
                phone = NULLIF(COALESCE($3, phone), '')
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(update.full_name)
            .bind(update.phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| QueryError::new("profiles", e))
    }

    async fn sync_profile_role(&self, id: Uuid, role: Role) -> Result<bool, QueryError> {
        sqlx::query("UPDATE profiles SET role = $2 WHERE id = $1 AND role IS DISTINCT FROM $2")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| QueryError::new("profiles", e))
    }

    async fn create_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry, QueryError> {
        let sql = format!(
            r#"
            INSERT INTO inquiries (id, trek_id, user_id, name, email, phone, message, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING {}
            "#,
            INQUIRY_COLUMNS
        );
        sqlx::query_as::<_, Inquiry>(&sql)
            .bind(Uuid::new_v4())
            .bind(inquiry.trek_id)
            .bind(inquiry.user_id)
            .bind(inquiry.name)
            .bind(inquiry.email)
            .bind(inquiry.phone)
            .bind(inquiry.message)
            .bind(INQUIRY_PENDING)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| QueryError::new("inquiries", e))
    }

    async fn list_inquiries(&self) -> Vec<Inquiry> {
        let sql = format!("SELECT {} FROM inquiries ORDER BY created_at DESC", INQUIRY_COLUMNS);
        or_empty(
            sqlx::query_as::<_, Inquiry>(&sql).fetch_all(&self.pool).await,
            "list_inquiries",
        )
    }

    async fn list_user_inquiries(&self, user_id: Uuid) -> Vec<Inquiry> {
        let sql = format!(
            "SELECT {} FROM inquiries WHERE user_id = $1 ORDER BY created_at DESC",
            INQUIRY_COLUMNS
        );
        or_empty(
            sqlx::query_as::<_, Inquiry>(&sql)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await,
            "list_user_inquiries",
        )
    }

    async fn set_inquiry_status(&self, id: Uuid, status: String) -> Result<Option<Inquiry>, QueryError> {
        let sql = format!(
            "UPDATE inquiries SET status = $2 WHERE id = $1 RETURNING {}",
            INQUIRY_COLUMNS
        );
        sqlx::query_as::<_, Inquiry>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| QueryError::new("inquiries", e))
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, QueryError> {
        let sql = format!(
            r#"
            INSERT INTO reviews (id, trek_id, user_id, full_name, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {}
            "#,
            REVIEW_COLUMNS
        );
        sqlx::query_as::<_, Review>(&sql)
            .bind(Uuid::new_v4())
            .bind(review.trek_id)
            .bind(review.user_id)
            .bind(review.full_name)
            .bind(review.rating)
            .bind(review.comment)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| QueryError::new("reviews", e))
    }

    async fn reviews_for_trek(&self, trek_id: Uuid) -> Vec<Review> {
        let sql = format!(
            "SELECT {} FROM reviews WHERE trek_id = $1 ORDER BY created_at DESC",
            REVIEW_COLUMNS
        );
        or_empty(
            sqlx::query_as::<_, Review>(&sql)
                .bind(trek_id)
                .fetch_all(&self.pool)
                .await,
            "reviews_for_trek",
        )
    }

    async fn list_reviews(&self) -> Vec<Review> {
        let sql = format!("SELECT {} FROM reviews ORDER BY created_at DESC", REVIEW_COLUMNS);
        or_empty(
            sqlx::query_as::<_, Review>(&sql).fetch_all(&self.pool).await,
            "list_reviews",
        )
    }

    async fn list_user_reviews(&self, user_id: Uuid) -> Vec<Review> {
        let sql = format!(
            "SELECT {} FROM reviews WHERE user_id = $1 ORDER BY created_at DESC",
            REVIEW_COLUMNS
        );
        or_empty(
            sqlx::query_as::<_, Review>(&sql)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await,
            "list_user_reviews",
        )
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool, QueryError> {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| QueryError::new("reviews", e))
    }

    async fn published_posts(&self) -> Vec<BlogPost> {
        let sql = format!(
            "SELECT {} FROM blog_posts WHERE published = true ORDER BY created_at DESC",
            POST_COLUMNS
        );
        or_empty(
            sqlx::query_as::<_, BlogPost>(&sql).fetch_all(&self.pool).await,
            "published_posts",
        )
    }

    async fn published_post(&self, slug: &str) -> Option<BlogPost> {
        let sql = format!(
            "SELECT {} FROM blog_posts WHERE slug = $1 AND published = true",
            POST_COLUMNS
        );
        or_empty(
            sqlx::query_as::<_, BlogPost>(&sql)
                .bind(slug)
                .fetch_optional(&self.pool)
                .await,
            "published_post",
        )
    }

    async fn get_stats(&self) -> DashboardStats {
        DashboardStats {
            treks: self.count("treks").await,
            users: self.count("profiles").await,
            inquiries: self.count("inquiries").await,
            reviews: self.count("reviews").await,
        }
    }
}
