use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StorageError;

/// Lifetime of a signed upload URL.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);
/// Prefix under which trek images are stored in the bucket.
const TREK_IMAGE_PREFIX: &str = "treks";

/// StorageService
///
/// Object storage for trek images. `S3StorageClient` talks to MinIO locally and
/// Supabase Storage in production; `MockStorageService` stands in during tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if missing. Only called for `Env::Local`.
    async fn ensure_bucket_exists(&self);

    /// Signs a PUT of `key` restricted to `content_type`, valid for ten minutes.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3StorageClient
///
/// Path-style addressing is required by both MinIO and the Supabase Storage gateway.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket on an existing bucket fails harmlessly.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(UPLOAD_URL_TTL).map_err(|e| StorageError(e.to_string()))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(sanitize_key(key))
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}

/// Drops empty, `.` and `..` segments so a key can never climb out of its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Only images may be attached to a trek.
pub fn is_image_type(content_type: &str) -> bool {
    content_type
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty() && !subtype.contains('/'))
}

/// trek_image_key
///
/// A fresh object key `treks/<uuid>.<ext>`. The extension is taken from the
/// uploaded file name when it is purely alphanumeric, otherwise from the MIME
/// subtype; the rest of the client's file name is discarded.
pub fn trek_image_key(filename: &str, content_type: &str) -> String {
    let from_name = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    let ext = from_name
        .or_else(|| content_type.strip_prefix("image/"))
        .unwrap_or("bin")
        .to_ascii_lowercase();

    format!("{}/{}.{}", TREK_IMAGE_PREFIX, Uuid::new_v4(), ext)
}

/// MockStorageService
///
/// Deterministic URLs without a network, or a forced failure.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError("simulated storage outage".to_string()));
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

pub type StorageState = Arc<dyn StorageService>;
