/// Object storage for user uploads
///
/// Uploads go through the [`ObjectStore`] trait; [`S3Store`] implements it
/// for any S3-compatible service (AWS, MinIO, R2). Objects are addressed by
/// key and exposed through a public URL:
///
/// - `<STORAGE_PUBLIC_URL>/<key>` when a public base URL is configured
/// - `<endpoint>/<bucket>/<key>` otherwise (path-style)

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{BehaviorVersion, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Storage is not configured for this deployment
    #[error("Object storage is not configured")]
    NotConfigured,

    #[error("Upload failed: {0}")]
    Upload(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `key` and returns its public URL
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3-compatible object store
pub struct S3Store {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "planboard-config",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base: public_base_url(config),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Upload(DisplayErrorContext(e).to_string()))?;

        tracing::debug!(bucket = %self.bucket, key, size, "Stored object");
        Ok(self.public_url(key))
    }
}

/// Base URL under which object keys are publicly reachable
pub fn public_base_url(config: &StorageConfig) -> String {
    match &config.public_url {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => format!(
            "{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket
        ),
    }
}

/// File extension for an accepted avatar content type
pub fn avatar_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Object key for a new avatar; each upload gets a fresh key
pub fn avatar_key(user_id: Uuid, extension: &str) -> String {
    format!("avatars/{}/{}.{}", user_id, Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public_url: Option<&str>) -> StorageConfig {
        StorageConfig {
            endpoint: "http://localhost:9000".to_string(),
            region: "us-east-1".to_string(),
            bucket: "planboard".to_string(),
            access_key: "minio".to_string(),
            secret_key: "minio-secret".to_string(),
            public_url: public_url.map(str::to_string),
        }
    }

    #[test]
    fn test_public_base_url() {
        assert_eq!(public_base_url(&config(None)), "http://localhost:9000/planboard");
        assert_eq!(
            public_base_url(&config(Some("https://cdn.example.com/"))),
            "https://cdn.example.com"
        );
    }

    #[test]
    fn test_s3_store_public_url() {
        let store = S3Store::new(&config(Some("https://cdn.example.com")));
        assert_eq!(
            store.public_url("avatars/a.png"),
            "https://cdn.example.com/avatars/a.png"
        );
    }

    #[test]
    fn test_avatar_extension() {
        assert_eq!(avatar_extension("image/png"), Some("png"));
        assert_eq!(avatar_extension("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(avatar_extension("image/webp"), Some("webp"));
        assert_eq!(avatar_extension("image/svg+xml"), None);
        assert_eq!(avatar_extension("text/plain"), None);
    }

    #[test]
    fn test_avatar_key_is_unique_per_upload() {
        let user_id = Uuid::new_v4();
        let a = avatar_key(user_id, "png");
        let b = avatar_key(user_id, "png");

        assert!(a.starts_with(&format!("avatars/{}/", user_id)));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }
}
