//! S3-compatible object storage client.
//!
//! Jobs reference previously uploaded objects by key; the worker downloads
//! sources and uploads mastered outputs through this crate. Works against
//! AWS S3 or a MinIO endpoint (path-style addressing when `S3_ENDPOINT` is
//! set).

use std::path::Path;

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("download of {key} failed: {source}")]
    Download {
        key: String,
        #[source]
        source: aws_sdk_s3::Error,
    },

    #[error("upload of {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: aws_sdk_s3::Error,
    },

    #[error("reading object stream for {key} failed: {source}")]
    Stream {
        key: String,
        #[source]
        source: aws_smithy_types::byte_stream::error::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Custom endpoint URL (MinIO); `None` means real AWS S3.
    pub endpoint: Option<String>,
    /// Region name (default: `us-east-1`).
    pub region: String,
    /// Static access key id.
    pub access_key: String,
    /// Static secret access key.
    pub secret_key: String,
    /// Bucket holding all job objects.
    pub bucket: String,
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var         | Required | Default     |
    /// |-----------------|----------|-------------|
    /// | `S3_ENDPOINT`   | no       | --          |
    /// | `S3_REGION`     | no       | `us-east-1` |
    /// | `S3_ACCESS_KEY` | **yes**  | --          |
    /// | `S3_SECRET_KEY` | **yes**  | --          |
    /// | `S3_BUCKET`     | **yes**  | --          |
    ///
    /// # Panics
    ///
    /// Panics if a required variable is not set.
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            access_key: std::env::var("S3_ACCESS_KEY").expect("S3_ACCESS_KEY must be set"),
            secret_key: std::env::var("S3_SECRET_KEY").expect("S3_SECRET_KEY must be set"),
            bucket: std::env::var("S3_BUCKET").expect("S3_BUCKET must be set"),
        }
    }
}

/// Handle to the job object bucket.
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
}

impl ObjectStorage {
    /// Build a client from configuration. Path-style addressing is enabled
    /// when a custom endpoint is configured (MinIO requires it).
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Download an object to a local path.
    pub async fn download(&self, object_key: &str, dest: &Path) -> Result<(), StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|e| StorageError::Download {
                key: object_key.to_string(),
                source: e.into(),
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Stream {
                key: object_key.to_string(),
                source: e,
            })?
            .into_bytes();

        tokio::fs::write(dest, &bytes).await?;
        tracing::debug!(key = object_key, bytes = bytes.len(), "Downloaded object");
        Ok(())
    }

    /// Upload a local file under the given key with a content type.
    pub async fn upload(
        &self,
        src: &Path,
        object_key: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(src).await?;
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(object_key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: object_key.to_string(),
                source: e.into(),
            })?;

        tracing::debug!(key = object_key, bytes = size, "Uploaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: Option<&str>) -> StorageConfig {
        StorageConfig {
            endpoint: endpoint.map(str::to_string),
            region: "us-east-1".to_string(),
            access_key: "minio".to_string(),
            secret_key: "minio-secret".to_string(),
            bucket: "resona-jobs".to_string(),
        }
    }

    // Client construction needs no network; it must succeed with static
    // credentials both against real S3 and a custom MinIO endpoint.
    #[test]
    fn builds_client_without_endpoint() {
        let storage = ObjectStorage::new(&test_config(None));
        assert_eq!(storage.bucket, "resona-jobs");
    }

    #[test]
    fn builds_client_with_minio_endpoint() {
        let storage = ObjectStorage::new(&test_config(Some("http://localhost:9000")));
        assert_eq!(storage.bucket, "resona-jobs");
    }
}
