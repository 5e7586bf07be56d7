use std::path::Path;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

/// Object storage holding raw recordings and derived artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object at `key` into the local file `dest`.
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError>;

    /// Store the local file `src` under a new key and return that key.
    async fn upload(&self, src: &Path, content_type: &str) -> Result<String, StorageError>;
}

/// S3-compatible object storage client.
pub struct S3Storage {
    bucket: Box<Bucket>,
}

impl S3Storage {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .with_path_style();

        Ok(Self { bucket })
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn download(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let response = self.bucket.get_object(key).await.map_err(StorageError::S3)?;
        let status = response.status_code();
        if status != 200 {
            return Err(StorageError::Status {
                key: key.to_string(),
                status,
            });
        }

        tokio::fs::write(dest, response.bytes()).await?;
        Ok(())
    }

    async fn upload(&self, src: &Path, content_type: &str) -> Result<String, StorageError> {
        let data = tokio::fs::read(src).await?;
        let key = Uuid::new_v4().to_string();

        let response = self
            .bucket
            .put_object_with_content_type(&key, &data, content_type)
            .await
            .map_err(StorageError::S3)?;
        let status = response.status_code();
        if status != 200 {
            return Err(StorageError::Status { key, status });
        }

        Ok(key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Unexpected status {status} for object {key}")]
    Status { key: String, status: u16 },

    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
