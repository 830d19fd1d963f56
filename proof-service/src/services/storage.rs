use crate::services::backend::{expect_success, AccessToken, BackendClient};
use async_trait::async_trait;
use serde_json::json;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Blob storage organised in named buckets.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(
        &self,
        token: &AccessToken,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), AppError>;

    async fn download(
        &self,
        token: &AccessToken,
        bucket: &str,
        path: &str,
    ) -> Result<Vec<u8>, AppError>;

    async fn delete(&self, token: &AccessToken, bucket: &str, paths: &[String])
        -> Result<(), AppError>;

    /// URL an external reader (the analysis function) can fetch the object from.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Buckets of the hosted backend's storage API.
pub struct HostedStorage {
    backend: BackendClient,
}

impl HostedStorage {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        self.backend
            .url(&format!("storage/v1/object/{}/{}", bucket, path))
    }
}

#[async_trait]
impl Storage for HostedStorage {
    async fn upload(
        &self,
        token: &AccessToken,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), AppError> {
        let size = data.len();
        let response = self
            .backend
            .post(token, &self.object_url(bucket, path))
            .header("x-upsert", "false")
            .body(content_type, data)
            .send()
            .await?;
        expect_success(response, "storage_upload").await?;

        tracing::debug!(bucket = %bucket, path = %path, size = size, "Object uploaded");
        Ok(())
    }

    async fn download(
        &self,
        token: &AccessToken,
        bucket: &str,
        path: &str,
    ) -> Result<Vec<u8>, AppError> {
        let response = self
            .backend
            .get(token, &self.object_url(bucket, path))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_upstream(status, "storage_download", &body));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn delete(
        &self,
        token: &AccessToken,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), AppError> {
        if paths.is_empty() {
            return Ok(());
        }

        let response = self
            .backend
            .delete(token, &self.backend.url(&format!("storage/v1/object/{}", bucket)))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;
        expect_success(response, "storage_delete").await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.backend
            .url(&format!("storage/v1/object/public/{}/{}", bucket, path))
    }
}

/// Filesystem buckets under a base directory, for local runs and tests.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(bucket).join(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid object path: {}/{}",
                bucket,
                path
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(
        &self,
        _token: &AccessToken,
        bucket: &str,
        path: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> Result<(), AppError> {
        let path = self.resolve(bucket, path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn download(
        &self,
        _token: &AccessToken,
        bucket: &str,
        path: &str,
    ) -> Result<Vec<u8>, AppError> {
        let full = self.resolve(bucket, path)?;
        fs::read(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(anyhow::anyhow!("Object not found: {}/{}", bucket, path))
            } else {
                AppError::StorageError(anyhow::Error::new(e))
            }
        })
    }

    async fn delete(
        &self,
        _token: &AccessToken,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), AppError> {
        for path in paths {
            let full = self.resolve(bucket, path)?;
            if full.exists() {
                fs::remove_file(full).await?;
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("file://{}", self.base_path.join(bucket).join(path).display())
    }
}
