//! File storage for contract documents, tenant IDs and maintenance invoices.
//!
//! The engine treats the returned path as an opaque string.

use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};
use uuid::Uuid;

/// Upload destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Contract,
    TenantId,
    MaintenanceInvoice,
}

impl FileCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            FileCategory::Contract => "contracts",
            FileCategory::TenantId => "tenant-ids",
            FileCategory::MaintenanceInvoice => "maintenance-invoices",
        }
    }
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist `data` and return the path it can be retrieved from.
    async fn store(
        &self,
        category: FileCategory,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String, AppError>;
}

pub struct LocalFileStorage {
    base_path: PathBuf,
}

impl LocalFileStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        // create_dir_all succeeds when the directory already exists
        fs::create_dir_all(&base_path).await.map_err(|e| {
            AppError::StorageError(anyhow::anyhow!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// Keep only the final path component and characters safe on every filesystem.
fn sanitize_file_name(file_name: &str) -> String {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn store(
        &self,
        category: FileCategory,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String, AppError> {
        let dir = self.base_path.join(category.dir_name());
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::StorageError(anyhow::anyhow!("Failed to create {}: {}", dir.display(), e))
        })?;

        let name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name));
        let path = dir.join(&name);
        fs::write(&path, data).await.map_err(|e| {
            AppError::StorageError(anyhow::anyhow!("Failed to write {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), "File stored");
        Ok(format!("{}/{}", category.dir_name(), name))
    }
}
