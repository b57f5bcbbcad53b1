//! File attachment validation and storage
//!
//! Domain-level file checks that sit beyond request-shape validation:
//! PDF signature sniffing and the per-user storage quota. Blob storage
//! itself is a collaborator behind the `BlobStorage` trait.

use crate::config::StorageConfig;
use crate::error::AppError;
use crate::proposal::ProposalStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// PDF file signature (magic bytes)
const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Blob storage collaborator
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn store(&self, bytes: &[u8], path: &str) -> Result<(), AppError>;
    async fn exists(&self, path: &str) -> bool;
    /// True if a file was removed, false if nothing existed at the path
    async fn delete(&self, path: &str) -> Result<bool, AppError>;
    /// Size in bytes; `NotFound` if the path does not exist
    async fn size(&self, path: &str) -> Result<u64, AppError>;
    async fn read(&self, path: &str) -> Result<Vec<u8>, AppError>;
}

/// Blob storage on the local filesystem under a configured root
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl BlobStorage for LocalDiskStorage {
    async fn store(&self, bytes: &[u8], path: &str) -> Result<(), AppError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        tokio::fs::try_exists(self.full_path(path)).await.unwrap_or(false)
    }

    async fn delete(&self, path: &str) -> Result<bool, AppError> {
        let full = self.full_path(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, path: &str) -> Result<u64, AppError> {
        let full = self.full_path(path);
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("File not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, AppError> {
        let full = self.full_path(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("File not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob storage for tests and demos
#[derive(Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn store(&self, bytes: &[u8], path: &str) -> Result<(), AppError> {
        self.blobs.write().await.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.blobs.read().await.contains_key(path)
    }

    async fn delete(&self, path: &str) -> Result<bool, AppError> {
        Ok(self.blobs.write().await.remove(path).is_some())
    }

    async fn size(&self, path: &str) -> Result<u64, AppError> {
        self.blobs
            .read()
            .await
            .get(path)
            .map(|b| b.len() as u64)
            .ok_or_else(|| AppError::NotFound(format!("File not found: {}", path)))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, AppError> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("File not found: {}", path)))
    }
}

/// Service enforcing domain-level file rules and wrapping blob storage
#[derive(Clone)]
pub struct FileService {
    storage: Arc<dyn BlobStorage>,
    proposals: ProposalStore,
    quota_bytes: u64,
}

impl FileService {
    pub fn new(storage: Arc<dyn BlobStorage>, proposals: ProposalStore, config: &StorageConfig) -> Self {
        Self {
            storage,
            proposals,
            quota_bytes: config.quota_bytes(),
        }
    }

    /// Validate domain-level rules for an uploaded file.
    ///
    /// Signature check runs before the quota scan. Request-level checks
    /// (size cap, MIME, extension) belong to the HTTP layer and are not
    /// repeated here.
    pub async fn validate_domain_rules(&self, bytes: &[u8], owner_id: Uuid) -> Result<(), AppError> {
        self.validate_pdf_structure(bytes)?;
        self.check_storage_quota(owner_id, bytes.len() as u64).await
    }

    fn validate_pdf_structure(&self, bytes: &[u8]) -> Result<(), AppError> {
        if bytes.len() < PDF_SIGNATURE.len() || &bytes[..PDF_SIGNATURE.len()] != PDF_SIGNATURE {
            return Err(AppError::DomainValidation(
                "File does not appear to be a valid PDF document".to_string(),
            ));
        }
        Ok(())
    }

    async fn check_storage_quota(&self, owner_id: Uuid, new_file_size: u64) -> Result<(), AppError> {
        let current_usage = self.storage_usage(owner_id).await;

        if current_usage + new_file_size > self.quota_bytes {
            let usage_mb = Self::to_mb(current_usage);
            let quota_mb = Self::to_mb(self.quota_bytes);
            return Err(AppError::DomainValidation(format!(
                "Storage quota exceeded. Current usage: {} MB, Max quota: {} MB",
                usage_mb, quota_mb
            )));
        }
        Ok(())
    }

    /// Total bytes attached to the owner's proposals. Missing files log a
    /// warning and contribute zero.
    pub async fn storage_usage(&self, owner_id: Uuid) -> u64 {
        let mut total = 0;
        for path in self.proposals.file_paths_for_user(owner_id).await {
            match self.storage.size(&path).await {
                Ok(size) => total += size,
                Err(_) => {
                    warn!(file_path = %path, user_id = %owner_id, "Attached file missing during quota scan");
                }
            }
        }
        total
    }

    fn to_mb(bytes: u64) -> f64 {
        (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
    }

    /// Store an uploaded file under a generated path
    pub async fn store_upload(&self, bytes: &[u8]) -> Result<String, AppError> {
        let path = format!("proposals/{}.pdf", Uuid::new_v4());
        self.storage.store(bytes, &path).await?;
        Ok(path)
    }

    /// Best-effort delete. Returns false (with a warning) when the file is
    /// already gone.
    pub async fn delete_file(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        match self.storage.delete(path).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(file_path = %path, "Attempted to delete non-existent file");
                false
            }
            Err(e) => {
                warn!(file_path = %path, error = %e, "Failed to delete file");
                false
            }
        }
    }

    pub async fn file_size(&self, path: &str) -> Result<u64, AppError> {
        self.storage.size(path).await
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, AppError> {
        self.storage.read(path).await
    }

    pub async fn file_exists(&self, path: &str) -> bool {
        self.storage.exists(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Proposal;

    fn service_with_quota_mb(quota_mb: u64) -> (FileService, ProposalStore, Arc<MemoryBlobStorage>) {
        let storage = Arc::new(MemoryBlobStorage::new());
        let proposals = ProposalStore::new();
        let config = StorageConfig {
            root_dir: "unused".to_string(),
            quota_per_user_mb: quota_mb,
        };
        (
            FileService::new(storage.clone(), proposals.clone(), &config),
            proposals,
            storage,
        )
    }

    fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(len, 0);
        bytes
    }

    #[tokio::test]
    async fn test_rejects_non_pdf_signature() {
        let (service, _, _) = service_with_quota_mb(100);
        let owner = Uuid::new_v4();

        for bad in [&b"<htm"[..], &b"PK\x03\x04"[..], &b"%PD"[..], &b""[..]] {
            let err = service.validate_domain_rules(bad, owner).await.unwrap_err();
            assert!(matches!(err, AppError::DomainValidation(_)), "accepted {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_accepts_valid_pdf() {
        let (service, _, _) = service_with_quota_mb(100);
        service
            .validate_domain_rules(b"%PDF-1.7 content", Uuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_quota_exceeded_message_contains_mb_figures() {
        let (service, proposals, storage) = service_with_quota_mb(1);
        let owner = Uuid::new_v4();

        // Existing attachment of 768 KiB
        let existing = pdf_bytes(768 * 1024);
        storage.store(&existing, "proposals/existing.pdf").await.unwrap();
        let mut p = Proposal::new(owner, "T".into(), "D".into(), None);
        p.file_path = Some("proposals/existing.pdf".into());
        proposals.create(p).await.unwrap();

        // New 512 KiB file pushes past the 1 MB quota
        let err = service
            .validate_domain_rules(&pdf_bytes(512 * 1024), owner)
            .await
            .unwrap_err();
        match err {
            AppError::DomainValidation(msg) => {
                assert!(msg.contains("Storage quota exceeded"), "{}", msg);
                assert!(msg.contains("0.75 MB"), "{}", msg);
                assert!(msg.contains("1 MB"), "{}", msg);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_at_exact_quota_boundary_succeeds() {
        let (service, _, _) = service_with_quota_mb(1);
        // U + S == Q is allowed
        service
            .validate_domain_rules(&pdf_bytes(1024 * 1024), Uuid::new_v4())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_attachment_counts_zero_in_quota_scan() {
        let (service, proposals, _) = service_with_quota_mb(1);
        let owner = Uuid::new_v4();
        let mut p = Proposal::new(owner, "T".into(), "D".into(), None);
        p.file_path = Some("proposals/vanished.pdf".into());
        proposals.create(p).await.unwrap();

        assert_eq!(service.storage_usage(owner).await, 0);
        service
            .validate_domain_rules(&pdf_bytes(1024), owner)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_file_is_best_effort() {
        let (service, _, storage) = service_with_quota_mb(100);
        storage.store(b"%PDF", "proposals/a.pdf").await.unwrap();

        assert!(service.delete_file("proposals/a.pdf").await);
        // Second delete is an idempotent no-op
        assert!(!service.delete_file("proposals/a.pdf").await);
        assert!(!service.delete_file("").await);
    }

    #[tokio::test]
    async fn test_file_size_missing_is_not_found() {
        let (service, _, _) = service_with_quota_mb(100);
        let err = service.file_size("proposals/nope.pdf").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
