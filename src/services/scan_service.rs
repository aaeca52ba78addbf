use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::file_scans::{self, ScanStatus};
use crate::services::provider::{AnalysisStatus, ScanProvider, VerdictCounts};
use crate::services::scan_store::{NewScan, ScanPatch, ScanStore};
use crate::utils::hash::hash_reader;
use crate::utils::validation::{detect_file_type, validate_upload};
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A file as received from the client, fully buffered.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The record was not `scanning`; nothing was asked of the provider
    NotApplicable,
    NotReady,
    Completed(file_scans::Model),
    /// Another writer moved the record first; this is the row as it is now
    Superseded(file_scans::Model),
}

/// A scan record as returned to its owner. The report is never persisted.
#[derive(Debug, Clone)]
pub struct ScanView {
    pub record: file_scans::Model,
    pub detailed_report: Option<Value>,
}

/// Owns the scan state machine: pending -> scanning -> completed, with
/// an administrative exit to error from either non-terminal state.
pub struct ScanService {
    store: ScanStore,
    provider: Arc<dyn ScanProvider>,
    config: AppConfig,
}

impl ScanService {
    pub fn new(store: ScanStore, provider: Arc<dyn ScanProvider>, config: AppConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Validates, hashes and persists an upload as `pending`. Never contacts the provider.
    pub async fn accept_upload(
        &self,
        owner_id: i32,
        file: &UploadedFile,
    ) -> Result<file_scans::Model, AppError> {
        if let Err(e) = validate_upload(
            &file.filename,
            file.content.len(),
            &self.config.allowed_extensions,
            self.config.max_file_size_bytes(),
        ) {
            debug!("Rejected upload '{}' from user {}: {}", file.filename, owner_id, e);
            return Err(AppError::Validation {
                errors: vec![
                    e.message.clone(),
                    format!(
                        "Allowed extensions: {}",
                        self.config.allowed_extensions.join(", ")
                    ),
                ],
                message: e.message,
            });
        }

        let digests = hash_reader(file.content.as_ref()).await?;
        let file_type = detect_file_type(file.content_type.as_deref(), &file.content);

        let record = self
            .store
            .create(NewScan {
                filename: file.filename.clone(),
                file_type,
                digests,
                owner_id,
            })
            .await?;

        info!(
            "📥 Accepted '{}' as scan {} ({} bytes, sha256 {})",
            record.filename, record.id, record.file_size, record.sha256_hash
        );

        Ok(record)
    }

    /// Hands the content to the provider and moves the record to `scanning`.
    ///
    /// On provider failure the record stays `pending` and the error is returned.
    pub async fn submit_for_scanning(
        &self,
        record: &file_scans::Model,
        content: Bytes,
    ) -> Result<file_scans::Model, AppError> {
        if record.status != ScanStatus::Pending {
            return Err(AppError::validation(format!(
                "Scan {} cannot be submitted while {}",
                record.id, record.status
            )));
        }

        let declared_size = u64::try_from(record.file_size).unwrap_or(0);
        let provider_scan_id = match self
            .provider
            .submit(content, &record.filename, declared_size)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("❌ Submission of scan {} failed, left pending: {}", record.id, e);
                return Err(e.into());
            }
        };

        let patch = ScanPatch {
            status: Some(ScanStatus::Scanning),
            provider_scan_id: Some(provider_scan_id.clone()),
            scan_submitted_at: Some(Utc::now()),
            ..Default::default()
        };

        let updated = self
            .store
            .transition(record.id, ScanStatus::Pending, patch)
            .await?
            .ok_or_else(|| {
                AppError::validation(format!("Scan {} is no longer pending", record.id))
            })?;

        info!(
            "🔬 Scan {} submitted to {} as {}",
            updated.id,
            self.provider.name(),
            provider_scan_id
        );

        Ok(updated)
    }

    /// Polls the provider for a `scanning` record and stores the verdict once final.
    pub async fn refresh_if_scanning(
        &self,
        record: &file_scans::Model,
    ) -> Result<RefreshOutcome, AppError> {
        if record.status != ScanStatus::Scanning {
            return Ok(RefreshOutcome::NotApplicable);
        }

        let provider_scan_id = record.provider_scan_id.as_deref().ok_or_else(|| {
            AppError::Internal(format!("scan {} is scanning without a provider id", record.id))
        })?;

        let counts = match self.provider.poll(provider_scan_id).await? {
            AnalysisStatus::NotReady => {
                debug!("Scan {} not ready yet", record.id);
                return Ok(RefreshOutcome::NotReady);
            }
            AnalysisStatus::Completed(counts) => counts,
        };

        let (positives, total) = verdict_columns(&counts);
        let patch = ScanPatch {
            status: Some(ScanStatus::Completed),
            result_available_at: Some(Utc::now()),
            positives: Some(positives),
            total_scans: Some(total),
            ..Default::default()
        };

        match self
            .store
            .transition(record.id, ScanStatus::Scanning, patch)
            .await?
        {
            Some(updated) => {
                info!(
                    "✅ Scan {} completed: {}/{} engines flagged it",
                    updated.id, positives, total
                );
                Ok(RefreshOutcome::Completed(updated))
            }
            // Another request got there first; report whatever it stored.
            None => match self.store.get(record.id).await? {
                Some(current) if current.status == ScanStatus::Completed => {
                    Ok(RefreshOutcome::Completed(current))
                }
                Some(current) => Ok(RefreshOutcome::Superseded(current)),
                None => Err(scan_not_found()),
            },
        }
    }

    /// Owner-scoped read. Absent and foreign records produce the same `NotFound`.
    pub async fn get_scan(&self, id: i32, owner_id: i32) -> Result<ScanView, AppError> {
        let mut record = self
            .store
            .get(id)
            .await?
            .filter(|r| r.owner_id == owner_id)
            .ok_or_else(scan_not_found)?;

        if record.status == ScanStatus::Scanning {
            match self.refresh_if_scanning(&record).await {
                Ok(RefreshOutcome::Completed(current) | RefreshOutcome::Superseded(current)) => {
                    record = current
                }
                Ok(_) => {}
                Err(e) => warn!("Refresh of scan {} failed, serving stored state: {}", id, e),
            }
        }

        let detailed_report = if record.status == ScanStatus::Completed {
            match self.provider.fetch_report(&record.sha256_hash).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Detailed report for scan {} unavailable: {}", id, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(ScanView {
            record,
            detailed_report,
        })
    }

    pub async fn list_scans(
        &self,
        owner_id: i32,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<file_scans::Model>, AppError> {
        Ok(self.store.list_for_owner(owner_id, skip, limit).await?)
    }

    pub async fn find_by_hash(
        &self,
        owner_id: i32,
        hash: &str,
    ) -> Result<file_scans::Model, AppError> {
        self.store
            .find_by_any_hash_for_owner(owner_id, hash)
            .await?
            .ok_or_else(scan_not_found)
    }

    /// Administrative move to `error` from `pending` or `scanning`.
    pub async fn mark_error(
        &self,
        id: i32,
        message: &str,
    ) -> Result<file_scans::Model, AppError> {
        let record = self.store.get(id).await?.ok_or_else(scan_not_found)?;

        if !record.status.can_transition_to(ScanStatus::Error) {
            return Err(AppError::validation(format!(
                "Scan {} is {} and cannot be marked as error",
                id, record.status
            )));
        }

        let patch = ScanPatch {
            status: Some(ScanStatus::Error),
            error_message: Some(message.to_string()),
            ..Default::default()
        };

        let updated = self
            .store
            .transition(id, record.status, patch)
            .await?
            .ok_or_else(|| AppError::validation(format!("Scan {} changed concurrently", id)))?;

        warn!("⚠️  Scan {} marked as error: {}", id, message);
        Ok(updated)
    }
}

fn scan_not_found() -> AppError {
    AppError::NotFound("Scan not found".to_string())
}

/// (positives, total) for the record, saturating at the column range.
fn verdict_columns(counts: &VerdictCounts) -> (i32, i32) {
    let clamp = |v: u64| i32::try_from(v).unwrap_or(i32::MAX);
    (clamp(counts.malicious()), clamp(counts.total()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_columns() {
        let counts = VerdictCounts::new()
            .with("malicious", 5)
            .with("undetected", 55);
        assert_eq!(verdict_columns(&counts), (5, 60));

        let huge = VerdictCounts::new().with("undetected", u64::MAX / 2);
        assert_eq!(verdict_columns(&huge), (0, i32::MAX));
    }
}
