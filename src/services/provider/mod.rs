//! Boundary to the external malware-scanning service.
//!
//! The coordinator only talks to [`ScanProvider`]; the production
//! implementation speaks the VirusTotal v3 HTTP API and the in-memory one
//! backs tests and local development.

use crate::config::AppConfig;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod virustotal;

pub use memory::{InMemoryProvider, RecordedSubmission};
pub use virustotal::{VirusTotalClient, VirusTotalConfig};

/// Files above this size must go through a dedicated upload URL.
pub const LARGE_FILE_THRESHOLD: u64 = 32 * 1024 * 1024; // 32 MiB

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Non-success HTTP status, or the request never got a response
    #[error("scan provider unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },

    /// Success status but the body did not have the expected shape
    #[error("unexpected scan provider response during {operation}: {reason}")]
    Protocol {
        operation: &'static str,
        reason: String,
    },

    #[error("'{0}' is unknown to the scan provider")]
    NotFound(String),
}

impl ProviderError {
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.into(),
        }
    }

    pub fn protocol(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            reason: reason.into(),
        }
    }
}

/// How a file reaches the provider, decided by its declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPath {
    /// `POST {base}/files`
    Direct,
    /// `GET {base}/files/upload_url`, then `POST` to the returned URL
    UploadUrl,
}

impl SubmissionPath {
    pub fn for_size(declared_size: u64) -> Self {
        if declared_size <= LARGE_FILE_THRESHOLD {
            SubmissionPath::Direct
        } else {
            SubmissionPath::UploadUrl
        }
    }
}

/// Per-category engine verdict tally (malicious, suspicious, undetected, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerdictCounts(BTreeMap<String, u64>);

impl VerdictCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: impl Into<String>, count: u64) -> Self {
        self.0.insert(category.into(), count);
        self
    }

    /// Builds the tally from a JSON object, skipping non-numeric entries.
    pub fn from_json(stats: &serde_json::Map<String, Value>) -> Self {
        Self(
            stats
                .iter()
                .filter_map(|(category, count)| count.as_u64().map(|c| (category.clone(), c)))
                .collect(),
        )
    }

    pub fn get(&self, category: &str) -> u64 {
        self.0.get(category).copied().unwrap_or(0)
    }

    pub fn malicious(&self) -> u64 {
        self.get("malicious")
    }

    /// Sum of all categories, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.0
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(category, count)| (category.clone(), Value::from(*count)))
                .collect(),
        )
    }
}

/// Outcome of polling an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisStatus {
    /// Still queued or running; not an error
    NotReady,
    Completed(VerdictCounts),
}

#[async_trait]
pub trait ScanProvider: Send + Sync {
    /// Provider identifier used in logs and health output
    fn name(&self) -> &'static str;

    /// Submits content for analysis and returns the provider's analysis id
    async fn submit(
        &self,
        content: Bytes,
        filename: &str,
        declared_size: u64,
    ) -> Result<String, ProviderError>;

    async fn poll(&self, provider_scan_id: &str) -> Result<AnalysisStatus, ProviderError>;

    /// Detailed report for a content hash the provider has already analysed
    async fn fetch_report(&self, sha256: &str) -> Result<Value, ProviderError>;

    async fn health_check(&self) -> bool;
}

/// Factory function to create the provider selected by config
pub fn create_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn ScanProvider>> {
    match config.scan_provider.to_lowercase().as_str() {
        "virustotal" | "vt" => {
            let client = VirusTotalClient::new(VirusTotalConfig::from_app_config(config))?;
            Ok(Arc::new(client))
        }
        "memory" | "noop" => {
            tracing::warn!("InMemoryProvider: scans are simulated (development mode)");
            Ok(Arc::new(InMemoryProvider::auto_completing(
                VerdictCounts::new()
                    .with("malicious", 0)
                    .with("suspicious", 0)
                    .with("undetected", 1),
            )))
        }
        other => anyhow::bail!("Unknown scan provider '{}'", other),
    }
}
