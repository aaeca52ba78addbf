use super::{AnalysisStatus, ProviderError, ScanProvider, SubmissionPath, VerdictCounts};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A submission as the provider saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmission {
    pub scan_id: String,
    pub filename: String,
    pub declared_size: u64,
    pub content_len: usize,
    pub path: SubmissionPath,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    submissions: Vec<RecordedSubmission>,
    analyses: HashMap<String, AnalysisStatus>,
    reports: HashMap<String, Value>,
    fail_submit: bool,
    fail_poll: bool,
    fail_report: bool,
    poll_calls: usize,
    report_calls: usize,
}

/// Provider kept entirely in process memory.
///
/// Analyses stay `NotReady` until scripted with [`InMemoryProvider::complete_analysis`],
/// unless the provider was built with [`InMemoryProvider::auto_completing`].
#[derive(Default)]
pub struct InMemoryProvider {
    state: Mutex<MemoryState>,
    auto_complete: Option<VerdictCounts>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every submission completes immediately with `counts` and gets a report.
    pub fn auto_completing(counts: VerdictCounts) -> Self {
        Self {
            state: Mutex::default(),
            auto_complete: Some(counts),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn complete_analysis(&self, scan_id: &str, counts: VerdictCounts) {
        self.state()
            .analyses
            .insert(scan_id.to_string(), AnalysisStatus::Completed(counts));
    }

    pub fn set_report(&self, sha256: &str, report: Value) {
        self.state().reports.insert(sha256.to_string(), report);
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.state().fail_submit = fail;
    }

    pub fn fail_polls(&self, fail: bool) {
        self.state().fail_poll = fail;
    }

    pub fn fail_reports(&self, fail: bool) {
        self.state().fail_report = fail;
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.state().submissions.clone()
    }

    pub fn poll_calls(&self) -> usize {
        self.state().poll_calls
    }

    pub fn report_calls(&self) -> usize {
        self.state().report_calls
    }
}

#[async_trait]
impl ScanProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn submit(
        &self,
        content: Bytes,
        filename: &str,
        declared_size: u64,
    ) -> Result<String, ProviderError> {
        let mut state = self.state();
        if state.fail_submit {
            return Err(ProviderError::unavailable("submit", "simulated outage"));
        }

        state.next_id += 1;
        let scan_id = format!("mem-{}", state.next_id);
        state.submissions.push(RecordedSubmission {
            scan_id: scan_id.clone(),
            filename: filename.to_string(),
            declared_size,
            content_len: content.len(),
            path: SubmissionPath::for_size(declared_size),
        });
        state
            .analyses
            .insert(scan_id.clone(), AnalysisStatus::NotReady);

        if let Some(counts) = &self.auto_complete {
            let sha256 = crate::utils::hash::hash_content(&content).sha256;
            state.reports.insert(
                sha256.clone(),
                json!({
                    "id": sha256,
                    "type": "file",
                    "attributes": {
                        "meaningful_name": filename,
                        "size": content.len(),
                        "last_analysis_stats": counts.to_json(),
                    }
                }),
            );
            state
                .analyses
                .insert(scan_id.clone(), AnalysisStatus::Completed(counts.clone()));
        }

        Ok(scan_id)
    }

    async fn poll(&self, provider_scan_id: &str) -> Result<AnalysisStatus, ProviderError> {
        let mut state = self.state();
        state.poll_calls += 1;
        if state.fail_poll {
            return Err(ProviderError::unavailable("poll", "simulated outage"));
        }

        state
            .analyses
            .get(provider_scan_id)
            .cloned()
            .ok_or_else(|| ProviderError::unavailable("poll", "HTTP 404 Not Found"))
    }

    async fn fetch_report(&self, sha256: &str) -> Result<Value, ProviderError> {
        let mut state = self.state();
        state.report_calls += 1;
        if state.fail_report {
            return Err(ProviderError::unavailable("report", "simulated outage"));
        }

        state
            .reports
            .get(sha256)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(sha256.to_string()))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
