use super::{AnalysisStatus, ProviderError, ScanProvider, SubmissionPath, VerdictCounts};
use crate::config::AppConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Hash of the EICAR test file, known to every VirusTotal deployment.
const EICAR_SHA256: &str = "275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f";

#[derive(Debug, Clone)]
pub struct VirusTotalConfig {
    pub api_key: String,
    /// Base URL without trailing slash, e.g. `https://www.virustotal.com/api/v3`
    pub base_url: String,
    /// Applied to every outbound request
    pub timeout: Duration,
}

impl VirusTotalConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(&config.virustotal_api_key, &config.virustotal_api_url)
            .with_timeout(config.provider_timeout())
    }
}

/// VirusTotal v3 client. No retries: one call, one outcome.
pub struct VirusTotalClient {
    config: VirusTotalConfig,
    client: reqwest::Client,
}

impl VirusTotalClient {
    pub fn new(config: VirusTotalConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() {
            tracing::warn!("⚠️  VirusTotal API key is empty; every request will be rejected");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::unavailable("client setup", format!("HTTP client error: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-apikey", &self.config.api_key)
            .header(ACCEPT, "application/json")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<Response, ProviderError> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| ProviderError::unavailable(operation, e.to_string()))
    }

    async fn request_upload_url(&self) -> Result<String, ProviderError> {
        const OP: &str = "upload url";
        let response = self.send(self.client.get(self.url("/files/upload_url")), OP).await?;
        let body = success_json(response, OP).await?;

        let upload_url = body
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::protocol(OP, "missing 'data' upload URL"))?;

        url::Url::parse(upload_url)
            .map_err(|e| ProviderError::protocol(OP, format!("invalid upload URL: {}", e)))?;

        Ok(upload_url.to_string())
    }

    async fn upload(
        &self,
        target: &str,
        content: Bytes,
        filename: &str,
        operation: &'static str,
    ) -> Result<String, ProviderError> {
        let part = reqwest::multipart::Part::bytes(content.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .send(self.client.post(target).multipart(form), operation)
            .await?;
        let body = success_json(response, operation).await?;

        body.pointer("/data/id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::protocol(operation, "missing 'data.id' in response"))
    }
}

/// Rejects non-success statuses, then decodes the JSON body.
async fn success_json(response: Response, operation: &'static str) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::unavailable(
            operation,
            format!("HTTP {}", status),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::protocol(operation, format!("invalid JSON body: {}", e)))
}

/// Stats are final only when present and the analysis is not still queued.
pub(crate) fn parse_analysis(body: &Value) -> AnalysisStatus {
    let attributes = body.pointer("/data/attributes");

    if let Some(state) = attributes
        .and_then(|a| a.get("status"))
        .and_then(Value::as_str)
        && state != "completed"
    {
        return AnalysisStatus::NotReady;
    }

    match attributes
        .and_then(|a| a.get("stats"))
        .and_then(Value::as_object)
    {
        Some(stats) => AnalysisStatus::Completed(VerdictCounts::from_json(stats)),
        None => AnalysisStatus::NotReady,
    }
}

#[async_trait]
impl ScanProvider for VirusTotalClient {
    fn name(&self) -> &'static str {
        "virustotal"
    }

    async fn submit(
        &self,
        content: Bytes,
        filename: &str,
        declared_size: u64,
    ) -> Result<String, ProviderError> {
        match SubmissionPath::for_size(declared_size) {
            SubmissionPath::Direct => {
                tracing::debug!("Submitting {} ({} bytes) directly", filename, declared_size);
                self.upload(&self.url("/files"), content, filename, "submit")
                    .await
            }
            SubmissionPath::UploadUrl => {
                tracing::debug!(
                    "Submitting {} ({} bytes) through a dedicated upload URL",
                    filename,
                    declared_size
                );
                let upload_url = self.request_upload_url().await?;
                self.upload(&upload_url, content, filename, "large submit")
                    .await
            }
        }
    }

    async fn poll(&self, provider_scan_id: &str) -> Result<AnalysisStatus, ProviderError> {
        const OP: &str = "poll";
        let url = self.url(&format!("/analyses/{}", provider_scan_id));
        let response = self.send(self.client.get(url), OP).await?;
        let body = success_json(response, OP).await?;
        Ok(parse_analysis(&body))
    }

    async fn fetch_report(&self, sha256: &str) -> Result<Value, ProviderError> {
        const OP: &str = "report";
        let url = self.url(&format!("/files/{}", sha256));
        let response = self.send(self.client.get(url), OP).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(sha256.to_string()));
        }

        let mut body = success_json(response, OP).await?;
        match body.get_mut("data") {
            Some(data) if data.is_object() => Ok(data.take()),
            _ => Err(ProviderError::protocol(OP, "missing 'data' report object")),
        }
    }

    async fn health_check(&self) -> bool {
        match self.fetch_report(EICAR_SHA256).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("VirusTotal health check failed: {}", e);
                false
            }
        }
    }
}
