use crate::config::AppConfig;
use crate::services::provider::{ScanProvider, create_provider};
use std::sync::Arc;
use tracing::info;

pub async fn setup_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn ScanProvider>> {
    let provider = create_provider(config)?;

    // Warm up provider connection
    if provider.health_check().await {
        info!("🦠 Scan provider '{}' reachable", provider.name());
    } else {
        tracing::warn!(
            "⚠️  Scan provider '{}' unreachable! Submissions will fail until it recovers.",
            provider.name()
        );
    }

    Ok(provider)
}
