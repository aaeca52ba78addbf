use std::env;

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    // Executables
    "exe", "dll", "sys", // Scripts
    "js", "py", "php", "sh", "bat", // Documents
    "pdf", "doc", "docx", "xls", "xlsx", // Archives
    "zip", "rar", "7z", "tar", "gz",
];

/// Application configuration, passed explicitly into services at construction
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database connection string (default: local SQLite file)
    pub database_url: String,

    /// Maximum upload size in MiB (default: 32)
    pub max_file_size_mb: u64,

    /// Accepted file extensions, lowercase without the dot
    pub allowed_extensions: Vec<String>,

    /// Scan provider type: "virustotal" or "memory" (default: "virustotal")
    pub scan_provider: String,

    /// VirusTotal API key
    pub virustotal_api_key: String,

    /// VirusTotal API base URL
    pub virustotal_api_url: String,

    /// Timeout for every outbound provider call in seconds (default: 30)
    pub provider_timeout_secs: u64,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Lifetime of issued access tokens (default: 30 minutes)
    pub access_token_expire_minutes: i64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://scans.db?mode=rwc".to_string(),
            max_file_size_mb: 32,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            scan_provider: "virustotal".to_string(),
            virustotal_api_key: String::new(),
            virustotal_api_url: "https://www.virustotal.com/api/v3".to_string(),
            provider_timeout_secs: 30,
            jwt_secret: "secret".to_string(),
            access_token_expire_minutes: 30,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            max_file_size_mb: env::var("MAX_FILE_SIZE_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size_mb),

            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| parse_list(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(default.allowed_extensions),

            scan_provider: env::var("SCAN_PROVIDER").unwrap_or(default.scan_provider),

            virustotal_api_key: env::var("VIRUSTOTAL_API_KEY")
                .unwrap_or(default.virustotal_api_key),

            virustotal_api_url: env::var("VIRUSTOTAL_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.virustotal_api_url),

            provider_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(default.provider_timeout_secs),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret), // Fallback for dev convenience, strictly enforced in production method

            access_token_expire_minutes: env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.access_token_expire_minutes),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (in-memory provider, no API key needed)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            scan_provider: "memory".to_string(),
            access_token_expire_minutes: 24 * 60,
            ..Self::default()
        }
    }

    /// Create config for production (real provider, secrets must be set)
    pub fn production() -> Self {
        let from_env = Self::from_env();
        Self {
            scan_provider: "virustotal".to_string(),
            virustotal_api_key: env::var("VIRUSTOTAL_API_KEY")
                .expect("CRITICAL: VIRUSTOTAL_API_KEY must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            ..from_env
        }
    }

    /// Saturates at `usize::MAX` for absurd `MAX_FILE_SIZE_MB` values.
    pub fn max_file_size_bytes(&self) -> usize {
        usize::try_from(self.max_file_size_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024 * 1024)
    }

    pub fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.provider_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_file_size_mb, 32);
        assert_eq!(config.max_file_size_bytes(), 32 * 1024 * 1024);
        assert_eq!(config.scan_provider, "virustotal");
        assert_eq!(config.provider_timeout_secs, 30);
        assert!(config.allowed_extensions.contains(&"exe".to_string()));
        assert!(config.allowed_extensions.contains(&"7z".to_string()));
        assert_eq!(config.allowed_extensions.len(), 18);
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.scan_provider, "memory");
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_production_config() {
        unsafe {
            env::set_var("JWT_SECRET", "test_secret");
            env::set_var("VIRUSTOTAL_API_KEY", "vt_key");
        }
        let config = AppConfig::production();
        unsafe {
            env::remove_var("JWT_SECRET");
            env::remove_var("VIRUSTOTAL_API_KEY");
        }
        assert_eq!(config.scan_provider, "virustotal");
        assert_eq!(config.jwt_secret, "test_secret");
        assert_eq!(config.virustotal_api_key, "vt_key");
    }

    #[test]
    fn test_huge_size_limit_saturates() {
        let config = AppConfig {
            max_file_size_mb: u64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(config.max_file_size_bytes(), usize::MAX);
    }

    #[test]
    fn test_parse_extension_list() {
        assert_eq!(
            parse_list(" EXE, .pdf,,zip "),
            vec!["exe".to_string(), "pdf".to_string(), "zip".to_string()]
        );
    }
}
