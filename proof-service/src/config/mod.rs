//! Configuration module for proof-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProofServiceConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub converter: ConverterConfig,
    pub max_upload_bytes: usize,
    /// Browser origins allowed to call the API.
    pub allowed_origins: Vec<String>,
}

/// Hosted backend (query API, storage, functions) coordinates.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    /// Public project key sent as `apikey`; the caller's bearer token carries identity.
    pub anon_key: Secret<String>,
    pub analyze_function: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub temp_bucket: String,
    pub proof_bucket: String,
    /// When set, blobs are written under this directory instead of the hosted buckets.
    pub local_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub timeout: Duration,
    pub raster_dpi: u32,
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

impl ProofServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "proof-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            backend: BackendConfig {
                url: required("BACKEND_URL")?.trim_end_matches('/').to_string(),
                anon_key: Secret::new(required("BACKEND_ANON_KEY")?),
                analyze_function: env::var("ANALYZE_FUNCTION")
                    .unwrap_or_else(|_| "analyze-payment".to_string()),
                timeout: Duration::from_secs(parsed("BACKEND_TIMEOUT_SECS", 30)),
            },
            storage: StorageConfig {
                temp_bucket: env::var("PROOF_TEMP_BUCKET")
                    .unwrap_or_else(|_| "payment-proofs-temp".to_string()),
                proof_bucket: env::var("PROOF_BUCKET")
                    .unwrap_or_else(|_| "payment-proofs".to_string()),
                local_path: env::var("LOCAL_STORAGE_PATH")
                    .ok()
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from),
            },
            converter: ConverterConfig {
                timeout: Duration::from_secs(parsed("CONVERTER_TIMEOUT_SECS", 60)),
                raster_dpi: parsed("RASTER_DPI", 150),
            },
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("{} is required", key)))
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    fn clear() {
        for key in [
            "BACKEND_URL",
            "BACKEND_ANON_KEY",
            "RASTER_DPI",
            "LOCAL_STORAGE_PATH",
            "MAX_UPLOAD_BYTES",
            "ALLOWED_ORIGINS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn backend_url_is_required() {
        clear();
        env::set_var("BACKEND_ANON_KEY", "anon");
        let err = ProofServiceConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("BACKEND_URL"));
        clear();
    }

    #[test]
    #[serial]
    fn defaults_apply() {
        clear();
        env::set_var("BACKEND_URL", "https://project.example.co/");
        env::set_var("BACKEND_ANON_KEY", "anon");
        env::set_var("RASTER_DPI", "not-a-number");

        let config = ProofServiceConfig::from_env().unwrap();
        assert_eq!(config.backend.url, "https://project.example.co");
        assert_eq!(config.backend.anon_key.expose_secret(), "anon");
        assert_eq!(config.backend.analyze_function, "analyze-payment");
        assert_eq!(config.storage.temp_bucket, "payment-proofs-temp");
        assert_eq!(config.storage.proof_bucket, "payment-proofs");
        assert!(config.storage.local_path.is_none());
        assert_eq!(config.converter.raster_dpi, 150);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.allowed_origins.is_empty());
        clear();
    }

    #[test]
    #[serial]
    fn allowed_origins_are_split() {
        clear();
        env::set_var("BACKEND_URL", "https://project.example.co");
        env::set_var("BACKEND_ANON_KEY", "anon");
        env::set_var("ALLOWED_ORIGINS", "https://app.example.fr, http://localhost:5173,");

        let config = ProofServiceConfig::from_env().unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://app.example.fr", "http://localhost:5173"]
        );
        clear();
    }
}
