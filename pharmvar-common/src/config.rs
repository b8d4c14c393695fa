//! Configuration loading and resolution
//!
//! Bootstrap configuration lives in a single TOML file. Every field has a
//! built-in default, so a missing file (or a partial one) still yields a
//! runnable configuration.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `PHARMVAR_CONFIG` environment variable
//! 3. User config file (`~/.config/pharmvar/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! After loading, a small set of environment variables override individual
//! fields (`PHARMVAR_DATABASE`, `NCBI_API_KEY`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PHARMVAR_CONFIG";
/// Environment variable overriding `database_path`
pub const DATABASE_ENV_VAR: &str = "PHARMVAR_DATABASE";
/// Environment variable overriding `clinvar.api_key`
pub const NCBI_API_KEY_ENV_VAR: &str = "NCBI_API_KEY";

/// ClinVar (NCBI E-utilities) ceilings: 3 req/s anonymous, 10 req/s with a key.
/// Stay one under each published limit.
const CLINVAR_RPS_ANONYMOUS: f64 = 2.0;
const CLINVAR_RPS_WITH_KEY: f64 = 9.0;

/// Complete bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PharmvarConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub ensembl: EnsemblConfig,
    pub clinvar: ClinVarConfig,
    pub retry: RetryConfig,
    pub enrichment: EnrichmentConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

/// Query API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: String,
    /// CORS origins allowed to read the API (dashboard hosts)
    pub allowed_origins: Vec<String>,
}

/// Ensembl REST (variant/consequence service)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsemblConfig {
    pub base_url: String,
    /// Ensembl publishes 15 req/s; default stays under it
    pub requests_per_second: f64,
    pub species: String,
}

/// ClinVar via NCBI E-utilities (clinical-significance service)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinVarConfig {
    pub base_url: String,
    /// Explicit ceiling; when absent it depends on whether an API key is set
    pub requests_per_second: Option<f64>,
    pub api_key: Option<String>,
    /// Maximum ClinVar records fetched per variant
    pub max_matches: u32,
}

/// Retry/backoff policy shared by the upstream clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub request_timeout_secs: u64,
}

/// Enrichment run controls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Concurrent per-variant fetches (independent of the rate limits)
    pub concurrency: usize,
    pub run_timeout_secs: u64,
    pub max_variants_per_gene: usize,
    /// Upper bound on retrying a locked database write
    pub max_lock_wait_ms: u64,
    /// How long fetched upstream responses are reused; 0 disables the cache
    pub response_cache_ttl_secs: u64,
    pub response_cache_capacity: u64,
}

impl Default for PharmvarConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
            ensembl: EnsemblConfig::default(),
            clinvar: ClinVarConfig::default(),
            retry: RetryConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
        }
    }
}

impl Default for EnsemblConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rest.ensembl.org".to_string(),
            requests_per_second: 14.0,
            species: "human".to_string(),
        }
    }
}

impl Default for ClinVarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            requests_per_second: None,
            api_key: None,
            max_matches: 5,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            request_timeout_secs: 30,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            run_timeout_secs: 600,
            max_variants_per_gene: 50,
            max_lock_wait_ms: 5000,
            response_cache_ttl_secs: 3600,
            response_cache_capacity: 10_000,
        }
    }
}

impl ClinVarConfig {
    /// Effective requests-per-second ceiling
    pub fn requests_per_second(&self) -> f64 {
        match self.requests_per_second {
            Some(rps) => rps,
            None if self.api_key.is_some() => CLINVAR_RPS_WITH_KEY,
            None => CLINVAR_RPS_ANONYMOUS,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl EnrichmentConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn response_cache_ttl(&self) -> Option<Duration> {
        (self.response_cache_ttl_secs > 0).then(|| Duration::from_secs(self.response_cache_ttl_secs))
    }
}

impl PharmvarConfig {
    /// Parse a TOML document; absent fields take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would stall or disable the pipeline
    pub fn validate(&self) -> Result<()> {
        if !(self.ensembl.requests_per_second > 0.0) {
            return Err(Error::Config(
                "ensembl.requests_per_second must be greater than 0".to_string(),
            ));
        }
        if !(self.clinvar.requests_per_second() > 0.0) {
            return Err(Error::Config(
                "clinvar.requests_per_second must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.enrichment.concurrency == 0 {
            return Err(Error::Config(
                "enrichment.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides on top of file/default values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            if !path.trim().is_empty() {
                self.database_path = PathBuf::from(path);
            }
        }
        if let Ok(key) = std::env::var(NCBI_API_KEY_ENV_VAR) {
            if !key.trim().is_empty() {
                self.clinvar.api_key = Some(key);
            }
        }
    }
}

/// Resolve which config file to read, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User config file (only when it exists)
    dirs::config_dir()
        .map(|d| d.join("pharmvar").join("config.toml"))
        .filter(|p| p.exists())
}

/// Load configuration following the resolution priority
///
/// A missing config file falls back to defaults with a warning; a file
/// that exists but fails to parse is an error.
pub fn load_config(cli_arg: Option<&Path>) -> Result<PharmvarConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            PharmvarConfig::from_file(&path)?
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            PharmvarConfig::default()
        }
        None => {
            info!("No config file found, using built-in defaults");
            PharmvarConfig::default()
        }
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pharmvar").join("pharmvar.db"))
        .unwrap_or_else(|| PathBuf::from("./pharmvar_data/pharmvar.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PharmvarConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ensembl.requests_per_second, 14.0);
        assert_eq!(config.enrichment.concurrency, 4);
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_clinvar_rate_depends_on_api_key() {
        let mut clinvar = ClinVarConfig::default();
        assert_eq!(clinvar.requests_per_second(), 2.0);

        clinvar.api_key = Some("secret".to_string());
        assert_eq!(clinvar.requests_per_second(), 9.0);

        clinvar.requests_per_second = Some(5.0);
        assert_eq!(clinvar.requests_per_second(), 5.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PharmvarConfig::from_toml_str(
            r#"
            database_path = "/tmp/pgx.db"

            [enrichment]
            concurrency = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/pgx.db"));
        assert_eq!(config.enrichment.concurrency, 8);
        assert_eq!(config.enrichment.max_variants_per_gene, 50);
        assert_eq!(config.ensembl.base_url, "https://rest.ensembl.org");
    }

    #[test]
    fn test_response_cache_can_be_disabled() {
        let defaults = EnrichmentConfig::default();
        assert_eq!(defaults.response_cache_ttl(), Some(Duration::from_secs(3600)));

        let config = PharmvarConfig::from_toml_str("[enrichment]\nresponse_cache_ttl_secs = 0\n").unwrap();
        assert_eq!(config.enrichment.response_cache_ttl(), None);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = PharmvarConfig::from_toml_str("[enrichment]\nconcurrency = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let result = PharmvarConfig::from_toml_str("[ensembl]\nrequests_per_second = 0.0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
