//! Centralized configuration management for secpdf

use std::time::Duration;
use anyhow::{Result, Context};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP client configuration
    pub http: HttpConfig,
    /// EDGAR endpoints
    pub edgar: EdgarUrls,
    /// Per-run processing limits
    pub limits: BatchLimits,
    /// Name or path of the HTML-to-PDF executable
    pub renderer: String,
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string. The SEC rejects requests without a contact address.
    pub user_agent: String,
    /// Timeout for the submissions index request in seconds
    pub index_timeout_seconds: u64,
    /// Timeout for a primary document request in seconds
    pub document_timeout_seconds: u64,
    /// Timeout for each embedded asset request in seconds
    pub asset_timeout_seconds: u64,
}

/// Base URLs for the EDGAR services used by a run
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    /// Submissions API host
    pub data: String,
    /// Filing archive root
    pub archives: String,
    /// Host serving `/files/company_tickers.json`
    pub files: String,
}

/// Limits applied by the batch orchestrator
#[derive(Debug, Clone)]
pub struct BatchLimits {
    /// Maximum number of filings converted in one run
    pub max_filings: usize,
    /// Filings whose reported year predates this are skipped
    pub min_reported_year: i32,
}

pub const DEFAULT_USER_AGENT: &str = "secpdf/0.1.0 (sec-viewer-contact@example.com)";
pub const DEFAULT_RENDERER: &str = "weasyprint";

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            index_timeout_seconds: 20,
            document_timeout_seconds: 30,
            asset_timeout_seconds: 20,
        }
    }
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            data: "https://data.sec.gov".to_string(),
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            files: "https://www.sec.gov".to_string(),
        }
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_filings: 20,
            min_reported_year: 2017,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            edgar: EdgarUrls::default(),
            limits: BatchLimits::default(),
            renderer: DEFAULT_RENDERER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let http = HttpConfig {
            user_agent: std::env::var("SECPDF_USER_AGENT")
                .unwrap_or(defaults.http.user_agent),
            index_timeout_seconds: parse_env_var("SECPDF_INDEX_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.index_timeout_seconds),
            document_timeout_seconds: parse_env_var("SECPDF_DOCUMENT_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.document_timeout_seconds),
            asset_timeout_seconds: parse_env_var("SECPDF_ASSET_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.asset_timeout_seconds),
        };

        let edgar = EdgarUrls {
            data: std::env::var("SECPDF_DATA_URL").unwrap_or(defaults.edgar.data),
            archives: std::env::var("SECPDF_ARCHIVES_URL").unwrap_or(defaults.edgar.archives),
            files: std::env::var("SECPDF_FILES_URL").unwrap_or(defaults.edgar.files),
        };

        let limits = BatchLimits {
            max_filings: parse_env_var("SECPDF_MAX_FILINGS")?
                .unwrap_or(defaults.limits.max_filings),
            min_reported_year: parse_env_var("SECPDF_MIN_REPORTED_YEAR")?
                .unwrap_or(defaults.limits.min_reported_year),
        };

        let renderer = std::env::var("SECPDF_RENDERER").unwrap_or(defaults.renderer);

        Ok(Config {
            http,
            edgar,
            limits,
            renderer,
        })
    }

    /// Get the index request timeout as Duration
    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.http.index_timeout_seconds)
    }

    /// Get the document request timeout as Duration
    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.http.document_timeout_seconds)
    }

    /// Get the asset request timeout as Duration
    pub fn asset_timeout(&self) -> Duration {
        Duration::from_secs(self.http.asset_timeout_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(anyhow::anyhow!("SECPDF_USER_AGENT must not be empty"));
        }

        for base in [&self.edgar.data, &self.edgar.archives, &self.edgar.files] {
            url::Url::parse(base).with_context(|| format!("Invalid EDGAR base URL: {}", base))?;
        }

        if self.limits.max_filings == 0 {
            return Err(anyhow::anyhow!("SECPDF_MAX_FILINGS must be at least 1"));
        }

        Ok(())
    }
}

/// Helper function to parse environment variable as a specific type
fn parse_env_var<T>(var_name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display + Send + Sync + std::error::Error + 'static,
{
    match std::env::var(var_name) {
        Ok(val) => val.trim().parse().map(Some).with_context(|| {
            format!("Failed to parse environment variable {} = '{}'", var_name, val)
        }),
        Err(_) => Ok(None),
    }
}
