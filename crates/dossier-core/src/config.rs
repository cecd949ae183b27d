//! Configuration module
//!
//! Environment-driven settings for the record client and the reference server.
//! Both read a `.env` file first when one is present.

use std::env;
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_DIR: &str = "./data/uploads";
const MAX_UPLOAD_SIZE_MB: usize = 10;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Settings for talking to a record server.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let config = Self {
            api_url: lookup("DOSSIER_API_URL")
                .or_else(|| lookup("API_URL"))
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: lookup("DOSSIER_TOKEN")
                .or_else(|| lookup("JWT_TOKEN"))
                .filter(|t| !t.trim().is_empty()),
            user_id: lookup("DOSSIER_USER_ID").filter(|u| !u.trim().is_empty()),
            request_timeout_secs: lookup("DOSSIER_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "DOSSIER_API_URL must start with http:// or https://"
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "DOSSIER_REQUEST_TIMEOUT_SECS must be greater than zero"
            ));
        }
        Ok(())
    }
}

/// Settings for the reference record server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Limit on a whole submission request, all attachments included.
    pub max_upload_size_mb: usize,
    pub concurrency_limit: usize,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let config = Self {
            port: lookup("PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            upload_dir: PathBuf::from(
                lookup("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            max_upload_size_mb: lookup("MAX_UPLOAD_SIZE_MB")
                .unwrap_or_else(|| MAX_UPLOAD_SIZE_MB.to_string())
                .parse()
                .unwrap_or(MAX_UPLOAD_SIZE_MB),
            concurrency_limit: lookup("HTTP_CONCURRENCY_LIMIT")
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(HTTP_CONCURRENCY_LIMIT)
                .max(1),
            cors_origins,
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_mb * 1024 * 1024
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        if self.max_upload_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than zero"));
        }
        Ok(())
    }
}
