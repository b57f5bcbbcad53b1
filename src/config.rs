//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum ConfigError {
    #[error("Failed to load environment variables: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// File storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored proposal files
    pub root_dir: String,
    /// Per-user storage quota in megabytes
    pub quota_per_user_mb: u64,
}

impl StorageConfig {
    pub fn quota_bytes(&self) -> u64 {
        self.quota_per_user_mb * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: "storage/app".to_string(),
            quota_per_user_mb: 100,
        }
    }
}

/// Background job configuration
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct JobConfig {
    /// Number of times a job may be attempted before it is failed permanently
    pub max_attempts: u32,
    /// Seconds to wait between attempts
    pub backoff_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 5,
        }
    }
}

/// Rating / top-rated listing configuration
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RatingConfig {
    /// Minimum average rating for a proposal to appear in the top-rated list
    pub top_rated_min_rating: f64,
    /// TTL for the cached top-rated listing, in seconds
    pub top_rated_cache_ttl_secs: u64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            top_rated_min_rating: 4.0,
            top_rated_cache_ttl_secs: 900,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub storage: StorageConfig,
    pub jobs: JobConfig,
    pub ratings: RatingConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: std::env::var("HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        let cors = CorsConfig {
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let storage = StorageConfig {
            root_dir: std::env::var("FILE_STORAGE_ROOT")
                .unwrap_or_else(|_| StorageConfig::default().root_dir),
            quota_per_user_mb: std::env::var("FILE_QUOTA_PER_USER_MB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
        };

        let jobs = JobConfig {
            max_attempts: std::env::var("JOB_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            backoff_secs: std::env::var("JOB_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let ratings = RatingConfig {
            top_rated_min_rating: std::env::var("TOP_RATED_MIN_RATING")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4.0),
            top_rated_cache_ttl_secs: std::env::var("TOP_RATED_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(900),
        };

        Ok(Self {
            server,
            cors,
            storage,
            jobs,
            ratings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_default_storage_quota() {
        let config = StorageConfig::default();
        assert_eq!(config.quota_per_user_mb, 100);
        assert_eq!(config.quota_bytes(), 100 * 1024 * 1024);
    }

    #[test]
    fn test_default_job_config() {
        let config = JobConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_secs, 5);
    }

    #[test]
    fn test_default_rating_config() {
        let config = RatingConfig::default();
        assert_eq!(config.top_rated_min_rating, 4.0);
        assert_eq!(config.top_rated_cache_ttl_secs, 900);
    }
}
