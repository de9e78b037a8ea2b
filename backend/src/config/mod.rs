//! Configuration module for the DevConnect backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Default upload limit, matching the 5 MiB bucket limit.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Accepted session lifetimes, one hour to one year.
const SESSION_TTL_HOURS: RangeInclusive<i64> = 1..=24 * 366;

/// Which object store backs uploaded files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    Memory,
}

/// Configuration errors surfaced at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding session issuance by the identity provider
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Object store used for uploaded images
    pub storage: StorageBackend,
    /// Root directory of the local object store
    pub storage_path: PathBuf,
    /// Base URL that public file URLs are derived from
    pub public_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
    /// Whether creating a project requires an image
    pub require_project_image: bool,
    /// Hosts allowed for externally hosted images
    pub image_hosts: Vec<String>,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("DEVCONNECT_API_PSK")
            .ok()
            .filter(|psk| !psk.is_empty());

        let db_path = env::var("DEVCONNECT_DB_PATH")
            .unwrap_or_else(|_| "./data/devconnect.sqlite".to_string())
            .into();

        let index_path = env::var("DEVCONNECT_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let storage = match env::var("DEVCONNECT_STORAGE")
            .unwrap_or_else(|_| "local".to_string())
            .as_str()
        {
            "local" => StorageBackend::Local,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "DEVCONNECT_STORAGE",
                    value: other.to_string(),
                })
            }
        };

        let storage_path = env::var("DEVCONNECT_STORAGE_PATH")
            .unwrap_or_else(|_| "./data/storage".to_string())
            .into();

        let public_url = env::var("DEVCONNECT_PUBLIC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let bind_addr = parse_var("DEVCONNECT_BIND_ADDR", "127.0.0.1:8080")?;

        let log_level = env::var("DEVCONNECT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let max_upload_bytes = parse_var(
            "DEVCONNECT_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;

        let require_project_image = parse_var("DEVCONNECT_REQUIRE_PROJECT_IMAGE", "false")?;

        let image_hosts = env::var("DEVCONNECT_IMAGE_HOSTS")
            .unwrap_or_else(|_| "res.cloudinary.com,cdn.vox-cdn.com".to_string())
            .split(',')
            .map(|host| host.trim().to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();

        let session_ttl_hours =
            parse_var_in("DEVCONNECT_SESSION_TTL_HOURS", "168", SESSION_TTL_HOURS)?;

        Ok(Self {
            api_psk,
            db_path,
            index_path,
            storage,
            storage_path,
            public_url,
            bind_addr,
            log_level,
            max_upload_bytes,
            require_project_image,
            image_hosts,
            session_ttl_hours,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_var_in<T>(
    key: &'static str,
    default: &str,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
{
    let value: T = parse_var(key, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "DEVCONNECT_API_PSK",
            "DEVCONNECT_DB_PATH",
            "DEVCONNECT_INDEX_PATH",
            "DEVCONNECT_STORAGE",
            "DEVCONNECT_STORAGE_PATH",
            "DEVCONNECT_PUBLIC_URL",
            "DEVCONNECT_BIND_ADDR",
            "DEVCONNECT_LOG_LEVEL",
            "DEVCONNECT_MAX_UPLOAD_BYTES",
            "DEVCONNECT_REQUIRE_PROJECT_IMAGE",
            "DEVCONNECT_IMAGE_HOSTS",
            "DEVCONNECT_SESSION_TTL_HOURS",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/devconnect.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.storage, StorageBackend::Local);
        assert_eq!(config.public_url, "http://127.0.0.1:8080");
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert!(!config.require_project_image);
        assert_eq!(
            config.image_hosts,
            vec!["res.cloudinary.com".to_string(), "cdn.vox-cdn.com".to_string()]
        );
        assert_eq!(config.session_ttl_hours, 168);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        let err = parse_var::<usize>("DEVCONNECT_TEST_UNSET_NUMBER", "lots").unwrap_err();
        assert!(err.to_string().contains("DEVCONNECT_TEST_UNSET_NUMBER"));
    }

    #[test]
    fn test_session_ttl_must_be_in_range() {
        let key = "DEVCONNECT_TEST_UNSET_TTL";
        assert_eq!(parse_var_in(key, "168", SESSION_TTL_HOURS).unwrap(), 168);

        for value in ["0", "-5", "100000000000"] {
            let err = parse_var_in(key, value, SESSION_TTL_HOURS).unwrap_err();
            assert!(err.to_string().contains(value), "{value} was accepted");
        }
    }
}
