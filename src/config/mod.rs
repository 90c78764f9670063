//! Configuration.
//!
//! [`ConfigService`] is a flat key/value view of the process environment,
//! optionally seeded from a `.env` file. [`Settings`] is the typed subset
//! the framework itself consumes.

use dashmap::DashMap;
use serde::{Serialize, Serializer};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SECRET_KEY: &str = "CHANGE-IN-PRODUCTION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Parse { key: String, value: String },

    #[error("Failed to load {path}: {message}")]
    Load { path: String, message: String },

    #[error("Configuration errors:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<String>),
}

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// A service holding every variable of the process environment.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    /// Environment variables layered over a `.env` file. A missing file
    /// is not an error; the environment wins on conflicts.
    pub fn from_dotenv(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let service = Self::default();
        match dotenvy::from_path_iter(path) {
            Ok(entries) => {
                for entry in entries {
                    let (key, value) = entry.map_err(|e| ConfigError::Load {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                    service.set(&key, &value);
                }
            }
            Err(e) if e.not_found() => {
                tracing::debug!("No env file at {}", path.display());
            }
            Err(e) => {
                return Err(ConfigError::Load {
                    path: path.display().to_string(),
                    message: e.to_string(),
                });
            }
        }
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        Ok(service)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let service = Self::default();
        for (key, value) in pairs {
            service.set(key.as_ref(), value.as_ref());
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a value, `Ok(None)` when the key is absent.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::Parse {
                    key: key.to_string(),
                    value,
                }),
            None => Ok(None),
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub requests: u32,
    pub window_secs: u64,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 100,
            window_secs: 60,
        }
    }
}

/// Settings consumed by the framework: secrets, CORS origins, bind
/// address, body limit and rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    #[serde(serialize_with = "redact")]
    pub secret_key: String,
    pub debug: bool,
    pub allowed_origins: Vec<String>,
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
    pub rate_limit: RateLimitSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            debug: false,
            allowed_origins: vec!["*".to_string()],
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_request_size: 10 * 1024 * 1024,
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_service(&ConfigService::new())
    }

    pub fn from_service(config: &ConfigService) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            secret_key: config.get_or("SECRET_KEY", &defaults.secret_key),
            debug: config.get_bool("DEBUG").unwrap_or(defaults.debug),
            allowed_origins: config
                .get("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.allowed_origins),
            host: config.get_or("HOST", &defaults.host),
            port: config.get_parsed("PORT")?.unwrap_or(defaults.port),
            max_request_size: config
                .get_parsed("MAX_REQUEST_SIZE")?
                .unwrap_or(defaults.max_request_size),
            rate_limit: RateLimitSettings {
                enabled: config
                    .get_bool("RATE_LIMIT_ENABLED")
                    .unwrap_or(defaults.rate_limit.enabled),
                requests: config
                    .get_parsed("RATE_LIMIT_REQUESTS")?
                    .unwrap_or(defaults.rate_limit.requests),
                window_secs: config
                    .get_parsed("RATE_LIMIT_WINDOW")?
                    .unwrap_or(defaults.rate_limit.window_secs),
            },
        })
    }

    /// Check every rule and report all problems together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if !self.debug && self.secret_key == DEFAULT_SECRET_KEY {
            errors.push("SECRET_KEY must be set in production!".to_string());
        }
        if self.port == 0 {
            errors.push("Invalid PORT: 0. Must be between 1 and 65535".to_string());
        }
        if self.max_request_size == 0 {
            errors.push("MAX_REQUEST_SIZE must be positive".to_string());
        }
        if self.rate_limit.enabled && self.rate_limit.requests == 0 {
            errors.push("RATE_LIMIT_REQUESTS must be positive".to_string());
        }
        if self.rate_limit.enabled && self.rate_limit.window_secs == 0 {
            errors.push("RATE_LIMIT_WINDOW must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn redact<S: Serializer>(_secret: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("***")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_service(&ConfigService::default()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
        assert_eq!(settings.rate_limit.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_values_from_service() {
        let config = ConfigService::from_pairs([
            ("SECRET_KEY", "s3cret"),
            ("DEBUG", "TRUE"),
            ("ALLOWED_ORIGINS", "https://a.com, https://b.com"),
            ("PORT", "9000"),
            ("RATE_LIMIT_REQUESTS", "5"),
        ]);
        let settings = Settings::from_service(&config).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.allowed_origins, vec!["https://a.com", "https://b.com"]);
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.rate_limit.requests, 5);
    }

    #[test]
    fn test_unparsable_value() {
        let config = ConfigService::from_pairs([("PORT", "eighty")]);
        assert!(matches!(
            Settings::from_service(&config),
            Err(ConfigError::Parse { ref key, .. }) if key == "PORT"
        ));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let settings = Settings {
            port: 0,
            max_request_size: 0,
            ..Settings::default()
        };
        match settings.validate() {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {other:?}"),
        }

        let dev = Settings {
            debug: true,
            ..Settings::default()
        };
        assert!(dev.validate().is_ok());
    }

    #[test]
    fn test_secret_is_redacted() {
        let settings = Settings {
            secret_key: "top-secret".into(),
            ..Settings::default()
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["secret_key"], "***");
        assert!(!json.to_string().contains("top-secret"));
    }

    #[test]
    fn test_missing_dotenv_file_is_fine() {
        let service = ConfigService::from_dotenv("/definitely/not/here/.env").unwrap();
        assert_eq!(service.get("__FENNEC_UNSET_KEY__"), None);
    }
}
