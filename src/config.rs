//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub recommendation: RecommendationConfig,
    pub payments: PaymentsConfig,
    pub cache: CacheConfig,
    pub chat: ChatConfig,
    pub stories: StoriesConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "bird.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://bird.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Local media storage
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory uploads are written to
    pub root: PathBuf,
    /// URL path the directory is served under (e.g. "/media")
    pub public_path: String,
    /// ffmpeg binary used for video thumbnails
    pub ffmpeg_path: String,
}

/// Session authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 1209600 = 14 days)
    pub session_max_age: i64,
}

/// External recommendation/embedding service
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationConfig {
    /// Send new posts to the ingest endpoint
    pub enabled: bool,
    /// Service base URL (e.g. "http://localhost:8003")
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Reorder the home feed through the ranking endpoint
    pub rank_feed: bool,
}

/// Mercado Pago integration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentsConfig {
    /// Access token; checkout is unavailable when unset
    pub mercadopago_access_token: Option<String>,
    /// REST API base URL
    pub api_base_url: String,
    /// Premium subscription price (BRL)
    pub premium_price: f64,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL in seconds for remembered feed orderings (default: 3600)
    pub ranking_ttl: u64,
    /// Maximum viewers with a remembered ordering (default: 10000)
    pub ranking_max_entries: u64,
}

/// Chat configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Broadcast buffer per room
    pub channel_capacity: usize,
    /// Messages returned when opening a room
    pub history_limit: i64,
}

/// Story expiry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoriesConfig {
    /// How often expired stories are purged (0 disables the sweeper)
    pub sweep_interval_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (BIRD__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/bird.db")?
            .set_default("media.root", "media")?
            .set_default("media.public_path", "/media")?
            .set_default("media.ffmpeg_path", "ffmpeg")?
            .set_default("auth.session_max_age", 1_209_600)?
            .set_default("recommendation.enabled", true)?
            .set_default("recommendation.base_url", "http://localhost:8003")?
            .set_default("recommendation.timeout_seconds", 5)?
            .set_default("recommendation.rank_feed", false)?
            .set_default("payments.api_base_url", "https://api.mercadopago.com")?
            .set_default("payments.premium_price", 29.90)?
            .set_default("cache.ranking_ttl", 3600)?
            .set_default("cache.ranking_max_entries", 10_000)?
            .set_default("chat.channel_capacity", 100)?
            .set_default("chat.history_limit", 50)?
            .set_default("stories.sweep_interval_seconds", 900)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (BIRD__*)
            .add_source(
                Environment::with_prefix("BIRD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    /// Whether a Mercado Pago access token is configured
    pub fn payments_ready(&self) -> bool {
        self.payments
            .mercadopago_access_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        if self.chat.channel_capacity == 0 {
            return Err(crate::error::AppError::Config(
                "chat.channel_capacity must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.recommendation.base_url).is_err() {
            return Err(crate::error::AppError::Config(format!(
                "recommendation.base_url is not a valid URL: {}",
                self.recommendation.base_url
            )));
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(crate::error::AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}

#[cfg(test)]
pub(crate) fn test_config(root: &std::path::Path) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: DatabaseConfig {
            path: root.join("bird-test.db"),
        },
        media: MediaConfig {
            root: root.join("media"),
            public_path: "/media".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        },
        auth: AuthConfig {
            session_secret: "x".repeat(32),
            session_max_age: 1_209_600,
        },
        recommendation: RecommendationConfig {
            enabled: false,
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
            rank_feed: false,
        },
        payments: PaymentsConfig {
            mercadopago_access_token: None,
            api_base_url: "http://127.0.0.1:9".to_string(),
            premium_price: 29.90,
        },
        cache: CacheConfig {
            ranking_ttl: 3600,
            ranking_max_entries: 1000,
        },
        chat: ChatConfig {
            channel_capacity: 16,
            history_limit: 50,
        },
        stories: StoriesConfig {
            sweep_interval_seconds: 0,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        test_config(std::path::Path::new("/tmp"))
    }

    #[test]
    fn validate_accepts_http_on_localhost() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert!(!config.should_use_secure_cookies());
    }

    #[test]
    fn validate_rejects_short_session_secret() {
        let mut config = valid_config();
        config.auth.session_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("session secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.session_secret")
        ));
    }

    #[test]
    fn validate_rejects_http_for_non_local_domain() {
        let mut config = valid_config();
        config.server.domain = "bird.example.com".to_string();
        config.server.protocol = "http".to_string();

        let error = config
            .validate()
            .expect_err("public domains must require https");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("server.protocol must be https")
        ));
    }

    #[test]
    fn validate_rejects_bad_recommendation_url() {
        let mut config = valid_config();
        config.recommendation.base_url = "not a url".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn payments_ready_requires_non_blank_token() {
        let mut config = valid_config();
        assert!(!config.payments_ready());

        config.payments.mercadopago_access_token = Some("   ".to_string());
        assert!(!config.payments_ready());

        config.payments.mercadopago_access_token = Some("APP_USR-token".to_string());
        assert!(config.payments_ready());
    }
}
