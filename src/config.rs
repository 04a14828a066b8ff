/*
 * Responsibility
 * - Read settings from the environment (.env honored via dotenvy)
 * - Validate them; missing/invalid values fail startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub database_url: String,
    pub database_max_connections: u32,

    // Reverse the proxy's path-style DNs (`/CN=x/O=y`) into `O=y, CN=x`.
    // Off unless explicitly enabled: some proxies already send canonical DNs.
    pub preprocess_dn: bool,

    // TLS ends at the proxy; this header/value pair tells us the client used it.
    pub secure_proxy_header: HeaderName,
    pub secure_proxy_value: String,

    pub request_timeout: Duration,
    pub request_body_limit_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let preprocess_dn = match std::env::var("PREPROCESS_DN") {
            Ok(v) => parse_flag(&v).ok_or(ConfigError::Invalid("PREPROCESS_DN"))?,
            Err(_) => false,
        };

        let secure_proxy_header = std::env::var("SECURE_PROXY_SSL_HEADER")
            .unwrap_or_else(|_| "x-forwarded-proto".to_string());
        let secure_proxy_header = HeaderName::from_str(&secure_proxy_header.to_ascii_lowercase())
            .map_err(|_| ConfigError::Invalid("SECURE_PROXY_SSL_HEADER"))?;

        let secure_proxy_value =
            std::env::var("SECURE_PROXY_SSL_VALUE").unwrap_or_else(|_| "https".to_string());

        let request_timeout = std::env::var("REQUEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let request_body_limit_bytes = std::env::var("REQUEST_BODY_LIMIT_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1024 * 1024);

        Ok(Self {
            addr,
            app_env,
            database_url,
            database_max_connections,
            preprocess_dn,
            secure_proxy_header,
            secure_proxy_value,
            request_timeout,
            request_body_limit_bytes,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
