use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis: RedisConfig,
    pub oidc: OidcConfig,
    pub audit_secret: String,
    pub worker_count: usize,
    pub allowed_origins: Vec<String>,
    pub require_approval: bool,
}

/// Redis connection settings. `REDIS_URL` wins; otherwise the URL is
/// assembled from the host/port/password/db quartet.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis: RedisConfig::from_env()?,
            oidc: OidcConfig {
                issuer: env::var("OIDC_ISSUER").context("OIDC_ISSUER must be set")?,
                client_id: env::var("OIDC_CLIENT_ID").context("OIDC_CLIENT_ID must be set")?,
                client_secret: env::var("OIDC_CLIENT_SECRET")
                    .context("OIDC_CLIENT_SECRET must be set")?,
                redirect_url: env::var("OIDC_REDIRECT_URL")
                    .context("OIDC_REDIRECT_URL must be set")?,
            },
            audit_secret: env::var("AUDIT_SECRET").context("AUDIT_SECRET must be set")?,
            worker_count: env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("WORKER_COUNT must be a valid number")?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| {
                    if cfg!(debug_assertions) {
                        "http://localhost:3000".to_string()
                    } else {
                        "".to_string()
                    }
                })
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            require_approval: env::var("REQUIRE_APPROVAL")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        })
    }
}

impl RedisConfig {
    fn from_env() -> Result<Self> {
        let url = match env::var("REDIS_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                let db = env::var("REDIS_DB").unwrap_or_else(|_| "0".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) if !password.is_empty() => {
                        format!("redis://:{password}@{host}:{port}/{db}")
                    }
                    _ => format!("redis://{host}:{port}/{db}"),
                }
            }
        };

        Ok(Self {
            url,
            dial_timeout: env_millis("REDIS_DIAL_TIMEOUT_MS", 5_000)?,
            read_timeout: env_millis("REDIS_READ_TIMEOUT_MS", 3_000)?,
            write_timeout: env_millis("REDIS_WRITE_TIMEOUT_MS", 3_000)?,
        })
    }
}

fn env_millis(name: &str, default_ms: u64) -> Result<Duration> {
    let ms = match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be a number of milliseconds"))?,
        Err(_) => default_ms,
    };
    Ok(Duration::from_millis(ms))
}
