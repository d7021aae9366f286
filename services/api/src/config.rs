use callbridge_core::{pacer, provision, registry};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub vapi_api_key: String,
    pub vapi_assistant_id: String,
    pub vapi_base_url: String,
    /// Host advertised in `wss://` URLs; the request's `Host` header is used when unset.
    pub public_host: Option<String>,
    pub webhook_secret: Option<String>,
    pub provision_timeout: Duration,
    pub token_ttl: Duration,
    pub max_queue_frames: usize,
    pub log_level: Level,
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8766".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let vapi_api_key = required("VAPI_API_KEY")?;
        let vapi_assistant_id = required("VAPI_ASSISTANT_ID")?;
        let vapi_base_url =
            optional("VAPI_BASE_URL").unwrap_or_else(|| "https://api.vapi.ai".to_string());

        let provision_timeout = Duration::from_secs(parse_or(
            "PROVISION_TIMEOUT_SECS",
            provision::DEFAULT_PROVISION_TIMEOUT.as_secs(),
        )?);
        let token_ttl = Duration::from_secs(parse_or(
            "TOKEN_TTL_SECS",
            registry::DEFAULT_TOKEN_TTL.as_secs(),
        )?);
        let max_queue_frames = parse_or("MAX_QUEUE_FRAMES", pacer::DEFAULT_QUEUE_CAPACITY)?;
        if max_queue_frames == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_QUEUE_FRAMES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            vapi_api_key,
            vapi_assistant_id,
            vapi_base_url,
            public_host: optional("PUBLIC_HOST"),
            webhook_secret: optional("WEBHOOK_SECRET"),
            provision_timeout,
            token_ttl,
            max_queue_frames,
            log_level,
        })
    }
}
