use crate::buffer::OverflowPolicy;
use crate::error::ConfigError;
use crate::store::RegistryLimits;
use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MOUNT_POINT: &str = "/";
const DEFAULT_MAX_IDLE_DURATION_SECONDS: u64 = 3600;
const DEFAULT_MAX_DURATION_SECONDS: u64 = 3600 * 24 * 3 + 3600;
const DEFAULT_MAX_ACTIVE_ENDPOINTS: usize = 1024;
const DEFAULT_MAX_ENDPOINT_NOTIFICATIONS: usize = 100;
const DEFAULT_CLEANUP_FREQUENCY_SECONDS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    /// Public base URL that callback URLs are built from.
    pub public_server_url: String,
    /// Path prefix for every served route.
    pub mount_point: String,
    pub max_idle_duration: Duration,
    pub max_duration: Duration,
    pub cleanup_frequency: Duration,
    pub max_active_endpoints: NonZeroUsize,
    pub max_endpoint_notifications: NonZeroUsize,
    pub overflow_policy: OverflowPolicy,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable source; unset or blank variables
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("APP_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                name: "APP_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let overflow_policy = match get("NOTIFICATION_OVERFLOW_POLICY") {
            Some(raw) => raw.parse::<OverflowPolicy>().map_err(|message| ConfigError::Invalid {
                name: "NOTIFICATION_OVERFLOW_POLICY",
                message,
            })?,
            None => OverflowPolicy::default(),
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            Some(f) if f == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            port,
            public_server_url: get("SERVER_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            mount_point: get("MOUNT_POINT").unwrap_or_else(|| DEFAULT_MOUNT_POINT.to_string()),
            max_idle_duration: Duration::from_secs(positive(
                "MAX_IDLE_DURATION_SECONDS",
                get("MAX_IDLE_DURATION_SECONDS"),
                DEFAULT_MAX_IDLE_DURATION_SECONDS,
            )?),
            max_duration: Duration::from_secs(positive(
                "MAX_DURATION_SECONDS",
                get("MAX_DURATION_SECONDS"),
                DEFAULT_MAX_DURATION_SECONDS,
            )?),
            cleanup_frequency: Duration::from_secs(positive(
                "CLEANUP_FREQUENCY_SECONDS",
                get("CLEANUP_FREQUENCY_SECONDS"),
                DEFAULT_CLEANUP_FREQUENCY_SECONDS,
            )?),
            max_active_endpoints: positive_count(
                "MAX_ACTIVE_ENDPOINTS",
                get("MAX_ACTIVE_ENDPOINTS"),
                DEFAULT_MAX_ACTIVE_ENDPOINTS,
            )?,
            max_endpoint_notifications: positive_count(
                "MAX_ENDPOINT_NOTIFICATIONS",
                get("MAX_ENDPOINT_NOTIFICATIONS"),
                DEFAULT_MAX_ENDPOINT_NOTIFICATIONS,
            )?,
            overflow_policy,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
        })
    }

    pub fn registry_limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_active_endpoints: self.max_active_endpoints,
            max_endpoint_notifications: self.max_endpoint_notifications,
            overflow_policy: self.overflow_policy,
            max_idle_duration: self.max_idle_duration,
            max_duration: self.max_duration,
        }
    }
}

fn positive(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::NotPositiveInteger { name, value: raw }),
    }
}

fn positive_count(
    name: &'static str,
    raw: Option<String>,
    default: usize,
) -> Result<NonZeroUsize, ConfigError> {
    let n = positive(name, raw, default as u64)?;
    usize::try_from(n)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| ConfigError::NotPositiveInteger {
            name,
            value: n.to_string(),
        })
}
