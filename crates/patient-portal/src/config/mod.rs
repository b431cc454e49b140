use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::risk_assessment::{AssessmentPolicy, MAX_SCHEDULE_DAYS};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub assessment: AssessmentPolicy,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        let request_timeout_ms: u64 = parse_var("RISK_REQUEST_TIMEOUT_MS", 5_000)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = AssessmentPolicy::default();
        let assessment = AssessmentPolicy {
            lock_window_days: parse_var("RISK_LOCK_WINDOW_DAYS", defaults.lock_window_days)?,
            follow_up_days: parse_var("RISK_FOLLOW_UP_DAYS", defaults.follow_up_days)?,
            derived_write_attempts: parse_var(
                "RISK_DERIVED_WRITE_ATTEMPTS",
                defaults.derived_write_attempts,
            )?,
            notification_timeout_ms: parse_var(
                "RISK_NOTIFY_TIMEOUT_MS",
                defaults.notification_timeout_ms,
            )?,
        };
        ensure_range(
            "RISK_LOCK_WINDOW_DAYS",
            assessment.lock_window_days,
            1,
            MAX_SCHEDULE_DAYS,
        )?;
        ensure_range(
            "RISK_FOLLOW_UP_DAYS",
            assessment.follow_up_days,
            1,
            MAX_SCHEDULE_DAYS,
        )?;
        ensure_range(
            "RISK_DERIVED_WRITE_ATTEMPTS",
            i64::from(assessment.derived_write_attempts),
            1,
            i64::from(u8::MAX),
        )?;
        if request_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                key: "RISK_REQUEST_TIMEOUT_MS",
                min: 1,
                max: i64::MAX,
            });
        }
        if assessment.notification_timeout_ms == 0 {
            return Err(ConfigError::OutOfRange {
                key: "RISK_NOTIFY_TIMEOUT_MS",
                min: 1,
                max: i64::MAX,
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                request_timeout: Duration::from_millis(request_timeout_ms),
            },
            telemetry: TelemetryConfig { log_level },
            assessment,
        })
    }
}

fn ensure_range(key: &'static str, value: i64, min: i64, max: i64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { key, min, max })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on collaborator work performed for a single request.
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    OutOfRange {
        key: &'static str,
        min: i64,
        max: i64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (found '{value}')")
            }
            ConfigError::OutOfRange { key, min, max } if *max == i64::MAX => {
                write!(f, "{key} must be at least {min}")
            }
            ConfigError::OutOfRange { key, min, max } => {
                write!(f, "{key} must be between {min} and {max}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::OutOfRange { .. } => None,
        }
    }
}
