use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;

use chrono::Duration;

const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_OTP_TTL_MINUTES: i64 = 10;
/// One minute up to one day.
const OTP_TTL_MINUTES_RANGE: RangeInclusive<i64> = 1..=24 * 60;

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
    pub uploads: UploadConfig,
    pub accounts: AccountConfig,
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

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let max_document_bytes =
            parse_number("APP_MAX_DOCUMENT_BYTES", DEFAULT_MAX_DOCUMENT_BYTES)?;
        let media_base_url = env::var("APP_MEDIA_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}/media"));

        let otp_ttl_minutes = parse_number("APP_OTP_TTL_MINUTES", DEFAULT_OTP_TTL_MINUTES)?;
        if !OTP_TTL_MINUTES_RANGE.contains(&otp_ttl_minutes) {
            return Err(ConfigError::InvalidNumber {
                var: "APP_OTP_TTL_MINUTES",
            });
        }
        let bootstrap_admin = match env::var("APP_ADMIN_EMAIL") {
            Ok(email) if !email.trim().is_empty() => Some(AdminBootstrap {
                username: env::var("APP_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
                email,
            }),
            _ => None,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            uploads: UploadConfig {
                max_document_bytes,
                media_base_url,
            },
            accounts: AccountConfig {
                otp_ttl_minutes,
                bootstrap_admin,
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Limits and URL resolution for uploaded verification documents.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_document_bytes: u64,
    pub media_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            media_base_url: "http://127.0.0.1:3000/media".to_string(),
        }
    }
}

/// Registration settings.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub otp_ttl_minutes: i64,
    pub bootstrap_admin: Option<AdminBootstrap>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
            bootstrap_admin: None,
        }
    }
}

impl AccountConfig {
    /// Passcode lifetime; values outside the accepted range fall back to the default.
    pub fn otp_ttl(&self) -> Duration {
        let minutes = if OTP_TTL_MINUTES_RANGE.contains(&self.otp_ttl_minutes) {
            self.otp_ttl_minutes
        } else {
            DEFAULT_OTP_TTL_MINUTES
        };
        Duration::minutes(minutes)
    }
}

/// Admin account seeded at startup; admins skip OTP verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub email: String,
    pub username: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => write!(f, "{var} must be a valid number"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_MAX_DOCUMENT_BYTES",
            "APP_MEDIA_BASE_URL",
            "APP_OTP_TTL_MINUTES",
            "APP_ADMIN_EMAIL",
            "APP_ADMIN_USERNAME",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.uploads.max_document_bytes, 5 * 1024 * 1024);
        assert_eq!(config.uploads.media_base_url, "http://127.0.0.1:3000/media");
        assert_eq!(config.accounts.otp_ttl_minutes, 10);
        assert!(config.accounts.bootstrap_admin.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_upload_limit() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_MAX_DOCUMENT_BYTES", "five megabytes");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { var }) => assert_eq!(var, "APP_MAX_DOCUMENT_BYTES"),
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_otp_lifetime() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        for raw in ["0", "-5", "1441", "9223372036854775807"] {
            reset_env();
            env::set_var("APP_OTP_TTL_MINUTES", raw);
            match AppConfig::load() {
                Err(ConfigError::InvalidNumber { var }) => assert_eq!(var, "APP_OTP_TTL_MINUTES"),
                other => panic!("expected invalid number for {raw}, got {other:?}"),
            }
        }

        reset_env();
        env::set_var("APP_OTP_TTL_MINUTES", "1440");
        let config = AppConfig::load().expect("one day is accepted");
        assert_eq!(config.accounts.otp_ttl(), Duration::days(1));
        reset_env();
    }

    #[test]
    fn otp_lifetime_falls_back_when_set_out_of_range() {
        let config = AccountConfig {
            otp_ttl_minutes: i64::MAX,
            bootstrap_admin: None,
        };
        assert_eq!(config.otp_ttl(), Duration::minutes(10));
    }

    #[test]
    fn reads_bootstrap_admin() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ADMIN_EMAIL", "ops@carenest.test");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.accounts.bootstrap_admin,
            Some(AdminBootstrap {
                email: "ops@carenest.test".to_string(),
                username: "admin".to_string(),
            })
        );
        reset_env();
    }
}
