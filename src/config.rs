//! Configuration for the Aurora Mentis service.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! Required (the server refuses to start without them):
//! - `FIREBASE_SERVICE_ACCOUNT_KEY_PATH` - Path to the service-account JSON file
//! - `FIREBASE_DATABASE_URL` - Database URL of the Firebase project
//! - `SMTP_HOST` / `SMTP_PORT` - SMTP relay
//! - `SMTP_USER` / `SMTP_PASSWORD` - SMTP credentials (the user is also the sender)
//! - `FRONTEND_URL` - Origin allowed by CORS
//!
//! Optional:
//! - `AURORA_SERVER_HOST` / `AURORA_SERVER_PORT` - Bind address
//! - `AURORA_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//! - `AURORA_TIMEZONE` - IANA timezone for schedules and "today"
//! - `AURORA_JOBS_ENABLED` - Run the monthly sweeps on their schedule

use std::env;
use std::str::FromStr;

use chrono_tz::Tz;
use config::Config;
use serde::Deserialize;

use crate::errors::{AcademyError, AcademyResult};
use crate::validation::validate_http_url;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AcademyConfig {
    pub server: ServerConfig,
    pub firebase: FirebaseConfig,
    pub smtp: SmtpConfig,
    pub mail: MailConfig,
    pub logging: LoggingConfig,
    pub jobs: JobsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// Additional allowed origins (local development)
    pub extra_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            frontend_url: String::new(),
            extra_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Firebase project configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Path to the service-account key file
    pub credentials_path: String,
    /// Project database URL
    pub database_url: String,
    /// Firestore REST endpoint
    pub firestore_base_url: String,
    /// Identity Toolkit REST endpoint
    pub identity_base_url: String,
    /// JWK set used to verify ID tokens
    pub jwks_url: String,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            credentials_path: String::new(),
            database_url: String::new(),
            firestore_base_url: "https://firestore.googleapis.com/v1".to_string(),
            identity_base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            jwks_url:
                "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com"
                    .to_string(),
        }
    }
}

/// SMTP relay configuration. Every field is required; a port of 0 means unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// What the emails say about the academy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Sender display name and the academy name used in every message
    pub academy_name: String,
    /// Phone number students call after paying an overdue balance
    pub contact_phone: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            academy_name: "ADE Academy".to_string(),
            contact_phone: "957-018-079".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Scheduled sweep configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Run the sweeps on their schedule
    pub enabled: bool,
    /// IANA timezone for the schedules and for "today" in the overdue check
    pub timezone: String,
    /// Cron expression for the deactivation sweep (default: day 3 at 02:00)
    pub deactivation_cron: String,
    /// Cron expression for the reminder sweep (default: day 30 at 10:00)
    pub reminder_cron: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: "America/Lima".to_string(),
            deactivation_cron: "0 0 2 3 * *".to_string(),
            reminder_cron: "0 0 10 30 * *".to_string(),
        }
    }
}

fn config_error(e: config::ConfigError) -> AcademyError {
    AcademyError::ConfigError(e.to_string())
}

/// Read and parse `key`. Unset is `None`; a value that does not parse is an error.
fn env_parsed<T>(key: &str) -> AcademyResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AcademyError::ConfigError(format!("{key} is invalid ('{raw}'): {e}"))),
        Err(_) => Ok(None),
    }
}

impl AcademyConfig {
    /// Load configuration from file and environment, then validate it.
    pub fn load() -> AcademyResult<Self> {
        let config = Self::load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    fn load_unvalidated() -> AcademyResult<Self> {
        let defaults = AcademyConfig::default();

        let builder = Config::builder()
            // Start with defaults
            .set_default("server.host", defaults.server.host)
            .map_err(config_error)?
            .set_default("server.port", defaults.server.port as i64)
            .map_err(config_error)?
            .set_default("server.extra_origins", defaults.server.extra_origins)
            .map_err(config_error)?
            .set_default("firebase.firestore_base_url", defaults.firebase.firestore_base_url)
            .map_err(config_error)?
            .set_default("firebase.identity_base_url", defaults.firebase.identity_base_url)
            .map_err(config_error)?
            .set_default("firebase.jwks_url", defaults.firebase.jwks_url)
            .map_err(config_error)?
            .set_default("mail.academy_name", defaults.mail.academy_name)
            .map_err(config_error)?
            .set_default("mail.contact_phone", defaults.mail.contact_phone)
            .map_err(config_error)?
            .set_default("logging.level", defaults.logging.level)
            .map_err(config_error)?
            .set_default("jobs.enabled", defaults.jobs.enabled)
            .map_err(config_error)?
            .set_default("jobs.timezone", defaults.jobs.timezone)
            .map_err(config_error)?
            .set_default("jobs.deactivation_cron", defaults.jobs.deactivation_cron)
            .map_err(config_error)?
            .set_default("jobs.reminder_cron", defaults.jobs.reminder_cron)
            .map_err(config_error)?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option(
                "firebase.credentials_path",
                env::var("FIREBASE_SERVICE_ACCOUNT_KEY_PATH").ok(),
            )
            .map_err(config_error)?
            .set_override_option("firebase.database_url", env::var("FIREBASE_DATABASE_URL").ok())
            .map_err(config_error)?
            .set_override_option("smtp.host", env::var("SMTP_HOST").ok())
            .map_err(config_error)?
            .set_override_option("smtp.port", env_parsed::<u16>("SMTP_PORT")?.map(i64::from))
            .map_err(config_error)?
            .set_override_option("smtp.username", env::var("SMTP_USER").ok())
            .map_err(config_error)?
            .set_override_option("smtp.password", env::var("SMTP_PASSWORD").ok())
            .map_err(config_error)?
            .set_override_option("server.frontend_url", env::var("FRONTEND_URL").ok())
            .map_err(config_error)?
            .set_override_option("server.host", env::var("AURORA_SERVER_HOST").ok())
            .map_err(config_error)?
            .set_override_option(
                "server.port",
                env_parsed::<u16>("AURORA_SERVER_PORT")?.map(i64::from),
            )
            .map_err(config_error)?
            .set_override_option("logging.level", env::var("AURORA_LOG_LEVEL").ok())
            .map_err(config_error)?
            .set_override_option("jobs.timezone", env::var("AURORA_TIMEZONE").ok())
            .map_err(config_error)?
            .set_override_option("jobs.enabled", env_parsed::<bool>("AURORA_JOBS_ENABLED")?)
            .map_err(config_error)?;

        let settings = builder
            .build()
            .map_err(|e| AcademyError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| AcademyError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AcademyResult<()> {
        let required = [
            ("firebase.credentials_path", &self.firebase.credentials_path),
            ("firebase.database_url", &self.firebase.database_url),
            ("smtp.host", &self.smtp.host),
            ("smtp.username", &self.smtp.username),
            ("smtp.password", &self.smtp.password),
            ("server.frontend_url", &self.server.frontend_url),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(AcademyError::ConfigError(format!("{key} is required")));
            }
        }

        if self.server.port == 0 {
            return Err(AcademyError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if self.smtp.port == 0 {
            return Err(AcademyError::ConfigError("smtp.port is required".to_string()));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(AcademyError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        self.timezone()?;

        for origin in self.allowed_origins() {
            validate_http_url(&origin, "server.frontend_url")
                .map_err(|e| AcademyError::ConfigError(format!("invalid origin '{origin}': {e}")))?;
        }

        Ok(())
    }

    /// The configured timezone.
    pub fn timezone(&self) -> AcademyResult<Tz> {
        Tz::from_str(&self.jobs.timezone).map_err(|_| {
            AcademyError::ConfigError(format!("unknown timezone '{}'", self.jobs.timezone))
        })
    }

    /// The frontend origin followed by any extra origins, without trailing slashes.
    pub fn allowed_origins(&self) -> Vec<String> {
        std::iter::once(&self.server.frontend_url)
            .chain(self.server.extra_origins.iter())
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect()
    }
}
