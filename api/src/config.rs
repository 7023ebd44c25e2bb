//! Service configuration module
//! Loads mail identities, provider credentials, CORS, rate-limit and
//! sanitizer settings from the environment.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use contact_shared::Mailbox;
use thiserror::Error;
use tracing::{debug, info};

use crate::validation::sanitizers::DEFAULT_LINK_TRUNCATE;
use crate::validation::SanitizerOptions;

const DEFAULT_BIND_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SPARKPOST_ENDPOINT: &str = "https://api.sparkpost.com/api/v1";
const DEFAULT_SPARKPOST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 2;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Listen address
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

/// Sender and recipient identities for outbound mail
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender: Mailbox,
    pub recipient: Mailbox,
}

/// SparkPost credentials and client settings
#[derive(Debug, Clone)]
pub struct SparkPostConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
}

/// Origin allowed to call the endpoint from a browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    Any,
    Exact(String),
}

/// Sliding-window limiter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RATE_LIMIT_REQUESTS,
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Service configuration combining all settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub mail: MailConfig,
    pub sparkpost: SparkPostConfig,
    pub cors: CorsOrigin,
    pub rate_limit: RateLimitConfig,
    pub sanitizer: SanitizerOptions,
    pub expose_error_details: bool,
}

impl AppConfig {
    /// Load full service configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let environment = match vars.optional("APP_ENV") {
            Some(value) if value.eq_ignore_ascii_case("production") => Environment::Production,
            _ => Environment::Development,
        };

        let bind_ip: IpAddr = vars.parsed("BIND_ADDRESS", DEFAULT_BIND_ADDRESS)?;
        let port: u16 = vars.parsed("PORT", DEFAULT_PORT)?;

        let contact_name = vars.required("ENDPOINT_CONTACT_NAME")?;
        let sender_name = vars
            .optional("ENDPOINT_SENDER_NAME")
            .unwrap_or_else(|| contact_name.clone());
        let mail = MailConfig {
            sender: Mailbox::new(sender_name, vars.required("ENDPOINT_SPARKPOST_EMAIL")?),
            recipient: Mailbox::new(contact_name, vars.required("ENDPOINT_CONTACT_EMAIL")?),
        };

        let timeout_secs: u64 =
            vars.parsed("SPARKPOST_TIMEOUT_SECS", DEFAULT_SPARKPOST_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "SPARKPOST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        let sparkpost = SparkPostConfig {
            api_key: vars.required("SPARKPOST_API_KEY")?,
            endpoint: vars
                .optional("SPARKPOST_API_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_SPARKPOST_ENDPOINT.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let cors = if environment.is_production() {
            CorsOrigin::Exact(vars.required("ENDPOINT_CORS_ORIGIN")?)
        } else {
            CorsOrigin::Any
        };

        let limit: u32 = vars.parsed("RATE_LIMIT_REQUESTS", DEFAULT_RATE_LIMIT_REQUESTS)?;
        let window_secs: u64 =
            vars.parsed("RATE_LIMIT_WINDOW_SECONDS", DEFAULT_RATE_LIMIT_WINDOW_SECS)?;
        if limit == 0 || window_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Rate limit requests and window must be greater than zero".to_string(),
            ));
        }
        let rate_limit = RateLimitConfig {
            limit,
            window: Duration::from_secs(window_secs),
        };

        let link_truncate: usize =
            vars.parsed("ENDPOINT_AUTOLINK_TRUNCATE", DEFAULT_LINK_TRUNCATE)?;
        if link_truncate == 0 {
            return Err(ConfigError::InvalidConfig(
                "ENDPOINT_AUTOLINK_TRUNCATE must be greater than zero".to_string(),
            ));
        }
        let sanitizer = SanitizerOptions {
            line_breaks: vars.flag("ENDPOINT_LINE_BREAKS", true)?,
            auto_link: vars.flag("ENDPOINT_AUTOLINK", true)?,
            link_truncate,
        };

        let expose_error_details =
            vars.flag("ENDPOINT_EXPOSE_ERRORS", !environment.is_production())?;

        info!(
            production = environment.is_production(),
            rate_limit = limit,
            rate_window_secs = window_secs,
            line_breaks = sanitizer.line_breaks,
            auto_link = sanitizer.auto_link,
            expose_error_details,
            "Service configuration loaded"
        );
        debug!(endpoint = %sparkpost.endpoint, "SparkPost endpoint configured");

        Ok(AppConfig {
            environment,
            server: ServerConfig {
                bind_addr: SocketAddr::new(bind_ip, port),
            },
            mail,
            sparkpost,
            cors,
            rate_limit,
            sanitizer,
            expose_error_details,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse::<T>().map_err(|e| {
                ConfigError::InvalidConfig(format!("Invalid value for {} (`{}`): {}", key, raw, e))
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidConfig(format!(
                    "Invalid boolean for {} (`{}`)",
                    key, raw
                ))),
            },
            None => Ok(default),
        }
    }
}
