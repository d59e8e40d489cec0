//! Configuration management for the pushgate service.

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use pushgate_dispatch::{
    DispatcherConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_SEND_TIMEOUT_SECONDS, DEFAULT_WORKER_COUNT,
};
use pushgate_fcm::{FcmConfig, DEFAULT_FCM_ENDPOINT};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "pushgate.toml";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`pushgate.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// # Example
///
/// ```no_run
/// use pushgate_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // Dispatch
    /// Number of concurrent delivery workers.
    ///
    /// Environment variable: `WORKER_POOL_SIZE`
    #[serde(default = "default_worker_pool_size", alias = "WORKER_POOL_SIZE")]
    pub worker_pool_size: usize,
    /// Notifications held waiting for a worker before submissions are
    /// rejected.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[serde(default = "default_queue_capacity", alias = "QUEUE_CAPACITY")]
    pub queue_capacity: usize,
    /// Deadline for a single provider call in seconds; `0` disables it.
    ///
    /// Environment variable: `SEND_TIMEOUT_SECONDS`
    #[serde(default = "default_send_timeout", alias = "SEND_TIMEOUT_SECONDS")]
    pub send_timeout_seconds: u64,
    /// Time allowed for the HTTP listener to close before draining.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_SECONDS`
    #[serde(default = "default_shutdown_grace", alias = "SHUTDOWN_GRACE_SECONDS")]
    pub shutdown_grace_seconds: u64,

    // FCM
    /// Path to the service account key file.
    ///
    /// Environment variable: `GOOGLE_APPLICATION_CREDENTIALS`
    #[serde(default = "default_credentials_path", alias = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub google_application_credentials: PathBuf,
    /// FCM API base URL.
    ///
    /// Environment variable: `FCM_ENDPOINT`
    #[serde(default = "default_fcm_endpoint", alias = "FCM_ENDPOINT")]
    pub fcm_endpoint: String,

    // Logging
    /// Tracing filter directives, in `EnvFilter` syntax.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a source holds a value of the wrong type or the
    /// merged configuration fails validation.
    pub fn load() -> Result<Self> {
        let config: Self = Self::figment().extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Layered configuration sources, lowest priority first.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""))
    }

    /// Convert to the dispatch engine's configuration.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            worker_count: self.worker_pool_size,
            queue_capacity: self.queue_capacity,
            send_timeout: (self.send_timeout_seconds > 0)
                .then(|| Duration::from_secs(self.send_timeout_seconds)),
        }
    }

    /// Convert to the FCM client's configuration.
    ///
    /// The HTTP timeout never outlives the dispatcher's send deadline.
    pub fn to_fcm_config(&self) -> FcmConfig {
        let defaults = FcmConfig::default();
        let request_timeout = match self.send_timeout_seconds {
            0 => defaults.request_timeout,
            seconds => defaults.request_timeout.min(Duration::from_secs(seconds)),
        };

        FcmConfig { endpoint: self.fcm_endpoint.clone(), request_timeout, ..defaults }
    }

    /// Parse server socket address from host and port configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Listener shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.worker_pool_size == 0 {
            anyhow::bail!("worker_pool_size must be greater than 0");
        }

        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be greater than 0");
        }

        if self.google_application_credentials.as_os_str().is_empty() {
            anyhow::bail!("google_application_credentials must name a key file");
        }

        if self.fcm_endpoint.trim().is_empty() {
            anyhow::bail!("fcm_endpoint must not be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            worker_pool_size: default_worker_pool_size(),
            queue_capacity: default_queue_capacity(),
            send_timeout_seconds: default_send_timeout(),
            shutdown_grace_seconds: default_shutdown_grace(),
            google_application_credentials: default_credentials_path(),
            fcm_endpoint: default_fcm_endpoint(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8083
}

fn default_request_timeout() -> u64 {
    30
}

fn default_worker_pool_size() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_send_timeout() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECONDS
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("service-account.json")
}

fn default_fcm_endpoint() -> String {
    DEFAULT_FCM_ENDPOINT.to_string()
}

fn default_log_level() -> String {
    "info,pushgate=debug,tower_http=debug".to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.port, 8083);
        assert_eq!(config.worker_pool_size, 50);
        assert_eq!(config.queue_capacity, 5000);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.google_application_credentials, PathBuf::from("service-account.json"));
        assert_eq!(config.rust_log, "info,pushgate=debug,tower_http=debug");
    }

    #[test]
    fn environment_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("PORT", "9090");
            jail.set_env("WORKER_POOL_SIZE", "8");
            jail.set_env("QUEUE_CAPACITY", "64");
            jail.set_env("GOOGLE_APPLICATION_CREDENTIALS", "/etc/pushgate/key.json");
            jail.set_env("FCM_ENDPOINT", "http://localhost:9099");

            let config = Config::load().expect("config loads");
            assert_eq!(config.port, 9090);
            assert_eq!(config.worker_pool_size, 8);
            assert_eq!(config.queue_capacity, 64);
            assert_eq!(
                config.google_application_credentials,
                PathBuf::from("/etc/pushgate/key.json")
            );
            assert_eq!(config.fcm_endpoint, "http://localhost:9099");
            Ok(())
        });
    }

    #[test]
    fn file_is_overridden_by_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                port = 7000
                worker_pool_size = 12
                send_timeout_seconds = 10
                "#,
            )?;
            jail.set_env("WORKER_POOL_SIZE", "20");

            let config = Config::load().expect("config loads");
            assert_eq!(config.port, 7000);
            assert_eq!(config.worker_pool_size, 20);
            assert_eq!(config.send_timeout_seconds, 10);
            Ok(())
        });
    }

    #[test]
    fn log_filter_comes_from_configuration() {
        Jail::expect_with(|jail| {
            std::env::remove_var("RUST_LOG");
            jail.create_file(CONFIG_FILE, r#"rust_log = "warn,pushgate=trace""#)?;

            let config = Config::load().expect("config loads");
            assert_eq!(config.rust_log, "warn,pushgate=trace");

            jail.set_env("RUST_LOG", "error");
            let config = Config::load().expect("config loads");
            assert_eq!(config.rust_log, "error");
            Ok(())
        });
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("QUEUE_CAPACITY", "0");

            let error = Config::load().unwrap_err();
            assert!(error.to_string().contains("queue_capacity"));
            Ok(())
        });
    }

    #[test]
    fn invalid_config_validation_fails() {
        let mut config = Config::default();
        config.port = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.worker_pool_size = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.google_application_credentials = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn dispatcher_conversion_honours_disabled_deadline() {
        let mut config = Config { worker_pool_size: 4, queue_capacity: 16, ..Default::default() };

        let dispatcher = config.to_dispatcher_config();
        assert_eq!(dispatcher.worker_count, 4);
        assert_eq!(dispatcher.queue_capacity, 16);
        assert_eq!(dispatcher.send_timeout, Some(Duration::from_secs(30)));

        config.send_timeout_seconds = 0;
        assert_eq!(config.to_dispatcher_config().send_timeout, None);
    }

    #[test]
    fn fcm_request_timeout_fits_inside_send_deadline() {
        let config = Config { send_timeout_seconds: 3, ..Default::default() };
        let fcm = config.to_fcm_config();
        assert_eq!(fcm.request_timeout, Duration::from_secs(3));
        assert_eq!(fcm.endpoint, DEFAULT_FCM_ENDPOINT);
    }

    #[test]
    fn socket_address_parsing() {
        let config = Config { host: "127.0.0.1".to_string(), port: 9000, ..Default::default() };

        let addr = config.parse_server_addr().expect("Should parse socket address");
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 9000);
    }
}
