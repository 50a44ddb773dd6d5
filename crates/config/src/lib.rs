use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "campus.toml",
    "config/campus.toml",
    "crates/config/campus.toml",
    "../campus.toml",
    "../config/campus.toml",
    "../crates/config/campus.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://campus.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Token validation settings shared by the WebSocket upgrade and the REST routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_issuer")]
    pub issuer: String,
    #[serde(default = "AuthConfig::default_audience")]
    pub audience: String,
}

impl AuthConfig {
    fn default_issuer() -> String {
        "campus".to_string()
    }

    fn default_audience() -> String {
        "campus-users".to_string()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            issuer: Self::default_issuer(),
            audience: Self::default_audience(),
        }
    }
}

/// Live-delivery tuning.
///
/// ```
/// use campus_config::MessagingConfig;
///
/// let messaging = MessagingConfig::default();
/// assert_eq!(messaging.keepalive_interval_seconds, 30);
/// assert_eq!(messaging.outbound_buffer, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default = "MessagingConfig::default_keepalive")]
    pub keepalive_interval_seconds: u64,
    #[serde(default = "MessagingConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl MessagingConfig {
    const fn default_keepalive() -> u64 {
        30
    }

    const fn default_outbound_buffer() -> usize {
        64
    }

    pub fn keepalive_interval(&self) -> Duration {
        // a zero interval would make tokio's ticker panic
        Duration::from_secs(self.keepalive_interval_seconds.max(1))
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_seconds: Self::default_keepalive(),
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use campus_config::load;
///
/// std::env::remove_var("CAMPUS_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let keepalive = i64::try_from(defaults.messaging.keepalive_interval_seconds).unwrap_or(i64::MAX);
    let outbound_buffer = i64::try_from(defaults.messaging.outbound_buffer).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default("database.max_connections", i64::from(defaults.database.max_connections))?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?
        .set_default("auth.audience", defaults.auth.audience.clone())?
        .set_default("messaging.keepalive_interval_seconds", keepalive)?
        .set_default("messaging.outbound_buffer", outbound_buffer)?;

    let environment_overrides = config::Environment::with_prefix("CAMPUS").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CAMPUS_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CAMPUS_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(
        http.address = %config.http.address,
        http.port = config.http.port,
        database.url = %config.database.url,
        keepalive = config.messaging.keepalive_interval_seconds,
        "loaded backend configuration"
    );
    Ok(config)
}
