//! Configuration for the guest token server
//!
//! Sources, lowest precedence first:
//! - Default values
//! - Configuration file (config.toml, or `--config` / GUEST_TOKEN_CONFIG_FILE)
//! - Environment variables with the GUEST_TOKEN prefix, `__` between keys
//!   (e.g. GUEST_TOKEN__SUPERSET__BASE_URL)
//! - Legacy single variables (SUPERSET_URL, DASHBOARD_ID, PORT, ...)

use crate::routes::EmbedSettings;
use anyhow::{Context, Result, anyhow};
use config::{Config as ConfigBuilder, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use superset_guest_token::SupersetConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const CONFIG_FILE_ENV: &str = "GUEST_TOKEN_CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "GUEST_TOKEN";
const LOG_LEVELS: &[&str] = &["off", "trace", "debug", "info", "warn", "error"];

/// Legacy environment variables and the keys they override.
const LEGACY_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("PORT", "server.port"),
    ("SUPERSET_URL", "superset.base_url"),
    ("SUPERSET_USERNAME", "superset.username"),
    ("SUPERSET_PASSWORD", "superset.password"),
    ("SUPERSET_PROVIDER", "superset.provider"),
    ("DASHBOARD_ID", "superset.dashboard_id"),
    ("RUST_LOG", "logging.level"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Superset connection, service account and guest grant
    pub superset: SupersetConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where each value came from, logged once tracing is up
    #[serde(skip)]
    pub sources: Vec<String>,
}

/// Server network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or IP address to bind to (default: 127.0.0.1)
    pub host: String,

    /// Port to bind to (default: 3000)
    pub port: u16,

    /// Directory with the embedding page and other static assets
    pub static_dir: PathBuf,

    /// Superset address as the browser reaches it, handed to the embedding
    /// page. Falls back to `superset.base_url`.
    pub superset_domain: Option<String>,

    pub cors: CorsConfig,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Whether to allow any origin (default: true)
    pub allow_any_origin: bool,

    /// Specific allowed origins (only used if allow_any_origin is false)
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 3000,
            static_dir: PathBuf::from("public"),
            superset_domain: None,
            cors: CorsConfig::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_any_origin: true,
            allowed_origins: vec![],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, the process environment and
    /// legacy variables, then validate it.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_from_vars(config_path, std::env::vars().collect())
    }

    /// Same as [`Config::load`] with an explicit set of environment variables.
    ///
    /// Environment values are kept as strings; `config` converts them only
    /// when a field asks for a number or bool, so `0123` stays `0123`.
    pub fn load_from_vars(config_path: Option<&Path>, vars: Map<String, String>) -> Result<Self> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .or_else(|| vars.get(CONFIG_FILE_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut sources = Vec::new();
        let mut builder = ConfigBuilder::builder();

        if config_path.exists() {
            sources.push(format!("Loaded configuration from {}", config_path.display()));
            builder = builder.add_source(File::from(config_path.as_path()));
        } else {
            sources.push(format!(
                "No config file found at {}, using environment only",
                config_path.display()
            ));
        }

        let prefix = format!("{}__", ENV_PREFIX);
        if vars.keys().any(|key| key.starts_with(&prefix)) {
            sources.push(format!("Using {}* environment variables", prefix));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .source(Some(vars.clone())),
        );

        for (var, key) in LEGACY_OVERRIDES {
            if let Some(value) = vars.get(*var) {
                sources.push(format!("Using {} environment variable", var));
                builder = builder
                    .set_override(*key, value.as_str())
                    .with_context(|| format!("Invalid {} value", var))?;
            }
        }

        let mut settings: Config = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        settings.sources = sources;

        settings.validate()?;
        Ok(settings)
    }

    /// Log where the configuration came from.
    pub fn log_sources(&self) {
        for source in &self.sources {
            info!("{}", source);
        }
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings: Config = ConfigBuilder::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.server.host.trim().is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        self.superset
            .validate()
            .context("Invalid superset configuration")?;

        EnvFilter::try_new(self.log_filter()).map_err(|e| {
            anyhow!(
                "Invalid log level '{}': {}. Use one of {:?} or a filter directive",
                self.logging.level,
                e,
                LOG_LEVELS
            )
        })?;

        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            );
        }

        if !self.server.cors.allow_any_origin {
            if self.server.cors.allowed_origins.is_empty() {
                anyhow::bail!(
                    "CORS: If allow_any_origin is false, allowed_origins must be specified"
                );
            }
            for origin in &self.server.cors.allowed_origins {
                axum::http::HeaderValue::from_str(origin)
                    .with_context(|| format!("CORS: invalid origin '{}'", origin))?;
            }
        }

        Ok(())
    }

    /// Resolve the bind address; `host` may be a name such as `localhost`.
    pub async fn resolve_socket_addr(&self) -> Result<SocketAddr> {
        let host = self.server.host.as_str();
        tokio::net::lookup_host((host, self.server.port))
            .await
            .with_context(|| format!("Failed to resolve host '{}'", host))?
            .next()
            .ok_or_else(|| anyhow!("Host '{}' resolved to no addresses", host))
    }

    /// What the embedding page needs to mount the dashboard.
    pub fn embed_settings(&self) -> EmbedSettings {
        let domain = self
            .server
            .superset_domain
            .as_deref()
            .unwrap_or(&self.superset.base_url);
        EmbedSettings {
            superset_domain: domain.trim_end_matches('/').to_string(),
            dashboard_id: self.superset.dashboard_id.clone(),
        }
    }

    /// Get the log filter string for tracing. A bare level applies to this
    /// server's crates and everything else; anything else is used verbatim.
    pub fn log_filter(&self) -> String {
        let level = self.logging.level.to_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            format!(
                "guest_token_server={level},superset_guest_token={level},tower_http={level},{level}"
            )
        } else {
            self.logging.level.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [superset]
        base_url = "http://192.168.178.10:8088"
        username = "admin"
        password = "admin"
        dashboard_id = "12"
    "#;

    fn vars(pairs: &[(&str, &str)]) -> Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.static_dir, PathBuf::from("public"));
        assert!(config.server.cors.allow_any_origin);
        assert_eq!(config.superset.provider, "db");
        assert!(config.superset.rls.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.embed_settings(),
            EmbedSettings {
                superset_domain: "http://192.168.178.10:8088".to_string(),
                dashboard_id: "12".to_string(),
            }
        );
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            static_dir = "site"
            superset_domain = "https://bi.example.com/"

            [server.cors]
            allow_any_origin = false
            allowed_origins = ["https://app.example.com"]

            [superset]
            base_url = "http://superset.internal:8088"
            username = "svc"
            password = "secret"
            provider = "ldap"
            dashboard_id = "7"
            http_timeout_seconds = 10

            [[superset.rls]]
            clause = "region = 'EU'"
            dataset = 4

            [superset.guest]
            first_name = "Kiosk"
            last_name = "Viewer"

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.embed_settings().superset_domain,
            "https://bi.example.com"
        );
        assert_eq!(config.embed_settings().dashboard_id, "7");
        assert_eq!(config.superset.provider, "ldap");
        assert_eq!(config.superset.rls.len(), 1);
        assert_eq!(config.superset.rls[0].dataset, Some(4));
        assert_eq!(config.superset.guest.first_name, "Kiosk");
        assert_eq!(config.superset.http_timeout_seconds, Some(10));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_superset_section_is_rejected() {
        assert!(Config::from_toml_str("[server]\nport = 3000\n").is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();

        config.server.port = 0;
        assert!(config.validate().is_err());
        config.server.port = 3000;

        config.server.host = " ".to_string();
        assert!(config.validate().is_err());
        config.server.host = "localhost".to_string();

        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
        config.logging.format = "compact".to_string();

        config.logging.level = "superset_guest_token=loud".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "warn".to_string();

        config.server.cors.allow_any_origin = false;
        assert!(config.validate().is_err());
        config.server.cors.allowed_origins = vec!["https://app.example.com".to_string()];
        assert!(config.validate().is_ok());

        config.superset.dashboard_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_any_env_filter_is_a_valid_level() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();

        for level in [
            "off",
            "OFF",
            "trace",
            "superset_guest_token",
            "warn,superset_guest_token=trace",
            "tower_http::trace=debug",
        ] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "level {level:?} was rejected");
        }
    }

    #[test]
    fn test_log_filter() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(
            config.log_filter(),
            "guest_token_server=info,superset_guest_token=info,tower_http=info,info"
        );

        config.logging.level = "off".to_string();
        assert_eq!(
            config.log_filter(),
            "guest_token_server=off,superset_guest_token=off,tower_http=off,off"
        );

        config.logging.level = "superset_guest_token".to_string();
        assert_eq!(config.log_filter(), "superset_guest_token");

        config.logging.level = "warn,superset_guest_token=trace".to_string();
        assert_eq!(config.log_filter(), "warn,superset_guest_token=trace");
    }

    #[test]
    fn test_env_values_are_kept_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_vars(
            Some(&dir.path().join("missing.toml")),
            vars(&[
                ("GUEST_TOKEN__SUPERSET__BASE_URL", "http://superset:8088"),
                ("GUEST_TOKEN__SUPERSET__USERNAME", "1e3"),
                ("GUEST_TOKEN__SUPERSET__PASSWORD", "0123"),
                ("GUEST_TOKEN__SUPERSET__DASHBOARD_ID", "007"),
                ("GUEST_TOKEN__SUPERSET__GUEST__FIRST_NAME", "TRUE"),
                ("GUEST_TOKEN__SUPERSET__GUEST__LAST_NAME", "1.50"),
                ("GUEST_TOKEN__SERVER__PORT", "8080"),
                ("GUEST_TOKEN__SERVER__CORS__ALLOW_ANY_ORIGIN", "true"),
                ("GUEST_TOKEN__SUPERSET__HTTP_TIMEOUT_SECONDS", "15"),
            ]),
        )
        .unwrap();

        assert_eq!(config.superset.username, "1e3");
        assert_eq!(config.superset.password, "0123");
        assert_eq!(config.superset.dashboard_id, "007");
        assert_eq!(config.superset.guest.first_name, "TRUE");
        assert_eq!(config.superset.guest.last_name, "1.50");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.cors.allow_any_origin);
        assert_eq!(config.superset.http_timeout_seconds, Some(15));
    }

    #[test]
    fn test_legacy_vars_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load_from_vars(
            Some(&path),
            vars(&[
                ("HOST", "localhost"),
                ("PORT", "4000"),
                ("SUPERSET_PASSWORD", "00042"),
                ("DASHBOARD_ID", "0x1f"),
                ("RUST_LOG", "off"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.superset.password, "00042");
        assert_eq!(config.superset.dashboard_id, "0x1f");
        assert_eq!(config.superset.username, "admin");
        assert_eq!(config.logging.level, "off");
    }

    #[test]
    fn test_sources_are_recorded_for_later_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = Config::load_from_vars(
            Some(&path),
            vars(&[("SUPERSET_URL", "http://superset:8088")]),
        )
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert!(config.sources[0].contains(&path.display().to_string()));
        assert_eq!(config.sources[1], "Using SUPERSET_URL environment variable");

        let missing = dir.path().join("missing.toml");
        let err = Config::load_from_vars(Some(&missing), vars(&[])).unwrap_err();
        assert!(format!("{err:#}").contains("superset"));
    }

    #[tokio::test]
    async fn test_resolve_socket_addr() {
        let mut config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(
            config.resolve_socket_addr().await.unwrap().to_string(),
            "127.0.0.1:3000"
        );

        config.server.host = "localhost".to_string();
        config.server.port = 8080;
        let addr = config.resolve_socket_addr().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8080);

        config.server.host = "no such host.invalid".to_string();
        assert!(config.resolve_socket_addr().await.is_err());
    }
}
