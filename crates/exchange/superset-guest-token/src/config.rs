//! Superset connection and guest grant configuration.

use crate::error::{GuestTokenError, GuestTokenResult};
use crate::types::RlsRule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const LOGIN_PATH: &str = "api/v1/security/login";
pub const CSRF_TOKEN_PATH: &str = "api/v1/security/csrf_token/";
pub const GUEST_TOKEN_PATH: &str = "api/v1/security/guest_token/";

/// Display names embedded in the guest token's synthetic user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuestUserConfig {
    pub first_name: String,
    pub last_name: String,
}

impl Default for GuestUserConfig {
    fn default() -> Self {
        Self {
            first_name: "Guest".to_string(),
            last_name: "User".to_string(),
        }
    }
}

/// Everything the exchange needs: where Superset lives, the privileged
/// service account, and what the guest is allowed to see.
#[derive(Clone, Serialize, Deserialize)]
pub struct SupersetConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Superset auth provider, `db` for the built-in user table
    #[serde(default = "default_provider")]
    pub provider: String,
    pub dashboard_id: String,
    /// Row level security clauses baked into every guest token
    #[serde(default)]
    pub rls: Vec<RlsRule>,
    #[serde(default)]
    pub guest: GuestUserConfig,
    /// Per-request timeout. Unset means wait for as long as the remote takes.
    #[serde(default)]
    pub http_timeout_seconds: Option<u64>,
}

fn default_provider() -> String {
    "db".to_string()
}

impl fmt::Debug for SupersetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupersetConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("provider", &self.provider)
            .field("dashboard_id", &self.dashboard_id)
            .field("rls", &self.rls)
            .field("guest", &self.guest)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .finish()
    }
}

impl SupersetConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        dashboard_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            provider: default_provider(),
            dashboard_id: dashboard_id.into(),
            rls: Vec::new(),
            guest: GuestUserConfig::default(),
            http_timeout_seconds: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_rls_rule(mut self, rule: RlsRule) -> Self {
        self.rls.push(rule);
        self
    }

    pub fn with_guest_name(
        mut self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        self.guest = GuestUserConfig {
            first_name: first_name.into(),
            last_name: last_name.into(),
        };
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = Some(seconds);
        self
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_seconds.map(Duration::from_secs)
    }

    pub fn validate(&self) -> GuestTokenResult<()> {
        let base = Url::parse(&self.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(GuestTokenError::ConfigError(format!(
                "base_url must be http or https, got '{}'",
                base.scheme()
            )));
        }

        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("provider", &self.provider),
            ("dashboard_id", &self.dashboard_id),
        ] {
            if value.trim().is_empty() {
                return Err(GuestTokenError::ConfigError(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        if self.rls.iter().any(|rule| rule.clause.trim().is_empty()) {
            return Err(GuestTokenError::ConfigError(
                "rls rules must have a non-empty clause".to_string(),
            ));
        }

        if self.http_timeout_seconds == Some(0) {
            return Err(GuestTokenError::ConfigError(
                "http_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Absolute URLs of the three security endpoints.
#[derive(Debug, Clone)]
pub struct SupersetEndpoints {
    pub login: Url,
    pub csrf_token: Url,
    pub guest_token: Url,
}

impl SupersetEndpoints {
    /// Resolves the endpoints against `base_url`, keeping any path prefix
    /// such as `https://host/superset`.
    pub fn from_base_url(base_url: &str) -> GuestTokenResult<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            login: base.join(LOGIN_PATH)?,
            csrf_token: base.join(CSRF_TOKEN_PATH)?,
            guest_token: base.join(GUEST_TOKEN_PATH)?,
        })
    }
}
