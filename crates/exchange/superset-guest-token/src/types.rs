//! Superset security API wire types and the tokens they carry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Username of the synthetic principal every guest token is issued to.
pub const GUEST_USERNAME: &str = "guest";

/// Privileged access token returned by the login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// Anti-forgery token, only valid within the session that fetched it.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(<redacted>)")
    }
}

/// Short-lived token granting anonymous view access to one dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestToken(String);

impl GuestToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for GuestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row level security rule applied to the guest's queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RlsRule {
    pub clause: String,
    /// Restricts the clause to one dataset; applies to all datasets when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<u64>,
}

impl RlsRule {
    pub fn new(clause: impl Into<String>) -> Self {
        Self {
            clause: clause.into(),
            dataset: None,
        }
    }

    pub fn for_dataset(mut self, dataset: u64) -> Self {
        self.dataset = Some(dataset);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub provider: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfTokenResponse {
    pub result: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Dashboard,
}

/// A resource the guest token grants access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestResource {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub id: String,
}

impl GuestResource {
    pub fn dashboard(id: impl Into<String>) -> Self {
        Self {
            resource_type: ResourceType::Dashboard,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuestTokenRequest {
    pub user: GuestUser,
    pub rls: Vec<RlsRule>,
    pub resources: Vec<GuestResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuestTokenResponse {
    pub token: Option<String>,
}
