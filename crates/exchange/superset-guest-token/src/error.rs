//! Guest token exchange error types.

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

pub type GuestTokenResult<T> = Result<T, GuestTokenError>;

/// The remote call an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStep {
    Login,
    CsrfToken,
    GuestToken,
}

impl ExchangeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStep::Login => "login",
            ExchangeStep::CsrfToken => "csrf_token",
            ExchangeStep::GuestToken => "guest_token",
        }
    }
}

impl fmt::Display for ExchangeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GuestTokenError {
    #[error("Authentication failed ({status}): {body}")]
    AuthenticationFailed { status: StatusCode, body: String },

    #[error("Session establishment failed ({status}): {body}")]
    SessionEstablishmentFailed { status: StatusCode, body: String },

    #[error("Guest token issuance failed ({status}): {body}")]
    GuestTokenIssuanceFailed { status: StatusCode, body: String },

    #[error("Malformed {step} response: {detail}")]
    MalformedUpstreamResponse { step: ExchangeStep, detail: String },

    #[error("Transport failure during {step}: {source}")]
    TransportFailure {
        step: ExchangeStep,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl GuestTokenError {
    /// Builds the rejection variant that belongs to `step`.
    pub(crate) fn rejected(step: ExchangeStep, status: StatusCode, body: String) -> Self {
        match step {
            ExchangeStep::Login => GuestTokenError::AuthenticationFailed { status, body },
            ExchangeStep::CsrfToken => GuestTokenError::SessionEstablishmentFailed { status, body },
            ExchangeStep::GuestToken => GuestTokenError::GuestTokenIssuanceFailed { status, body },
        }
    }

    pub(crate) fn malformed(step: ExchangeStep, detail: impl Into<String>) -> Self {
        GuestTokenError::MalformedUpstreamResponse {
            step,
            detail: detail.into(),
        }
    }

    pub(crate) fn transport(step: ExchangeStep) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| GuestTokenError::TransportFailure { step, source }
    }

    /// Stable snake_case name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GuestTokenError::AuthenticationFailed { .. } => "authentication_failed",
            GuestTokenError::SessionEstablishmentFailed { .. } => "session_establishment_failed",
            GuestTokenError::GuestTokenIssuanceFailed { .. } => "guest_token_issuance_failed",
            GuestTokenError::MalformedUpstreamResponse { .. } => "malformed_upstream_response",
            GuestTokenError::TransportFailure { .. } => "transport_failure",
            GuestTokenError::ConfigError(_) | GuestTokenError::UrlError(_) => "config_error",
        }
    }

    /// The exchange step that failed, if the failure happened mid-exchange.
    pub fn step(&self) -> Option<ExchangeStep> {
        match self {
            GuestTokenError::AuthenticationFailed { .. } => Some(ExchangeStep::Login),
            GuestTokenError::SessionEstablishmentFailed { .. } => Some(ExchangeStep::CsrfToken),
            GuestTokenError::GuestTokenIssuanceFailed { .. } => Some(ExchangeStep::GuestToken),
            GuestTokenError::MalformedUpstreamResponse { step, .. }
            | GuestTokenError::TransportFailure { step, .. } => Some(*step),
            GuestTokenError::ConfigError(_) | GuestTokenError::UrlError(_) => None,
        }
    }

    /// HTTP status the remote service answered with, for rejections.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GuestTokenError::AuthenticationFailed { status, .. }
            | GuestTokenError::SessionEstablishmentFailed { status, .. }
            | GuestTokenError::GuestTokenIssuanceFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw error payload returned by the remote service, when there was one.
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            GuestTokenError::AuthenticationFailed { body, .. }
            | GuestTokenError::SessionEstablishmentFailed { body, .. }
            | GuestTokenError::GuestTokenIssuanceFailed { body, .. } => Some(body),
            _ => None,
        }
    }
}
