//! The login → CSRF → guest token exchange against Superset.

use crate::config::{SupersetConfig, SupersetEndpoints};
use crate::error::{ExchangeStep, GuestTokenError, GuestTokenResult};
use crate::session::{AuthenticatedSession, SessionContext};
use crate::types::{
    BearerToken, CsrfToken, CsrfTokenResponse, GUEST_USERNAME, GuestResource, GuestToken,
    GuestTokenRequest, GuestTokenResponse, GuestUser, LoginRequest, LoginResponse,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span};

/// Header Superset (Flask-WTF) reads the anti-forgery token from.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Anything that can hand out guest tokens.
#[async_trait]
pub trait GuestTokenSource: Send + Sync {
    async fn request_guest_token(&self) -> GuestTokenResult<GuestToken>;
}

/// Mints guest tokens by running the full three-step exchange on every call.
///
/// The underlying HTTP client carries no cookie store; all session state
/// lives in a fresh [`SessionContext`] per exchange.
#[derive(Clone)]
pub struct GuestTokenClient {
    http_client: Client,
    config: Arc<SupersetConfig>,
    endpoints: Arc<SupersetEndpoints>,
}

impl GuestTokenClient {
    pub fn new(config: SupersetConfig) -> GuestTokenResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
            GuestTokenError::ConfigError(format!("Failed to create HTTP client: {}", e))
        })?;

        Self::with_http_client(config, http_client)
    }

    /// Uses an existing client, e.g. to share a connection pool. The client
    /// must not have a cookie store enabled.
    pub fn with_http_client(config: SupersetConfig, http_client: Client) -> GuestTokenResult<Self> {
        config.validate()?;
        let endpoints = SupersetEndpoints::from_base_url(&config.base_url)?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
            endpoints: Arc::new(endpoints),
        })
    }

    pub fn config(&self) -> &SupersetConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &SupersetEndpoints {
        &self.endpoints
    }

    /// Runs login, CSRF and guest token requests in order. The first failing
    /// step aborts the exchange; nothing is retried or cached.
    pub async fn request_guest_token(&self) -> GuestTokenResult<GuestToken> {
        let session = SessionContext::new();
        let span = info_span!(
            "guest_token_exchange",
            exchange_id = %session.exchange_id(),
            dashboard_id = %self.config.dashboard_id,
        );

        async move {
            let mut session = self.login(session).await?;
            let csrf_token = self.fetch_csrf_token(&mut session).await?;
            let guest_token = self.issue_guest_token(&session, &csrf_token).await?;

            info!("Issued guest token");
            Ok(guest_token)
        }
        .instrument(span)
        .await
    }

    /// Step 1: authenticate the service account.
    pub async fn login(&self, mut session: SessionContext) -> GuestTokenResult<AuthenticatedSession> {
        let step = ExchangeStep::Login;
        let body = LoginRequest {
            username: &self.config.username,
            password: &self.config.password,
            provider: &self.config.provider,
        };

        let response = self
            .http_client
            .post(self.endpoints.login.clone())
            .json(&body)
            .send()
            .await
            .map_err(GuestTokenError::transport(step))?;

        session.absorb(&response);
        let login: LoginResponse = read_success(step, response).await?;
        let access_token = non_empty(step, "access_token", login.access_token)?;

        debug!(username = %self.config.username, "Logged in to Superset");
        Ok(session.authenticate(BearerToken::new(access_token)))
    }

    /// Step 2: fetch an anti-forgery token bound to the logged-in session.
    pub async fn fetch_csrf_token(
        &self,
        session: &mut AuthenticatedSession,
    ) -> GuestTokenResult<CsrfToken> {
        let step = ExchangeStep::CsrfToken;

        let response = session
            .apply(self.http_client.get(self.endpoints.csrf_token.clone()))
            .send()
            .await
            .map_err(GuestTokenError::transport(step))?;

        // Flask stores the CSRF secret in the session cookie, which this
        // response rewrites.
        session.absorb(&response);
        let csrf: CsrfTokenResponse = read_success(step, response).await?;
        let token = non_empty(step, "result", csrf.result)?;

        debug!("Obtained CSRF token");
        Ok(CsrfToken::new(token))
    }

    /// Step 3: exchange bearer and CSRF tokens for a dashboard guest token.
    pub async fn issue_guest_token(
        &self,
        session: &AuthenticatedSession,
        csrf_token: &CsrfToken,
    ) -> GuestTokenResult<GuestToken> {
        let step = ExchangeStep::GuestToken;

        let response = session
            .apply(self.http_client.post(self.endpoints.guest_token.clone()))
            .header(CSRF_HEADER, csrf_token.as_str())
            .json(&self.guest_token_request())
            .send()
            .await
            .map_err(GuestTokenError::transport(step))?;

        let issued: GuestTokenResponse = read_success(step, response).await?;
        let token = non_empty(step, "token", issued.token)?;

        Ok(GuestToken::new(token))
    }

    /// Body of the guest token request for the configured dashboard.
    pub fn guest_token_request(&self) -> GuestTokenRequest {
        GuestTokenRequest {
            user: GuestUser {
                username: GUEST_USERNAME.to_string(),
                first_name: self.config.guest.first_name.clone(),
                last_name: self.config.guest.last_name.clone(),
            },
            rls: self.config.rls.clone(),
            resources: vec![GuestResource::dashboard(self.config.dashboard_id.clone())],
        }
    }
}

#[async_trait]
impl GuestTokenSource for GuestTokenClient {
    async fn request_guest_token(&self) -> GuestTokenResult<GuestToken> {
        GuestTokenClient::request_guest_token(self).await
    }
}

/// Classifies a response: non-2xx is the step's rejection, an undecodable
/// 2xx body is malformed.
async fn read_success<T: DeserializeOwned>(
    step: ExchangeStep,
    response: Response,
) -> GuestTokenResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(GuestTokenError::transport(step))?;

    if !status.is_success() {
        error!(%step, %status, body = %body, "Superset rejected request");
        return Err(GuestTokenError::rejected(step, status, body));
    }

    serde_json::from_str(&body).map_err(|e| {
        error!(%step, error = %e, "Superset returned an undecodable body");
        GuestTokenError::malformed(step, e.to_string())
    })
}

fn non_empty(step: ExchangeStep, field: &str, value: Option<String>) -> GuestTokenResult<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => {
            error!(%step, field, "Superset response is missing a required field");
            Err(GuestTokenError::malformed(
                step,
                format!("missing or empty '{}'", field),
            ))
        }
    }
}
