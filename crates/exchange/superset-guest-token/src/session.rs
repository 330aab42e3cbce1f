//! Per-exchange session state.
//!
//! Superset binds the CSRF token to the Flask session cookie set during the
//! exchange, so every request after login has to replay the cookies the
//! earlier responses set. A [`SessionContext`] lives for exactly one
//! exchange and is never shared; two concurrent exchanges never see each
//! other's cookies or bearer token.

use crate::types::BearerToken;
use reqwest::header::COOKIE;
use reqwest::{RequestBuilder, Response};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use tracing::trace;
use uuid::Uuid;

/// Session affinity state for one exchange.
#[derive(Debug, Clone)]
pub struct SessionContext {
    exchange_id: Uuid,
    cookies: BTreeMap<String, String>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            exchange_id: Uuid::new_v4(),
            cookies: BTreeMap::new(),
        }
    }

    pub fn exchange_id(&self) -> Uuid {
        self.exchange_id
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Records the cookies a response sets. A cookie replaces an earlier one
    /// with the same name; an expired cookie removes it.
    pub fn absorb(&mut self, response: &Response) {
        let now = SystemTime::now();
        for cookie in response.cookies() {
            let expired = cookie.max_age() == Some(Duration::ZERO)
                || cookie.expires().is_some_and(|expires| expires <= now);

            if expired {
                trace!(cookie = cookie.name(), "Dropping expired session cookie");
                self.cookies.remove(cookie.name());
            } else {
                trace!(cookie = cookie.name(), "Captured session cookie");
                self.cookies
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
    }

    /// Value for the `Cookie` request header, `None` when nothing was set.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }

        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Replays the captured cookies on an outgoing request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.cookie_header() {
            Some(header) => request.header(COOKIE, header),
            None => request,
        }
    }

    pub(crate) fn authenticate(self, bearer: BearerToken) -> AuthenticatedSession {
        AuthenticatedSession {
            context: self,
            bearer,
        }
    }
}

/// A session that completed the login step.
///
/// Only obtainable from a successful login, so the CSRF and guest token
/// steps cannot run without one.
#[derive(Debug)]
pub struct AuthenticatedSession {
    context: SessionContext,
    bearer: BearerToken,
}

impl AuthenticatedSession {
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn bearer(&self) -> &BearerToken {
        &self.bearer
    }

    pub fn absorb(&mut self, response: &Response) {
        self.context.absorb(response);
    }

    /// Adds the affinity cookies and the bearer credential to a request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        self.context
            .apply(request)
            .bearer_auth(self.bearer.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::SET_COOKIE;

    fn response_setting(cookies: &[&str]) -> Response {
        let mut builder = http::Response::builder().status(200);
        for cookie in cookies {
            builder = builder.header(SET_COOKIE, *cookie);
        }
        Response::from(builder.body("").unwrap())
    }

    #[test]
    fn test_new_context_is_empty() {
        let context = SessionContext::new();
        assert!(context.is_empty());
        assert_eq!(context.cookie_header(), None);
    }

    #[test]
    fn test_contexts_get_distinct_exchange_ids() {
        assert_ne!(
            SessionContext::new().exchange_id(),
            SessionContext::new().exchange_id()
        );
    }

    #[test]
    fn test_absorb_captures_name_and_value_only() {
        let mut context = SessionContext::new();
        context.absorb(&response_setting(&[
            "session=abc123; HttpOnly; Path=/; SameSite=Lax",
            "route=node-2; Path=/",
        ]));

        assert_eq!(context.cookie("session"), Some("abc123"));
        assert_eq!(context.cookie("route"), Some("node-2"));
        assert_eq!(
            context.cookie_header().as_deref(),
            Some("route=node-2; session=abc123")
        );
    }

    #[test]
    fn test_later_cookie_replaces_earlier() {
        let mut context = SessionContext::new();
        context.absorb(&response_setting(&["session=first; Path=/"]));
        context.absorb(&response_setting(&["session=second; Path=/"]));

        assert_eq!(context.cookie("session"), Some("second"));
    }

    #[test]
    fn test_expired_cookie_is_removed() {
        let mut context = SessionContext::new();
        context.absorb(&response_setting(&["session=abc; Path=/", "route=a; Path=/"]));
        context.absorb(&response_setting(&[
            "session=; Max-Age=0; Path=/",
            "route=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path=/",
        ]));

        assert!(context.is_empty());
    }

    #[test]
    fn test_response_without_cookies_keeps_state() {
        let mut context = SessionContext::new();
        context.absorb(&response_setting(&["session=abc"]));
        context.absorb(&response_setting(&[]));

        assert_eq!(context.cookie("session"), Some("abc"));
    }

    #[test]
    fn test_authenticated_session_adds_cookie_and_bearer() {
        let mut context = SessionContext::new();
        context.absorb(&response_setting(&["session=abc"]));
        let session = context.authenticate(BearerToken::new("A"));

        let request = session
            .apply(reqwest::Client::new().get("http://superset.local/"))
            .build()
            .unwrap();

        assert_eq!(
            request.headers().get(COOKIE).unwrap().to_str().unwrap(),
            "session=abc"
        );
        assert_eq!(
            request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .unwrap()
                .to_str()
                .unwrap(),
            "Bearer A"
        );
    }
}
