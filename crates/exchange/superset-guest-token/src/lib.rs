//! Superset embedded-dashboard guest token exchange.
//!
//! Mints guest tokens for one configured dashboard by running Superset's
//! three-step security API exchange:
//!
//! 1. `POST /api/v1/security/login` as a privileged service account,
//! 2. `GET /api/v1/security/csrf_token/` within the same session,
//! 3. `POST /api/v1/security/guest_token/` with both tokens.
//!
//! Each exchange owns its own [`SessionContext`]; the HTTP client shared
//! between exchanges holds no cookies, so concurrent callers never share a
//! session.
//!
//! ```no_run
//! use superset_guest_token::{GuestTokenClient, SupersetConfig};
//!
//! # async fn run() -> superset_guest_token::GuestTokenResult<()> {
//! let config = SupersetConfig::new("http://localhost:8088", "admin", "admin", "12");
//! let client = GuestTokenClient::new(config)?;
//! let token = client.request_guest_token().await?;
//! println!("{}", token);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod types;


pub use client::{CSRF_HEADER, GuestTokenClient, GuestTokenSource};
pub use config::{GuestUserConfig, SupersetConfig, SupersetEndpoints};
pub use error::{ExchangeStep, GuestTokenError, GuestTokenResult};
pub use session::{AuthenticatedSession, SessionContext};
pub use types::{BearerToken, CsrfToken, GuestResource, GuestToken, GuestTokenRequest, RlsRule};
