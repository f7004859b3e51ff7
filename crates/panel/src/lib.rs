//! Client for the administrative HTTP API of a 3x-ui panel.
//!
//! One [`PanelClient`] is built at process start and injected into every
//! caller. It owns the HTTP session (cookie jar plus an explicit
//! authenticated/unauthenticated state) and exposes four concerns:
//! session authentication with login-path discovery (`session`), inbound
//! discovery (`inbound`), idempotent account creation (`provision`), and
//! subscription lookup/URL derivation (`subscription`).
//!
//! Operations return tagged outcomes rather than aborting: panel-side
//! rejections are values, and only transport/auth/parse faults surface as
//! [`PanelError`].

use std::time::Duration;

use tokio::sync::Mutex;

use {crate::session::SessionState, subgate_config::PanelConfig};

mod error;
mod inbound;
mod provision;
mod session;
mod subscription;
pub mod types;

pub use {
    error::PanelError,
    types::{
        ClientAccount, DeviceLabel, FoundAccount, Identity, Inbound, ProvisionOutcome,
        RejectReason, Subscription,
    },
};

/// Fixed timeout for every panel request. There is no retry or backoff
/// beyond the bounded login-endpoint cycling; callers impose their own
/// upstream cancellation if they need one.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to one panel. Cheap to share behind an `Arc`; all operations take
/// `&self`.
///
/// The session authenticates lazily and is never proactively revalidated:
/// an expired session surfaces as an ordinary operation failure. The
/// existence pre-check and the create call in [`PanelClient::create_account`]
/// are not transactional, so concurrent provisioning for the same
/// identity/device must be serialized by the caller.
pub struct PanelClient {
    http: reqwest::Client,
    config: PanelConfig,
    session: Mutex<SessionState>,
}

impl PanelClient {
    pub fn new(config: PanelConfig) -> Result<Self, PanelError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        Ok(Self {
            http,
            config,
            session: Mutex::new(SessionState::Unauthenticated),
        })
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub(crate) fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }
}
