//! Wire types of the panel API and the outcome types the client surfaces.

use serde::{Deserialize, Serialize};

use crate::error::PanelError;

// ── Wire types ───────────────────────────────────────────────────────────────

/// Envelope every panel API endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub obj: Option<T>,
}

/// One provisioned VPN account, as embedded in an inbound's settings.
///
/// `email` is the lookup key (unique per inbound); `id` is the credential
/// the VPN protocol authenticates with; `subId` is the bearer token the
/// public subscription URL is built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientAccount {
    pub id: String,
    pub flow: String,
    pub email: String,
    #[serde(rename = "limitIp")]
    pub limit_ip: u32,
    #[serde(rename = "totalGB")]
    pub total_gb: u64,
    #[serde(rename = "expiryTime")]
    pub expiry_time: i64,
    pub enable: bool,
    /// Owner tag: the Telegram user id, stored as text. The authoritative
    /// key for "all accounts of this user" — emails may carry arbitrary
    /// collision suffixes.
    #[serde(rename = "tgId")]
    pub tg_id: String,
    #[serde(rename = "subId")]
    pub sub_id: String,
    pub comment: String,
    pub reset: i64,
    /// Only present on vmess inbounds.
    #[serde(rename = "alterId", skip_serializing_if = "Option::is_none")]
    pub alter_id: Option<u32>,
}

/// A panel-side listener new accounts attach to.
#[derive(Debug, Clone, Deserialize)]
pub struct Inbound {
    pub id: i64,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub enable: bool,
    /// JSON-encoded string embedding `{"clients": [...]}`.
    #[serde(default)]
    pub settings: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InboundSettings {
    clients: Vec<ClientAccount>,
}

impl Inbound {
    /// The accounts embedded in this inbound. An empty settings string means
    /// no clients; anything else must parse.
    pub fn clients(&self) -> Result<Vec<ClientAccount>, PanelError> {
        if self.settings.is_empty() {
            return Ok(Vec::new());
        }
        let settings: InboundSettings = serde_json::from_str(&self.settings).map_err(|e| {
            PanelError::MalformedResponse(format!("inbound {} settings: {e}", self.id))
        })?;
        Ok(settings.clients)
    }
}

// ── Client-facing types ──────────────────────────────────────────────────────

/// The Telegram identity an account is provisioned for.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: u64,
    /// Telegram username. Absent when the user never set one; provisioning
    /// is refused in that case.
    pub username: Option<String>,
}

impl Identity {
    pub fn new(id: u64, username: Option<String>) -> Self {
        Self { id, username }
    }
}

/// Tagged result of a provisioning attempt.
#[derive(Debug, Clone)]
pub enum ProvisionOutcome {
    /// A fresh account was created.
    Created { account: ClientAccount, url: String },
    /// The email key is already taken. The URL is recovered from the
    /// existing account when it could be re-read.
    AlreadyExists { url: Option<String> },
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The identity has no Telegram username to derive an email key from.
    UsernameRequired,
    /// No inbound id configured and no enabled inbound discovered.
    NoInboundAvailable,
    /// All collision suffixes up to `_100` are taken.
    TooManyDeviceSlots,
    /// Unclassified panel rejection.
    CreateFailed,
}

/// An account found by email, with its derived subscription URL (absent
/// when the account carries no subId).
#[derive(Debug, Clone)]
pub struct FoundAccount {
    pub account: ClientAccount,
    pub url: Option<String>,
}

/// Derived subscription view; recomputed from the panel state on every query.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub email: String,
    pub sub_id: String,
    pub label: DeviceLabel,
    pub url: String,
}

/// How an account relates to its owner's base username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLabel {
    /// The bare-username account.
    Primary,
    /// A named device, or the raw email when it matches no known pattern.
    Named(String),
}
