//! Config schema types. Every field can come from `subgate.toml` or be
//! overridden through a `SUBGATE_*` environment variable (see `loader`).

use {
    secrecy::SecretString,
    serde::Deserialize,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubgateConfig {
    pub telegram: TelegramConfig,
    pub panel: PanelConfig,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token. Required at startup.
    pub token: Option<SecretString>,

    /// HTTPS page that copies a query-string URL to the clipboard. When set,
    /// subscription messages carry a web-app "copy link" button.
    pub web_app_url: Option<String>,
}

/// Connection and provisioning defaults for the 3x-ui panel.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Admin base URL, e.g. `https://1.2.3.4:54321`. Required at startup.
    /// Trailing slashes are trimmed on load.
    pub url: String,

    /// Admin username.
    pub username: String,

    /// Admin password.
    pub password: SecretString,

    /// Protocol of the inbound new accounts attach to.
    pub protocol: String,

    /// Traffic quota per account, in gigabytes.
    pub quota_gb: u64,

    /// Fixed inbound id. When set it always wins over inbound discovery.
    pub inbound_id: Option<i64>,

    /// Full `host[:port]` for subscription URLs, e.g. `1.2.3.4:2096`.
    /// Takes precedence over `subscription_port`.
    pub subscription_host: Option<String>,

    /// Subscription port to combine with the host parsed from `url`.
    pub subscription_port: Option<u16>,

    /// Verify the panel's TLS certificate. Panels ship self-signed certs,
    /// so this is off by default.
    pub verify_tls: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: "admin".into(),
            password: SecretString::new("admin".into()),
            protocol: "vmess".into(),
            quota_gb: 100,
            inbound_id: None,
            subscription_host: None,
            subscription_port: None,
            verify_tls: false,
        }
    }
}

impl PanelConfig {
    /// Quota in bytes, as the panel stores it.
    pub fn quota_bytes(&self) -> u64 {
        self.quota_gb * 1024 * 1024 * 1024
    }
}
