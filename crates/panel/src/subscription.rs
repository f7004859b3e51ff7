//! Subscription lookup and URL derivation.
//!
//! Subscriptions are never stored: they are recomputed from the inbound's
//! client list and the configured overrides on every query. Lookups are
//! linear scans — the panel offers no indexed access.

use tracing::warn;

use {
    crate::{
        PanelClient,
        error::PanelError,
        types::{DeviceLabel, FoundAccount, Subscription},
    },
    subgate_config::PanelConfig,
};

/// Port the panel serves subscription content on when nothing is configured.
const DEFAULT_SUBSCRIPTION_PORT: u16 = 2096;

impl PanelClient {
    /// Public subscription URL for a subId.
    pub fn subscription_url(&self, sub_id: &str) -> String {
        subscription_url(self.config(), sub_id)
    }

    /// Exact-email scan of the given inbound, or the configured default one.
    ///
    /// With neither an explicit nor a configured inbound id there is nothing
    /// to scan; that is reported as "not found" so that provisioning can
    /// fall back to the panel's own uniqueness check.
    pub async fn find_by_email(
        &self,
        email: &str,
        inbound_id: Option<i64>,
    ) -> Result<Option<FoundAccount>, PanelError> {
        self.ensure_authenticated().await?;

        let Some(inbound_id) = inbound_id.or(self.config().inbound_id) else {
            warn!("no inbound id available for account lookup");
            return Ok(None);
        };
        let Some(inbound) = self.inbound_by_id(inbound_id).await? else {
            return Ok(None);
        };

        let account = inbound.clients()?.into_iter().find(|c| c.email == email);
        Ok(account.map(|account| {
            let url =
                (!account.sub_id.is_empty()).then(|| self.subscription_url(&account.sub_id));
            FoundAccount { account, url }
        }))
    }

    /// Every subscription belonging to `owner_id`, in panel list order.
    ///
    /// Ownership is the tgId tag, not the email: device accounts may carry
    /// arbitrary collision-suffixed emails. Records without a subId cannot
    /// form a URL and are dropped.
    pub async fn list_by_owner(
        &self,
        owner_id: u64,
        base_username: Option<&str>,
    ) -> Result<Vec<Subscription>, PanelError> {
        self.ensure_authenticated().await?;

        let Some(inbound_id) = self.config().inbound_id else {
            warn!("no inbound id available for subscription listing");
            return Ok(Vec::new());
        };
        let Some(inbound) = self.inbound_by_id(inbound_id).await? else {
            return Ok(Vec::new());
        };

        let owner_tag = owner_id.to_string();
        let subscriptions = inbound
            .clients()?
            .into_iter()
            .filter(|c| c.tg_id == owner_tag)
            .filter(|c| !c.sub_id.is_empty())
            .map(|c| Subscription {
                url: self.subscription_url(&c.sub_id),
                label: device_label(&c.email, base_username),
                email: c.email,
                sub_id: c.sub_id,
            })
            .collect();
        Ok(subscriptions)
    }
}

/// How an account email reads as a device label, relative to the owner's
/// base username.
fn device_label(email: &str, base_username: Option<&str>) -> DeviceLabel {
    let Some(base) = base_username else {
        return DeviceLabel::Named(email.to_string());
    };
    if email == base {
        return DeviceLabel::Primary;
    }
    match email.strip_prefix(base).and_then(|rest| rest.strip_prefix('_')) {
        Some(device) => DeviceLabel::Named(device.to_string()),
        None => DeviceLabel::Named(email.to_string()),
    }
}

/// Derive the public subscription URL for `sub_id`.
///
/// Priority: configured subscription host (used verbatim, may carry a
/// port) → configured subscription port with the host parsed from the admin
/// base URL → parsed host with the fixed fallback port. The admin URL's own
/// scheme, port, and path never leak into the result.
pub(crate) fn subscription_url(config: &PanelConfig, sub_id: &str) -> String {
    if let Some(host) = &config.subscription_host {
        return format!("https://{host}/sub/{sub_id}");
    }
    let host = admin_host(&config.url);
    let port = config.subscription_port.unwrap_or(DEFAULT_SUBSCRIPTION_PORT);
    format!("https://{host}:{port}/sub/{sub_id}")
}

/// Host of the admin base URL: scheme, explicit port, and path stripped.
fn admin_host(base_url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(base_url)
        && let Some(host) = parsed.host_str()
    {
        return host.to_string();
    }
    // Not a parseable URL; strip by hand.
    let rest = base_url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let rest = rest.split('/').next().unwrap_or(rest);
    rest.split(':').next().unwrap_or(rest).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use subgate_config::PanelConfig;

    use {super::*, crate::PanelClient};

    fn config(url: &str) -> PanelConfig {
        PanelConfig {
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn host_override_is_used_verbatim() {
        let cfg = PanelConfig {
            subscription_host: Some("1.2.3.4:2096".into()),
            ..config("https://panel.example.com:54321/admin")
        };
        assert_eq!(
            subscription_url(&cfg, "Ab12_-xyz"),
            "https://1.2.3.4:2096/sub/Ab12_-xyz"
        );
    }

    #[test]
    fn port_override_combines_with_parsed_host() {
        let cfg = PanelConfig {
            subscription_port: Some(2096),
            ..config("https://panel.example.com:54321/admin")
        };
        assert_eq!(
            subscription_url(&cfg, "Ab12_-xyz"),
            "https://panel.example.com:2096/sub/Ab12_-xyz"
        );
    }

    #[test]
    fn fallback_port_applies_without_overrides() {
        let cfg = config("https://panel.example.com/admin");
        assert_eq!(
            subscription_url(&cfg, "Ab12_-xyz"),
            "https://panel.example.com:2096/sub/Ab12_-xyz"
        );
    }

    #[test]
    fn unparseable_base_url_is_stripped_by_hand() {
        let cfg = config("panel.example.com:54321/admin");
        assert_eq!(
            subscription_url(&cfg, "t"),
            "https://panel.example.com:2096/sub/t"
        );
    }

    #[test]
    fn device_labels_derive_from_base_username() {
        assert_eq!(device_label("alice", Some("alice")), DeviceLabel::Primary);
        assert_eq!(
            device_label("alice_phone", Some("alice")),
            DeviceLabel::Named("phone".into())
        );
        assert_eq!(
            device_label("alice_phone_2", Some("alice")),
            DeviceLabel::Named("phone_2".into())
        );
        assert_eq!(
            device_label("bob_tablet", Some("alice")),
            DeviceLabel::Named("bob_tablet".into())
        );
        assert_eq!(
            device_label("alice", None),
            DeviceLabel::Named("alice".into())
        );
    }

    fn panel_client(server: &mockito::ServerGuard, inbound_id: Option<i64>) -> PanelClient {
        let cfg = PanelConfig {
            inbound_id,
            ..config(&server.url())
        };
        PanelClient::new(cfg).unwrap()
    }

    async fn mock_login(server: &mut mockito::ServerGuard) {
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;
    }

    fn list_body_with_clients(clients: &str) -> String {
        let settings = serde_json::to_string(&format!("{{\"clients\":{clients}}}")).unwrap();
        format!(
            r#"{{"success":true,"msg":"","obj":[{{"id":1,"protocol":"vless","enable":true,"settings":{settings}}}]}}"#
        )
    }

    #[tokio::test]
    async fn list_by_owner_filters_and_preserves_order() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        let clients = r#"[
            {"id":"a","email":"alice_tablet","tgId":"100","subId":"t3"},
            {"id":"b","email":"bob","tgId":"200","subId":"t9"},
            {"id":"c","email":"alice","tgId":"100","subId":"t1"},
            {"id":"d","email":"alice_broken","tgId":"100","subId":""}
        ]"#;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body_with_clients(clients))
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));
        let subs = client.list_by_owner(100, Some("alice")).await.unwrap();

        // Other owners and subId-less records are gone; panel order stands.
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].email, "alice_tablet");
        assert_eq!(subs[0].label, DeviceLabel::Named("tablet".into()));
        assert_eq!(subs[1].email, "alice");
        assert_eq!(subs[1].label, DeviceLabel::Primary);
        assert_eq!(subs[1].url, "https://127.0.0.1:2096/sub/t1");
    }

    #[tokio::test]
    async fn list_by_owner_without_inbound_id_is_empty() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;

        let client = panel_client(&server, None);
        assert!(client.list_by_owner(100, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_by_email_matches_exactly() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        let clients = r#"[{"id":"a","email":"alice","tgId":"100","subId":"tok"}]"#;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body_with_clients(clients))
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));

        let found = client.find_by_email("alice", None).await.unwrap().unwrap();
        assert_eq!(found.account.id, "a");
        assert_eq!(found.url.as_deref(), Some("https://127.0.0.1:2096/sub/tok"));

        assert!(client.find_by_email("alic", None).await.unwrap().is_none());
        assert!(client.find_by_email("alice2", None).await.unwrap().is_none());
    }
}
