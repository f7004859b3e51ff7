//! Account creation.
//!
//! `create_account` issues at most one mutating call per invocation. The
//! email existence pre-check and the create are a read-then-write pair with
//! no server-side idempotency key; callers that may provision the same
//! identity/device concurrently must serialize those calls themselves.

use {
    reqwest::StatusCode,
    tracing::{debug, info, warn},
};

use crate::{
    PanelClient,
    error::PanelError,
    types::{ApiEnvelope, ClientAccount, Identity, ProvisionOutcome, RejectReason},
};

/// Cap on `username_device_N` collision suffixes.
const MAX_DEVICE_SLOTS: u32 = 100;

impl PanelClient {
    /// Create a panel account for `identity`, optionally for a named device.
    ///
    /// The email key is the bare username for the primary device and
    /// `username_device[_N]` for additional ones. An account that already
    /// holds the primary key short-circuits to [`ProvisionOutcome::AlreadyExists`]
    /// with its recovered URL.
    pub async fn create_account(
        &self,
        identity: &Identity,
        device: Option<&str>,
    ) -> Result<ProvisionOutcome, PanelError> {
        let Some(username) = identity.username.as_deref() else {
            warn!(owner_id = identity.id, "cannot provision without a username");
            return Ok(ProvisionOutcome::Rejected(RejectReason::UsernameRequired));
        };
        self.ensure_authenticated().await?;

        let email = match device {
            None => {
                if let Some(existing) = self.find_by_email(username, None).await? {
                    info!(email = %username, "primary account already exists");
                    return Ok(ProvisionOutcome::AlreadyExists { url: existing.url });
                }
                username.to_string()
            },
            Some(device) => match self.free_device_email(username, device).await? {
                Some(email) => email,
                None => {
                    warn!(%username, %device, "all device slots taken");
                    return Ok(ProvisionOutcome::Rejected(RejectReason::TooManyDeviceSlots));
                },
            },
        };

        let inbound_id = match self.config().inbound_id {
            Some(id) => {
                debug!(inbound_id = id, "using configured inbound");
                id
            },
            None => match self.resolve_inbound(Some(&self.config().protocol)).await? {
                Some(inbound) => {
                    debug!(inbound_id = inbound.id, protocol = %inbound.protocol, "using discovered inbound");
                    inbound.id
                },
                None => {
                    warn!(
                        protocol = %self.config().protocol,
                        "no enabled inbound found and no inbound id configured"
                    );
                    return Ok(ProvisionOutcome::Rejected(RejectReason::NoInboundAvailable));
                },
            },
        };

        let account = self.new_account_record(identity, email);
        self.submit_account(inbound_id, account).await
    }

    /// First free device email: `username_device`, then `_2` through `_100`.
    async fn free_device_email(
        &self,
        username: &str,
        device: &str,
    ) -> Result<Option<String>, PanelError> {
        let base = format!("{username}_{device}");
        if self.find_by_email(&base, None).await?.is_none() {
            return Ok(Some(base));
        }
        for n in 2..=MAX_DEVICE_SLOTS {
            let candidate = format!("{base}_{n}");
            if self.find_by_email(&candidate, None).await?.is_none() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Build the account record. Both tokens are generated fresh per
    /// account and never derived from user input: the subId ends up in a
    /// public URL and acts as a bearer credential.
    fn new_account_record(&self, identity: &Identity, email: String) -> ClientAccount {
        ClientAccount {
            id: uuid::Uuid::new_v4().to_string(),
            flow: String::new(),
            email,
            limit_ip: 0,
            total_gb: self.config().quota_bytes(),
            expiry_time: 0,
            enable: true,
            tg_id: identity.id.to_string(),
            sub_id: new_sub_id(),
            comment: String::new(),
            reset: 0,
            alter_id: (self.config().protocol == "vmess").then_some(0),
        }
    }

    /// Submit the record as a single-element client list. On a rejection
    /// that smells like an email conflict, re-read the inbound to recover
    /// the existing account's URL.
    async fn submit_account(
        &self,
        inbound_id: i64,
        account: ClientAccount,
    ) -> Result<ProvisionOutcome, PanelError> {
        let url = format!("{}/panel/api/inbounds/addClient", self.base_url());
        let settings = serde_json::json!({ "clients": [&account] }).to_string();
        let form = [("id", inbound_id.to_string()), ("settings", settings)];

        info!(inbound_id, email = %account.email, "adding client to inbound");
        let response = self
            .http
            .post(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let envelope = response.json::<ApiEnvelope<serde_json::Value>>().await.ok();

        if status == StatusCode::OK && envelope.as_ref().is_some_and(|e| e.success) {
            let url = self.subscription_url(&account.sub_id);
            info!(email = %account.email, sub_id = %account.sub_id, "account created");
            return Ok(ProvisionOutcome::Created { account, url });
        }

        let msg = envelope.map(|e| e.msg).unwrap_or_default();
        warn!(%status, msg = %msg, email = %account.email, "panel rejected addClient");

        if looks_like_conflict(&msg)
            && let Some(existing) = self.find_by_email(&account.email, Some(inbound_id)).await?
        {
            return Ok(ProvisionOutcome::AlreadyExists { url: existing.url });
        }
        Ok(ProvisionOutcome::Rejected(RejectReason::CreateFailed))
    }
}

/// Best-effort conflict detection over the panel's free-text errors. There
/// is no structured conflict code; these substrings cover the messages the
/// panel emits for duplicate emails.
fn looks_like_conflict(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    ["exist", "duplicate", "already"]
        .iter()
        .any(|needle| msg.contains(needle))
}

/// Random URL-safe subscription token, 12 bytes of entropy.
fn new_sub_id() -> String {
    use {base64::Engine, rand::RngCore};

    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use subgate_config::PanelConfig;

    use super::*;

    fn identity() -> Identity {
        Identity::new(100, Some("alice".into()))
    }

    fn panel_client(server: &mockito::ServerGuard, inbound_id: Option<i64>) -> PanelClient {
        let config = PanelConfig {
            url: server.url(),
            inbound_id,
            ..Default::default()
        };
        PanelClient::new(config).unwrap()
    }

    async fn mock_login(server: &mut mockito::ServerGuard) {
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;
    }

    fn list_body(clients: &str) -> String {
        let settings = serde_json::to_string(&format!("{{\"clients\":{clients}}}")).unwrap();
        format!(
            r#"{{"success":true,"msg":"","obj":[{{"id":1,"protocol":"vmess","enable":true,"settings":{settings}}}]}}"#
        )
    }

    #[test]
    fn conflict_classifier_matches_known_messages() {
        assert!(looks_like_conflict("Duplicate email: alice"));
        assert!(looks_like_conflict("client already exists"));
        assert!(looks_like_conflict("Email EXISTS"));
        assert!(!looks_like_conflict("quota exceeded"));
        assert!(!looks_like_conflict(""));
    }

    #[test]
    fn sub_ids_are_random_and_url_safe() {
        let a = new_sub_id();
        let b = new_sub_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn creates_primary_account_with_bare_username() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body("[]"))
            .create_async()
            .await;
        let add = server
            .mock("POST", "/panel/api/inbounds/addClient")
            .match_body(mockito::Matcher::UrlEncoded("id".into(), "1".into()))
            .with_status(200)
            .with_body(r#"{"success":true,"msg":""}"#)
            .expect(1)
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));
        let outcome = client.create_account(&identity(), None).await.unwrap();

        let ProvisionOutcome::Created { account, url } = outcome else {
            panic!("expected Created, got {outcome:?}");
        };
        assert_eq!(account.email, "alice");
        assert_eq!(account.tg_id, "100");
        assert_eq!(account.limit_ip, 0);
        assert_eq!(account.expiry_time, 0);
        assert_eq!(account.total_gb, 100 * 1024 * 1024 * 1024);
        assert_eq!(account.alter_id, Some(0)); // default protocol is vmess
        assert!(account.enable);
        assert_eq!(url, format!("https://127.0.0.1:2096/sub/{}", account.sub_id));
        add.assert_async().await;
    }

    #[tokio::test]
    async fn existing_primary_account_short_circuits() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body(
                r#"[{"id":"a","email":"alice","tgId":"100","subId":"tok"}]"#,
            ))
            .create_async()
            .await;
        let add = server
            .mock("POST", "/panel/api/inbounds/addClient")
            .expect(0)
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));
        let outcome = client.create_account(&identity(), None).await.unwrap();

        let ProvisionOutcome::AlreadyExists { url } = outcome else {
            panic!("expected AlreadyExists, got {outcome:?}");
        };
        assert_eq!(url.as_deref(), Some("https://127.0.0.1:2096/sub/tok"));
        add.assert_async().await;
    }

    #[tokio::test]
    async fn missing_username_is_rejected_before_any_request() {
        let server = mockito::Server::new_async().await;
        let client = panel_client(&server, Some(1));

        let anonymous = Identity::new(100, None);
        let outcome = client.create_account(&anonymous, None).await.unwrap();
        assert!(matches!(
            outcome,
            ProvisionOutcome::Rejected(RejectReason::UsernameRequired)
        ));
    }

    #[tokio::test]
    async fn device_email_gets_first_free_suffix() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body(
                r#"[{"id":"a","email":"alice_phone","tgId":"100","subId":"t1"},
                    {"id":"b","email":"alice_phone_2","tgId":"100","subId":"t2"}]"#,
            ))
            .create_async()
            .await;
        let add = server
            .mock("POST", "/panel/api/inbounds/addClient")
            .with_status(200)
            .with_body(r#"{"success":true,"msg":""}"#)
            .expect(1)
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));
        let outcome = client
            .create_account(&identity(), Some("phone"))
            .await
            .unwrap();

        let ProvisionOutcome::Created { account, .. } = outcome else {
            panic!("expected Created, got {outcome:?}");
        };
        assert_eq!(account.email, "alice_phone_3");
        add.assert_async().await;
    }

    #[tokio::test]
    async fn saturated_device_slots_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        // alice_phone plus _2.._100: every probe finds its candidate taken.
        let mut clients = vec![r#"{"id":"x","email":"alice_phone","subId":"t"}"#.to_string()];
        for n in 2..=100 {
            clients.push(format!(r#"{{"id":"x{n}","email":"alice_phone_{n}","subId":"t{n}"}}"#));
        }
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body(&format!("[{}]", clients.join(","))))
            .create_async()
            .await;
        let add = server
            .mock("POST", "/panel/api/inbounds/addClient")
            .expect(0)
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));
        let outcome = client
            .create_account(&identity(), Some("phone"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ProvisionOutcome::Rejected(RejectReason::TooManyDeviceSlots)
        ));
        add.assert_async().await;
    }

    #[tokio::test]
    async fn two_devices_get_distinct_emails() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body("[]"))
            .create_async()
            .await;
        server
            .mock("POST", "/panel/api/inbounds/addClient")
            .with_status(200)
            .with_body(r#"{"success":true,"msg":""}"#)
            .expect(2)
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));
        let phone = client
            .create_account(&identity(), Some("phone"))
            .await
            .unwrap();
        let tablet = client
            .create_account(&identity(), Some("tablet"))
            .await
            .unwrap();

        let (ProvisionOutcome::Created { account: a, .. }, ProvisionOutcome::Created { account: b, .. }) =
            (phone, tablet)
        else {
            panic!("expected two Created outcomes");
        };
        assert_eq!(a.email, "alice_phone");
        assert_eq!(b.email, "alice_tablet");
        assert_ne!(a.id, b.id);
        assert_ne!(a.sub_id, b.sub_id);
    }

    #[tokio::test]
    async fn conflict_message_recovers_existing_account() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        // No configured inbound id: the pre-check is skipped and the inbound
        // is discovered, so the create races into the panel's own check.
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body(
                r#"[{"id":"a","email":"alice","tgId":"100","subId":"tok"}]"#,
            ))
            .create_async()
            .await;
        server
            .mock("POST", "/panel/api/inbounds/addClient")
            .with_status(200)
            .with_body(r#"{"success":false,"msg":"Duplicate email: alice"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = panel_client(&server, None);
        let outcome = client.create_account(&identity(), None).await.unwrap();

        let ProvisionOutcome::AlreadyExists { url } = outcome else {
            panic!("expected AlreadyExists, got {outcome:?}");
        };
        assert_eq!(url.as_deref(), Some("https://127.0.0.1:2096/sub/tok"));
    }

    #[tokio::test]
    async fn unclassified_rejection_is_create_failed() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(list_body("[]"))
            .create_async()
            .await;
        server
            .mock("POST", "/panel/api/inbounds/addClient")
            .with_status(200)
            .with_body(r#"{"success":false,"msg":"database locked"}"#)
            .create_async()
            .await;

        let client = panel_client(&server, Some(1));
        let outcome = client.create_account(&identity(), None).await.unwrap();
        assert!(matches!(
            outcome,
            ProvisionOutcome::Rejected(RejectReason::CreateFailed)
        ));
    }

    #[tokio::test]
    async fn no_enabled_inbound_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        mock_login(&mut server).await;
        server
            .mock("GET", "/panel/api/inbounds/list")
            .with_status(200)
            .with_body(r#"{"success":true,"msg":"","obj":[]}"#)
            .create_async()
            .await;

        let client = panel_client(&server, None);
        let outcome = client.create_account(&identity(), None).await.unwrap();
        assert!(matches!(
            outcome,
            ProvisionOutcome::Rejected(RejectReason::NoInboundAvailable)
        ));
    }
}
