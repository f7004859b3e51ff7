//! Inbound discovery. The panel has no filtered or per-inbound endpoint, so
//! everything goes through the full listing.

use {
    reqwest::StatusCode,
    tracing::{debug, warn},
};

use crate::{
    PanelClient,
    error::PanelError,
    types::{ApiEnvelope, Inbound},
};

impl PanelClient {
    /// Fetch every inbound with its embedded client settings.
    pub async fn list_inbounds(&self) -> Result<Vec<Inbound>, PanelError> {
        self.ensure_authenticated().await?;

        let url = format!("{}/panel/api/inbounds/list", self.base_url());
        let response = self
            .http
            .get(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PanelError::MalformedResponse(format!(
                "inbound list returned HTTP {status}"
            )));
        }

        let envelope: ApiEnvelope<Vec<Inbound>> = response
            .json()
            .await
            .map_err(|e| PanelError::MalformedResponse(format!("inbound list: {e}")))?;
        Ok(envelope.obj.unwrap_or_default())
    }

    /// First enabled inbound in panel order, constrained to `protocol` when
    /// a hint is given. `None` when the list is empty or nothing matches.
    pub async fn resolve_inbound(
        &self,
        protocol: Option<&str>,
    ) -> Result<Option<Inbound>, PanelError> {
        let inbounds = self.list_inbounds().await?;
        if inbounds.is_empty() {
            warn!("panel reports no inbounds");
            return Ok(None);
        }

        let found = inbounds
            .into_iter()
            .find(|i| i.enable && protocol.is_none_or(|p| i.protocol == p));
        match &found {
            Some(inbound) => {
                debug!(inbound_id = inbound.id, protocol = %inbound.protocol, "resolved inbound")
            },
            None => warn!(protocol = ?protocol, "no enabled inbound matches"),
        }
        Ok(found)
    }

    /// Re-read one inbound by id, via the full list. Used whenever account
    /// contents must be re-read.
    pub async fn inbound_by_id(&self, id: i64) -> Result<Option<Inbound>, PanelError> {
        let inbound = self.list_inbounds().await?.into_iter().find(|i| i.id == id);
        if inbound.is_none() {
            warn!(inbound_id = id, "inbound not found in panel list");
        }
        Ok(inbound)
    }
}
