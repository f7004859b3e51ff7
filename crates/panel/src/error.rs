use thiserror::Error;

/// Faults of the panel client. Provisioning outcomes that are ordinary
/// results of the protocol (already exists, no inbound, ...) are not errors;
/// they live in [`crate::types::ProvisionOutcome`].
#[derive(Debug, Error)]
pub enum PanelError {
    /// Every login candidate was exhausted, or the panel refused the
    /// connection outright.
    #[error("panel authentication failed: {0}")]
    Authentication(String),

    /// The panel answered, but not with the structured payload an endpoint
    /// is specified to return.
    #[error("malformed panel response: {0}")]
    MalformedResponse(String),

    /// Transport-level failure talking to the panel.
    #[error("panel request failed: {0}")]
    Transport(#[from] reqwest::Error),
}
