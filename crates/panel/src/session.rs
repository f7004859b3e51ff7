//! Session authentication with login-path discovery.
//!
//! Panel builds differ in where they mount the login endpoint, so candidates
//! are cycled in order. The session cookie lands in the client's cookie jar;
//! the explicit state here only records that a login succeeded.

use {
    reqwest::StatusCode,
    secrecy::ExposeSecret,
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{PanelClient, error::PanelError, types::ApiEnvelope};

/// Login endpoint variants, tried in order.
const LOGIN_PATHS: &[&str] = &["/login", "/xui/login", "/api/login", "/login/"];

#[derive(Debug, Clone, Copy)]
pub(crate) enum SessionState {
    Unauthenticated,
    Authenticated,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

impl PanelClient {
    /// Idempotent login: a no-op once a prior attempt succeeded. The session
    /// is never revalidated afterwards; staleness shows up as a failure of
    /// whatever operation hits it first.
    pub async fn ensure_authenticated(&self) -> Result<(), PanelError> {
        let mut session = self.session.lock().await;
        if matches!(*session, SessionState::Authenticated) {
            return Ok(());
        }
        self.authenticate().await?;
        *session = SessionState::Authenticated;
        Ok(())
    }

    /// Cycle the candidate login paths until one accepts the credentials.
    ///
    /// Per candidate: JSON body first; 200 with a success flag (or a 200
    /// whose body is not JSON) wins, 404 moves on, anything else gets one
    /// form-encoded retry. A refused connection aborts the whole attempt;
    /// a timeout only skips the candidate.
    async fn authenticate(&self) -> Result<(), PanelError> {
        let credentials = LoginRequest {
            username: &self.config().username,
            password: self.config().password.expose_secret(),
        };

        for path in LOGIN_PATHS {
            let url = format!("{}{path}", self.base_url());
            debug!(%url, "attempting panel login");

            let response = match self.http.post(&url).json(&credentials).send().await {
                Ok(response) => response,
                Err(e) if e.is_connect() => {
                    return Err(PanelError::Authentication(format!(
                        "connection to {url} refused: {e}"
                    )));
                },
                Err(e) if e.is_timeout() => {
                    warn!(%url, "login attempt timed out");
                    continue;
                },
                Err(e) => {
                    warn!(%url, error = %e, "login attempt failed");
                    continue;
                },
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                debug!(%url, "login endpoint not found, trying next");
                continue;
            }
            if status == StatusCode::OK {
                if login_accepted(response).await {
                    info!(%url, "authenticated with panel");
                    return Ok(());
                }
                // 200 with success=false: wrong shape for this path.
                continue;
            }

            // Some panel builds only take form-encoded credentials.
            let form = [
                ("username", self.config().username.as_str()),
                ("password", self.config().password.expose_secret().as_str()),
            ];
            match self.http.post(&url).form(&form).send().await {
                Ok(retry) if retry.status() == StatusCode::OK => {
                    info!(%url, "authenticated with panel (form credentials)");
                    return Ok(());
                },
                Ok(retry) => {
                    warn!(%url, status = %retry.status(), "form login rejected");
                },
                Err(e) => {
                    warn!(%url, error = %e, "form login failed");
                },
            }
        }

        Err(PanelError::Authentication(
            "all login endpoints rejected the credentials".into(),
        ))
    }
}

/// A 200 counts as a login when the body reports success, or is not
/// structured at all (some builds answer the login with an HTML page).
async fn login_accepted(response: reqwest::Response) -> bool {
    match response.json::<ApiEnvelope<serde_json::Value>>().await {
        Ok(envelope) => envelope.success,
        Err(_) => true,
    }
}
