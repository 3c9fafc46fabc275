//! REST client for the remote browser cloud's session API.
//!
//! Sessions are provisioned over HTTPS, then the driver attaches to the
//! session's WebDriver endpoint. The debug URL points a human at a live
//! view of the session for manual takeover.

use anyhow::{anyhow, Context, Result};
use hawker_http::{HeaderMap, HeaderName, HeaderValue, HttpClient, RequestOpts};
use serde::{Deserialize, Serialize};

use crate::RemoteSettings;

const API_KEY_HEADER: &str = "x-bb-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'a> {
    project_id: &'a str,
}

/// A provisioned remote browser session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSession {
    pub id: String,
    /// WebDriver endpoint the automation client attaches to.
    pub connect_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugInfo {
    debugger_fullscreen_url: String,
}

#[derive(Clone)]
pub struct SessionApi {
    http: HttpClient,
    api_key: String,
    project_id: String,
}

impl SessionApi {
    pub fn new(settings: &RemoteSettings) -> Result<Self> {
        let http = HttpClient::new(&settings.api_base)
            .map_err(|e| anyhow!("invalid session API base: {e}"))?;
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            project_id: settings.project_id.clone(),
        })
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(API_KEY_HEADER),
            HeaderValue::from_str(self.api_key.trim()).context("API key is not a valid header")?,
        );
        Ok(headers)
    }

    /// Provision a new session under the configured project.
    pub async fn create_session(&self) -> Result<RemoteSession> {
        let session: RemoteSession = self
            .http
            .post_json(
                "v1/sessions",
                &CreateSessionRequest {
                    project_id: &self.project_id,
                },
                RequestOpts {
                    headers: Some(self.auth_headers()?),
                    ..Default::default()
                },
            )
            .await
            .context("failed to create remote browser session")?;

        if session.id.is_empty() {
            return Err(anyhow!("session response carried no session id"));
        }
        tracing::info!(target: "cloud", session_id = %session.id, "remote session created");
        Ok(session)
    }

    /// Live-view URL for human takeover of a session.
    pub async fn debug_url(&self, session_id: &str) -> Result<String> {
        let info: DebugInfo = self
            .http
            .get_json(
                &format!("v1/sessions/{session_id}/debug"),
                RequestOpts {
                    headers: Some(self.auth_headers()?),
                    ..Default::default()
                },
            )
            .await
            .context("failed to fetch session debug URL")?;
        Ok(info.debugger_fullscreen_url)
    }
}
