//! HTTP transport over `reqwest`.
//!
//! Requests are JSON. `POST /sync/push` carries a [`PushRequest`] and
//! `GET /sync/pull?cursor=` answers with a [`PullResponse`]. Authentication
//! is a bearer token on every call.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::session::{AuthClient, AuthSession, AuthUser, Credentials};
use crate::transport::SyncTransport;
use hivesync_sync_protocol::{PullRequest, PullResponse, PushRequest};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

/// Sync transport that talks to the remote over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    /// Builds a transport from the engine configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = build_client(config)?;
        Ok(Self {
            client,
            base_url: config.server_url.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl SyncTransport for HttpTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<()> {
        let url = format!("{}/sync/push", self.base_url);
        let response = self
            .authorized(self.client.post(&url).json(request))
            .send()
            .await
            .map_err(map_send_error)?;
        check_status(response)?;
        debug!(changes = request.changes.len(), "push accepted");
        Ok(())
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        let url = format!("{}/sync/pull", self.base_url);
        let response = self
            .authorized(self.client.get(&url).query(&[("cursor", &request.cursor)]))
            .send()
            .await
            .map_err(map_send_error)?;
        let response = check_status(response)?;
        response
            .json::<PullResponse>()
            .await
            .map_err(|e| SyncError::Protocol(format!("undecodable pull response: {e}")))
    }
}

/// Auth endpoints (`/auth/login`, `/auth/logout`, `/auth/me`) over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    client: Client,
    base_url: String,
}

impl HttpAuthClient {
    /// Builds a client from the engine configuration.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.server_url.clone(),
        })
    }
}

impl AuthClient for HttpAuthClient {
    async fn login(&self, credentials: &Credentials) -> SyncResult<AuthSession> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(map_send_error)?;
        check_status(response)?
            .json::<AuthSession>()
            .await
            .map_err(|e| SyncError::Protocol(format!("undecodable login response: {e}")))
    }

    async fn logout(&self, token: &str) -> SyncResult<()> {
        let url = format!("{}/auth/logout", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_send_error)?;
        check_status(response)?;
        Ok(())
    }

    async fn current_user(&self, token: &str) -> SyncResult<Option<AuthUser>> {
        let url = format!("{}/auth/me", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_send_error)?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        check_status(response)?
            .json::<AuthUser>()
            .await
            .map(Some)
            .map_err(|e| SyncError::Protocol(format!("undecodable user: {e}")))
    }
}

fn build_client(config: &SyncConfig) -> SyncResult<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| SyncError::transport_fatal(format!("cannot build HTTP client: {e}")))
}

fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        debug!(%status, url = %response.url(), "remote rejected request");
        Err(SyncError::RemoteStatus {
            status: status.as_u16(),
        })
    }
}

fn map_send_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else if err.is_builder() {
        SyncError::transport_fatal(err.to_string())
    } else {
        SyncError::transport_retryable(err.to_string())
    }
}
