//! HTTP client for the Ai Pin cloud API.
//!
//! Provides [`CenterClient`], the HTTP implementation of [`CenterApi`]. The
//! client owns the session state: it fetches a session before authenticated
//! calls (per the configured [`RefreshPolicy`]), persists the token to a
//! [`TokenStore`], and drops back to unauthenticated when the server rejects
//! a request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::device::parse_device_info;
use super::service::{CaptureQuery, CenterApi, EventQuery};
use super::token_store::TokenStore;
use super::ApiError;
use crate::config::{Config, RefreshPolicy};
use crate::media::AssetDownload;
use crate::models::{
    ContentEnvelope, DeviceInfo, EventEnvelope, FeatureFlag, Note, Page, SearchDomain,
    SearchResults, Session, Subscription,
};

/// Statuses accepted as success. Everything else is an authorization failure.
const ACCEPTED_STATUS: std::ops::RangeInclusive<u16> = 200..=304;

/// Authentication state of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    Unauthenticated,
    Authenticated {
        token: String,
        /// `None` for a token resumed from the token store.
        refreshed_at: Option<DateTime<Utc>>,
    },
}

/// Cloud API client.
pub struct CenterClient {
    /// HTTP client instance. Keeps cookies for the session endpoint.
    http: Client,
    /// Base URL of the memories API.
    api_url: String,
    session_url: String,
    device_page_url: String,
    refresh: RefreshPolicy,
    /// Single owner of the token; refreshes are serialized behind it.
    session: Mutex<SessionState>,
    store: Arc<dyn TokenStore>,
}

impl CenterClient {
    /// Creates a client from configuration.
    ///
    /// A token found in `store` is resumed without a session fetch.
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()?;

        let session = match store.load() {
            Ok(Some(token)) => {
                tracing::debug!("Resuming stored session");
                SessionState::Authenticated {
                    token,
                    refreshed_at: None,
                }
            }
            Ok(None) => SessionState::Unauthenticated,
            Err(e) => {
                tracing::warn!("Failed to read stored access token: {e}");
                SessionState::Unauthenticated
            }
        };

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            session_url: config.session_url.clone(),
            device_page_url: config.device_page_url.clone(),
            refresh: config.refresh,
            session: Mutex::new(session),
            store,
        })
    }

    /// Returns the configured API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns true if a token is currently held.
    pub async fn is_logged_in(&self) -> bool {
        matches!(*self.session.lock().await, SessionState::Authenticated { .. })
    }

    /// Returns the held access token, if any.
    pub async fn access_token(&self) -> Option<String> {
        match &*self.session.lock().await {
            SessionState::Authenticated { token, .. } => Some(token.clone()),
            SessionState::Unauthenticated => None,
        }
    }

    /// Drops the session and clears the stored token.
    pub async fn logout(&self) -> Result<(), ApiError> {
        *self.session.lock().await = SessionState::Unauthenticated;
        self.store.clear()?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Returns a usable token, fetching a new session when the policy says so.
    async fn ensure_session(&self) -> Result<String, ApiError> {
        let mut state = self.session.lock().await;

        if let SessionState::Authenticated {
            token,
            refreshed_at,
        } = &*state
        {
            if self.is_trusted(*refreshed_at) {
                return Ok(token.clone());
            }
        }

        match self.request_session().await {
            Ok(session) => {
                if let Err(e) = self.store.store(&session.access_token) {
                    tracing::warn!("Failed to persist access token: {e}");
                }
                *state = SessionState::Authenticated {
                    token: session.access_token.clone(),
                    refreshed_at: Some(Utc::now()),
                };
                Ok(session.access_token)
            }
            Err(e) => {
                tracing::debug!("Session refresh failed: {e}");
                if e.is_authorization_failure() {
                    *state = SessionState::Unauthenticated;
                }
                Err(e)
            }
        }
    }

    fn is_trusted(&self, refreshed_at: Option<DateTime<Utc>>) -> bool {
        match self.refresh {
            RefreshPolicy::EveryCall => false,
            RefreshPolicy::TrustWindow { seconds } => match refreshed_at {
                // Resumed tokens are trusted until the server rejects one.
                None => true,
                Some(at) => {
                    let window = i64::try_from(seconds)
                        .ok()
                        .and_then(chrono::Duration::try_seconds);
                    match window {
                        Some(window) => Utc::now() - at < window,
                        // Beyond what chrono can represent.
                        None => true,
                    }
                }
            },
        }
    }

    async fn invalidate(&self) {
        *self.session.lock().await = SessionState::Unauthenticated;
    }

    /// Unauthenticated session fetch.
    async fn request_session(&self) -> Result<Session, ApiError> {
        tracing::debug!("GET {}", self.session_url);
        let body = execute(self.http.get(&self.session_url)).await?;
        let session: Session = serde_json::from_slice(&body)?;

        if session.access_token.is_empty() {
            return Err(ApiError::NotAuthorized);
        }
        Ok(session)
    }

    /// Sends a request with the bearer token and JSON accept header.
    async fn send_authorized(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        self.send_with_bearer(request.header(ACCEPT, "application/json"))
            .await
    }

    /// Sends a request with the bearer token only.
    async fn send_with_bearer(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let token = self.ensure_session().await?;

        match execute(request.bearer_auth(&token)).await {
            Err(e) if e.is_authorization_failure() => {
                self.invalidate().await;
                Err(e)
            }
            other => other,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        tracing::debug!("GET {url}");
        let body = self.send_authorized(self.http.get(&url).query(query)).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        tracing::debug!("POST {url}");
        let body = self.send_authorized(self.http.post(&url).json(payload)).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// POST without a body, ignoring the response body.
    async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path);
        tracing::debug!("POST {url}");
        self.send_authorized(self.http.post(&url)).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }
}

/// Sends a request and returns the body, mapping unaccepted statuses.
async fn execute(request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
    let response = request.send().await?;
    let status = response.status().as_u16();

    if !ACCEPTED_STATUS.contains(&status) {
        tracing::debug!("Request rejected with status {status}");
        return Err(ApiError::Rejected { status });
    }

    Ok(response.bytes().await?.to_vec())
}

#[async_trait]
impl CenterApi for CenterClient {
    async fn fetch_session(&self) -> Result<Session, ApiError> {
        self.request_session().await
    }

    async fn list_captures(
        &self,
        query: &CaptureQuery,
    ) -> Result<Page<ContentEnvelope>, ApiError> {
        self.get(
            "capture/captures",
            &[
                ("page", query.page.to_string()),
                ("size", query.size.to_string()),
                ("sort", query.sort.clone()),
                ("onlyContainingFavorited", query.only_favorited.to_string()),
            ],
        )
        .await
    }

    async fn list_notes(&self, page: u32, size: u32) -> Result<Page<ContentEnvelope>, ApiError> {
        self.get(
            "capture/notes",
            &[("page", page.to_string()), ("size", size.to_string())],
        )
        .await
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Page<EventEnvelope>, ApiError> {
        self.get(
            "notable-events/mydata",
            &[
                ("domain", query.domain.as_str().to_string()),
                ("page", query.page.to_string()),
                ("size", query.size.to_string()),
                ("sort", query.sort.clone()),
            ],
        )
        .await
    }

    async fn create_note(&self, note: &Note) -> Result<ContentEnvelope, ApiError> {
        self.post("capture/note/create", note).await
    }

    async fn update_note(&self, id: Uuid, note: &Note) -> Result<ContentEnvelope, ApiError> {
        self.post(&format!("capture/note/{id}"), note).await
    }

    async fn favorite(&self, id: Uuid) -> Result<(), ApiError> {
        self.post_empty(&format!("capture/memory/{id}/favorite")).await
    }

    async fn unfavorite(&self, id: Uuid) -> Result<(), ApiError> {
        self.post_empty(&format!("capture/memory/{id}/unfavorite")).await
    }

    async fn delete_content(&self, id: Uuid) -> Result<String, ApiError> {
        let url = self.endpoint(&format!("capture/memory/{id}"));
        tracing::debug!("DELETE {url}");
        let body = self.send_authorized(self.http.delete(&url)).await?;

        // The server echoes the identifier, usually as a JSON string.
        match serde_json::from_slice::<String>(&body) {
            Ok(echoed) => Ok(echoed),
            Err(e) => match std::str::from_utf8(&body).map(str::trim) {
                Ok(text) if !text.is_empty() && !text.starts_with(['{', '[']) => {
                    Ok(text.to_string())
                }
                _ => Err(ApiError::Decode(e)),
            },
        }
    }

    async fn fetch_memory(&self, id: Uuid) -> Result<ContentEnvelope, ApiError> {
        self.get(&format!("capture/memory/{id}"), &[]).await
    }

    async fn search(&self, query: &str, domain: SearchDomain) -> Result<SearchResults, ApiError> {
        self.get(
            "ai-bus/search",
            &[
                ("query", query.to_string()),
                ("domain", domain.as_str().to_string()),
            ],
        )
        .await
    }

    async fn fetch_subscription(&self) -> Result<Subscription, ApiError> {
        self.get("subscription/v3/subscription", &[]).await
    }

    async fn fetch_feature_flag(&self, name: &str) -> Result<FeatureFlag, ApiError> {
        self.get(&format!("feature-flags/v0/feature-flag/flags/{name}"), &[])
            .await
    }

    async fn fetch_detailed_device_info(&self) -> Result<DeviceInfo, ApiError> {
        tracing::debug!("GET {}", self.device_page_url);
        let body = self
            .send_authorized(self.http.get(&self.device_page_url))
            .await?;
        Ok(parse_device_info(&String::from_utf8_lossy(&body)))
    }

    async fn download_asset(&self, asset: &AssetDownload) -> Result<Vec<u8>, ApiError> {
        tracing::debug!("Downloading {:?} for memory {}", asset.kind, asset.memory_id);
        let request = self.http.get(asset.url.clone());

        if asset.requires_session {
            self.send_with_bearer(request).await
        } else {
            execute(request).await
        }
    }
}
