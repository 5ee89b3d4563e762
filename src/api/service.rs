//! Operation set of the session client.
//!
//! [`CenterApi`] is the seam between the repository layer and the network.
//! [`super::CenterClient`] implements it over HTTP; tests provide their own
//! implementations.

use async_trait::async_trait;
use uuid::Uuid;

use super::ApiError;
use crate::media::AssetDownload;
use crate::models::{
    ContentEnvelope, DeviceInfo, EventDomain, EventEnvelope, FeatureFlag, Note, Page,
    SearchDomain, SearchResults, Session, Subscription,
};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Default capture ordering: newest first.
pub const DEFAULT_CAPTURE_SORT: &str = "userCreatedAt,DESC";

/// Default event ordering: oldest first.
pub const DEFAULT_EVENT_SORT: &str = "eventCreationTime,ASC";

/// Parameters for listing captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureQuery {
    pub page: u32,
    pub size: u32,
    pub sort: String,
    pub only_favorited: bool,
}

impl CaptureQuery {
    /// Query for the given page with default size and ordering.
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn only_favorited(mut self, only_favorited: bool) -> Self {
        self.only_favorited = only_favorited;
        self
    }
}

impl Default for CaptureQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_CAPTURE_SORT.to_string(),
            only_favorited: false,
        }
    }
}

/// Parameters for listing notable events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub domain: EventDomain,
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl EventQuery {
    /// First page of the given domain with default size and ordering.
    pub fn new(domain: EventDomain) -> Self {
        Self {
            domain,
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_EVENT_SORT.to_string(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}

/// Typed operations against the cloud backend.
///
/// Every authenticated operation ensures a session first. No operation
/// retries; a failure is reported once.
#[async_trait]
pub trait CenterApi: Send + Sync {
    /// Fetches a fresh session from the cookie-authenticated session endpoint.
    async fn fetch_session(&self) -> Result<Session, ApiError>;

    async fn list_captures(&self, query: &CaptureQuery)
        -> Result<Page<ContentEnvelope>, ApiError>;

    async fn list_notes(&self, page: u32, size: u32) -> Result<Page<ContentEnvelope>, ApiError>;

    async fn list_events(&self, query: &EventQuery) -> Result<Page<EventEnvelope>, ApiError>;

    async fn create_note(&self, note: &Note) -> Result<ContentEnvelope, ApiError>;

    async fn update_note(&self, id: Uuid, note: &Note) -> Result<ContentEnvelope, ApiError>;

    /// Marks a memory as favorite. The server treats repeats as no-ops.
    async fn favorite(&self, id: Uuid) -> Result<(), ApiError>;

    async fn unfavorite(&self, id: Uuid) -> Result<(), ApiError>;

    /// Deletes a memory, returning the identifier echoed by the server.
    async fn delete_content(&self, id: Uuid) -> Result<String, ApiError>;

    /// Fetches a single memory by identifier.
    async fn fetch_memory(&self, id: Uuid) -> Result<ContentEnvelope, ApiError>;

    /// Full-text search, returning matching identifiers in relevance order.
    async fn search(&self, query: &str, domain: SearchDomain) -> Result<SearchResults, ApiError>;

    async fn fetch_subscription(&self) -> Result<Subscription, ApiError>;

    async fn fetch_feature_flag(&self, name: &str) -> Result<FeatureFlag, ApiError>;

    /// Scrapes device details from the account page.
    async fn fetch_detailed_device_info(&self) -> Result<DeviceInfo, ApiError>;

    /// Downloads the raw bytes of a capture asset.
    async fn download_asset(&self, asset: &AssetDownload) -> Result<Vec<u8>, ApiError>;
}
