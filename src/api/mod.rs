//! Session client for the Ai Pin cloud backend.
//!
//! Provides the authenticated gateway between the app and the remote API,
//! including session refresh, durable token storage and typed operations.
//!
//! # Submodules
//!
//! - `client` - HTTP-backed implementation of [`CenterApi`]
//! - `service` - The [`CenterApi`] trait and its query types
//! - `timestamp` - The fixed timestamp format used by response bodies
//! - `token_store` - Durable storage for the access token (keychain + fallback)
//! - `device` - Best-effort scrape of the device details page

pub mod client;
pub mod device;
pub mod service;
pub mod timestamp;
pub mod token_store;

pub use client::CenterClient;
pub use service::{CaptureQuery, CenterApi, EventQuery};
pub use token_store::{FileTokenStore, KeychainTokenStore, MemoryTokenStore, TokenStore};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://webapi.prod.humane.cloud";

/// Session endpoint. Authenticated by browser cookies, not by bearer token.
pub const DEFAULT_SESSION_URL: &str = "https://humane.center/api/auth/session";

/// Account page that embeds the detailed device information.
pub const DEFAULT_DEVICE_PAGE_URL: &str = "https://humane.center/account/devices";

/// User agent sent with every request. The backend rejects unrecognized clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15";

/// Service name for keyring storage.
pub const KEYRING_SERVICE: &str = "pin-center";

/// User identifier for the access token in keyring.
pub const KEYRING_ACCESS_TOKEN_USER: &str = "access-token";

/// Error type for session client operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No access token is held and none could be obtained.
    #[error("Not authorized: no access token available")]
    NotAuthorized,

    /// The server answered with a status outside `200..=304`.
    ///
    /// Every such response is treated as an authorization failure.
    #[error("Request rejected with status {status}")]
    Rejected { status: u16 },

    /// Network or protocol failure.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Malformed or unexpected response body.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Durable token storage failed.
    #[error("Token storage error: {0}")]
    TokenStore(String),

    /// A URL could not be built from the configured endpoints.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The requested resource does not exist on the content item.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local file system failure while exporting media.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Returns true for failures that drop the client back to unauthenticated.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, ApiError::NotAuthorized | ApiError::Rejected { .. })
    }
}
