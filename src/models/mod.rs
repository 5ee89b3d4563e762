//! Data model for the Ai Pin cloud backend.
//!
//! These types mirror the JSON bodies returned by the API. Content items
//! are identified by a stable UUID; equality and hashing use that identifier
//! alone so collections can de-duplicate on it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::timestamp;

/// Session payload returned by the session endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token for authenticated API calls.
    pub access_token: String,

    /// Expiry as reported by the session endpoint, passed through verbatim.
    #[serde(default)]
    pub expires: Option<String>,
}

/// A single memory: note, capture or event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEnvelope {
    /// Stable unique identifier.
    pub uuid: Uuid,

    /// When the user created the memory.
    #[serde(with = "timestamp")]
    pub user_created_at: DateTime<Utc>,

    /// When the memory was last modified.
    #[serde(default, with = "timestamp::option")]
    pub user_last_modified: Option<DateTime<Utc>>,

    /// Whether the user has favorited this memory.
    #[serde(default)]
    pub favorite: bool,

    /// Kind-specific payload.
    pub data: ContentData,
}

impl ContentEnvelope {
    /// Returns the capture payload, if this is a capture.
    pub fn capture(&self) -> Option<&CaptureData> {
        match &self.data {
            ContentData::Capture(capture) => Some(capture),
            _ => None,
        }
    }

    /// Returns the note payload, if this is a note.
    pub fn note(&self) -> Option<&NoteData> {
        match &self.data {
            ContentData::Note(note) => Some(note),
            _ => None,
        }
    }
}

impl PartialEq for ContentEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for ContentEnvelope {}

impl Hash for ContentEnvelope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

/// Kind-specific content payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentData {
    /// A text note.
    Note(NoteData),
    /// A photo or video capture.
    Capture(CaptureData),
    /// A notable event (call, music, translation...).
    Event(EventData),
}

/// Note payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteData {
    #[serde(default)]
    pub title: String,
    pub text: String,
}

/// Capture payload with references to its downloadable assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureData {
    /// Low resolution preview, always present.
    pub thumbnail: FileAsset,

    /// Full resolution still, when the capture has one.
    #[serde(default)]
    pub closeup_asset: Option<FileAsset>,

    /// Video file, when the capture is a video.
    #[serde(default)]
    pub video: Option<FileAsset>,

    /// Reverse-geocoded location, if recorded.
    #[serde(default)]
    pub location: Option<String>,
}

impl CaptureData {
    /// Returns true if the capture is a video.
    pub fn is_video(&self) -> bool {
        self.video.is_some()
    }

    /// Best still image asset: the closeup if present, else the thumbnail.
    pub fn best_image(&self) -> &FileAsset {
        self.closeup_asset.as_ref().unwrap_or(&self.thumbnail)
    }
}

/// A downloadable file with its own short-lived access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileAsset {
    #[serde(rename = "fileUUID")]
    pub file_uuid: Uuid,

    /// Per-asset token, distinct from the session bearer token.
    pub access_token: String,
}

/// Event payload embedded in a content envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// One notable event from the events feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_identifier: Uuid,

    #[serde(with = "timestamp")]
    pub event_creation_time: DateTime<Utc>,

    #[serde(default)]
    pub domain: Option<EventDomain>,

    /// Domain-specific payload, left untyped.
    #[serde(default)]
    pub event_data: serde_json::Value,
}

impl PartialEq for EventEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.event_identifier == other.event_identifier
    }
}

impl Eq for EventEnvelope {}

impl Hash for EventEnvelope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.event_identifier.hash(state);
    }
}

/// Event categories accepted by the events feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventDomain {
    Calls,
    Music,
    Translation,
    AiMic,
    Notes,
    Captures,
}

impl EventDomain {
    /// Wire name used in query parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventDomain::Calls => "CALLS",
            EventDomain::Music => "MUSIC",
            EventDomain::Translation => "TRANSLATION",
            EventDomain::AiMic => "AI_MIC",
            EventDomain::Notes => "NOTES",
            EventDomain::Captures => "CAPTURES",
        }
    }
}

impl fmt::Display for EventDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CALLS" => Ok(EventDomain::Calls),
            "MUSIC" => Ok(EventDomain::Music),
            "TRANSLATION" => Ok(EventDomain::Translation),
            "AI_MIC" => Ok(EventDomain::AiMic),
            "NOTES" => Ok(EventDomain::Notes),
            "CAPTURES" => Ok(EventDomain::Captures),
            other => Err(format!("Unknown event domain: '{other}'")),
        }
    }
}

/// Domains accepted by the search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDomain {
    Captures,
    Notes,
}

impl SearchDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDomain::Captures => "CAPTURES",
            SearchDomain::Notes => "NOTES",
        }
    }
}

/// Pagination metadata within a page response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pageable {
    pub page_number: u32,
    pub page_size: u32,
}

/// One page of a larger paginated collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub pageable: Pageable,
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: Option<u64>,
    #[serde(default)]
    pub last: bool,
}

impl<T> Page<T> {
    /// Zero-based index of this page.
    pub fn page_number(&self) -> u32 {
        self.pageable.page_number
    }

    /// Returns true if a page after this one exists.
    pub fn has_next(&self) -> bool {
        self.page_number().saturating_add(1) < self.total_pages
    }
}

/// Request body for creating or updating a note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub title: String,
    pub text: String,
}

/// Identifier hit returned by the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub uuid: Uuid,
}

/// Search endpoint response. `memories` is absent when nothing matched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub memories: Option<Vec<SearchHit>>,
}

impl SearchResults {
    /// Matched identifiers in relevance order; empty when nothing matched.
    pub fn ids(&self) -> Vec<Uuid> {
        self.memories
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|hit| hit.uuid)
            .collect()
    }
}

/// Subscription details for the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub status: String,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub plan_price: Option<f64>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub subscription_start_date: Option<DateTime<Utc>>,
}

/// Feature flag state as reported by the flags endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeatureFlagState {
    Enabled,
    Disabled,
}

/// Feature flag envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub state: FeatureFlagState,
}

impl FeatureFlag {
    pub fn is_enabled(&self) -> bool {
        self.state == FeatureFlagState::Enabled
    }
}

/// Device details scraped from the account page.
///
/// Fields the page did not contain hold [`DeviceInfo::UNKNOWN`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub iccid: String,
    pub serial_number: String,
    pub sku: String,
    pub color: String,
}

impl DeviceInfo {
    /// Sentinel for fields missing from the scraped page.
    pub const UNKNOWN: &'static str = "UNKNOWN";
}
