//! Media download planning and export for capture assets.
//!
//! Capture assets are fetched with their own short-lived access token,
//! passed as the `token` query parameter. Video downloads also need the
//! session bearer token.

use std::path::{Path, PathBuf};

use reqwest::Url;
use uuid::Uuid;

use crate::api::{ApiError, CenterApi};
use crate::models::{ContentEnvelope, FileAsset};

/// Kind of media an asset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// File extension used when exporting.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

/// A resolved asset download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDownload {
    /// Memory the asset belongs to.
    pub memory_id: Uuid,
    pub kind: MediaKind,
    /// Asset URL, including the per-asset `token` parameter.
    pub url: Url,
    /// Whether the session bearer token must also be sent.
    pub requires_session: bool,
}

impl AssetDownload {
    /// Plans the download of the item's primary media.
    ///
    /// Videos download the video file; stills download the closeup when
    /// present, else the thumbnail.
    pub fn for_content(api_base: &str, item: &ContentEnvelope) -> Result<Self, ApiError> {
        let capture = item
            .capture()
            .ok_or_else(|| ApiError::NotFound(format!("memory {} is not a capture", item.uuid)))?;

        match &capture.video {
            Some(video) => Self::build(api_base, item.uuid, video, MediaKind::Video),
            None => Self::build(api_base, item.uuid, capture.best_image(), MediaKind::Image),
        }
    }

    /// Plans the download of the item's still image, even for videos.
    pub fn image_for_content(api_base: &str, item: &ContentEnvelope) -> Result<Self, ApiError> {
        let capture = item
            .capture()
            .ok_or_else(|| ApiError::NotFound(format!("memory {} is not a capture", item.uuid)))?;

        Self::build(api_base, item.uuid, capture.best_image(), MediaKind::Image)
    }

    fn build(
        api_base: &str,
        memory_id: Uuid,
        asset: &FileAsset,
        kind: MediaKind,
    ) -> Result<Self, ApiError> {
        let raw = format!(
            "{}/capture/memory/{}/file/{}/download",
            api_base.trim_end_matches('/'),
            memory_id,
            asset.file_uuid
        );
        let mut url = Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("token", &asset.access_token)
            .append_pair("rawData", "false");

        Ok(Self {
            memory_id,
            kind,
            url,
            requires_session: kind == MediaKind::Video,
        })
    }

    /// File name used when exporting: `<memory uuid>.<ext>`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.memory_id, self.kind.extension())
    }
}

/// Downloads an item's primary media and writes it into `dir`.
///
/// Returns the path of the written file.
pub async fn export<A>(
    api: &A,
    api_base: &str,
    item: &ContentEnvelope,
    dir: &Path,
) -> Result<PathBuf, ApiError>
where
    A: CenterApi + ?Sized,
{
    let download = AssetDownload::for_content(api_base, item)?;
    let bytes = api.download_asset(&download).await?;

    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(download.file_name());
    tokio::fs::write(&target, &bytes).await?;

    tracing::debug!(
        "Exported {} bytes for memory {} to {}",
        bytes.len(),
        item.uuid,
        target.display()
    );
    Ok(target)
}
