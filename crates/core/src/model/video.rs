use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::VideoId;

/// Hard cap on the persisted video catalog.
pub const MAX_CATALOG_VIDEOS: usize = 1000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VideoError {
    #[error("video id is empty")]
    EmptyId,

    #[error("video url does not parse: {raw}")]
    InvalidUrl { raw: String },

    #[error("video url does not reference video {id}")]
    UrlIdMismatch { id: VideoId },
}

/// A reward video entry from the external catalog.
///
/// The URL is validated at construction to parse and to reference the video's
/// own id, so a catalog entry can always be turned into a playable link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    id: VideoId,
    url: String,
    title: String,
    channel_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
    added_at: DateTime<Utc>,
}

impl Video {
    /// Build a catalog entry, validating the id/url pair.
    ///
    /// # Errors
    ///
    /// Returns `VideoError` if the id is empty, the url does not parse, or
    /// the url does not mention the id.
    pub fn new(
        id: VideoId,
        url: impl Into<String>,
        title: impl Into<String>,
        channel_title: impl Into<String>,
        published_at: Option<DateTime<Utc>>,
        added_at: DateTime<Utc>,
    ) -> Result<Self, VideoError> {
        if id.as_str().trim().is_empty() {
            return Err(VideoError::EmptyId);
        }

        let url = url.into();
        let parsed = Url::parse(&url).map_err(|_| VideoError::InvalidUrl { raw: url.clone() })?;
        let mentions_id = parsed.path().contains(id.as_str())
            || parsed
                .query_pairs()
                .any(|(_, value)| value == id.as_str());
        if !mentions_id {
            return Err(VideoError::UrlIdMismatch { id });
        }

        Ok(Self {
            id,
            url,
            title: title.into(),
            channel_title: channel_title.into(),
            published_at,
            added_at,
        })
    }

    /// Canonical short-form watch URL for a bare video id.
    #[must_use]
    pub fn shorts_url(id: &VideoId) -> String {
        format!("https://www.youtube.com/shorts/{id}")
    }

    #[must_use]
    pub fn id(&self) -> &VideoId {
        &self.id
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn channel_title(&self) -> &str {
        &self.channel_title
    }

    #[must_use]
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    #[must_use]
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Consolidated persisted catalog document: `{videos, lastUpdated, count}`.
///
/// Merging is idempotent: entries are deduplicated by id (the stored entry
/// wins) and the list never exceeds [`MAX_CATALOG_VIDEOS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCatalog {
    videos: Vec<Video>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
    count: usize,
}

impl VideoCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_videos(videos: Vec<Video>, now: DateTime<Utc>) -> Self {
        let mut catalog = Self::new();
        catalog.merge(videos, now);
        catalog
    }

    #[must_use]
    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &VideoId) -> bool {
        self.videos.iter().any(|v| v.id() == id)
    }

    /// Merge freshly fetched videos into the catalog.
    ///
    /// New entries are placed ahead of existing ones, duplicates (by id) are
    /// skipped, and the list is truncated to the cap. Returns the number of
    /// entries actually added.
    pub fn merge(&mut self, incoming: Vec<Video>, now: DateTime<Utc>) -> usize {
        let mut fresh: Vec<Video> = Vec::new();
        for video in incoming {
            if self.contains(video.id()) || fresh.iter().any(|v: &Video| v.id() == video.id()) {
                continue;
            }
            fresh.push(video);
        }

        let added = fresh.len();
        if added > 0 {
            fresh.append(&mut self.videos);
            self.videos = fresh;
            self.videos.truncate(MAX_CATALOG_VIDEOS);
        }
        self.last_updated = Some(now);
        self.count = self.videos.len();
        added
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn build_video(id: &str) -> Video {
        let vid = VideoId::new(id);
        Video::new(
            vid.clone(),
            Video::shorts_url(&vid),
            format!("Video {id}"),
            "Channel",
            None,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_url_that_does_not_reference_the_id() {
        let err = Video::new(
            VideoId::new("abc123"),
            "https://www.youtube.com/shorts/zzz999",
            "T",
            "C",
            None,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, VideoError::UrlIdMismatch { .. }));
    }

    #[test]
    fn accepts_watch_url_with_id_in_query() {
        let video = Video::new(
            VideoId::new("abc123"),
            "https://www.youtube.com/watch?v=abc123",
            "T",
            "C",
            None,
            fixed_now(),
        );
        assert!(video.is_ok());
    }

    #[test]
    fn merge_is_idempotent() {
        let now = fixed_now();
        let mut catalog = VideoCatalog::new();
        let batch = vec![build_video("a"), build_video("b")];

        assert_eq!(catalog.merge(batch.clone(), now), 2);
        assert_eq!(catalog.merge(batch, now), 0);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn merge_puts_new_entries_first_and_caps_the_list() {
        let now = fixed_now();
        let seed: Vec<Video> = (0..MAX_CATALOG_VIDEOS)
            .map(|i| build_video(&format!("v{i}")))
            .collect();
        let mut catalog = VideoCatalog::from_videos(seed, now);
        assert_eq!(catalog.len(), MAX_CATALOG_VIDEOS);

        let added = catalog.merge(vec![build_video("fresh")], now);
        assert_eq!(added, 1);
        assert_eq!(catalog.len(), MAX_CATALOG_VIDEOS);
        assert_eq!(catalog.videos()[0].id(), &VideoId::new("fresh"));
        // the oldest entry fell off the end
        assert!(!catalog.contains(&VideoId::new(format!(
            "v{}",
            MAX_CATALOG_VIDEOS - 1
        ))));
    }

    #[test]
    fn catalog_document_round_trips() {
        let catalog = VideoCatalog::from_videos(vec![build_video("a")], fixed_now());
        let json = serde_json::to_string(&catalog).unwrap();
        assert!(json.contains("lastUpdated"));
        let restored: VideoCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, catalog);
    }
}
