use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use quiz_core::Clock;
use quiz_core::model::{Video, VideoCatalog, VideoId};
use storage::repository::VideoCatalogRepository;

use crate::error::FetchError;

/// Deadline for a single catalog request.
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on the personalized result, and the degraded viral fetch size.
pub const PERSONALIZED_LIMIT: usize = 30;

/// How many viral entries get mixed into a personalized result.
const VIRAL_MIX_COUNT: usize = 10;

/// How many subscribed channels the personalized path samples.
const PERSONALIZED_CHANNEL_CAP: usize = 10;

const RECENT_UPLOADS_PER_CHANNEL: u32 = 5;

//
// ─── CATALOG API ───────────────────────────────────────────────────────────────
//

/// Raw catalog entry, before the short/view-count filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: VideoId,
    pub title: String,
    pub channel_title: String,
    pub published_at: Option<DateTime<Utc>>,
    /// ISO-8601 duration, e.g. `PT45S`.
    pub duration: String,
    pub view_count: u64,
}

/// Seam for the external video catalog, so tests can substitute fakes.
#[async_trait]
pub trait VideoCatalogApi: Send + Sync {
    /// Popularity-ranked short-form candidates for one region.
    async fn popular_shorts(
        &self,
        region: &str,
        max_results: u32,
    ) -> Result<Vec<CatalogItem>, FetchError>;

    /// Channel ids the authenticated user subscribes to.
    async fn subscribed_channels(&self, access_token: &str) -> Result<Vec<String>, FetchError>;

    /// Recent uploads for one channel.
    async fn recent_uploads(
        &self,
        channel_id: &str,
        max_results: u32,
    ) -> Result<Vec<CatalogItem>, FetchError>;
}

#[derive(Clone, Debug)]
pub struct VideoApiConfig {
    pub base_url: String,
    pub api_key: String,
}

impl VideoApiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://www.googleapis.com/youtube/v3";

    /// Reads `QUIZREEL_VIDEO_API_KEY`; without a key the catalog API stays
    /// unconfigured and the source serves persisted/emergency content only.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZREEL_VIDEO_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("QUIZREEL_VIDEO_API_URL").unwrap_or_else(|_| Self::DEFAULT_BASE_URL.into());
        Some(Self { base_url, api_key })
    }
}

/// HTTP implementation over the catalog's search/videos/subscriptions
/// endpoints. Search yields candidate ids; the videos endpoint supplies
/// duration and view counts.
pub struct HttpVideoCatalogApi {
    client: Client,
    config: Option<VideoApiConfig>,
}

impl HttpVideoCatalogApi {
    #[must_use]
    pub fn new(config: Option<VideoApiConfig>) -> Self {
        let client = Client::builder()
            .timeout(CATALOG_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(VideoApiConfig::from_env())
    }

    fn config(&self) -> Result<&VideoApiConfig, FetchError> {
        self.config.as_ref().ok_or(FetchError::NotConfigured)
    }

    async fn search_ids(&self, query: &[(&str, String)]) -> Result<Vec<String>, FetchError> {
        let config = self.config()?;
        let url = format!("{}/search", config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("key", config.api_key.as_str())])
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|err| FetchError::Malformed(err.to_string()))?;
        Ok(body
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    async fn video_details(&self, ids: &[String]) -> Result<Vec<CatalogItem>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let config = self.config()?;
        let url = format!("{}/videos", config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[
                ("part", "snippet,contentDetails,statistics"),
                ("id", &ids.join(",")),
                ("key", config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }

        let body: VideosResponse = response
            .json()
            .await
            .map_err(|err| FetchError::Malformed(err.to_string()))?;

        Ok(body
            .items
            .into_iter()
            .map(|item| CatalogItem {
                id: VideoId::new(item.id),
                title: item.snippet.title,
                channel_title: item.snippet.channel_title,
                published_at: item.snippet.published_at,
                duration: item.content_details.duration,
                view_count: item
                    .statistics
                    .view_count
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0),
            })
            .collect())
    }
}

#[async_trait]
impl VideoCatalogApi for HttpVideoCatalogApi {
    async fn popular_shorts(
        &self,
        region: &str,
        max_results: u32,
    ) -> Result<Vec<CatalogItem>, FetchError> {
        let ids = self
            .search_ids(&[
                ("part", "snippet".into()),
                ("type", "video".into()),
                ("videoDuration", "short".into()),
                ("order", "viewCount".into()),
                ("q", "#shorts".into()),
                ("regionCode", region.into()),
                ("maxResults", max_results.to_string()),
            ])
            .await?;
        self.video_details(&ids).await
    }

    async fn subscribed_channels(&self, access_token: &str) -> Result<Vec<String>, FetchError> {
        let config = self.config()?;
        let url = format!("{}/subscriptions", config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(&[("part", "snippet"), ("mine", "true"), ("maxResults", "50")])
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }

        let body: SubscriptionsResponse = response
            .json()
            .await
            .map_err(|err| FetchError::Malformed(err.to_string()))?;
        Ok(body
            .items
            .into_iter()
            .filter_map(|item| item.snippet.resource_id.channel_id)
            .collect())
    }

    async fn recent_uploads(
        &self,
        channel_id: &str,
        max_results: u32,
    ) -> Result<Vec<CatalogItem>, FetchError> {
        let ids = self
            .search_ids(&[
                ("part", "snippet".into()),
                ("type", "video".into()),
                ("videoDuration", "short".into()),
                ("order", "date".into()),
                ("channelId", channel_id.into()),
                ("maxResults", max_results.to_string()),
            ])
            .await?;
        self.video_details(&ids).await
    }
}

// Wire shapes for the catalog endpoints.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: VideoContentDetails,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionsResponse {
    #[serde(default)]
    items: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    snippet: SubscriptionSnippet,
}

#[derive(Debug, Deserialize)]
struct SubscriptionSnippet {
    #[serde(rename = "resourceId")]
    resource_id: SubscriptionResource,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResource {
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}

//
// ─── DURATION HEURISTIC ────────────────────────────────────────────────────────
//

/// Whether an ISO-8601 duration qualifies as short-form: over zero and at
/// most 60 seconds.
#[must_use]
pub fn is_short_duration(duration: &str) -> bool {
    parse_iso8601_seconds(duration).is_some_and(|secs| secs > 0 && secs <= 60)
}

fn parse_iso8601_seconds(duration: &str) -> Option<u64> {
    let rest = duration.strip_prefix("PT")?;
    let mut total: u64 = 0;
    let mut number = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let value: u64 = number.parse().ok()?;
        number.clear();
        let factor = match ch {
            'H' => 3600,
            'M' => 60,
            'S' => 1,
            _ => return None,
        };
        total = total.checked_add(value.checked_mul(factor)?)?;
    }
    if number.is_empty() { Some(total) } else { None }
}

//
// ─── SOURCE ────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct VideoSourceConfig {
    pub regions: Vec<String>,
    pub min_view_count: u64,
}

impl Default for VideoSourceConfig {
    fn default() -> Self {
        Self {
            regions: vec!["US".into(), "GB".into(), "CA".into()],
            min_view_count: 100_000,
        }
    }
}

impl VideoSourceConfig {
    /// Region list from `QUIZREEL_VIDEO_REGIONS` (comma separated) and view
    /// threshold from `QUIZREEL_MIN_VIEW_COUNT`, with defaults for both.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var("QUIZREEL_VIDEO_REGIONS") {
            let regions: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_uppercase)
                .collect();
            if !regions.is_empty() {
                config.regions = regions;
            }
        }
        if let Ok(raw) = env::var("QUIZREEL_MIN_VIEW_COUNT")
            && let Ok(min) = raw.parse()
        {
            config.min_view_count = min;
        }
        config
    }
}

/// Reward-video supply: fetches and filters shorts from the external
/// catalog, deduplicates, persists merged results for offline reuse, and
/// degrades through the persisted catalog down to an embedded emergency
/// list. Never yields an empty result to the controller.
pub struct VideoSource {
    api: Arc<dyn VideoCatalogApi>,
    storage: Arc<dyn VideoCatalogRepository>,
    clock: Clock,
    config: VideoSourceConfig,
}

impl VideoSource {
    #[must_use]
    pub fn new(
        api: Arc<dyn VideoCatalogApi>,
        storage: Arc<dyn VideoCatalogRepository>,
        clock: Clock,
        config: VideoSourceConfig,
    ) -> Self {
        Self {
            api,
            storage,
            clock,
            config,
        }
    }

    /// Popularity-ranked shorts across the configured regions.
    ///
    /// Entries must clear the view-count threshold and the short-form
    /// duration heuristic; ids are deduplicated across regions. Successful
    /// runs are merged into the persisted catalog best-effort. On total
    /// fetch failure the persisted catalog is served, then the emergency
    /// list.
    pub async fn get_viral_shorts(&self, max_results: usize) -> Vec<Video> {
        let now = self.clock.now();
        let mut seen: HashSet<VideoId> = HashSet::new();
        let mut collected: Vec<Video> = Vec::new();

        let per_region = max_results.clamp(5, 50) as u32;
        for region in &self.config.regions {
            match self.api.popular_shorts(region, per_region).await {
                Ok(items) => {
                    for item in items {
                        if seen.contains(&item.id) {
                            continue;
                        }
                        if let Some(video) = self.admit(item, now) {
                            seen.insert(video.id().clone());
                            collected.push(video);
                        }
                    }
                }
                Err(err) => {
                    warn!(region = %region, error = %err, "regional shorts fetch failed, skipping");
                }
            }
        }

        if collected.is_empty() {
            return self.offline_shorts(max_results).await;
        }

        self.persist_merged(&collected, now).await;
        collected.truncate(max_results);
        collected
    }

    /// Shorts from the user's subscriptions, mixed with a slice of the viral
    /// list and shuffled. Any failure degrades to `get_viral_shorts`.
    pub async fn get_personalized_shorts(&self, access_token: &str) -> Vec<Video> {
        match self.try_personalized(access_token).await {
            Ok(videos) if !videos.is_empty() => videos,
            Ok(_) => {
                debug!("personalized path yielded nothing, degrading to viral shorts");
                self.get_viral_shorts(PERSONALIZED_LIMIT).await
            }
            Err(err) => {
                warn!(error = %err, "personalized path failed, degrading to viral shorts");
                self.get_viral_shorts(PERSONALIZED_LIMIT).await
            }
        }
    }

    /// Fetch-and-persist pass for deployment-time seeding. Returns the
    /// number of entries fetched and the persisted catalog size.
    pub async fn seed_catalog(&self, max_results: usize) -> (usize, usize) {
        let fetched = self.get_viral_shorts(max_results).await.len();
        let total = match self.storage.load_catalog().await {
            Ok(Some(catalog)) => catalog.len(),
            _ => 0,
        };
        (fetched, total)
    }

    async fn try_personalized(&self, access_token: &str) -> Result<Vec<Video>, FetchError> {
        let now = self.clock.now();
        let channels = self.api.subscribed_channels(access_token).await?;

        let mut seen: HashSet<VideoId> = HashSet::new();
        let mut videos: Vec<Video> = Vec::new();
        for channel in channels.iter().take(PERSONALIZED_CHANNEL_CAP) {
            let uploads = self
                .api
                .recent_uploads(channel, RECENT_UPLOADS_PER_CHANNEL)
                .await?;
            for item in uploads {
                if seen.contains(&item.id) {
                    continue;
                }
                if let Some(video) = self.admit(item, now) {
                    seen.insert(video.id().clone());
                    videos.push(video);
                }
            }
        }

        if videos.is_empty() {
            return Ok(videos);
        }

        for video in self.get_viral_shorts(VIRAL_MIX_COUNT).await {
            if !seen.contains(video.id()) {
                seen.insert(video.id().clone());
                videos.push(video);
            }
        }

        videos.shuffle(&mut rand::rng());
        videos.truncate(PERSONALIZED_LIMIT);
        Ok(videos)
    }

    /// Apply the view-count and short-form filters and build the domain
    /// entry. Filter misses are normal; malformed entries are logged.
    fn admit(&self, item: CatalogItem, now: DateTime<Utc>) -> Option<Video> {
        if item.view_count < self.config.min_view_count {
            return None;
        }
        if !is_short_duration(&item.duration) {
            return None;
        }
        match Video::new(
            item.id.clone(),
            Video::shorts_url(&item.id),
            item.title,
            item.channel_title,
            item.published_at,
            now,
        ) {
            Ok(video) => Some(video),
            Err(err) => {
                debug!(id = %item.id, error = %err, "dropping malformed catalog entry");
                None
            }
        }
    }

    /// Best-effort persistence: merge with whatever is stored and write
    /// back. A failed save is logged and never propagated.
    async fn persist_merged(&self, fresh: &[Video], now: DateTime<Utc>) {
        let mut catalog = match self.storage.load_catalog().await {
            Ok(Some(catalog)) => catalog,
            Ok(None) => VideoCatalog::new(),
            Err(err) => {
                warn!(error = %err, "catalog load failed, starting from empty");
                VideoCatalog::new()
            }
        };
        let added = catalog.merge(fresh.to_vec(), now);
        if let Err(err) = self.storage.save_catalog(&catalog).await {
            warn!(error = %err, added, "catalog save failed, continuing without persistence");
        }
    }

    async fn offline_shorts(&self, max_results: usize) -> Vec<Video> {
        match self.storage.load_catalog().await {
            Ok(Some(catalog)) if !catalog.is_empty() => {
                let mut videos = catalog.videos().to_vec();
                videos.truncate(max_results);
                videos
            }
            _ => {
                warn!("no fetched or persisted videos, serving emergency list");
                let mut videos = emergency_videos(self.clock.now());
                videos.truncate(max_results);
                videos
            }
        }
    }
}

/// Embedded last-resort list, used only when the fetch failed and the
/// persisted catalog is empty.
fn emergency_videos(now: DateTime<Utc>) -> Vec<Video> {
    [
        ("jNQXAC9IVRw", "Me at the zoo", "jawed"),
        ("dQw4w9WgXcQ", "Never Gonna Give You Up", "Rick Astley"),
        ("9bZkp7q19f0", "Gangnam Style", "officialpsy"),
    ]
    .into_iter()
    .filter_map(|(id, title, channel)| {
        let id = VideoId::new(id);
        Video::new(id.clone(), Video::shorts_url(&id), title, channel, None, now).ok()
    })
    .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
