use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{SessionStats, VideoCatalog};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for session statistics.
///
/// Stats writes are best-effort by design: callers log and continue on
/// failure rather than blocking a state transition.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Load persisted stats, or `None` for a first run.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn load_stats(&self) -> Result<Option<SessionStats>, StorageError>;

    /// Persist the full stats snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_stats(&self, stats: &SessionStats) -> Result<(), StorageError>;
}

/// Repository contract for the consolidated video catalog document.
#[async_trait]
pub trait VideoCatalogRepository: Send + Sync {
    /// Load the persisted catalog, or `None` if never written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn load_catalog(&self) -> Result<Option<VideoCatalog>, StorageError>;

    /// Persist the full catalog document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be stored.
    async fn save_catalog(&self, catalog: &VideoCatalog) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    stats: Arc<Mutex<Option<SessionStats>>>,
    catalog: Arc<Mutex<Option<VideoCatalog>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsRepository for InMemoryRepository {
    async fn load_stats(&self) -> Result<Option<SessionStats>, StorageError> {
        let guard = self
            .stats
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_stats(&self, stats: &SessionStats) -> Result<(), StorageError> {
        let mut guard = self
            .stats
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(stats.clone());
        Ok(())
    }
}

#[async_trait]
impl VideoCatalogRepository for InMemoryRepository {
    async fn load_catalog(&self) -> Result<Option<VideoCatalog>, StorageError> {
        let guard = self
            .catalog
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save_catalog(&self, catalog: &VideoCatalog) -> Result<(), StorageError> {
        let mut guard = self
            .catalog
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(catalog.clone());
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub stats: Arc<dyn StatsRepository>,
    pub videos: Arc<dyn VideoCatalogRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let stats: Arc<dyn StatsRepository> = Arc::new(repo.clone());
        let videos: Arc<dyn VideoCatalogRepository> = Arc::new(repo);
        Self { stats, videos }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Video, VideoId};
    use quiz_core::time::fixed_now;

    #[tokio::test]
    async fn stats_round_trip() {
        let repo = InMemoryRepository::new();
        assert!(repo.load_stats().await.unwrap().is_none());

        let mut stats = SessionStats::new();
        stats.note_answer(true);
        stats.note_score(91);
        repo.save_stats(&stats).await.unwrap();

        let loaded = repo.load_stats().await.unwrap().unwrap();
        assert_eq!(loaded, stats);
    }

    #[tokio::test]
    async fn catalog_round_trip() {
        let repo = InMemoryRepository::new();
        let id = VideoId::new("abc");
        let video = Video::new(
            id.clone(),
            Video::shorts_url(&id),
            "Title",
            "Channel",
            None,
            fixed_now(),
        )
        .unwrap();
        let catalog = VideoCatalog::from_videos(vec![video], fixed_now());

        repo.save_catalog(&catalog).await.unwrap();
        let loaded = repo.load_catalog().await.unwrap().unwrap();
        assert_eq!(loaded, catalog);
    }
}
