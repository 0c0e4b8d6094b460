use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{StorageError, VideoCatalogRepository};
use quiz_core::model::VideoCatalog;

use super::SqliteRepository;

/// The catalog is persisted as one consolidated JSON document in a
/// single-row table, matching the deployment-time artifact layout.
#[async_trait]
impl VideoCatalogRepository for SqliteRepository {
    async fn load_catalog(&self) -> Result<Option<VideoCatalog>, StorageError> {
        let row = sqlx::query("SELECT document FROM video_catalog WHERE id = 1")
            .fetch_optional(self.pool())
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row
            .try_get("document")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let catalog: VideoCatalog = serde_json::from_str(&document)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        Ok(Some(catalog))
    }

    async fn save_catalog(&self, catalog: &VideoCatalog) -> Result<(), StorageError> {
        let document = serde_json::to_string(catalog)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO video_catalog (id, document, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            ",
        )
        .bind(document)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Video, VideoId};
    use quiz_core::time::fixed_now;

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

    #[tokio::test]
    async fn catalog_round_trip_through_sqlite() {
        let repo = SqliteRepository::connect("sqlite::memory:").await.unwrap();
        repo.migrate().await.unwrap();

        assert!(repo.load_catalog().await.unwrap().is_none());

        let catalog =
            VideoCatalog::from_videos(vec![build_video("a"), build_video("b")], fixed_now());
        repo.save_catalog(&catalog).await.unwrap();

        let loaded = repo.load_catalog().await.unwrap().unwrap();
        assert_eq!(loaded, catalog);
    }

    #[tokio::test]
    async fn repeated_saves_keep_a_single_document() {
        let repo = SqliteRepository::connect("sqlite::memory:").await.unwrap();
        repo.migrate().await.unwrap();

        let mut catalog = VideoCatalog::from_videos(vec![build_video("a")], fixed_now());
        repo.save_catalog(&catalog).await.unwrap();
        catalog.merge(vec![build_video("b")], fixed_now());
        repo.save_catalog(&catalog).await.unwrap();

        let loaded = repo.load_catalog().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
