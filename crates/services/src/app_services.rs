use std::sync::Arc;

use quiz_core::Clock;
use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::game_service::GameService;
use crate::question_source::{HttpQuestionFetcher, QuestionApiConfig, QuestionSource};
use crate::video_source::{HttpVideoCatalogApi, VideoSource, VideoSourceConfig};

/// Assembles app-facing services, constructed once at startup and handed
/// around by reference. All remote seams are env-configured here; nothing
/// else reads the environment.
#[derive(Clone)]
pub struct AppServices {
    questions: Arc<QuestionSource>,
    videos: Arc<VideoSource>,
    game: Arc<GameService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and env-configured APIs.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails. Missing
    /// API configuration is not an error: the sources degrade to cached and
    /// embedded content.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::with_storage(storage, clock).await)
    }

    /// Build services over an existing `Storage` (in-memory in tests).
    pub async fn with_storage(storage: Storage, clock: Clock) -> Self {
        let questions = Arc::new(QuestionSource::new(Arc::new(HttpQuestionFetcher::new(
            QuestionApiConfig::from_env(),
        ))));
        let videos = Arc::new(VideoSource::new(
            Arc::new(HttpVideoCatalogApi::from_env()),
            Arc::clone(&storage.videos),
            clock,
            VideoSourceConfig::from_env(),
        ));
        let game = Arc::new(
            GameService::load(
                clock,
                Arc::clone(&questions),
                Arc::clone(&videos),
                Arc::clone(&storage.stats),
            )
            .await,
        );

        Self {
            questions,
            videos,
            game,
        }
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionSource> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn videos(&self) -> Arc<VideoSource> {
        Arc::clone(&self.videos)
    }

    #[must_use]
    pub fn game(&self) -> Arc<GameService> {
        Arc::clone(&self.game)
    }
}
