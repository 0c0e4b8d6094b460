#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod game_service;
pub mod question_source;
pub mod scope;
pub mod video_source;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, FetchError, GameError, QuestionSourceError};
pub use game_service::{
    AnswerFeedback, GameService, GameSnapshot, NextQuestion, WatchVideo,
};
pub use question_source::{QuestionFetcher, QuestionSource};
pub use scope::TaskScope;
pub use video_source::{VideoCatalogApi, VideoSource};
