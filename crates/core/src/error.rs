use thiserror::Error;

use crate::model::{QuestionError, VideoError};
use crate::session::GameSessionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error(transparent)]
    Session(#[from] GameSessionError),
}
