mod ids;
mod question;
mod stats;
mod video;

pub use ids::{QuestionId, VideoId};
pub use question::{
    AnswerOption, Category, ParseCategoryError, Question, QuestionDraft, QuestionError,
    shuffle_options,
};
pub use stats::SessionStats;
pub use video::{MAX_CATALOG_VIDEOS, Video, VideoCatalog, VideoError};
