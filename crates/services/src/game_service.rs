use rand::Rng;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use chrono::{DateTime, Utc};
use quiz_core::Clock;
use quiz_core::model::{Category, Question, SessionStats, Video, shuffle_options};
use quiz_core::session::{
    AnswerOutcome, GameMode, GamePhase, GameSession, QuestionVerdict, WatchOutcome,
};
use storage::repository::StatsRepository;

use crate::error::GameError;
use crate::question_source::QuestionSource;
use crate::video_source::VideoSource;

/// Bounded retry budget for re-requesting a duplicate question. After this
/// many attempts the last question is accepted so tiny pools still progress.
pub const MAX_DUP_RETRIES: usize = 5;

/// How many catalog entries a reward-video pick samples from.
const REWARD_VIDEO_POOL: usize = 20;

/// Result of asking for the next question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextQuestion {
    Ready(Question),
    /// A fetch for the current slot is already outstanding; no second fetch
    /// was issued.
    InFlight,
}

/// Result of a reward-video request.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchVideo {
    Started(Option<Video>),
    NoRewards,
}

/// What the presentation layer shows after an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub outcome: AnswerOutcome,
    pub correct_answer: String,
    pub explanation: String,
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSnapshot {
    pub mode: GameMode,
    pub phase: GamePhase,
    pub streak: u32,
    pub score: u32,
    pub available_rewards: u32,
    pub questions_answered: u32,
}

/// Clears the in-flight fetch gate when the guarded scope ends, whether by
/// return, error, or the future being dropped.
struct LoadingReset<'a> {
    service: &'a GameService,
}

impl Drop for LoadingReset<'_> {
    fn drop(&mut self) {
        self.service.lock().loading = false;
    }
}

struct ControllerState {
    session: GameSession,
    stats: SessionStats,
    current_question: Option<Question>,
    question_shown_at: Option<DateTime<Utc>>,
    /// At-most-one in-flight current-question fetch.
    loading: bool,
}

/// The session controller: owns the game state machine and drives it with
/// content from the sources, persisting stats best-effort along the way.
///
/// All state mutations go through the single mutex-guarded update path; the
/// lock is never held across an await.
pub struct GameService {
    clock: Clock,
    questions: Arc<QuestionSource>,
    videos: Arc<VideoSource>,
    stats_repo: Arc<dyn StatsRepository>,
    state: Mutex<ControllerState>,
}

impl GameService {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<QuestionSource>,
        videos: Arc<VideoSource>,
        stats_repo: Arc<dyn StatsRepository>,
        stats: SessionStats,
    ) -> Self {
        let session = GameSession::resume(&stats);
        Self {
            clock,
            questions,
            videos,
            stats_repo,
            state: Mutex::new(ControllerState {
                session,
                stats,
                current_question: None,
                question_shown_at: None,
                loading: false,
            }),
        }
    }

    /// Build the controller from persisted stats; a load failure starts a
    /// fresh profile rather than blocking startup.
    pub async fn load(
        clock: Clock,
        questions: Arc<QuestionSource>,
        videos: Arc<VideoSource>,
        stats_repo: Arc<dyn StatsRepository>,
    ) -> Self {
        let stats = match stats_repo.load_stats().await {
            Ok(Some(stats)) => stats,
            Ok(None) => SessionStats::new(),
            Err(err) => {
                warn!(error = %err, "stats load failed, starting fresh");
                SessionStats::new()
            }
        };
        Self::new(clock, questions, videos, stats_repo, stats)
    }

    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        let state = self.lock();
        GameSnapshot {
            mode: state.session.mode(),
            phase: state.session.phase(),
            streak: state.session.streak(),
            score: state.session.score(),
            available_rewards: state.session.available_rewards(),
            questions_answered: state.session.questions_answered(),
        }
    }

    // ─── Intents ───────────────────────────────────────────────────────────

    /// Welcome → CategorySelect.
    ///
    /// # Errors
    ///
    /// Propagates state-machine phase errors.
    pub fn start(&self) -> Result<(), GameError> {
        self.lock().session.start()?;
        Ok(())
    }

    /// CategorySelect → Question.
    ///
    /// # Errors
    ///
    /// Propagates state-machine phase errors.
    pub fn choose_category(&self, category: Category) -> Result<(), GameError> {
        self.lock().session.choose_category(category)?;
        Ok(())
    }

    /// Warm the question cache for a category. Safe to run as a background
    /// task; partial failure is absorbed by the source.
    pub async fn prefetch_questions(&self, category: Category, count: usize) {
        self.questions.prefetch(category, count).await;
    }

    /// Fetch the next question for the current slot.
    ///
    /// Gated by a loading flag: while a fetch is outstanding, further calls
    /// return [`NextQuestion::InFlight`] instead of issuing a concurrent
    /// fetch. Duplicate ids within the rolling window are re-requested a
    /// bounded number of times.
    ///
    /// # Errors
    ///
    /// Propagates phase errors and the (never expected) terminal
    /// source failure.
    pub async fn next_question(&self) -> Result<NextQuestion, GameError> {
        let category = {
            let mut state = self.lock();
            if state.session.phase() != GamePhase::Question {
                return Err(GameError::Session(
                    quiz_core::session::GameSessionError::PhaseMismatch {
                        expected: GamePhase::Question,
                        actual: state.session.phase(),
                    },
                ));
            }
            if state.loading {
                return Ok(NextQuestion::InFlight);
            }
            let Some(category) = state.session.category() else {
                return Err(GameError::Session(
                    quiz_core::session::GameSessionError::NoCategory,
                ));
            };
            state.loading = true;
            category
        };
        // Clears the gate on every exit, including a caller dropping this
        // future mid-fetch.
        let _reset = LoadingReset { service: self };

        for attempt in 0..=MAX_DUP_RETRIES {
            let question = self.questions.get_random_question(category).await?;

            let mut state = self.lock();
            let verdict = state.session.record_question(question.id());
            if verdict == QuestionVerdict::Duplicate && attempt < MAX_DUP_RETRIES {
                debug!(id = %question.id(), attempt, "duplicate question, re-requesting");
                drop(state);
                continue;
            }

            let presented = shuffle_options(&question, &mut rand::rng());
            state.current_question = Some(presented.clone());
            state.question_shown_at = Some(self.clock.now());
            return Ok(NextQuestion::Ready(presented));
        }

        // unreachable: the loop always returns
        Err(GameError::NoActiveQuestion)
    }

    /// Apply the player's option choice to the current question.
    ///
    /// # Errors
    ///
    /// `GameError::NoActiveQuestion` without a pending question; otherwise
    /// propagates state-machine errors.
    pub async fn answer(&self, option_key: &str) -> Result<AnswerFeedback, GameError> {
        self.resolve_answer(Some(option_key)).await
    }

    /// Count the current question as missed (the countdown elapsed).
    ///
    /// # Errors
    ///
    /// Same contract as [`GameService::answer`].
    pub async fn timeout(&self) -> Result<AnswerFeedback, GameError> {
        self.resolve_answer(None).await
    }

    async fn resolve_answer(&self, option_key: Option<&str>) -> Result<AnswerFeedback, GameError> {
        let (feedback, stats) = {
            let mut state = self.lock();
            let Some(question) = state.current_question.take() else {
                return Err(GameError::NoActiveQuestion);
            };

            let correct = option_key.is_some_and(|key| question.is_correct(key));
            let shown_at = state.question_shown_at.take();
            let time_taken = shown_at.map(|shown| self.clock.seconds_since(shown));

            let outcome = match state.session.record_answer(correct, time_taken) {
                Ok(outcome) => outcome,
                Err(err) => {
                    // leave the question answerable, with its timing intact
                    state.current_question = Some(question);
                    state.question_shown_at = shown_at;
                    return Err(err.into());
                }
            };

            state.stats.note_answer(correct);
            let ControllerState {
                session, stats, ..
            } = &mut *state;
            session.sync_stats(stats);

            (
                AnswerFeedback {
                    outcome,
                    correct_answer: question.correct_answer().to_string(),
                    explanation: question.explanation().to_string(),
                },
                state.stats.clone(),
            )
        };

        self.persist(stats).await;
        Ok(feedback)
    }

    /// Spend a banked reward and pick a video to show.
    ///
    /// An empty balance is a plain [`WatchVideo::NoRewards`] outcome, with
    /// no state change and no error.
    ///
    /// # Errors
    ///
    /// Propagates state-machine phase errors.
    pub async fn watch_video(&self) -> Result<WatchVideo, GameError> {
        let stats = {
            let mut state = self.lock();
            match state.session.watch_video()? {
                WatchOutcome::NoRewards => return Ok(WatchVideo::NoRewards),
                WatchOutcome::Started => {}
            }
            let ControllerState {
                session, stats, ..
            } = &mut *state;
            session.sync_stats(stats);
            state.stats.clone()
        };

        self.persist(stats).await;
        let video = self.pick_reward_video().await;
        Ok(WatchVideo::Started(video))
    }

    /// Video for a tutorial reward phase: no balance is consumed, the
    /// session is already in the reward-video phase.
    pub async fn tutorial_video(&self) -> Option<Video> {
        self.pick_reward_video().await
    }

    /// RewardVideo → Question.
    ///
    /// # Errors
    ///
    /// Propagates state-machine phase errors.
    pub fn finish_video(&self) -> Result<(), GameError> {
        self.lock().session.finish_video()?;
        Ok(())
    }

    /// ModeChange → Question, after the announcement.
    ///
    /// # Errors
    ///
    /// Propagates state-machine phase errors.
    pub async fn acknowledge_mode_change(&self) -> Result<(), GameError> {
        let stats = {
            let mut state = self.lock();
            state.session.acknowledge_mode_change()?;
            let ControllerState {
                session, stats, ..
            } = &mut *state;
            session.sync_stats(stats);
            state.stats.clone()
        };
        self.persist(stats).await;
        Ok(())
    }

    // ─── Internals ─────────────────────────────────────────────────────────

    async fn pick_reward_video(&self) -> Option<Video> {
        let pool = self.videos.get_viral_shorts(REWARD_VIDEO_POOL).await;
        if pool.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..pool.len());
        pool.into_iter().nth(index)
    }

    /// Best-effort stats write. The state transition already happened;
    /// a failed save is logged and never surfaced.
    async fn persist(&self, stats: SessionStats) {
        if let Err(err) = self.stats_repo.save_stats(&stats).await {
            warn!(error = %err, "stats save failed, continuing");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ControllerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
