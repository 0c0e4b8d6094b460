//! The game session state machine.
//!
//! Pure and synchronous: every mutation happens through a small set of intent
//! methods, so async callers can serialize all state changes through one
//! update path. Network, timers, and persistence live in the services layer.

use std::collections::HashSet;
use thiserror::Error;

use crate::model::{Category, QuestionId, SessionStats};
use crate::scoring::{
    REWARD_STREAK_INTERVAL, TUTORIAL_CORRECT_TARGET, USED_QUESTION_WINDOW, points_for,
};

//
// ─── STATES & OUTCOMES ─────────────────────────────────────────────────────────
//

/// Gameplay mode. Tutorial precedes scored; the transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Tutorial,
    Scored,
}

/// Where the session currently is.
///
/// `Welcome` and `CategorySelect` are transient entry states. `ModeChange` is
/// the announcement state entered exactly once, on the tutorial's final
/// correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Welcome,
    CategorySelect,
    Question,
    RewardVideo,
    ModeChange,
}

/// Result of applying one answer to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub points: u32,
    pub streak: u32,
    /// A reward was banked on this answer (scored mode, streak parity).
    pub reward_earned: bool,
    /// Tutorial mode surfaces a reward video immediately, without consuming
    /// a banked reward.
    pub show_reward_video: bool,
    /// The tutorial just completed; the caller should display the
    /// announcement and then call [`GameSession::acknowledge_mode_change`].
    pub mode_changed: bool,
}

/// Outcome of a reward-video request. Never an error: asking with an empty
/// balance is a legal no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Started,
    NoRewards,
}

/// Verdict on a freshly fetched question id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionVerdict {
    Accepted,
    /// Seen within the rolling window; the caller should re-request, with a
    /// bounded number of attempts.
    Duplicate,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GameSessionError {
    #[error("expected phase {expected:?}, session is in {actual:?}")]
    PhaseMismatch {
        expected: GamePhase,
        actual: GamePhase,
    },

    #[error("no category selected")]
    NoCategory,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Owns all mutable gameplay state: mode, streak, score, reward balance, and
/// the used-question window.
///
/// Invariants: `available_rewards` never goes negative (decrements are gated
/// on a positive balance), `questions_answered` is monotonic, and the
/// tutorial→scored transition fires exactly once.
#[derive(Debug, Clone)]
pub struct GameSession {
    mode: GameMode,
    phase: GamePhase,
    category: Option<Category>,
    streak: u32,
    score: u32,
    available_rewards: u32,
    questions_answered: u32,
    correct_answers: u32,
    tutorial_correct: u32,
    used_question_ids: HashSet<QuestionId>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    /// A fresh session: welcome screen, tutorial mode, empty balances.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: GameMode::Tutorial,
            phase: GamePhase::Welcome,
            category: None,
            streak: 0,
            score: 0,
            available_rewards: 0,
            questions_answered: 0,
            correct_answers: 0,
            tutorial_correct: 0,
            used_question_ids: HashSet::new(),
        }
    }

    /// Rebuild a session from persisted stats.
    ///
    /// A returning player who finished the tutorial starts straight in
    /// scored mode with their banked rewards and score intact.
    #[must_use]
    pub fn resume(stats: &SessionStats) -> Self {
        let mut session = Self::new();
        if stats.tutorial_completed {
            session.mode = GameMode::Scored;
            session.tutorial_correct = TUTORIAL_CORRECT_TARGET;
            session.score = stats.current_score;
            session.available_rewards = stats.available_videos;
        }
        session
    }

    // ─── Accessors ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    #[must_use]
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    #[must_use]
    pub fn category(&self) -> Option<Category> {
        self.category
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn available_rewards(&self) -> u32 {
        self.available_rewards
    }

    #[must_use]
    pub fn questions_answered(&self) -> u32 {
        self.questions_answered
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn used_question_count(&self) -> usize {
        self.used_question_ids.len()
    }

    // ─── Entry transitions ─────────────────────────────────────────────────

    /// Welcome → CategorySelect.
    ///
    /// # Errors
    ///
    /// Returns `PhaseMismatch` unless the session is on the welcome screen.
    pub fn start(&mut self) -> Result<(), GameSessionError> {
        self.require_phase(GamePhase::Welcome)?;
        self.phase = GamePhase::CategorySelect;
        Ok(())
    }

    /// CategorySelect → Question.
    ///
    /// # Errors
    ///
    /// Returns `PhaseMismatch` unless a category is being selected.
    pub fn choose_category(&mut self, category: Category) -> Result<(), GameSessionError> {
        self.require_phase(GamePhase::CategorySelect)?;
        self.category = Some(category);
        self.phase = GamePhase::Question;
        Ok(())
    }

    // ─── Question lifecycle ────────────────────────────────────────────────

    /// Track a fetched question id against the rolling duplicate window.
    ///
    /// Once the window holds [`USED_QUESTION_WINDOW`] ids it is reset to just
    /// the new id; below that, a repeat is reported as [`QuestionVerdict::Duplicate`]
    /// so the caller can re-request (bounded, never by recursion).
    pub fn record_question(&mut self, id: &QuestionId) -> QuestionVerdict {
        if self.used_question_ids.len() >= USED_QUESTION_WINDOW {
            self.used_question_ids.clear();
            self.used_question_ids.insert(id.clone());
            return QuestionVerdict::Accepted;
        }
        if self.used_question_ids.contains(id) {
            return QuestionVerdict::Duplicate;
        }
        self.used_question_ids.insert(id.clone());
        QuestionVerdict::Accepted
    }

    /// Apply an answer. This is the single update path for streak, score,
    /// reward accrual, and the tutorial→scored transition.
    ///
    /// An incorrect answer and a timeout are the same event: streak resets,
    /// nothing is scored. `time_taken` only matters for correct answers in
    /// scored mode.
    ///
    /// # Errors
    ///
    /// Returns `PhaseMismatch` outside the question phase and `NoCategory` if
    /// no category was ever chosen.
    pub fn record_answer(
        &mut self,
        correct: bool,
        time_taken: Option<f64>,
    ) -> Result<AnswerOutcome, GameSessionError> {
        self.require_phase(GamePhase::Question)?;
        if self.category.is_none() {
            return Err(GameSessionError::NoCategory);
        }

        self.questions_answered = self.questions_answered.saturating_add(1);

        if !correct {
            self.streak = 0;
            return Ok(AnswerOutcome {
                correct: false,
                points: 0,
                streak: 0,
                reward_earned: false,
                show_reward_video: false,
                mode_changed: false,
            });
        }

        self.correct_answers = self.correct_answers.saturating_add(1);
        self.streak = self.streak.saturating_add(1);

        match self.mode {
            GameMode::Tutorial => {
                self.tutorial_correct += 1;
                if self.tutorial_correct >= TUTORIAL_CORRECT_TARGET {
                    // One-way transition; the announcement phase is entered
                    // exactly once because the mode check can never pass again.
                    self.mode = GameMode::Scored;
                    self.phase = GamePhase::ModeChange;
                    return Ok(AnswerOutcome {
                        correct: true,
                        points: 0,
                        streak: self.streak,
                        reward_earned: false,
                        show_reward_video: false,
                        mode_changed: true,
                    });
                }
                // Every tutorial correct answer surfaces a video without
                // touching the banked balance.
                self.phase = GamePhase::RewardVideo;
                Ok(AnswerOutcome {
                    correct: true,
                    points: 0,
                    streak: self.streak,
                    reward_earned: false,
                    show_reward_video: true,
                    mode_changed: false,
                })
            }
            GameMode::Scored => {
                let points = points_for(time_taken);
                self.score = self.score.saturating_add(points);
                let reward_earned = self.streak % REWARD_STREAK_INTERVAL == 0;
                if reward_earned {
                    self.available_rewards = self.available_rewards.saturating_add(1);
                }
                Ok(AnswerOutcome {
                    correct: true,
                    points,
                    streak: self.streak,
                    reward_earned,
                    show_reward_video: false,
                    mode_changed: false,
                })
            }
        }
    }

    /// ModeChange → Question, after the announcement has been displayed.
    ///
    /// # Errors
    ///
    /// Returns `PhaseMismatch` unless the announcement is showing.
    pub fn acknowledge_mode_change(&mut self) -> Result<(), GameSessionError> {
        self.require_phase(GamePhase::ModeChange)?;
        self.phase = GamePhase::Question;
        Ok(())
    }

    // ─── Rewards ───────────────────────────────────────────────────────────

    /// Spend one banked reward to watch a video.
    ///
    /// With an empty balance this is a no-op reporting
    /// [`WatchOutcome::NoRewards`]; the balance can never go negative.
    ///
    /// # Errors
    ///
    /// Returns `PhaseMismatch` outside the question phase.
    pub fn watch_video(&mut self) -> Result<WatchOutcome, GameSessionError> {
        self.require_phase(GamePhase::Question)?;
        if self.available_rewards == 0 {
            return Ok(WatchOutcome::NoRewards);
        }
        self.available_rewards -= 1;
        self.phase = GamePhase::RewardVideo;
        Ok(WatchOutcome::Started)
    }

    /// RewardVideo → Question, when the video ends or is swiped away.
    ///
    /// # Errors
    ///
    /// Returns `PhaseMismatch` unless a video is showing.
    pub fn finish_video(&mut self) -> Result<(), GameSessionError> {
        self.require_phase(GamePhase::RewardVideo)?;
        self.phase = GamePhase::Question;
        Ok(())
    }

    // ─── Persistence bridge ────────────────────────────────────────────────

    /// Fold the session's current standing into persisted stats.
    ///
    /// Per-answer totals are the caller's job (`SessionStats::note_answer`);
    /// this covers everything derived from session state.
    pub fn sync_stats(&self, stats: &mut SessionStats) {
        stats.note_score(self.score);
        stats.note_streak(self.streak);
        stats.available_videos = self.available_rewards;
        if self.mode == GameMode::Scored {
            stats.tutorial_completed = true;
        }
    }

    fn require_phase(&self, expected: GamePhase) -> Result<(), GameSessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameSessionError::PhaseMismatch {
                expected,
                actual: self.phase,
            })
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
