//! Canonical answer scoring and gameplay constants.
//!
//! The scoring formula lives in exactly one place; every caller that awards
//! points goes through [`points_for`].

/// Correct answers needed to finish the tutorial.
pub const TUTORIAL_CORRECT_TARGET: u32 = 5;

/// A reward is earned every Nth correct answer within a streak.
pub const REWARD_STREAK_INTERVAL: u32 = 2;

/// Rolling window of question ids tracked for duplicate avoidance.
pub const USED_QUESTION_WINDOW: usize = 20;

/// Points awarded when no answer duration is supplied.
pub const DEFAULT_POINTS: u32 = 50;

/// Fastest-possible answer score.
pub const MAX_POINTS: u32 = 100;

/// Floor applied to slow answers.
pub const MIN_POINTS: u32 = 10;

/// Points lost per second of thinking time.
pub const POINTS_DECAY_PER_SECOND: f64 = 9.0;

/// Points for a correct answer given the time taken in seconds.
///
/// `max(10, floor(100 - 9t))` for a supplied duration (negative durations
/// clamp to zero); the fixed default when no duration is known.
#[must_use]
pub fn points_for(time_taken: Option<f64>) -> u32 {
    let Some(seconds) = time_taken else {
        return DEFAULT_POINTS;
    };
    let seconds = seconds.max(0.0);
    let raw = (f64::from(MAX_POINTS) - POINTS_DECAY_PER_SECOND * seconds).floor();
    if raw <= f64::from(MIN_POINTS) {
        MIN_POINTS
    } else {
        // raw is within (10, 100], safe to narrow
        raw as u32
    }
}
