use serde::{Deserialize, Serialize};

/// Persisted session statistics.
///
/// Mirrors the namespaced key-value layout used by storage adapters; all
/// counters are high-water or monotonic, so a stale best-effort write can
/// only under-report, never corrupt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub tutorial_completed: bool,
    pub current_score: u32,
    pub high_score: u32,
    pub available_videos: u32,
    pub highest_streak: u32,
    pub total_questions_answered: u32,
    pub total_correct_answers: u32,
}

impl SessionStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one answered question.
    pub fn note_answer(&mut self, correct: bool) {
        self.total_questions_answered = self.total_questions_answered.saturating_add(1);
        if correct {
            self.total_correct_answers = self.total_correct_answers.saturating_add(1);
        }
    }

    /// Update the current score and the high-score high-water mark.
    pub fn note_score(&mut self, score: u32) {
        self.current_score = score;
        if score > self.high_score {
            self.high_score = score;
        }
    }

    /// Update the highest-streak high-water mark.
    pub fn note_streak(&mut self, streak: u32) {
        if streak > self.highest_streak {
            self.highest_streak = streak;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_water_marks_never_regress() {
        let mut stats = SessionStats::new();
        stats.note_score(120);
        stats.note_score(40);
        stats.note_streak(6);
        stats.note_streak(2);

        assert_eq!(stats.current_score, 40);
        assert_eq!(stats.high_score, 120);
        assert_eq!(stats.highest_streak, 6);
    }

    #[test]
    fn answers_count_correct_separately() {
        let mut stats = SessionStats::new();
        stats.note_answer(true);
        stats.note_answer(false);
        stats.note_answer(true);

        assert_eq!(stats.total_questions_answered, 3);
        assert_eq!(stats.total_correct_answers, 2);
    }
}
