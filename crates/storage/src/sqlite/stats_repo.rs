use async_trait::async_trait;
use sqlx::Row;
use std::collections::HashMap;

use crate::repository::{StatsRepository, StorageError};
use quiz_core::model::SessionStats;

use super::SqliteRepository;

// Namespaced key layout, one row per counter.
const KEY_TUTORIAL_COMPLETED: &str = "quizreel.tutorialCompleted";
const KEY_CURRENT_SCORE: &str = "quizreel.currentScore";
const KEY_HIGH_SCORE: &str = "quizreel.highScore";
const KEY_AVAILABLE_VIDEOS: &str = "quizreel.availableVideos";
const KEY_HIGHEST_STREAK: &str = "quizreel.highestStreak";
const KEY_TOTAL_QUESTIONS: &str = "quizreel.totalQuestionsAnswered";
const KEY_TOTAL_CORRECT: &str = "quizreel.totalCorrectAnswers";

fn get_u32(map: &HashMap<String, String>, key: &str) -> Result<u32, StorageError> {
    match map.get(key) {
        None => Ok(0),
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| StorageError::Serialization(format!("{key}: invalid integer {raw}"))),
    }
}

#[async_trait]
impl StatsRepository for SqliteRepository {
    async fn load_stats(&self) -> Result<Option<SessionStats>, StorageError> {
        let rows = sqlx::query("SELECT key, value FROM session_stats")
            .fetch_all(self.pool())
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row
                .try_get("key")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            let value: String = row
                .try_get("value")
                .map_err(|err| StorageError::Serialization(err.to_string()))?;
            map.insert(key, value);
        }

        Ok(Some(SessionStats {
            tutorial_completed: map
                .get(KEY_TUTORIAL_COMPLETED)
                .is_some_and(|v| v == "true"),
            current_score: get_u32(&map, KEY_CURRENT_SCORE)?,
            high_score: get_u32(&map, KEY_HIGH_SCORE)?,
            available_videos: get_u32(&map, KEY_AVAILABLE_VIDEOS)?,
            highest_streak: get_u32(&map, KEY_HIGHEST_STREAK)?,
            total_questions_answered: get_u32(&map, KEY_TOTAL_QUESTIONS)?,
            total_correct_answers: get_u32(&map, KEY_TOTAL_CORRECT)?,
        }))
    }

    async fn save_stats(&self, stats: &SessionStats) -> Result<(), StorageError> {
        let entries: [(&str, String); 7] = [
            (
                KEY_TUTORIAL_COMPLETED,
                if stats.tutorial_completed { "true" } else { "false" }.to_string(),
            ),
            (KEY_CURRENT_SCORE, stats.current_score.to_string()),
            (KEY_HIGH_SCORE, stats.high_score.to_string()),
            (KEY_AVAILABLE_VIDEOS, stats.available_videos.to_string()),
            (KEY_HIGHEST_STREAK, stats.highest_streak.to_string()),
            (
                KEY_TOTAL_QUESTIONS,
                stats.total_questions_answered.to_string(),
            ),
            (KEY_TOTAL_CORRECT, stats.total_correct_answers.to_string()),
        ];

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        for (key, value) in entries {
            sqlx::query(
                r"
                INSERT INTO session_stats (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stats_round_trip_through_sqlite() {
        let repo = SqliteRepository::connect("sqlite::memory:").await.unwrap();
        repo.migrate().await.unwrap();

        assert!(repo.load_stats().await.unwrap().is_none());

        let stats = SessionStats {
            tutorial_completed: true,
            current_score: 132,
            high_score: 400,
            available_videos: 2,
            highest_streak: 7,
            total_questions_answered: 31,
            total_correct_answers: 24,
        };
        repo.save_stats(&stats).await.unwrap();

        let loaded = repo.load_stats().await.unwrap().unwrap();
        assert_eq!(loaded, stats);
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let repo = SqliteRepository::connect("sqlite::memory:").await.unwrap();
        repo.migrate().await.unwrap();

        let mut stats = SessionStats::new();
        repo.save_stats(&stats).await.unwrap();
        stats.note_score(60);
        repo.save_stats(&stats).await.unwrap();

        let loaded = repo.load_stats().await.unwrap().unwrap();
        assert_eq!(loaded.current_score, 60);
        assert_eq!(loaded.high_score, 60);
    }
}
