use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use quiz_core::model::{AnswerOption, Category, Question, QuestionId, SessionStats, VideoId};
use quiz_core::session::{GameMode, GamePhase};
use quiz_core::time::fixed_clock;
use services::error::FetchError;
use services::game_service::{GameService, NextQuestion, WatchVideo};
use services::question_source::{QuestionFetcher, QuestionSource};
use services::video_source::{CatalogItem, VideoCatalogApi, VideoSource, VideoSourceConfig};
use storage::repository::{InMemoryRepository, StatsRepository};

/// Serves questions with ids from a cycling counter; `delay` simulates a
/// slow network, `repeat_id` pins every response to one id.
struct ScriptedFetcher {
    counter: AtomicUsize,
    delay: Duration,
    repeat_id: Option<&'static str>,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
            delay: Duration::ZERO,
            repeat_id: None,
        }
    }

    fn question(category: Category, id: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            category,
            "Q?",
            vec![
                AnswerOption {
                    key: "a".into(),
                    text: "A".into(),
                },
                AnswerOption {
                    key: "b".into(),
                    text: "B".into(),
                },
            ],
            "a",
            "Because a.",
        )
        .unwrap()
    }
}

#[async_trait]
impl QuestionFetcher for ScriptedFetcher {
    async fn fetch(&self, category: Category) -> Result<Question, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = self
            .repeat_id
            .map_or_else(|| format!("q-{seq}"), str::to_string);
        Ok(Self::question(category, &id))
    }

    async fn fetch_any(&self, hint: Category) -> Result<Question, FetchError> {
        self.fetch(hint).await
    }
}

struct SingleShortApi;

#[async_trait]
impl VideoCatalogApi for SingleShortApi {
    async fn popular_shorts(
        &self,
        _region: &str,
        _max_results: u32,
    ) -> Result<Vec<CatalogItem>, FetchError> {
        Ok(vec![CatalogItem {
            id: VideoId::new("short-1"),
            title: "A short".into(),
            channel_title: "Channel".into(),
            published_at: None,
            duration: "PT30S".into(),
            view_count: 1_000_000,
        }])
    }

    async fn subscribed_channels(&self, _access_token: &str) -> Result<Vec<String>, FetchError> {
        Err(FetchError::NotConfigured)
    }

    async fn recent_uploads(
        &self,
        _channel_id: &str,
        _max_results: u32,
    ) -> Result<Vec<CatalogItem>, FetchError> {
        Err(FetchError::NotConfigured)
    }
}

fn build_game(fetcher: ScriptedFetcher, repo: InMemoryRepository) -> GameService {
    let questions = Arc::new(QuestionSource::new(Arc::new(fetcher)));
    let videos = Arc::new(VideoSource::new(
        Arc::new(SingleShortApi),
        Arc::new(repo.clone()),
        fixed_clock(),
        VideoSourceConfig::default(),
    ));
    GameService::new(
        fixed_clock(),
        questions,
        videos,
        Arc::new(repo),
        SessionStats::new(),
    )
}

async fn answer_correctly(game: &GameService) -> quiz_core::session::AnswerOutcome {
    let NextQuestion::Ready(question) = game.next_question().await.unwrap() else {
        panic!("fetch unexpectedly in flight");
    };
    let correct = question.correct_answer().to_string();
    game.answer(&correct).await.unwrap().outcome
}

#[tokio::test]
async fn tutorial_to_scored_flow_with_rewards() {
    let repo = InMemoryRepository::new();
    let game = build_game(ScriptedFetcher::new(), repo.clone());

    game.start().unwrap();
    game.choose_category(Category::FunFacts).unwrap();

    // four tutorial corrects: a reward video after each, no mode change
    for _ in 0..4 {
        let outcome = answer_correctly(&game).await;
        assert!(outcome.show_reward_video);
        assert!(!outcome.mode_changed);
        assert!(game.tutorial_video().await.is_some());
        game.finish_video().unwrap();
    }

    // the fifth completes the tutorial, exactly once
    let outcome = answer_correctly(&game).await;
    assert!(outcome.mode_changed);
    assert_eq!(game.snapshot().mode, GameMode::Scored);
    assert_eq!(game.snapshot().phase, GamePhase::ModeChange);
    game.acknowledge_mode_change().await.unwrap();

    // persisted profile reflects the transition
    let stats = repo.load_stats().await.unwrap().unwrap();
    assert!(stats.tutorial_completed);
    assert_eq!(stats.total_correct_answers, 5);

    // sixth correct answer: streak 6, parity banks a reward
    let outcome = answer_correctly(&game).await;
    assert!(outcome.reward_earned);
    assert_eq!(game.snapshot().available_rewards, 1);

    // the reward is spendable exactly once
    match game.watch_video().await.unwrap() {
        WatchVideo::Started(video) => assert!(video.is_some()),
        WatchVideo::NoRewards => panic!("expected a reward to spend"),
    }
    game.finish_video().unwrap();
    assert_eq!(game.snapshot().available_rewards, 0);
    assert_eq!(game.watch_video().await.unwrap(), WatchVideo::NoRewards);
}

#[tokio::test]
async fn wrong_answers_reset_streak_and_score_nothing() {
    let repo = InMemoryRepository::new();
    let game = build_game(ScriptedFetcher::new(), repo.clone());

    game.start().unwrap();
    game.choose_category(Category::Psychology).unwrap();

    let NextQuestion::Ready(question) = game.next_question().await.unwrap() else {
        panic!("fetch unexpectedly in flight");
    };
    let wrong = question
        .options()
        .iter()
        .map(|o| o.key.clone())
        .find(|key| key != question.correct_answer())
        .unwrap();

    let feedback = game.answer(&wrong).await.unwrap();
    assert!(!feedback.outcome.correct);
    assert_eq!(feedback.outcome.streak, 0);
    assert_eq!(feedback.outcome.points, 0);
    assert_eq!(feedback.correct_answer, question.correct_answer());

    let stats = repo.load_stats().await.unwrap().unwrap();
    assert_eq!(stats.total_questions_answered, 1);
    assert_eq!(stats.total_correct_answers, 0);
}

#[tokio::test]
async fn concurrent_next_question_calls_issue_one_fetch() {
    let fetcher = ScriptedFetcher {
        counter: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
        repeat_id: None,
    };
    let game = Arc::new(build_game(fetcher, InMemoryRepository::new()));
    game.start().unwrap();
    game.choose_category(Category::FunFacts).unwrap();

    let first = {
        let game = Arc::clone(&game);
        tokio::spawn(async move { game.next_question().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = game.next_question().await.unwrap();

    assert_eq!(second, NextQuestion::InFlight);
    assert!(matches!(first.await.unwrap(), NextQuestion::Ready(_)));
}

#[tokio::test]
async fn abandoned_fetch_releases_the_loading_gate() {
    let fetcher = ScriptedFetcher {
        counter: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
        repeat_id: None,
    };
    let game = Arc::new(build_game(fetcher, InMemoryRepository::new()));
    game.start().unwrap();
    game.choose_category(Category::FunFacts).unwrap();

    let abandoned = {
        let game = Arc::clone(&game);
        tokio::spawn(async move { game.next_question().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    abandoned.abort();
    assert!(abandoned.await.unwrap_err().is_cancelled());

    let next = game.next_question().await.unwrap();
    assert!(matches!(next, NextQuestion::Ready(_)));
}

#[tokio::test]
async fn rejected_answer_keeps_the_question_and_its_timing() {
    let repo = InMemoryRepository::new();
    let game = build_game(ScriptedFetcher::new(), repo.clone());
    game.start().unwrap();
    game.choose_category(Category::FunFacts).unwrap();

    for _ in 0..4 {
        answer_correctly(&game).await;
        game.finish_video().unwrap();
    }
    assert!(answer_correctly(&game).await.mode_changed);
    game.acknowledge_mode_change().await.unwrap();
    assert!(answer_correctly(&game).await.reward_earned);

    // a question is on screen, then the player spends a reward instead
    let NextQuestion::Ready(question) = game.next_question().await.unwrap() else {
        panic!("fetch unexpectedly in flight");
    };
    assert!(matches!(
        game.watch_video().await.unwrap(),
        WatchVideo::Started(_)
    ));

    // answering during the video is rejected without consuming the question
    assert!(game.answer(question.correct_answer()).await.is_err());
    game.finish_video().unwrap();

    // fixed clock: zero elapsed must still score as an instant answer
    let feedback = game.answer(question.correct_answer()).await.unwrap();
    assert!(feedback.outcome.correct);
    assert_eq!(feedback.outcome.points, 100);
}

#[tokio::test]
async fn duplicate_questions_are_rerequested_a_bounded_number_of_times() {
    let fetcher = ScriptedFetcher {
        counter: AtomicUsize::new(0),
        delay: Duration::ZERO,
        repeat_id: Some("only-question"),
    };
    let game = build_game(fetcher, InMemoryRepository::new());
    game.start().unwrap();
    game.choose_category(Category::FunFacts).unwrap();

    // first presentation tracks the id
    let outcome = answer_correctly(&game).await;
    assert!(outcome.correct);
    game.finish_video().unwrap();

    // the only question in the pool repeats: retries must terminate and
    // still hand the player something to answer
    let next = game.next_question().await.unwrap();
    assert!(matches!(next, NextQuestion::Ready(_)));
}
