use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use quiz_core::model::{AnswerOption, Category, Question, QuestionDraft, QuestionId};

use crate::error::{FetchError, QuestionSourceError};

/// Deadline for a single question fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

//
// ─── FETCHER ───────────────────────────────────────────────────────────────────
//

/// Seam for the question API, so tests can substitute fakes.
#[async_trait]
pub trait QuestionFetcher: Send + Sync {
    /// Fetch one random question for the category.
    async fn fetch(&self, category: Category) -> Result<Question, FetchError>;

    /// Fetch from the categoryless fallback endpoint. The hint decides which
    /// category the result is filed under.
    async fn fetch_any(&self, hint: Category) -> Result<Question, FetchError>;
}

#[derive(Clone, Debug)]
pub struct QuestionApiConfig {
    pub base_url: String,
}

impl QuestionApiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://quizreel-api.fly.dev";

    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            env::var("QUIZREEL_QUESTION_API_URL").unwrap_or_else(|_| Self::DEFAULT_BASE_URL.into());
        Self { base_url }
    }
}

/// HTTP implementation over `GET /api/questions/random[/{category}]`.
pub struct HttpQuestionFetcher {
    client: Client,
    config: QuestionApiConfig,
}

impl HttpQuestionFetcher {
    #[must_use]
    pub fn new(config: QuestionApiConfig) -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    async fn fetch_from(&self, url: String, category: Category) -> Result<Question, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status()));
        }

        let draft: QuestionDraft = response
            .json()
            .await
            .map_err(|err| FetchError::Malformed(err.to_string()))?;
        draft
            .validate(category)
            .map_err(|err| FetchError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl QuestionFetcher for HttpQuestionFetcher {
    async fn fetch(&self, category: Category) -> Result<Question, FetchError> {
        let url = format!(
            "{}/api/questions/random/{category}",
            self.config.base_url.trim_end_matches('/')
        );
        self.fetch_from(url, category).await
    }

    async fn fetch_any(&self, hint: Category) -> Result<Question, FetchError> {
        let url = format!(
            "{}/api/questions/random",
            self.config.base_url.trim_end_matches('/')
        );
        self.fetch_from(url, hint).await
    }
}

//
// ─── SOURCE ────────────────────────────────────────────────────────────────────
//

/// Caching, prefetching question supply with a guaranteed fallback chain:
/// cache → category endpoint → categoryless endpoint → static question.
pub struct QuestionSource {
    fetcher: Arc<dyn QuestionFetcher>,
    cache: Mutex<HashMap<Category, Vec<Question>>>,
}

impl QuestionSource {
    #[must_use]
    pub fn new(fetcher: Arc<dyn QuestionFetcher>) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached questions for the category.
    #[must_use]
    pub fn cached_count(&self, category: Category) -> usize {
        self.cache
            .lock()
            .map(|cache| cache.get(&category).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Issue `count` fetches and append successes to the category cache.
    ///
    /// Partial failure is fine: each failed fetch is logged and skipped.
    pub async fn prefetch(&self, category: Category, count: usize) {
        for _ in 0..count {
            match self.fetcher.fetch(category).await {
                Ok(question) => {
                    if let Ok(mut cache) = self.cache.lock() {
                        cache.entry(category).or_default().push(question);
                    }
                }
                Err(err) => {
                    warn!(category = %category, error = %err, "prefetch fetch failed, skipping");
                }
            }
        }
    }

    /// Resolve one question for the category, always.
    ///
    /// Cached entries are consumed at a uniformly random index (at-most-once
    /// delivery per entry). A cache miss goes to the network with the
    /// category endpoint, then the categoryless endpoint, then the static
    /// fallback question.
    ///
    /// # Errors
    ///
    /// `QuestionSourceError::Unavailable` only if even the static fallback
    /// cannot be built, which no caller should ever observe in practice.
    pub async fn get_random_question(
        &self,
        category: Category,
    ) -> Result<Question, QuestionSourceError> {
        if let Some(cached) = self.pop_cached(category) {
            return Ok(cached);
        }

        match self.fetcher.fetch(category).await {
            Ok(question) => return Ok(question),
            Err(err) => {
                warn!(category = %category, error = %err, "category fetch failed, trying fallback endpoint");
            }
        }

        match self.fetcher.fetch_any(category).await {
            Ok(question) => return Ok(question),
            Err(err) => {
                warn!(category = %category, error = %err, "fallback endpoint failed, serving static question");
            }
        }

        fallback_question(category).ok_or(QuestionSourceError::Unavailable {
            category: category.to_string(),
        })
    }

    fn pop_cached(&self, category: Category) -> Option<Question> {
        let mut cache = self.cache.lock().ok()?;
        let list = cache.get_mut(&category)?;
        if list.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..list.len());
        let question = list.swap_remove(index);
        debug!(category = %category, remaining = list.len(), "served question from cache");
        Some(question)
    }
}

//
// ─── STATIC FALLBACK ───────────────────────────────────────────────────────────
//

fn fallback_question(category: Category) -> Option<Question> {
    let (text, options, correct, explanation) = match category {
        Category::Psychology => (
            "Which memory system holds information for only a few seconds without rehearsal?",
            [
                ("a", "Long-term memory"),
                ("b", "Short-term memory"),
                ("c", "Procedural memory"),
                ("d", "Semantic memory"),
            ],
            "b",
            "Short-term memory decays within seconds unless actively rehearsed.",
        ),
        Category::FunFacts => (
            "How many hearts does an octopus have?",
            [("a", "One"), ("b", "Two"), ("c", "Three"), ("d", "Four")],
            "c",
            "Two pump blood through the gills, one through the rest of the body.",
        ),
    };

    let options = options
        .into_iter()
        .map(|(key, text)| AnswerOption {
            key: key.to_string(),
            text: text.to_string(),
        })
        .collect();

    Question::new(
        QuestionId::new(format!("fallback-{category}")),
        category,
        text,
        options,
        correct,
        explanation,
    )
    .ok()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scriptable fetcher: categorized fetches fail after `fetch_budget`
    /// successes; the categoryless endpoint honors `any_works`.
    struct FakeFetcher {
        fetch_budget: AtomicUsize,
        any_works: bool,
        fetches: AtomicUsize,
        any_fetches: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(fetch_budget: usize, any_works: bool) -> Self {
            Self {
                fetch_budget: AtomicUsize::new(fetch_budget),
                any_works,
                fetches: AtomicUsize::new(0),
                any_fetches: AtomicUsize::new(0),
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
                "",
            )
            .unwrap()
        }
    }

    #[async_trait]
    impl QuestionFetcher for FakeFetcher {
        async fn fetch(&self, category: Category) -> Result<Question, FetchError> {
            let seq = self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fetch_budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| {
                b.checked_sub(1)
            })
            .is_ok()
            {
                Ok(Self::question(category, &format!("net-{seq}")))
            } else {
                Err(FetchError::Timeout)
            }
        }

        async fn fetch_any(&self, hint: Category) -> Result<Question, FetchError> {
            self.any_fetches.fetch_add(1, Ordering::SeqCst);
            if self.any_works {
                Ok(Self::question(hint, "any-0"))
            } else {
                Err(FetchError::UpstreamStatus(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                ))
            }
        }
    }

    #[tokio::test]
    async fn prefetch_skips_failures_and_caches_successes() {
        let fetcher = Arc::new(FakeFetcher::new(3, false));
        let source = QuestionSource::new(fetcher.clone());

        source.prefetch(Category::FunFacts, 5).await;

        assert_eq!(source.cached_count(Category::FunFacts), 3);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cached_questions_are_delivered_at_most_once() {
        let source = QuestionSource::new(Arc::new(FakeFetcher::new(4, false)));
        source.prefetch(Category::Psychology, 4).await;

        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let q = source
                .get_random_question(Category::Psychology)
                .await
                .unwrap();
            assert!(seen.insert(q.id().clone()), "duplicate delivery");
        }
        assert_eq!(source.cached_count(Category::Psychology), 0);
    }

    #[tokio::test]
    async fn miss_goes_to_network_before_fallbacks() {
        let fetcher = Arc::new(FakeFetcher::new(1, false));
        let source = QuestionSource::new(fetcher.clone());

        let q = source
            .get_random_question(Category::FunFacts)
            .await
            .unwrap();
        assert_eq!(q.id(), &QuestionId::new("net-0"));
        assert_eq!(fetcher.any_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn category_failure_retries_categoryless_endpoint() {
        let fetcher = Arc::new(FakeFetcher::new(0, true));
        let source = QuestionSource::new(fetcher.clone());

        let q = source
            .get_random_question(Category::FunFacts)
            .await
            .unwrap();
        assert_eq!(q.id(), &QuestionId::new("any-0"));
        assert_eq!(fetcher.any_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn total_failure_serves_the_static_question() {
        let source = QuestionSource::new(Arc::new(FakeFetcher::new(0, false)));

        for category in Category::ALL {
            let q = source.get_random_question(category).await.unwrap();
            assert_eq!(q.category(), category);
            // the invariant the presentation layer depends on
            assert!(q.options().iter().any(|o| o.key == q.correct_answer()));
        }
    }
}
