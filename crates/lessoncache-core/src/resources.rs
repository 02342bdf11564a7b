//! Typed queries and mutations over the query cache.
//!
//! Every read goes through the `QueryClient` under a key from
//! [`keys`](crate::cache::keys) with its resource's staleness window.
//! Every mutation lists the keys it affects and invalidates them once the
//! write succeeds; nothing is tracked automatically.

use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::{IdentityCache, ProfileSink, ProfileSnapshot};
use crate::cache::policy::{
    CATEGORIES_STALE_TIME, DASHBOARD_STALE_TIME, DEFAULT_STALE_TIME, LESSONS_STALE_TIME,
    LESSON_STALE_TIME, ROADMAP_STALE_TIME,
};
use crate::cache::{keys, QueryClient, QueryError, QueryKey, QueryOptions};
use crate::models::{
    Achievement, Category, ChallengeFilter, DashboardData, ExerciseSubmission, LeaderboardEntry,
    Lesson, LessonWithContent, PortfolioItem, PracticeChallenge, PracticeSession, PracticeStats,
    PromptSubmission, Roadmap, RoadmapDetail, SaveToPortfolioRequest, SubmissionResult,
    UserRoadmapProgress, UserStats,
};
use crate::progress::{LessonError, LessonProgressTracker};

type QueryResult<T> = std::result::Result<Arc<T>, QueryError>;

/// Resource facade for one session: API calls authenticated with the
/// session's identity, results cached in the session's query client.
#[derive(Clone)]
pub struct Resources {
    api: ApiClient,
    identity: Arc<IdentityCache>,
    queries: QueryClient,
}

impl Resources {
    pub fn new(api: ApiClient, identity: Arc<IdentityCache>, queries: QueryClient) -> Self {
        Self {
            api,
            identity,
            queries,
        }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// API client carrying the current identity's token.
    pub async fn api(&self) -> ApiClient {
        let token = self.identity.access_token().await.unwrap_or_default();
        self.api.with_token(&token)
    }

    /// Wrap an API call into a fetcher that authenticates at call time.
    fn authed<T, F, Fut>(&self, call: F) -> impl Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static
    where
        T: Send + 'static,
        F: Fn(ApiClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let base = self.api.clone();
        let identity = Arc::clone(&self.identity);
        let call = Arc::new(call);
        move || {
            let base = base.clone();
            let identity = Arc::clone(&identity);
            let call = Arc::clone(&call);
            async move {
                let token = identity.access_token().await.unwrap_or_default();
                (*call)(base.with_token(&token)).await
            }
            .boxed()
        }
    }

    // ===== Lessons =====

    pub async fn categories(&self) -> QueryResult<Vec<Category>> {
        self.queries
            .fetch_query(
                keys::categories(),
                QueryOptions::stale_after(CATEGORIES_STALE_TIME),
                self.authed(|api| async move { api.get_categories().await }),
            )
            .await
    }

    /// Disabled until a real category id (non-zero) is known.
    pub async fn lessons_by_category(&self, category_id: i64) -> QueryResult<Vec<Lesson>> {
        self.queries
            .fetch_query(
                keys::lessons(category_id),
                QueryOptions::stale_after(LESSONS_STALE_TIME).enabled(category_id != 0),
                self.authed(move |api| async move { api.get_lessons_by_category(category_id).await }),
            )
            .await
    }

    pub async fn lesson_with_content(&self, lesson_id: i64) -> QueryResult<LessonWithContent> {
        self.queries
            .fetch_query(
                keys::lesson(lesson_id),
                QueryOptions::stale_after(LESSON_STALE_TIME).enabled(lesson_id != 0),
                self.authed(move |api| async move { api.get_lesson_with_content(lesson_id).await }),
            )
            .await
    }

    pub async fn recommendations(&self, limit: Option<u32>) -> QueryResult<Vec<Lesson>> {
        self.queries
            .fetch_query(
                keys::with_limit(keys::recommendations(), limit),
                QueryOptions::stale_after(DEFAULT_STALE_TIME),
                self.authed(move |api| async move { api.get_personalized_recommendations(limit).await }),
            )
            .await
    }

    pub async fn user_stats(&self) -> QueryResult<UserStats> {
        self.queries
            .fetch_query(
                keys::user_stats(),
                QueryOptions::default(),
                self.authed(|api| async move { api.get_user_stats().await }),
            )
            .await
    }

    pub async fn achievements(&self) -> QueryResult<Vec<Achievement>> {
        self.queries
            .fetch_query(
                keys::achievements(),
                QueryOptions::default(),
                self.authed(|api| async move { api.get_user_achievements().await }),
            )
            .await
    }

    pub async fn dashboard(&self) -> QueryResult<DashboardData> {
        self.queries
            .fetch_query(
                keys::dashboard(),
                QueryOptions::stale_after(DASHBOARD_STALE_TIME),
                self.authed(|api| async move { api.get_dashboard_data().await }),
            )
            .await
    }

    // ===== Roadmaps =====

    pub async fn my_roadmap(&self) -> QueryResult<Option<UserRoadmapProgress>> {
        self.queries
            .fetch_query(
                keys::my_roadmap(),
                QueryOptions::stale_after(ROADMAP_STALE_TIME),
                self.authed(|api| async move { api.get_my_roadmap().await }),
            )
            .await
    }

    pub async fn roadmaps(&self) -> QueryResult<Vec<Roadmap>> {
        self.queries
            .fetch_query(
                keys::roadmaps(),
                QueryOptions::stale_after(ROADMAP_STALE_TIME),
                self.authed(|api| async move { api.get_all_roadmaps().await }),
            )
            .await
    }

    pub async fn roadmap_details(&self, roadmap_id: i64) -> QueryResult<RoadmapDetail> {
        self.queries
            .fetch_query(
                keys::roadmap_details(roadmap_id),
                QueryOptions::stale_after(ROADMAP_STALE_TIME).enabled(roadmap_id != 0),
                self.authed(move |api| async move { api.get_roadmap_details(roadmap_id).await }),
            )
            .await
    }

    // ===== Practice =====

    pub async fn practice_challenges(&self, filter: ChallengeFilter) -> QueryResult<Vec<PracticeChallenge>> {
        let key = keys::practice_challenges(&filter);
        self.queries
            .fetch_query(
                key,
                QueryOptions::default(),
                self.authed(move |api| {
                    let filter = filter.clone();
                    async move { api.get_practice_challenges(&filter).await }
                }),
            )
            .await
    }

    pub async fn practice_sessions(&self, limit: Option<u32>) -> QueryResult<Vec<PracticeSession>> {
        self.queries
            .fetch_query(
                keys::with_limit(keys::practice_sessions(), limit),
                QueryOptions::default(),
                self.authed(move |api| async move { api.get_practice_sessions(limit).await }),
            )
            .await
    }

    pub async fn practice_stats(&self) -> QueryResult<PracticeStats> {
        self.queries
            .fetch_query(
                keys::practice_stats(),
                QueryOptions::default(),
                self.authed(|api| async move { api.get_practice_stats().await }),
            )
            .await
    }

    pub async fn portfolio(&self) -> QueryResult<Vec<PortfolioItem>> {
        self.queries
            .fetch_query(
                keys::portfolio(),
                QueryOptions::default(),
                self.authed(|api| async move { api.get_portfolio().await }),
            )
            .await
    }

    pub async fn leaderboard(&self, challenge_id: i64, limit: Option<u32>) -> QueryResult<Vec<LeaderboardEntry>> {
        self.queries
            .fetch_query(
                keys::with_limit(keys::leaderboard(challenge_id), limit),
                QueryOptions::default().enabled(challenge_id != 0),
                self.authed(move |api| async move { api.get_challenge_leaderboard(challenge_id, limit).await }),
            )
            .await
    }

    // ===== Prefetch =====

    pub fn prefetch_categories(&self) {
        self.queries.prefetch_query(
            keys::categories(),
            QueryOptions::stale_after(CATEGORIES_STALE_TIME),
            self.authed(|api| async move { api.get_categories().await }),
        );
    }

    pub fn prefetch_lessons_by_category(&self, category_id: i64) {
        self.queries.prefetch_query(
            keys::lessons(category_id),
            QueryOptions::stale_after(LESSONS_STALE_TIME).enabled(category_id != 0),
            self.authed(move |api| async move { api.get_lessons_by_category(category_id).await }),
        );
    }

    pub fn prefetch_lesson_with_content(&self, lesson_id: i64) {
        self.queries.prefetch_query(
            keys::lesson(lesson_id),
            QueryOptions::stale_after(LESSON_STALE_TIME).enabled(lesson_id != 0),
            self.authed(move |api| async move { api.get_lesson_with_content(lesson_id).await }),
        );
    }

    // ===== Mutations =====

    fn invalidate_all(&self, affected: &[QueryKey]) {
        for key in affected {
            self.queries.invalidate_queries(key);
        }
    }

    /// Report the lesson as completed and return the category to navigate
    /// back to. Makes no request while any exercise is still open.
    pub async fn complete_lesson(&self, tracker: &LessonProgressTracker) -> std::result::Result<i64, LessonError> {
        let Some(request) = tracker.completion_request() else {
            return Err(LessonError::ExercisesIncomplete {
                remaining: tracker.remaining_exercises(),
            });
        };

        self.api().await.update_lesson_progress(&request).await?;
        info!(lesson_id = tracker.lesson_id(), "Lesson completed");

        self.invalidate_all(&[
            keys::lesson(tracker.lesson_id()),
            keys::lessons(tracker.category_id()),
            keys::categories(),
            keys::dashboard(),
            keys::my_roadmap(),
        ]);
        Ok(tracker.category_id())
    }

    /// Submit an exercise attempt for scoring and record the result.
    pub async fn submit_exercise(
        &self,
        tracker: &mut LessonProgressTracker,
        section_id: i64,
        prompt: &str,
    ) -> Result<SubmissionResult> {
        if prompt.trim().is_empty() {
            bail!("Nothing to submit: the prompt is empty");
        }
        let submission = ExerciseSubmission {
            lesson_id: tracker.lesson_id(),
            lesson_content_id: section_id,
            submitted_prompt: prompt.to_string(),
        };
        let result = self.api().await.submit_exercise(&submission).await?;

        if tracker.record_submission(section_id, &result) {
            debug!(section_id, score = result.score, "Exercise passed");
            self.queries
                .update_query_data::<LessonWithContent, _>(&keys::lesson(tracker.lesson_id()), |lesson| {
                    let mut lesson = lesson.clone();
                    for section in lesson.content_sections.iter_mut().filter(|s| s.id == section_id) {
                        section.is_completed = true;
                    }
                    lesson
                });
        }

        self.invalidate_all(&[keys::lesson(tracker.lesson_id()), keys::dashboard()]);
        Ok(result)
    }

    pub async fn submit_prompt(&self, submission: &PromptSubmission) -> Result<PracticeSession> {
        if submission.user_prompt.trim().is_empty() {
            bail!("Nothing to submit: the prompt is empty");
        }
        let session = self.api().await.submit_prompt(submission).await?;
        self.invalidate_all(&[
            keys::practice_sessions(),
            keys::practice_stats(),
            keys::leaderboard(submission.challenge_id),
            keys::dashboard(),
        ]);
        Ok(session)
    }

    pub async fn save_to_portfolio(&self, request: &SaveToPortfolioRequest) -> Result<PortfolioItem> {
        let item = self.api().await.save_to_portfolio(request).await?;
        self.invalidate_all(&[keys::portfolio(), keys::practice_stats()]);
        Ok(item)
    }

    pub async fn enroll_in_roadmap(&self, roadmap_id: i64) -> Result<()> {
        self.api().await.enroll_in_roadmap(roadmap_id).await?;
        self.invalidate_all(&[
            keys::my_roadmap(),
            keys::roadmap_details(roadmap_id),
            keys::dashboard(),
        ]);
        Ok(())
    }

    pub async fn toggle_bookmark(&self, lesson_id: i64) -> Result<()> {
        self.api().await.toggle_bookmark(lesson_id).await?;
        self.invalidate_all(&[keys::all_lessons(), keys::dashboard()]);
        Ok(())
    }
}

/// Profile pushes authenticated as the session's current identity.
#[async_trait]
impl ProfileSink for Resources {
    async fn push_profile(&self, profile: &ProfileSnapshot) -> Result<()> {
        self.api().await.push_profile(profile).await
    }
}
