//! API client for communicating with the learning platform REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! API requests for lessons, practice challenges, portfolio, roadmaps and
//! the dashboard, plus the streaming prompt playground.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::Stream;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::{ProfileSink, ProfileSnapshot};
use crate::models::{
    Achievement, Category, ChallengeFilter, DashboardData, ExerciseSubmission, HealthResponse,
    LeaderboardEntry, Lesson, LessonProgress, LessonWithContent, PortfolioItem,
    PracticeChallenge, PracticeSession, PracticeStats, PromptSubmission, Roadmap, RoadmapDetail,
    SaveToPortfolioRequest, SubmissionResult, UserEngagement, UserRoadmapProgress, UserStats,
};

use super::stream::decode_text_stream;
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Prefix under which every application endpoint is mounted.
const ROUTES_PREFIX: &str = "/routes";

/// HTTP request timeout in seconds.
/// Scoring endpoints call an LLM, so this is longer than a plain CRUD read needs.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Default page size for leaderboards.
const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

/// API client for the learning platform.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `http://localhost:8000`)
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    /// An empty token yields an unauthenticated client.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: Arc::clone(&self.base_url),
            token: (!token.is_empty()).then(|| Arc::from(token)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, ROUTES_PREFIX, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request built by `build`, retrying with exponential backoff while
    /// the server answers 429.
    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> Result<reqwest::RequestBuilder>,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build()?
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
        let text = response
            .text()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to read response body from {}", url))?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || Ok(self.client.get(&url).headers(self.auth_headers()?)))
            .await?;
        Self::decode(response, &url).await
    }

    async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || {
                Ok(self.client.get(&url).headers(self.auth_headers()?).query(query))
            })
            .await?;
        Self::decode(response, &url).await
    }

    async fn send_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(String, reqwest::Response)> {
        let url = self.url(path);
        let response = self
            .send_with_retry(&url, || {
                Ok(self.client.post(&url).headers(self.auth_headers()?).json(body))
            })
            .await?;
        Ok((url, response))
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let (url, response) = self.send_json(path, body).await?;
        Self::decode(response, &url).await
    }

    /// POST whose response body is irrelevant (`any` in the API contract).
    async fn post_ignore<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send_json(path, body).await?;
        Ok(())
    }

    // ===== Health =====

    /// Check health of the backend. Lives outside `/routes`.
    pub async fn check_health(&self) -> Result<HealthResponse> {
        let url = format!("{}/_healthz", self.base_url);
        let response = self
            .send_with_retry(&url, || Ok(self.client.get(&url)))
            .await?;
        Self::decode(response, &url).await
    }

    // ===== Lessons =====

    pub async fn get_categories(&self) -> Result<Vec<Category>> {
        self.get("/lessons/categories").await
    }

    pub async fn get_lessons_by_category(&self, category_id: i64) -> Result<Vec<Lesson>> {
        self.get(&format!("/lessons/categories/{}/lessons", category_id))
            .await
    }

    pub async fn get_personalized_recommendations(&self, limit: Option<u32>) -> Result<Vec<Lesson>> {
        self.get_with_query("/lessons/recommendations", &limit_query(limit))
            .await
    }

    pub async fn get_user_achievements(&self) -> Result<Vec<Achievement>> {
        self.get("/lessons/achievements").await
    }

    pub async fn get_user_stats(&self) -> Result<UserStats> {
        self.get("/lessons/stats").await
    }

    pub async fn track_engagement(&self, engagement: &UserEngagement) -> Result<()> {
        self.post_ignore("/lessons/engagement", engagement).await
    }

    pub async fn update_lesson_progress(&self, progress: &LessonProgress) -> Result<()> {
        debug!(lesson_id = progress.lesson_id, status = ?progress.status, "Updating lesson progress");
        self.post_ignore("/lessons/progress", progress).await
    }

    pub async fn toggle_bookmark(&self, lesson_id: i64) -> Result<()> {
        self.post_ignore(&format!("/lessons/bookmark/{}", lesson_id), &())
            .await
    }

    // ===== Lesson Content =====

    pub async fn get_lesson_with_content(&self, lesson_id: i64) -> Result<LessonWithContent> {
        self.get(&format!("/lesson-content/lessons/{}", lesson_id))
            .await
    }

    pub async fn submit_exercise(&self, submission: &ExerciseSubmission) -> Result<SubmissionResult> {
        self.post("/lesson-content/exercises/submit", submission)
            .await
    }

    pub async fn get_user_submissions(&self, exercise_id: i64) -> Result<Vec<SubmissionResult>> {
        self.get(&format!("/lesson-content/exercises/{}/submissions", exercise_id))
            .await
    }

    // ===== Dashboard =====

    pub async fn get_dashboard_data(&self) -> Result<DashboardData> {
        self.get("/dashboard/").await
    }

    // ===== Playground =====

    /// Stream a free-form completion token by token.
    pub async fn run_prompt_playground(
        &self,
        prompt: &str,
    ) -> Result<impl Stream<Item = Result<String>>> {
        let body = serde_json::json!({ "prompt": prompt });
        let (_, response) = self.send_json("/playground", &body).await?;
        Ok(decode_text_stream(Box::pin(response.bytes_stream())))
    }

    // ===== Practice =====

    pub async fn get_practice_challenges(&self, filter: &ChallengeFilter) -> Result<Vec<PracticeChallenge>> {
        self.get_with_query("/practice/challenges", filter).await
    }

    /// Submit a prompt for AI scoring. Costly: the backend calls the model.
    pub async fn submit_prompt(&self, submission: &PromptSubmission) -> Result<PracticeSession> {
        self.post("/practice/submit", submission).await
    }

    pub async fn get_practice_sessions(&self, limit: Option<u32>) -> Result<Vec<PracticeSession>> {
        self.get_with_query("/practice/sessions", &limit_query(limit))
            .await
    }

    pub async fn get_portfolio(&self) -> Result<Vec<PortfolioItem>> {
        self.get("/practice/portfolio").await
    }

    pub async fn save_to_portfolio(&self, request: &SaveToPortfolioRequest) -> Result<PortfolioItem> {
        self.post("/practice/portfolio", request).await
    }

    pub async fn get_practice_stats(&self) -> Result<PracticeStats> {
        self.get("/practice/stats").await
    }

    pub async fn get_challenge_leaderboard(
        &self,
        challenge_id: i64,
        limit: Option<u32>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
        self.get_with_query(
            &format!("/practice/leaderboard/{}", challenge_id),
            &limit_query(Some(limit)),
        )
        .await
    }

    /// Push the denormalized profile snapshot to the backend.
    pub async fn update_profile(&self, profile: &ProfileSnapshot) -> Result<()> {
        self.post_ignore("/practice/profile", profile).await
    }

    // ===== Roadmaps =====

    pub async fn get_all_roadmaps(&self) -> Result<Vec<Roadmap>> {
        self.get("/roadmaps/").await
    }

    /// The caller's enrolled roadmap, `None` when not enrolled.
    pub async fn get_my_roadmap(&self) -> Result<Option<UserRoadmapProgress>> {
        self.get("/roadmaps/my-roadmap").await
    }

    pub async fn get_roadmap_details(&self, roadmap_id: i64) -> Result<RoadmapDetail> {
        self.get(&format!("/roadmaps/{}", roadmap_id)).await
    }

    pub async fn enroll_in_roadmap(&self, roadmap_id: i64) -> Result<()> {
        self.post_ignore(&format!("/roadmaps/{}/enroll", roadmap_id), &())
            .await
    }
}

/// Optional `limit` query parameter; omitted entirely when `None`.
fn limit_query(limit: Option<u32>) -> Vec<(&'static str, u32)> {
    limit.map(|l| ("limit", l)).into_iter().collect()
}

#[async_trait]
impl ProfileSink for ApiClient {
    async fn push_profile(&self, profile: &ProfileSnapshot) -> Result<()> {
        self.update_profile(profile).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_routes_prefix() {
        let api = ApiClient::new("http://localhost:8000/").expect("client");
        assert_eq!(
            api.url("/lessons/categories"),
            "http://localhost:8000/routes/lessons/categories"
        );
    }

    #[test]
    fn test_with_token_shares_base_and_sets_auth() {
        let api = ApiClient::new("https://example.test/api").expect("client");
        assert!(!api.is_authenticated());

        let authed = api.with_token("abc123");
        assert!(authed.is_authenticated());
        assert_eq!(authed.base_url(), "https://example.test/api");

        let headers = authed.auth_headers().expect("headers");
        assert_eq!(
            headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc123")
        );
    }

    #[test]
    fn test_limit_query_omitted_when_none() {
        assert!(limit_query(None).is_empty());
        assert_eq!(limit_query(Some(5)), vec![("limit", 5)]);
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let api = ApiClient::new("http://localhost:8000").expect("client");
        let anon = api.with_token("");
        assert!(!anon.is_authenticated());
        assert!(anon.auth_headers().expect("headers").is_empty());
    }
}
