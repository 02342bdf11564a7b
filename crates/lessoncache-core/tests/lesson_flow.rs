mod common;

use std::sync::Arc;

use futures::StreamExt;
use lessoncache_core::cache::keys;
use lessoncache_core::models::{Lesson, LessonWithContent, PromptSubmission};
use lessoncache_core::{ApiError, LessonError, LessonProgressTracker, SessionContext};

use common::{api_client, signed_in_store, spawn_backend};

async fn session() -> (SessionContext, Arc<common::Backend>, tempfile::TempDir) {
    let (addr, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = signed_in_store(dir.path(), "alice");
    (SessionContext::new(api_client(addr), store), backend, dir)
}

#[tokio::test]
async fn test_repeated_reads_hit_backend_once() {
    let (session, backend, _dir) = session().await;
    let resources = session.resources();

    let first = resources.categories().await.expect("categories");
    let second = resources.categories().await.expect("categories again");
    assert_eq!(first[0].name, "Foundations");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend.hits("categories"), 1);

    // Requests carry the signed-in user's token
    assert_eq!(backend.auth_headers(), vec!["Bearer token-alice".to_string()]);
}

#[tokio::test]
async fn test_prefetch_then_read_is_one_request() {
    let (session, backend, _dir) = session().await;
    let resources = session.resources();

    resources.prefetch_lessons_by_category(3);
    let lessons = resources.lessons_by_category(3).await.expect("lessons");
    assert_eq!(lessons.len(), 1);
    assert_eq!(backend.hits("lessons"), 1);
}

#[tokio::test]
async fn test_unknown_ids_are_disabled() {
    let (session, backend, _dir) = session().await;
    let result = session.resources().lesson_with_content(0).await;
    assert!(matches!(result, Err(lessoncache_core::QueryError::Disabled(_))));
    assert_eq!(backend.hits("lesson"), 0);
}

#[tokio::test]
async fn test_complete_lesson_after_both_exercises_pass() {
    let (session, backend, _dir) = session().await;
    let resources = session.resources();

    resources.lessons_by_category(3).await.expect("lessons");
    let lesson = resources.lesson_with_content(42).await.expect("lesson");
    let mut tracker = LessonProgressTracker::from_lesson(&lesson);

    // Both exercises open: no request is made
    let err = resources.complete_lesson(&tracker).await.expect_err("disabled");
    assert!(matches!(err, LessonError::ExercisesIncomplete { remaining: 2 }));
    assert_eq!(backend.hits("progress"), 0);

    let first = resources
        .submit_exercise(&mut tracker, 2, "a good prompt")
        .await
        .expect("submit 1");
    assert_eq!(first.score, 90);
    assert!(!tracker.can_complete_lesson());

    let failed = resources
        .submit_exercise(&mut tracker, 4, "meh")
        .await
        .expect("submit 2");
    assert!(!failed.is_passing());
    assert!(!tracker.can_complete_lesson());

    resources
        .submit_exercise(&mut tracker, 4, "another good prompt")
        .await
        .expect("submit 3");
    assert!(tracker.can_complete_lesson());

    let category = resources.complete_lesson(&tracker).await.expect("complete");
    assert_eq!(category, 3);
    assert_eq!(backend.hits("progress"), 1);
    let body = &backend.bodies("progress")[0];
    assert_eq!(body["lesson_id"], 42);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress_percentage"], 100);

    // Blast radius: the category's lesson list is stale and refetched in the background
    let queries = session.queries();
    assert!(queries.read::<Vec<Lesson>>(&keys::lessons(3)).is_stale);
    assert!(queries.read::<LessonWithContent>(&keys::lesson(42)).is_stale);
    resources.lessons_by_category(3).await.expect("stale lessons");
    assert!(backend.wait_for("lessons", 2).await);
}

#[tokio::test]
async fn test_passing_submission_updates_cached_lesson() {
    let (session, _backend, _dir) = session().await;
    let resources = session.resources();
    let lesson = resources.lesson_with_content(42).await.expect("lesson");
    let mut tracker = LessonProgressTracker::from_lesson(&lesson);

    resources
        .submit_exercise(&mut tracker, 2, "good")
        .await
        .expect("submit");
    let cached = session
        .queries()
        .get_query_data::<LessonWithContent>(&keys::lesson(42))
        .expect("cached lesson");
    let exercise = cached
        .content_sections
        .iter()
        .find(|s| s.id == 2)
        .expect("exercise");
    assert!(exercise.is_completed);
}

#[tokio::test]
async fn test_empty_prompt_is_not_sent() {
    let (session, backend, _dir) = session().await;
    let resources = session.resources();
    let lesson = resources.lesson_with_content(42).await.expect("lesson");
    let mut tracker = LessonProgressTracker::from_lesson(&lesson);

    assert!(resources.submit_exercise(&mut tracker, 2, "   ").await.is_err());
    assert_eq!(backend.hits("submit_exercise"), 0);
}

#[tokio::test]
async fn test_server_validation_message_is_surfaced() {
    let (session, backend, _dir) = session().await;
    let submission = PromptSubmission {
        challenge_id: 5,
        user_prompt: "hi".into(),
        session_duration_seconds: None,
    };
    let err = session
        .resources()
        .submit_prompt(&submission)
        .await
        .expect_err("422");
    assert!(matches!(
        ApiError::find(&err),
        Some(ApiError::Validation(message)) if message == "Prompt is too short to score"
    ));
    assert_eq!(backend.hits("practice_submit"), 1);
}

#[tokio::test]
async fn test_playground_stream_keeps_characters_whole() {
    let (session, backend, _dir) = session().await;
    let api = session.resources().api().await;
    let stream = api.run_prompt_playground("price?").await.expect("stream");
    let chunks: Vec<String> = stream.map(|chunk| chunk.expect("chunk")).collect().await;
    assert_eq!(chunks.concat(), "Cost: €5");
    assert!(chunks.iter().all(|c| !c.is_empty()));
    assert_eq!(backend.bodies("playground")[0]["prompt"], "price?");
}

#[tokio::test]
async fn test_health_check() {
    let (session, _backend, _dir) = session().await;
    let health = session.api().check_health().await.expect("health");
    assert_eq!(health.status, "healthy");
}
