//! Data models for the learning platform API.
//!
//! This module contains the payloads exchanged with the backend:
//!
//! - `Category`, `Lesson`, `LessonWithContent`: lesson browsing and content
//! - `SubmissionResult`, `LessonProgress`: exercise scoring and completion
//! - Practice types: `PracticeChallenge`, `PracticeSession`, `PortfolioItem`, etc.
//! - `DashboardData` and its parts
//! - Roadmap types: `Roadmap`, `RoadmapDetail`, `UserRoadmapProgress`

pub mod dashboard;
pub mod lesson;
pub mod practice;
pub mod roadmap;

pub use dashboard::{
    Achievement, DashboardData, DashboardStats, HealthResponse, LearningStreak,
    ProgressOverview, QuickAction, RecentActivity, RecommendedLesson, UserStats,
};
pub use lesson::{
    Category, ExerciseSubmission, Lesson, LessonContentSection, LessonProgress,
    LessonWithContent, ProgressStatus, SectionContent, SectionKind, SubmissionResult,
    UserEngagement, PASS_THRESHOLD,
};
pub use practice::{
    ChallengeFilter, LeaderboardEntry, PortfolioItem, PracticeChallenge, PracticeSession,
    PracticeStats, PromptSubmission, SaveToPortfolioRequest,
};
pub use roadmap::{Roadmap, RoadmapDetail, RoadmapItem, UserRoadmapProgress};
