// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardData {
    pub stats: DashboardStats,
    #[serde(default)]
    pub recent_activity: Vec<RecentActivity>,
    #[serde(default)]
    pub quick_actions: Vec<QuickAction>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub recommended_lessons: Vec<RecommendedLesson>,
    #[serde(default)]
    pub progress_overview: Vec<ProgressOverview>,
    #[serde(default)]
    pub learning_streak: LearningStreak,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStats {
    pub lessons_completed: i32,
    pub lessons_in_progress: i32,
    pub total_lessons: i32,
    pub categories_explored: i32,
    pub total_categories: i32,
    pub practice_sessions: i32,
    pub average_practice_score: f64,
    pub achievements_earned: i32,
    pub total_achievements: i32,
    pub current_learning_streak: i32,
    pub total_study_time_minutes: i32,
    pub bookmarked_lessons: i32,
}

impl DashboardStats {
    /// Percentage of all lessons completed, rounded down.
    pub fn completion_percentage(&self) -> i32 {
        if self.total_lessons <= 0 {
            return 0;
        }
        self.lessons_completed * 100 / self.total_lessons
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentActivity {
    pub id: i64,
    pub activity_type: String,
    pub title: String,
    pub description: String,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickAction {
    pub action_type: String,
    pub title: String,
    pub description: String,
    pub target_url: String,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub estimated_time: Option<i32>,
}

/// Achievement as reported by either the dashboard or the lessons service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub reward_points: i32,
    #[serde(default)]
    pub is_earned: Option<bool>,
    #[serde(default)]
    pub earned_at: Option<String>,
    #[serde(default)]
    pub progress_current: Option<i32>,
    #[serde(default)]
    pub progress_target: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedLesson {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_name: String,
    pub difficulty_level: String,
    pub estimated_duration: i32,
    pub reason: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    pub progress_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressOverview {
    pub category_id: i64,
    pub category_name: String,
    pub category_color: String,
    pub category_icon: String,
    pub total_lessons: i32,
    pub completed_lessons: i32,
    pub in_progress_lessons: i32,
    pub progress_percentage: f64,
    #[serde(default)]
    pub next_lesson_id: Option<i64>,
    #[serde(default)]
    pub next_lesson_title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningStreak {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub streak_goal: i32,
    pub last_activity_date: Option<String>,
    pub is_today_completed: bool,
    pub days_this_week: Vec<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub total_lessons_completed: i32,
    pub total_categories_explored: i32,
    pub current_streak: i32,
    pub total_points: i32,
    pub achievements_earned: i32,
    pub bookmarked_lessons: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
