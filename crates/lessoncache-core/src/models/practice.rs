// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeChallenge {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub scenario_type: String,
    pub difficulty_level: String,
    pub context: String,
    pub target_outcome: String,
    #[serde(default)]
    pub template_prompt: Option<String>,
    #[serde(default)]
    pub scoring_criteria: serde_json::Map<String, serde_json::Value>,
    pub max_score: i32,
    #[serde(default)]
    pub time_limit_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChallengeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSubmission {
    pub challenge_id: i64,
    pub user_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration_seconds: Option<i32>,
}

/// A scored practice attempt, as returned by the scoring backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: i64,
    pub challenge_id: i64,
    #[serde(default)]
    pub challenge_title: String,
    pub user_prompt: String,
    #[serde(default)]
    pub feedback: String,
    pub total_score: i32,
    pub max_score: i32,
    #[serde(default)]
    pub scoring_breakdown: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
    pub submitted_at: String,
}

impl PracticeSession {
    pub fn score_display(&self) -> String {
        format!("{}/{}", self.total_score, self.max_score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioItem {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub prompt_text: String,
    #[serde(default)]
    pub ai_response: Option<String>,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveToPortfolioRequest {
    pub session_id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeStats {
    pub total_sessions: i32,
    pub average_score: f64,
    pub best_score: i32,
    pub total_practice_time_minutes: i32,
    pub current_streak_days: i32,
    pub challenges_completed: i32,
    pub prompts_saved: i32,
    #[serde(default)]
    pub last_practice_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub challenge_id: i64,
    pub challenge_title: String,
    pub score: i32,
    pub rank_position: i32,
    pub achieved_at: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

impl LeaderboardEntry {
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("Anonymous")
    }
}
