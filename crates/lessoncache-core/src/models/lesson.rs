//! Categories, lessons, lesson content sections and exercise submissions.

use serde::{Deserialize, Serialize};

/// Score at or above which an exercise submission counts as passed.
pub const PASS_THRESHOLD: i32 = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub difficulty_level: String,
    pub order_index: i32,
    #[serde(default)]
    pub lesson_count: Option<i32>,
    #[serde(default)]
    pub completed_lessons: Option<i32>,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub difficulty_level: String,
    pub estimated_duration: i32,
    #[serde(default)]
    pub preview_content: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub workplace_scenario: String,
    pub order_index: i32,
    #[serde(default)]
    pub is_bookmarked: Option<bool>,
    #[serde(default)]
    pub progress_status: Option<String>,
    #[serde(default)]
    pub progress_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonWithContent {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub difficulty_level: String,
    pub estimated_duration: i32,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub workplace_scenario: String,
    #[serde(default)]
    pub progress_status: String,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub content_sections: Vec<LessonContentSection>,
}

impl LessonWithContent {
    pub fn practice_exercises(&self) -> impl Iterator<Item = &LessonContentSection> {
        self.content_sections.iter().filter(|s| s.kind().is_exercise())
    }
}

/// Section body: markdown/code text for most sections, a structured object
/// (`{"scenario": ...}`) for practice exercises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionContent {
    Text(String),
    Structured(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContentSection {
    pub id: i64,
    pub section_type: String,
    pub order_index: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<SectionContent>,
    #[serde(default)]
    pub is_completed: bool,
}

/// How a section is presented and how it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Introduction,
    WorkplaceScenario,
    Conclusion,
    Content,
    Code,
    Video,
    PracticeExercise,
    Other,
}

impl SectionKind {
    pub fn from_type(section_type: &str) -> Self {
        match section_type {
            "introduction" => SectionKind::Introduction,
            "workplace_scenario" => SectionKind::WorkplaceScenario,
            "conclusion" => SectionKind::Conclusion,
            "content_block" | "content" | "example" => SectionKind::Content,
            "code_block" => SectionKind::Code,
            "video" => SectionKind::Video,
            "practice_exercise" => SectionKind::PracticeExercise,
            _ => SectionKind::Other,
        }
    }

    /// Exercise sections complete on a passing submission, not on visibility.
    pub fn is_exercise(&self) -> bool {
        matches!(self, SectionKind::PracticeExercise)
    }
}

impl LessonContentSection {
    pub fn kind(&self) -> SectionKind {
        SectionKind::from_type(&self.section_type)
    }

    /// Scenario text of a practice exercise. `None` for malformed exercises
    /// and for every other section type.
    pub fn exercise_scenario(&self) -> Option<&str> {
        if !self.kind().is_exercise() {
            return None;
        }
        match &self.content {
            Some(SectionContent::Structured(map)) => map.get("scenario").and_then(|v| v.as_str()),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(SectionContent::Text(text)) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub lesson_id: i64,
    pub status: ProgressStatus,
    pub progress_percentage: i32,
}

impl LessonProgress {
    pub fn completed(lesson_id: i64) -> Self {
        Self {
            lesson_id,
            status: ProgressStatus::Completed,
            progress_percentage: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseSubmission {
    pub lesson_id: i64,
    pub lesson_content_id: i64,
    pub submitted_prompt: String,
}

/// Server-scored exercise result. Never recomputed locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub id: i64,
    pub score: i32,
    pub feedback: String,
}

impl SubmissionResult {
    pub fn is_passing(&self) -> bool {
        self.score >= PASS_THRESHOLD
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEngagement {
    pub lesson_id: i64,
    pub engagement_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LESSON_JSON: &str = r#"{
        "id": 7,
        "title": "Prompt structure",
        "description": "Roles, context and constraints",
        "category_id": 2,
        "difficulty_level": "beginner",
        "estimated_duration": 15,
        "learning_objectives": ["Write a role"],
        "workplace_scenario": "Drafting an email",
        "progress_status": "in_progress",
        "progress_percentage": 40,
        "content_sections": [
            {"id": 1, "section_type": "introduction", "order_index": 0, "title": "Intro", "content": "Welcome", "is_completed": true},
            {"id": 2, "section_type": "practice_exercise", "order_index": 1, "title": "Try it", "content": {"scenario": "Ask for a summary"}},
            {"id": 3, "section_type": "code_block", "order_index": 2, "content": null}
        ]
    }"#;

    #[test]
    fn test_parse_lesson_with_content() {
        let lesson: LessonWithContent = serde_json::from_str(LESSON_JSON).expect("lesson json");
        assert_eq!(lesson.content_sections.len(), 3);
        assert!(lesson.content_sections[0].is_completed);
        assert!(!lesson.content_sections[1].is_completed);
        assert_eq!(lesson.content_sections[0].text(), Some("Welcome"));
        assert_eq!(
            lesson.content_sections[1].exercise_scenario(),
            Some("Ask for a summary")
        );
        assert_eq!(lesson.practice_exercises().count(), 1);
    }

    #[test]
    fn test_section_kind_classification() {
        assert_eq!(SectionKind::from_type("example"), SectionKind::Content);
        assert_eq!(SectionKind::from_type("code_block"), SectionKind::Code);
        assert_eq!(SectionKind::from_type("quiz"), SectionKind::Other);
        assert!(SectionKind::from_type("practice_exercise").is_exercise());
    }

    #[test]
    fn test_malformed_exercise_has_no_scenario() {
        let section = LessonContentSection {
            id: 9,
            section_type: "practice_exercise".to_string(),
            order_index: 0,
            title: None,
            content: Some(SectionContent::Text("not an object".to_string())),
            is_completed: false,
        };
        assert_eq!(section.exercise_scenario(), None);
    }

    #[test]
    fn test_pass_threshold() {
        let mut result = SubmissionResult {
            id: 1,
            score: 79,
            feedback: String::new(),
        };
        assert!(!result.is_passing());
        result.score = 80;
        assert!(result.is_passing());
    }

    #[test]
    fn test_completed_progress_serializes_snake_case() {
        let json = serde_json::to_value(LessonProgress::completed(4)).expect("serialize");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["progress_percentage"], 100);
    }
}
