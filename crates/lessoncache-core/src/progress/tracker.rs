use tracing::debug;

use crate::models::{LessonProgress, LessonWithContent, SectionKind, SubmissionResult};

/// Where a section currently sits relative to the viewport, in the same
/// units as the viewport height (top of viewport = 0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionVisibility {
    pub section_id: i64,
    pub top: f64,
    pub bottom: f64,
}

impl SectionVisibility {
    /// Whether the section spans the viewport's vertical midpoint.
    pub fn crosses_midpoint(&self, viewport_height: f64) -> bool {
        let mid = viewport_height / 2.0;
        self.top <= mid && mid < self.bottom
    }
}

/// Request to bring a section's top edge into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub section_id: i64,
    pub index: usize,
}

/// Table-of-contents row for a section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionOutline {
    pub id: i64,
    pub title: String,
    pub kind: SectionKind,
    pub completed: bool,
    pub current: bool,
}

#[derive(Debug, Clone)]
struct SectionState {
    id: i64,
    title: Option<String>,
    kind: SectionKind,
    completed: bool,
}

/// Local completion state for one open lesson.
///
/// Content sections complete when they cross the middle of the viewport;
/// practice exercises complete only on a passing submission. Completion
/// never reverts.
#[derive(Debug, Clone)]
pub struct LessonProgressTracker {
    lesson_id: i64,
    category_id: i64,
    sections: Vec<SectionState>,
    current: Option<i64>,
}

impl LessonProgressTracker {
    pub fn from_lesson(lesson: &LessonWithContent) -> Self {
        let mut ordered: Vec<_> = lesson.content_sections.iter().collect();
        ordered.sort_by_key(|section| section.order_index);

        let sections: Vec<SectionState> = ordered
            .into_iter()
            .map(|section| SectionState {
                id: section.id,
                title: section.title.clone(),
                kind: section.kind(),
                completed: section.is_completed,
            })
            .collect();
        let current = sections.first().map(|s| s.id);

        Self {
            lesson_id: lesson.id,
            category_id: lesson.category_id,
            sections,
            current,
        }
    }

    pub fn lesson_id(&self) -> i64 {
        self.lesson_id
    }

    pub fn category_id(&self) -> i64 {
        self.category_id
    }

    /// Apply a batch of visibility observations. Returns the sections that
    /// became complete as a result.
    pub fn on_visibility(&mut self, entries: &[SectionVisibility], viewport_height: f64) -> Vec<i64> {
        let mut newly_completed = Vec::new();
        for entry in entries.iter().filter(|e| e.crosses_midpoint(viewport_height)) {
            let Some(section) = self.sections.iter_mut().find(|s| s.id == entry.section_id) else {
                continue;
            };
            self.current = Some(section.id);
            if !section.kind.is_exercise() && !section.completed {
                section.completed = true;
                newly_completed.push(section.id);
            }
        }
        newly_completed
    }

    /// Record a scored exercise submission. Returns true when it completed
    /// the exercise.
    pub fn record_submission(&mut self, section_id: i64, result: &SubmissionResult) -> bool {
        let Some(section) = self.sections.iter_mut().find(|s| s.id == section_id) else {
            debug!(lesson_id = self.lesson_id, section_id, "Submission for unknown section");
            return false;
        };
        if !section.kind.is_exercise() {
            debug!(section_id, "Submission for a non-exercise section ignored");
            return false;
        }
        if section.completed || !result.is_passing() {
            return false;
        }
        section.completed = true;
        true
    }

    pub fn navigate_to(&self, section_id: i64) -> Option<ScrollRequest> {
        self.sections
            .iter()
            .position(|s| s.id == section_id)
            .map(|index| ScrollRequest { section_id, index })
    }

    pub fn current_section(&self) -> Option<i64> {
        self.current
    }

    pub fn is_completed(&self, section_id: i64) -> bool {
        self.sections
            .iter()
            .any(|s| s.id == section_id && s.completed)
    }

    pub fn remaining_exercises(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.kind.is_exercise() && !s.completed)
            .count()
    }

    /// "Mark lesson complete" is available once every exercise has passed.
    pub fn can_complete_lesson(&self) -> bool {
        self.remaining_exercises() == 0
    }

    pub fn progress_percentage(&self) -> u8 {
        if self.sections.is_empty() {
            return 0;
        }
        let done = self.sections.iter().filter(|s| s.completed).count();
        (done * 100 / self.sections.len()) as u8
    }

    /// The progress write for "mark lesson complete", or `None` while an
    /// exercise is still open.
    pub fn completion_request(&self) -> Option<LessonProgress> {
        self.can_complete_lesson()
            .then(|| LessonProgress::completed(self.lesson_id))
    }

    pub fn outline(&self) -> Vec<SectionOutline> {
        self.sections
            .iter()
            .map(|s| SectionOutline {
                id: s.id,
                title: s.title.clone().unwrap_or_else(|| "Section".to_string()),
                kind: s.kind,
                completed: s.completed,
                current: self.current == Some(s.id),
            })
            .collect()
    }
}
