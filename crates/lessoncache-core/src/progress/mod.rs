//! Lesson progress tracking.
//!
//! `LessonProgressTracker` is the local view of which sections of an open
//! lesson have been seen or passed. Only the final "complete lesson" action
//! reports progress to the server.

pub mod tracker;

pub use tracker::{LessonProgressTracker, ScrollRequest, SectionOutline, SectionVisibility};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LessonError {
    #[error("{remaining} practice exercise(s) still need a passing score")]
    ExercisesIncomplete { remaining: usize },

    #[error(transparent)]
    Api(#[from] anyhow::Error),
}
