use std::fmt;

/// One component of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Name(String),
    Id(i64),
}

impl From<&str> for KeySegment {
    fn from(name: &str) -> Self {
        KeySegment::Name(name.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(name: String) -> Self {
        KeySegment::Name(name)
    }
}

impl From<i64> for KeySegment {
    fn from(id: i64) -> Self {
        KeySegment::Id(id)
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Name(name) => f.write_str(name),
            KeySegment::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Structured cache key, e.g. `["lessons", 3]`.
///
/// Keys form families by prefix: `["lessons"]` matches every
/// `["lessons", id]` entry, so one invalidation can clear a whole family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    pub fn new(kind: impl Into<KeySegment>) -> Self {
        Self(vec![kind.into()])
    }

    /// The empty key; a prefix of every key.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// Whether `prefix` names this key or a family containing it.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}

/// Constructors for every key the resource layer uses.
pub mod keys {
    use super::QueryKey;
    use crate::models::ChallengeFilter;

    pub fn categories() -> QueryKey {
        QueryKey::new("categories")
    }

    /// Family prefix for every category's lesson list.
    pub fn all_lessons() -> QueryKey {
        QueryKey::new("lessons")
    }

    pub fn lessons(category_id: i64) -> QueryKey {
        all_lessons().with(category_id)
    }

    pub fn all_lesson_content() -> QueryKey {
        QueryKey::new("lesson")
    }

    pub fn lesson(lesson_id: i64) -> QueryKey {
        all_lesson_content().with(lesson_id)
    }

    pub fn recommendations() -> QueryKey {
        QueryKey::new("recommendations")
    }

    /// `family` narrowed to one page size. No limit keeps the family key.
    pub fn with_limit(family: QueryKey, limit: Option<u32>) -> QueryKey {
        match limit {
            Some(limit) => family.with(format!("limit={}", limit)),
            None => family,
        }
    }

    pub fn dashboard() -> QueryKey {
        QueryKey::new("dashboard")
    }

    /// The signed-in user's enrolled roadmap.
    pub fn my_roadmap() -> QueryKey {
        QueryKey::new("roadmap")
    }

    pub fn roadmaps() -> QueryKey {
        QueryKey::new("roadmaps")
    }

    pub fn roadmap_details(roadmap_id: i64) -> QueryKey {
        roadmaps().with(roadmap_id)
    }

    pub fn practice() -> QueryKey {
        QueryKey::new("practice")
    }

    pub fn practice_challenges(filter: &ChallengeFilter) -> QueryKey {
        let mut key = practice().with("challenges");
        if let Some(ref difficulty) = filter.difficulty {
            key = key.with(format!("difficulty={}", difficulty));
        }
        if let Some(ref scenario) = filter.scenario_type {
            key = key.with(format!("scenario={}", scenario));
        }
        key
    }

    pub fn practice_sessions() -> QueryKey {
        practice().with("sessions")
    }

    pub fn practice_stats() -> QueryKey {
        practice().with("stats")
    }

    pub fn leaderboard(challenge_id: i64) -> QueryKey {
        practice().with("leaderboard").with(challenge_id)
    }

    pub fn portfolio() -> QueryKey {
        QueryKey::new("portfolio")
    }

    pub fn user_stats() -> QueryKey {
        QueryKey::new("user-stats")
    }

    pub fn achievements() -> QueryKey {
        QueryKey::new("achievements")
    }

    /// Families whose contents depend on who is signed in.
    pub fn user_scoped() -> Vec<QueryKey> {
        vec![
            dashboard(),
            portfolio(),
            my_roadmap(),
            practice(),
            user_stats(),
            achievements(),
            recommendations(),
            all_lessons(),
            all_lesson_content(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChallengeFilter;

    #[test]
    fn test_page_size_is_part_of_the_key() {
        let five = keys::with_limit(keys::practice_sessions(), Some(5));
        let fifty = keys::with_limit(keys::practice_sessions(), Some(50));
        assert_ne!(five, fifty);
        assert!(five.starts_with(&keys::practice_sessions()));
        assert!(fifty.starts_with(&keys::practice()));
        assert_eq!(keys::with_limit(keys::recommendations(), None), keys::recommendations());
        assert_eq!(
            keys::with_limit(keys::leaderboard(7), Some(10)).to_string(),
            "practice/leaderboard/7/limit=10"
        );
    }

    #[test]
    fn test_prefix_matching_is_per_segment() {
        assert!(keys::lessons(3).starts_with(&keys::all_lessons()));
        assert!(keys::lessons(3).starts_with(&keys::lessons(3)));
        assert!(!keys::lessons(3).starts_with(&keys::lessons(4)));
        // "roadmap" is not a prefix of "roadmaps"
        assert!(!keys::roadmaps().starts_with(&keys::my_roadmap()));
        assert!(!keys::all_lessons().starts_with(&keys::lessons(3)));
        assert!(keys::dashboard().starts_with(&QueryKey::root()));
    }

    #[test]
    fn test_display() {
        assert_eq!(keys::leaderboard(7).to_string(), "practice/leaderboard/7");
    }

    #[test]
    fn test_challenge_filter_segments() {
        let filter = ChallengeFilter {
            difficulty: Some("easy".into()),
            scenario_type: None,
        };
        let key = keys::practice_challenges(&filter);
        assert_eq!(key.to_string(), "practice/challenges/difficulty=easy");
        assert!(key.starts_with(&keys::practice()));
    }
}
