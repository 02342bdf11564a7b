use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roadmap {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub estimated_duration_weeks: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapDetail {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub estimated_duration_weeks: Option<i32>,
    #[serde(default)]
    pub items: Vec<RoadmapItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapItem {
    pub id: i64,
    pub roadmap_id: i64,
    /// `"lesson"` or `"challenge"`; `item_id` points into that collection.
    pub item_type: String,
    pub item_id: i64,
    pub order_index: i32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoadmapProgress {
    pub roadmap: Roadmap,
    pub total_items: i32,
    pub completed_items: i32,
    #[serde(default)]
    pub current_item: Option<RoadmapItem>,
}

impl UserRoadmapProgress {
    pub fn progress_percentage(&self) -> i32 {
        if self.total_items <= 0 {
            return 0;
        }
        self.completed_items * 100 / self.total_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roadmap_progress() {
        let json = r#"{"roadmap": {"id": 1, "title": "Analyst track"}, "total_items": 8,
            "completed_items": 2, "current_item": {"id": 5, "roadmap_id": 1, "item_type": "lesson",
            "item_id": 42, "order_index": 2}}"#;
        let progress: UserRoadmapProgress = serde_json::from_str(json).expect("progress json");
        assert_eq!(progress.progress_percentage(), 25);
        assert_eq!(progress.current_item.map(|i| i.item_id), Some(42));
    }
}
