use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::Role;

/// One party's evaluation of the other for one completed booking. At most
/// one review per (booking_id, author_id); never deleted. Unpublished
/// reviews are visible to (and editable by) their author only; a published
/// review is visible to everyone and permanently immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub author_id: String,
    pub author_role: Role,
    pub target_id: String,
    pub rating: i32,
    pub category_ratings: Option<BTreeMap<String, i32>>,
    pub content: String,
    pub published: bool,
    pub pair_complete: bool,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Review {
    pub fn new(
        booking_id: String,
        author_id: String,
        author_role: Role,
        target_id: String,
        rating: i32,
        category_ratings: Option<BTreeMap<String, i32>>,
        content: String,
        now: NaiveDateTime,
    ) -> Self {
        Review {
            id: uuid::Uuid::new_v4().to_string(),
            booking_id,
            author_id,
            author_role,
            target_id,
            rating,
            category_ratings,
            content,
            published: false,
            pair_complete: false,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Double-blind visibility rule: the author always sees their own
    /// review; everyone else sees it only once published.
    pub fn visible_to(&self, viewer_id: &str) -> bool {
        self.published || viewer_id == self.author_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Review {
        Review::new(
            "bk-1".to_string(),
            "client-1".to_string(),
            Role::Client,
            "host-1".to_string(),
            5,
            None,
            "Great work".to_string(),
            Utc::now().naive_utc(),
        )
    }

    #[test]
    fn test_unpublished_visible_to_author_only() {
        let review = sample();
        assert!(!review.published);
        assert!(review.visible_to("client-1"));
        assert!(!review.visible_to("host-1"));
        assert!(!review.visible_to("stranger"));
    }

    #[test]
    fn test_published_visible_to_everyone() {
        let mut review = sample();
        review.published = true;
        assert!(review.visible_to("client-1"));
        assert!(review.visible_to("host-1"));
        assert!(review.visible_to("stranger"));
    }
}
