use serde::{Deserialize, Serialize};

/// Purchase channel recorded when a review has no offline-store badge.
pub const ONLINE_PURCHASE_CHANNEL: &str = "온라인";

/// One review node as extracted from the review list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub user_id: Option<String>,
    /// Opaque reviewer token taken from the profile link handler
    pub user_code: Option<String>,
    pub user_skin_types: Vec<String>,
    pub user_tags: Vec<String>,
    pub brand_name: Option<String>,
    pub product_name: Option<String>,
    pub rating: Option<f32>,
    pub date: Option<String>,
    pub purchase_channel: String,
    pub item_option: Option<String>,
    /// Poll question to answer, in page order
    pub poll_answers: Vec<(String, String)>,
    pub review_text: Option<String>,
    pub recommend_count: Option<u32>,
}

impl Default for ReviewRecord {
    fn default() -> Self {
        Self {
            user_id: None,
            user_code: None,
            user_skin_types: Vec::new(),
            user_tags: Vec::new(),
            brand_name: None,
            product_name: None,
            rating: None,
            date: None,
            purchase_channel: ONLINE_PURCHASE_CHANNEL.to_string(),
            item_option: None,
            poll_answers: Vec::new(),
            review_text: None,
            recommend_count: None,
        }
    }
}

impl ReviewRecord {
    pub fn poll_answer(&self, question: &str) -> Option<&str> {
        self.poll_answers
            .iter()
            .find(|(q, _)| q == question)
            .map(|(_, a)| a.as_str())
    }
}
