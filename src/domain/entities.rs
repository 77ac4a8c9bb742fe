//! Records returned by the upstream blog API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::types::SortField;

/// A blog post as served by the upstream collaborator.
///
/// Only `id` is mandatory. Counters keep the upstream's numeric
/// representation, display fields are optional, and unknown fields are kept
/// in `extra`, so responses pass records through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reads: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// Numeric value of `field`, widened to `f64` for ordering.
    ///
    /// `None` when the upstream left the field out.
    pub fn sort_value(&self, field: SortField) -> Option<f64> {
        let number = match field {
            SortField::Id => return Some(self.id as f64),
            SortField::Reads => self.reads.as_ref(),
            SortField::Likes => self.likes.as_ref(),
            SortField::Popularity => self.popularity.as_ref(),
        };
        number.and_then(Number::as_f64)
    }
}

/// Envelope shared by the upstream API and our `/api/posts` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostList {
    pub posts: Vec<Post>,
}
