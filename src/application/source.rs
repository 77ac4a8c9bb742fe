//! Port describing where posts come from.

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::entities::Post;
use crate::domain::types::{Direction, SortField};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request for tag `{tag}` timed out")]
    Timeout { tag: String },
    #[error("upstream request for tag `{tag}` failed: {message}")]
    Transport { tag: String, message: String },
    #[error("upstream returned status {status} for tag `{tag}`")]
    Status {
        tag: String,
        status: u16,
        body: Option<Value>,
    },
    #[error("upstream response for tag `{tag}` could not be decoded: {message}")]
    Decode { tag: String, message: String },
}

impl UpstreamError {
    pub fn transport(tag: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            tag: tag.to_string(),
            message: err.to_string(),
        }
    }

    pub fn decode(tag: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            tag: tag.to_string(),
            message: err.to_string(),
        }
    }

    /// Body forwarded to the client when this failure aborts a search.
    ///
    /// The upstream's own error body is passed through when there is one.
    pub fn payload(&self) -> Value {
        match self {
            UpstreamError::Status {
                body: Some(body), ..
            } => body.clone(),
            other => json!({ "error": other.to_string() }),
        }
    }
}

/// Fetches the posts tagged with a single tag.
///
/// `sort_by` and `direction` are forwarded only when the client supplied them.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_tag(
        &self,
        tag: &str,
        sort_by: Option<SortField>,
        direction: Option<Direction>,
    ) -> Result<Vec<Post>, UpstreamError>;
}
