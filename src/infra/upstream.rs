//! reqwest-backed client for the upstream blog posts API.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::application::source::{PostSource, UpstreamError};
use crate::config::UpstreamSettings;
use crate::domain::entities::{Post, PostList};
use crate::domain::types::{Direction, SortField};

use super::error::InfraError;

const POSTS_PATH: &str = "assessment/blog/posts";

#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
    endpoint: Url,
}

impl UpstreamClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| {
                InfraError::configuration(format!("failed to build upstream client: {err}"))
            })?;

        // A path prefix on the base survives the join only with a trailing slash.
        let mut base = settings.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(POSTS_PATH).map_err(|err| {
            InfraError::configuration(format!("invalid upstream posts endpoint: {err}"))
        })?;

        Ok(Self { client, endpoint })
    }

    pub fn user_agent() -> &'static str {
        concat!("tagfeed/", env!("CARGO_PKG_VERSION"))
    }

    /// URL for one tag; sort parameters are appended only when present.
    pub fn posts_url(
        &self,
        tag: &str,
        sort_by: Option<SortField>,
        direction: Option<Direction>,
    ) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("tag", tag);
            if let Some(sort_by) = sort_by {
                pairs.append_pair("sortBy", sort_by.as_str());
            }
            if let Some(direction) = direction {
                pairs.append_pair("direction", direction.as_str());
            }
        }
        url
    }

    async fn handle(tag: &str, response: Response) -> Result<Vec<Post>, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(tag, status = status.as_u16(), "upstream rejected posts request");
            return Err(UpstreamError::Status {
                tag: tag.to_string(),
                status: status.as_u16(),
                body: error_body(&text),
            });
        }

        let list: PostList = response
            .json()
            .await
            .map_err(|err| classify(tag, err))?;
        Ok(list.posts)
    }
}

#[async_trait]
impl PostSource for UpstreamClient {
    async fn fetch_tag(
        &self,
        tag: &str,
        sort_by: Option<SortField>,
        direction: Option<Direction>,
    ) -> Result<Vec<Post>, UpstreamError> {
        let url = self.posts_url(tag, sort_by, direction);
        debug!(tag, url = %url, "fetching posts from upstream");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| classify(tag, err))?;
        Self::handle(tag, response).await
    }
}

fn classify(tag: &str, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout {
            tag: tag.to_string(),
        }
    } else if err.is_decode() {
        UpstreamError::decode(tag, err)
    } else {
        UpstreamError::transport(tag, err)
    }
}

fn error_body(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| json!({ "error": trimmed })))
}
