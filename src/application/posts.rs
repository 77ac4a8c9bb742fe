//! Tag search: validate, consult the cache, fan out per tag, merge, store.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use futures::{StreamExt, TryStreamExt, stream};
use metrics::histogram;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::cache::PostCache;
use crate::domain::entities::Post;
use crate::domain::error::QueryError;
use crate::domain::merge::merge_posts;
use crate::domain::query::{PostQuery, RawPostQuery};

use super::source::{PostSource, UpstreamError};

pub const METRIC_UPSTREAM_FETCH_MS: &str = "tagfeed_upstream_fetch_ms";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Where a search result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub signature: String,
    pub cache: CacheStatus,
    pub posts: Vec<Post>,
}

pub struct PostSearchService {
    source: Arc<dyn PostSource>,
    cache: Arc<PostCache>,
    max_concurrency: NonZeroUsize,
}

impl PostSearchService {
    pub fn new(
        source: Arc<dyn PostSource>,
        cache: Arc<PostCache>,
        max_concurrency: NonZeroUsize,
    ) -> Self {
        Self {
            source,
            cache,
            max_concurrency,
        }
    }

    /// Run a search for the raw client parameters.
    ///
    /// A cached result for the same signature is returned as is. Otherwise
    /// every tag is fetched and the first upstream failure aborts the whole
    /// search without caching anything.
    #[instrument(skip(self), fields(signature = %raw.signature()))]
    pub async fn search(&self, raw: &RawPostQuery) -> Result<SearchOutcome, SearchError> {
        let query = PostQuery::parse(raw)?;

        if let Some(posts) = self.cache.lookup(&query.signature) {
            debug!(count = posts.len(), "serving cached search result");
            return Ok(SearchOutcome {
                signature: query.signature,
                cache: CacheStatus::Hit,
                posts,
            });
        }

        let batches = self.fetch_all(&query).await?;
        let posts = merge_posts(batches, query.sort_by, query.effective_direction());

        info!(
            tags = query.tags.len(),
            count = posts.len(),
            "merged upstream search result"
        );
        self.cache.store(query.signature.clone(), posts.clone());
        Ok(SearchOutcome {
            signature: query.signature,
            cache: CacheStatus::Miss,
            posts,
        })
    }

    async fn fetch_all(&self, query: &PostQuery) -> Result<Vec<Vec<Post>>, UpstreamError> {
        let started_at = Instant::now();

        let (sort_by, direction) = (query.sort_by, query.direction);

        // `buffered` keeps tag order so dedup sees batches in call order.
        let result = stream::iter(query.tags.iter().cloned())
            .map(|tag| {
                let source = Arc::clone(&self.source);
                async move { source.fetch_tag(&tag, sort_by, direction).await }
            })
            .buffered(self.max_concurrency.get())
            .try_collect::<Vec<_>>()
            .await;

        histogram!(METRIC_UPSTREAM_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::cache::CacheConfig;
    use crate::domain::types::{Direction, SortField};

    type Call = (String, Option<SortField>, Option<Direction>);

    #[derive(Default)]
    struct FakeSource {
        responses: Mutex<HashMap<String, Result<Vec<Post>, u16>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeSource {
        fn respond(&self, tag: &str, response: Result<Vec<Post>, u16>) {
            self.responses
                .lock()
                .expect("responses lock")
                .insert(tag.to_string(), response);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl PostSource for FakeSource {
        async fn fetch_tag(
            &self,
            tag: &str,
            sort_by: Option<SortField>,
            direction: Option<Direction>,
        ) -> Result<Vec<Post>, UpstreamError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((tag.to_string(), sort_by, direction));
            let response = self
                .responses
                .lock()
                .expect("responses lock")
                .get(tag)
                .cloned()
                .unwrap_or(Ok(Vec::new()));
            response.map_err(|status| UpstreamError::Status {
                tag: tag.to_string(),
                status,
                body: Some(json!({ "error": "unavailable" })),
            })
        }
    }

    fn post(id: i64, likes: i64) -> Post {
        serde_json::from_value(json!({
            "id": id,
            "author": format!("author-{id}"),
            "authorId": id,
            "likes": likes,
            "popularity": 0.1,
            "reads": 1,
            "tags": []
        }))
        .expect("post fixture")
    }

    fn service(source: Arc<FakeSource>) -> PostSearchService {
        PostSearchService::new(
            source,
            Arc::new(PostCache::new(&CacheConfig::default())),
            NonZeroUsize::new(4).expect("non-zero"),
        )
    }

    fn raw(query: &str) -> RawPostQuery {
        RawPostQuery::from_query_string(query)
    }

    #[tokio::test]
    async fn merges_tags_and_forwards_sort_parameters() {
        let source = Arc::new(FakeSource::default());
        source.respond("tech", Ok(vec![post(1, 5), post(2, 50)]));
        source.respond("science", Ok(vec![post(2, 50), post(3, 20)]));
        let service = service(source.clone());

        let outcome = service
            .search(&raw("tags=tech,science&sortBy=likes&direction=desc"))
            .await
            .expect("search succeeds");

        assert_eq!(outcome.signature, "tech,science-likes-desc");
        assert_eq!(outcome.cache, CacheStatus::Miss);
        let ids: Vec<i64> = outcome.posts.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(
            source.calls(),
            vec![
                (
                    "tech".to_string(),
                    Some(SortField::Likes),
                    Some(Direction::Desc)
                ),
                (
                    "science".to_string(),
                    Some(SortField::Likes),
                    Some(Direction::Desc)
                ),
            ]
        );
    }

    #[tokio::test]
    async fn omitted_sort_parameters_are_not_forwarded() {
        let source = Arc::new(FakeSource::default());
        let service = service(source.clone());

        service.search(&raw("tags=tech")).await.expect("search succeeds");
        assert_eq!(source.calls(), vec![("tech".to_string(), None, None)]);
    }

    #[tokio::test]
    async fn second_identical_search_is_served_from_cache() {
        let source = Arc::new(FakeSource::default());
        source.respond("tech", Ok(vec![post(1, 5)]));
        let service = service(source.clone());

        let first = service
            .search(&raw("tags=tech&sortBy=id"))
            .await
            .expect("first search");

        source.respond("tech", Ok(vec![post(1, 5), post(9, 9)]));
        let second = service
            .search(&raw("tags=tech&sortBy=id"))
            .await
            .expect("second search");

        assert_eq!(first.cache, CacheStatus::Miss);
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(first.posts, second.posts);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn failing_tag_aborts_and_caches_nothing() {
        let source = Arc::new(FakeSource::default());
        source.respond("tech", Ok(vec![post(1, 5)]));
        source.respond("science", Err(503));
        let service = service(source.clone());

        let err = service
            .search(&raw("tags=tech,science"))
            .await
            .expect_err("upstream failure");
        assert!(matches!(
            err,
            SearchError::Upstream(UpstreamError::Status { status: 503, .. })
        ));

        source.respond("science", Ok(Vec::new()));
        service
            .search(&raw("tags=tech,science"))
            .await
            .expect("retry succeeds");
        assert_eq!(source.calls().len(), 4);
    }

    #[tokio::test]
    async fn invalid_query_never_reaches_upstream() {
        let source = Arc::new(FakeSource::default());
        let service = service(source.clone());

        let err = service
            .search(&raw("tags=tech&direction=sideways"))
            .await
            .expect_err("invalid direction");
        assert!(matches!(
            err,
            SearchError::Query(QueryError::InvalidDirection)
        ));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn search_runs_on_a_spawned_task() {
        let source = Arc::new(FakeSource::default());
        source.respond("tech", Ok(vec![post(1, 5)]));
        source.respond("science", Ok(vec![post(2, 7)]));
        let service = Arc::new(service(source));

        let query = raw("tags=tech,science&sortBy=likes");
        let outcome = tokio::spawn(async move { service.search(&query).await })
            .await
            .expect("search task joins")
            .expect("search succeeds");

        let ids: Vec<i64> = outcome.posts.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
