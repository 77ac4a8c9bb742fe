use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use httpmock::MockServer;
use serde_json::{Value, json};
use tagfeed::application::posts::PostSearchService;
use tagfeed::cache::{CacheConfig, PostCache};
use tagfeed::config::UpstreamSettings;
use tagfeed::infra::http::{ApiState, build_api_router};
use tagfeed::infra::upstream::UpstreamClient;
use tower::ServiceExt;
use url::Url;

const POSTS_PATH: &str = "/assessment/blog/posts";

fn router_for(server: &MockServer) -> Router {
    let settings = UpstreamSettings {
        base_url: Url::parse(&server.base_url()).expect("mock server url"),
        timeout: Duration::from_secs(5),
        max_concurrency: NonZeroUsize::new(4).expect("non-zero"),
    };
    let upstream = UpstreamClient::new(&settings).expect("upstream client");
    let cache = Arc::new(PostCache::new(&CacheConfig::default()));
    let search = PostSearchService::new(Arc::new(upstream), cache, settings.max_concurrency);

    build_api_router(ApiState {
        search: Arc::new(search),
    })
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let body = serde_json::from_slice(&bytes).expect("json body");
    (status, body)
}

fn post(id: i64, likes: i64, tag: &str) -> Value {
    json!({
        "id": id,
        "author": format!("Author {id}"),
        "authorId": id * 3,
        "likes": likes,
        "popularity": 0.25,
        "reads": id * 1000,
        "tags": [tag]
    })
}

fn ids(body: &Value) -> Vec<i64> {
    body["posts"]
        .as_array()
        .expect("posts array")
        .iter()
        .map(|post| post["id"].as_i64().expect("post id"))
        .collect()
}

#[tokio::test]
async fn ping_reports_success() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, body) = get(&router, "/api/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn missing_parameters_are_rejected_in_order() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let cases = [
        ("/api/posts", "Tags parameter is required"),
        ("/api/posts?tags=", "Tags parameter is required"),
        (
            "/api/posts?sortBy=bogus&direction=bogus",
            "Tags parameter is required",
        ),
        (
            "/api/posts?tags=tech&sortBy=author&direction=bogus",
            "SortBy parameter is invalid",
        ),
        (
            "/api/posts?tags=tech&sortBy=likes&direction=bogus",
            "Direction parameter is invalid",
        ),
    ];

    for (uri, message) in cases {
        let (status, body) = get(&router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, json!({ "error": message }), "{uri}");
    }
}

#[tokio::test]
async fn merges_deduplicates_and_sorts_descending() {
    let server = MockServer::start_async().await;
    let tech = server
        .mock_async(|when, then| {
            when.method("GET")
                .path(POSTS_PATH)
                .query_param("tag", "tech")
                .query_param("sortBy", "likes")
                .query_param("direction", "desc");
            then.status(200).json_body(json!({
                "posts": [post(1, 10, "tech"), post(2, 40, "tech")]
            }));
        })
        .await;
    let science = server
        .mock_async(|when, then| {
            when.method("GET")
                .path(POSTS_PATH)
                .query_param("tag", "science")
                .query_param("sortBy", "likes")
                .query_param("direction", "desc");
            then.status(200).json_body(json!({
                "posts": [post(2, 40, "tech"), post(3, 25, "science")]
            }));
        })
        .await;
    let router = router_for(&server);

    let (status, body) = get(
        &router,
        "/api/posts?tags=tech,science&sortBy=likes&direction=desc",
    )
    .await;

    tech.assert_async().await;
    science.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![2, 3, 1]);

    let likes: Vec<i64> = body["posts"]
        .as_array()
        .expect("posts array")
        .iter()
        .map(|post| post["likes"].as_i64().expect("likes"))
        .collect();
    assert!(likes.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(body["posts"][0]["authorId"], json!(6));
}

#[tokio::test]
async fn sort_without_direction_orders_ascending() {
    let server = MockServer::start_async().await;
    let tech = server
        .mock_async(|when, then| {
            when.method("GET")
                .path(POSTS_PATH)
                .query_param("tag", "tech")
                .query_param("sortBy", "likes")
                .query_param_missing("direction");
            then.status(200).json_body(json!({
                "posts": [post(1, 30, "tech"), post(2, 10, "tech"), post(3, 20, "tech")]
            }));
        })
        .await;
    let router = router_for(&server);

    let (status, body) = get(&router, "/api/posts?tags=tech&sortBy=likes").await;

    tech.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![2, 3, 1]);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let server = MockServer::start_async().await;
    let mut first = server
        .mock_async(|when, then| {
            when.method("GET")
                .path(POSTS_PATH)
                .query_param("tag", "history");
            then.status(200)
                .json_body(json!({ "posts": [post(5, 1, "history")] }));
        })
        .await;
    let router = router_for(&server);
    let uri = "/api/posts?tags=history&sortBy=id";

    let (status, before) = get(&router, uri).await;
    assert_eq!(status, StatusCode::OK);
    first.assert_hits_async(1).await;

    // upstream data changes; the cached answer must not
    first.delete_async().await;
    let second = server
        .mock_async(|when, then| {
            when.method("GET")
                .path(POSTS_PATH)
                .query_param("tag", "history");
            then.status(200).json_body(json!({
                "posts": [post(5, 1, "history"), post(6, 2, "history")]
            }));
        })
        .await;

    let (status, after) = get(&router, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before, after);
    second.assert_hits_async(0).await;

    // the literal tags value keys the cache, so a trailing comma misses it
    let (_, trailing) = get(&router, "/api/posts?tags=history,&sortBy=id").await;
    assert_eq!(ids(&trailing), vec![5, 6]);
    second.assert_hits_async(1).await;
}

#[tokio::test]
async fn one_failing_tag_fails_the_whole_request() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path(POSTS_PATH).query_param("tag", "tech");
            then.status(200)
                .json_body(json!({ "posts": [post(1, 10, "tech")] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("GET")
                .path(POSTS_PATH)
                .query_param("tag", "politics");
            then.status(503)
                .json_body(json!({ "error": "Service temporarily unavailable" }));
        })
        .await;
    let router = router_for(&server);

    let (status, body) = get(&router, "/api/posts?tags=tech,politics").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Service temporarily unavailable" }));
    assert!(body.get("posts").is_none());
}

#[tokio::test]
async fn unknown_routes_return_json_not_found() {
    let server = MockServer::start_async().await;
    let router = router_for(&server);

    let (status, body) = get(&router, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Not found" }));
}
