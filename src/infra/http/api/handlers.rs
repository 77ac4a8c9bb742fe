//! Posts and health handlers

use axum::Json;
use axum::extract::{RawQuery, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::entities::PostList;
use crate::domain::query::RawPostQuery;

use crate::infra::http::middleware::SearchTrace;

use super::error::ApiError;
use super::state::ApiState;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub success: bool,
}

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { success: true })
}

pub async fn search_posts(
    State(state): State<ApiState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let raw = RawPostQuery::from_query_string(query.as_deref().unwrap_or_default());

    // Detached: a fan-out outlives a dropped client and still fills the cache.
    let search = state.search.clone();
    let outcome = tokio::spawn(async move { search.search(&raw).await })
        .await
        .map_err(|err| ApiError::internal(format!("search task failed: {err}")))??;

    let trace = SearchTrace {
        signature: outcome.signature,
        cache: outcome.cache,
        count: outcome.posts.len(),
    };
    let mut response = Json(PostList {
        posts: outcome.posts,
    })
    .into_response();
    trace.attach(&mut response);
    Ok(response)
}

pub async fn not_found() -> ApiError {
    ApiError::not_found()
}
