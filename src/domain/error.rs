use thiserror::Error;

/// Rejections produced while validating a posts query.
///
/// Display strings are returned to clients verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Tags parameter is required")]
    MissingTags,
    #[error("SortBy parameter is invalid")]
    InvalidSortBy,
    #[error("Direction parameter is invalid")]
    InvalidDirection,
}
