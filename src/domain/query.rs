//! Parsing and validation of `/api/posts` query parameters.

use url::form_urlencoded;

use super::error::QueryError;
use super::types::{Direction, SortField};

/// Query parameters exactly as the client supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPostQuery {
    pub tags: Option<String>,
    pub sort_by: Option<String>,
    pub direction: Option<String>,
}

impl RawPostQuery {
    /// Read the parameters from a raw URL query string.
    ///
    /// Repeated `tags` keys are joined with `,`; for `sortBy` and `direction`
    /// the first occurrence wins.
    pub fn from_query_string(query: &str) -> Self {
        let mut raw = RawPostQuery::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "tags" => match raw.tags.as_mut() {
                    Some(tags) => {
                        tags.push(',');
                        tags.push_str(&value);
                    }
                    None => raw.tags = Some(value.into_owned()),
                },
                "sortBy" if raw.sort_by.is_none() => raw.sort_by = Some(value.into_owned()),
                "direction" if raw.direction.is_none() => {
                    raw.direction = Some(value.into_owned())
                }
                _ => {}
            }
        }
        raw
    }

    /// Cache signature built from the literal parameter values.
    ///
    /// Tag order is significant: `a,b` and `b,a` map to different entries.
    pub fn signature(&self) -> String {
        format!(
            "{}-{}-{}",
            self.tags.as_deref().unwrap_or_default(),
            self.sort_by.as_deref().unwrap_or_default(),
            self.direction.as_deref().unwrap_or_default(),
        )
    }
}

/// A validated posts query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub tags: Vec<String>,
    pub sort_by: Option<SortField>,
    /// Direction as supplied; `None` lets the upstream pick its own ordering.
    pub direction: Option<Direction>,
    pub signature: String,
}

impl PostQuery {
    /// Validate raw parameters, reporting only the first failing rule.
    pub fn parse(raw: &RawPostQuery) -> Result<Self, QueryError> {
        let tags = split_tags(raw.tags.as_deref().unwrap_or_default());
        if tags.is_empty() {
            return Err(QueryError::MissingTags);
        }

        let sort_by = raw
            .sort_by
            .as_deref()
            .map(str::parse::<SortField>)
            .transpose()?;
        let direction = raw
            .direction
            .as_deref()
            .map(str::parse::<Direction>)
            .transpose()?;

        Ok(Self {
            tags,
            sort_by,
            direction,
            signature: raw.signature(),
        })
    }

    /// Direction applied when ordering merged results locally.
    pub fn effective_direction(&self) -> Direction {
        self.direction.unwrap_or_default()
    }
}

fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
