//! Merging per-tag upstream batches into one ordered result list.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::entities::Post;
use super::types::{Direction, SortField};

/// Identity used to collapse duplicates across tag batches.
///
/// The sort value is part of the key, so two records sharing an `id` but
/// disagreeing on the sort field are both kept. A record without the sort
/// field is keyed by `id` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DedupKey {
    id: i64,
    sort_bits: Option<u64>,
}

impl DedupKey {
    fn of(post: &Post, sort_by: Option<SortField>) -> Self {
        Self {
            id: post.id,
            sort_bits: sort_by
                .and_then(|field| post.sort_value(field))
                .map(f64::to_bits),
        }
    }
}

/// Deduplicate `batches` in call order, then order by `sort_by`.
///
/// A later duplicate replaces the earlier record but keeps its position.
/// Ordering is stable, so ties stay in merged order. Without `sort_by` the
/// merged order is returned unchanged.
pub fn merge_posts<I>(batches: I, sort_by: Option<SortField>, direction: Direction) -> Vec<Post>
where
    I: IntoIterator<Item = Vec<Post>>,
{
    let mut merged: Vec<Post> = Vec::new();
    let mut positions: HashMap<DedupKey, usize> = HashMap::new();

    for post in batches.into_iter().flatten() {
        let key = DedupKey::of(&post, sort_by);
        match positions.get(&key) {
            Some(&index) => merged[index] = post,
            None => {
                positions.insert(key, merged.len());
                merged.push(post);
            }
        }
    }

    if let Some(field) = sort_by {
        sort_posts(&mut merged, field, direction);
    }

    merged
}

fn sort_posts(posts: &mut [Post], field: SortField, direction: Direction) {
    posts.sort_by(|left, right| {
        let ordering = compare_values(left.sort_value(field), right.sort_value(field));
        match direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    });
}

/// Records missing the sort field order below every present value.
fn compare_values(left: Option<f64>, right: Option<f64>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}
