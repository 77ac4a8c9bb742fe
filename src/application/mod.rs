//! Application services orchestrating validation, caching and upstream access.

pub mod error;
pub mod posts;
pub mod source;
