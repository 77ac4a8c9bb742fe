//! Tag-merging proxy for an upstream blog posts API.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
