//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod merge;
pub mod query;
pub mod types;
