//! Shared schemas for the pipeline
//!
//! Every worker shares these records. Wire form is UTF-8 JSON with
//! snake_case keys and ISO-8601 UTC timestamps.

pub mod article;
pub mod common;
pub mod search;

pub use article::*;
pub use common::*;
pub use search::*;
