//! Newsflow
//! Streaming news aggregation pipeline
//!
//! Articles fan in from RSS feeds and a headline API, then flow strictly
//! forward through bus-coupled stages:
//!
//! raw -> cleaned -> normalized -> enriched -> indexed -> query
//!
//! Each stage is an independently scalable worker group keyed on article
//! id. Delivery is at-least-once; stages are idempotent on id and content
//! hash, so redelivery is the only retry mechanism between stages.

pub mod api;
pub mod bus;
pub mod config;
pub mod dedup;
pub mod error;
pub mod http;
pub mod lang;
pub mod llm;
pub mod metrics;
pub mod schemas;
pub mod search;
pub mod sources;
pub mod text;
pub mod translate;
pub mod workers;
