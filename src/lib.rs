//! Data-aggregation core of a streaming-catalog front end: a TMDB metadata
//! client with detail enrichment, a debounced search aggregator, a live
//! favorites store, a locally persisted ratings store, and the genre
//! taxonomy reconciler the filter selectors feed from.

pub mod favorites;
pub mod genres;
pub mod models;
pub mod ratings;
pub mod search;
pub mod session;
pub mod tmdb;
