//! anistream-core: identity resolution, streaming aggregation, and video
//! URL extraction for the anistream server.
//!
//! The pipeline runs catalog id + episode number through four stages:
//! resolve the title's per-provider slugs, scrape embed references for the
//! episode, extract direct media URLs, and hand delivery codes to the HTTP
//! layer. Site scrapers, the catalog client, and durable storage sit
//! behind the traits in [`traits`] and are injected at bootstrap.

pub mod clock;
pub mod config;
pub mod error;
pub mod extractor;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod service;
pub mod store;
pub mod traits;

pub use error::{Error, Result};
