//! Request-facing orchestration over the matcher and extractor layers.

pub mod detail;
pub mod streaming;

pub use detail::{CatalogDetail, DetailService, EpisodeEntry};
pub use streaming::{EpisodeStreams, StreamingItem, StreamingService, VaultOutcome};
